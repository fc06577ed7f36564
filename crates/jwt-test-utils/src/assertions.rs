//! Custom test assertions for expressive tests
//!
//! Provides trait-based assertions over compact tokens. Payloads are decoded
//! without verification; use the manager to check signatures.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use serde_json::Value;

/// JWT header structure
#[derive(Debug, Deserialize)]
struct JwtHeader {
    pub alg: String,
    #[serde(default)]
    pub typ: Option<String>,
}

fn decode_part(token: &str, index: usize) -> Value {
    let parts: Vec<_> = token.split('.').collect();
    let part = parts
        .get(index)
        .unwrap_or_else(|| panic!("JWT has no part {index}"));
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .unwrap_or_else(|e| panic!("Failed to base64 decode JWT part {index}: {e}"));
    serde_json::from_slice(&bytes).unwrap_or_else(|e| panic!("Failed to parse JWT part {index}: {e}"))
}

fn payload(token: &str) -> Value {
    decode_part(token, 1)
}

/// Custom assertions for compact tokens
///
/// # Example
/// ```rust,ignore
/// token
///     .assert_valid_jwt("HS256")
///     .assert_for_subject("user-42")
///     .assert_has_audience("svc")
///     .assert_expires_in(3600);
/// ```
pub trait TokenAssertions {
    /// Assert the token is a three-part JWT signed with `algorithm`
    fn assert_valid_jwt(&self, algorithm: &str) -> &Self;

    /// Assert the token is for the specified subject
    fn assert_for_subject(&self, subject: &str) -> &Self;

    /// Assert the token lists `audience`
    fn assert_has_audience(&self, audience: &str) -> &Self;

    /// Assert the token carries the given issuer
    fn assert_issued_by(&self, issuer: &str) -> &Self;

    /// Assert the token carries a non-empty `jti`
    fn assert_has_jti(&self) -> &Self;

    /// Assert the token expires within the specified seconds (±5s)
    fn assert_expires_in(&self, seconds: i64) -> &Self;

    /// Assert an application property has the given value
    fn assert_property(&self, name: &str, value: impl Into<Value>) -> &Self;
}

impl TokenAssertions for str {
    fn assert_valid_jwt(&self, algorithm: &str) -> &Self {
        let parts: Vec<_> = self.split('.').collect();
        assert_eq!(
            parts.len(),
            3,
            "JWT must have 3 parts (header.payload.signature), got {}",
            parts.len()
        );

        let header: JwtHeader =
            serde_json::from_value(decode_part(self, 0)).expect("Failed to parse JWT header");
        assert_eq!(header.alg, algorithm, "Unexpected JWT algorithm");
        assert_eq!(header.typ.as_deref(), Some("JWT"), "Expected JWT type");

        let claims = payload(self);
        for claim in ["jti", "sub", "iss", "aud", "exp", "iat"] {
            assert!(claims.get(claim).is_some(), "JWT is missing claim '{claim}'");
        }

        self
    }

    fn assert_for_subject(&self, subject: &str) -> &Self {
        assert_eq!(payload(self)["sub"], subject, "Unexpected token subject");
        self
    }

    fn assert_has_audience(&self, audience: &str) -> &Self {
        let claims = payload(self);
        let listed = match &claims["aud"] {
            Value::String(aud) => aud == audience,
            Value::Array(auds) => auds.iter().any(|a| a == audience),
            _ => false,
        };
        assert!(
            listed,
            "Token audience {} does not include '{}'",
            claims["aud"], audience
        );
        self
    }

    fn assert_issued_by(&self, issuer: &str) -> &Self {
        assert_eq!(payload(self)["iss"], issuer, "Unexpected token issuer");
        self
    }

    fn assert_has_jti(&self) -> &Self {
        let claims = payload(self);
        let jti = claims["jti"].as_str().unwrap_or_default();
        assert!(!jti.is_empty(), "Token has no jti");
        self
    }

    fn assert_expires_in(&self, seconds: i64) -> &Self {
        let exp = payload(self)["exp"].as_i64().expect("exp must be an integer");
        let now = chrono::Utc::now().timestamp();
        let expires_in = exp - now;

        // Allow 5-second tolerance for clock skew
        assert!(
            (expires_in - seconds).abs() <= 5,
            "Token expires in {expires_in}s, expected ~{seconds}s"
        );
        self
    }

    fn assert_property(&self, name: &str, value: impl Into<Value>) -> &Self {
        let expected = value.into();
        assert_eq!(payload(self)[name], expected, "Unexpected value for property '{name}'");
        self
    }
}

impl TokenAssertions for String {
    fn assert_valid_jwt(&self, algorithm: &str) -> &Self {
        self.as_str().assert_valid_jwt(algorithm);
        self
    }

    fn assert_for_subject(&self, subject: &str) -> &Self {
        self.as_str().assert_for_subject(subject);
        self
    }

    fn assert_has_audience(&self, audience: &str) -> &Self {
        self.as_str().assert_has_audience(audience);
        self
    }

    fn assert_issued_by(&self, issuer: &str) -> &Self {
        self.as_str().assert_issued_by(issuer);
        self
    }

    fn assert_has_jti(&self) -> &Self {
        self.as_str().assert_has_jti();
        self
    }

    fn assert_expires_in(&self, seconds: i64) -> &Self {
        self.as_str().assert_expires_in(seconds);
        self
    }

    fn assert_property(&self, name: &str, value: impl Into<Value>) -> &Self {
        self.as_str().assert_property(name, value);
        self
    }
}
