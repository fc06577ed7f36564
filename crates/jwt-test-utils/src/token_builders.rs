//! Builder patterns for test data construction
//!
//! Provides fluent APIs for creating claim sets and signed tokens that the
//! manager itself would never produce (foreign `jti`, missing claims, wrong
//! issuer, already expired...).

use crate::crypto_fixtures::test_signing_key;
use crate::test_ids::{TEST_AUDIENCE, TEST_HMAC_SECRET, TEST_ISSUER, TEST_JTI_1, TEST_SUBJECT};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Builder for creating test JWT claims and tokens
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_subject("alice")
///     .with_property("role", "admin")
///     .expires_in(3600)
///     .sign_hs256(TEST_HMAC_SECRET);
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults matching the test configs
    pub fn new() -> Self {
        let now = Utc::now();
        let claims = json!({
            "jti": TEST_JTI_1.to_string(),
            "sub": TEST_SUBJECT,
            "iss": TEST_ISSUER,
            "aud": [TEST_AUDIENCE],
            "exp": (now + Duration::seconds(3600)).timestamp(),
            "iat": now.timestamp(),
        });

        Self {
            claims: claims.as_object().cloned().unwrap_or_default(),
        }
    }

    /// Set the token identifier
    pub fn with_jti(self, jti: &str) -> Self {
        self.with_claim("jti", json!(jti))
    }

    /// Set the subject
    pub fn for_subject(self, subject: &str) -> Self {
        self.with_claim("sub", json!(subject))
    }

    /// Set the issuer
    pub fn with_issuer(self, issuer: &str) -> Self {
        self.with_claim("iss", json!(issuer))
    }

    /// Set the audience list
    pub fn with_audience(self, audience: &[&str]) -> Self {
        self.with_claim("aud", json!(audience))
    }

    /// Set expiration in seconds from now (negative for already expired)
    pub fn expires_in(self, seconds: i64) -> Self {
        self.with_claim("exp", json!((Utc::now() + Duration::seconds(seconds)).timestamp()))
    }

    /// Set not-before in seconds from now
    pub fn not_before_in(self, seconds: i64) -> Self {
        self.with_claim("nbf", json!((Utc::now() + Duration::seconds(seconds)).timestamp()))
    }

    /// Set issued-at timestamp
    pub fn issued_at(self, timestamp: i64) -> Self {
        self.with_claim("iat", json!(timestamp))
    }

    /// Add an application property
    pub fn with_property(self, name: &str, value: impl Into<Value>) -> Self {
        self.with_claim(name, value.into())
    }

    /// Set any claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim entirely
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }

    /// Sign with HS256 and `secret`
    pub fn sign_hs256(self, secret: &str) -> String {
        self.sign_with(Algorithm::HS256, &EncodingKey::from_secret(secret.as_bytes()))
    }

    /// Sign with HS256 and the default test secret
    pub fn sign(self) -> String {
        self.sign_hs256(TEST_HMAC_SECRET)
    }

    /// Sign with EdDSA using the deterministic key for `seed`
    pub fn sign_eddsa(self, seed: u8) -> String {
        let keys = test_signing_key(seed).expect("deterministic test key");
        self.sign_with(Algorithm::EdDSA, &EncodingKey::from_ed_der(&keys.private_key_pkcs8))
    }

    fn sign_with(self, algorithm: Algorithm, key: &EncodingKey) -> String {
        encode(&Header::new(algorithm), &self.build(), key).expect("Failed to sign test token")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
