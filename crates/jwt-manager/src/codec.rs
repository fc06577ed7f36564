//! Compact JWT signing, verification and structural decoding.
//!
//! This module wraps `jsonwebtoken` behind a small surface:
//! - [`JwtCodec::sign`] turns a claim set into a compact token
//! - [`JwtCodec::verify`] checks signature, algorithm, `iss`, `aud`, `exp`
//!   and `nbf` (with clock tolerance) and returns the claim set
//! - [`JwtCodec::decode`] reads the payload without any verification
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only the configured algorithm is accepted
//! - Rejections carry a generic message; the detailed cause is logged at
//!   debug level and exposed as a bounded [`TokenRejection::reason`]

use crate::claims::Claims;
use crate::config::{algorithm_family, AlgorithmFamily, ConfigError, KeyMaterial};
use crate::secret::ExposeSecret;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Maximum allowed JWT size in bytes (8KB).
///
/// Typical tokens are a few hundred bytes. Larger tokens are rejected before
/// any base64 decoding or signature verification.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Claims that must be present for verification to succeed.
const REQUIRED_SPEC_CLAIMS: [&str; 4] = ["exp", "sub", "iss", "aud"];

/// Reasons the codec refuses a token.
///
/// All variants display the same generic message to prevent information
/// leakage. Use [`TokenRejection::reason`] for logs and metrics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenRejection {
    /// Token size exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("The token is invalid or expired")]
    TooLarge,

    /// Token is not a well-formed JWT or its payload does not match the claim set.
    #[error("The token is invalid or expired")]
    Malformed,

    /// Signature does not match.
    #[error("The token is invalid or expired")]
    BadSignature,

    /// `exp` is in the past beyond the clock tolerance.
    #[error("The token is invalid or expired")]
    Expired,

    /// `nbf` is in the future beyond the clock tolerance.
    #[error("The token is invalid or expired")]
    NotYetValid,

    /// `iss` does not match the configured issuer.
    #[error("The token is invalid or expired")]
    WrongIssuer,

    /// None of the token's audiences is accepted.
    #[error("The token is invalid or expired")]
    WrongAudience,

    /// Header algorithm differs from the configured one.
    #[error("The token is invalid or expired")]
    WrongAlgorithm,

    /// A required claim is absent.
    #[error("The token is invalid or expired")]
    MissingClaim(String),
}

impl TokenRejection {
    /// Bounded label describing the rejection.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::TooLarge => "too_large",
            Self::Malformed => "malformed",
            Self::BadSignature => "bad_signature",
            Self::Expired => "expired",
            Self::NotYetValid => "not_yet_valid",
            Self::WrongIssuer => "wrong_issuer",
            Self::WrongAudience => "wrong_audience",
            Self::WrongAlgorithm => "wrong_algorithm",
            Self::MissingClaim(_) => "missing_claim",
        }
    }
}

impl From<&ErrorKind> for TokenRejection {
    fn from(kind: &ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidSignature => Self::BadSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::InvalidIssuer => Self::WrongIssuer,
            ErrorKind::InvalidAudience => Self::WrongAudience,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => Self::WrongAlgorithm,
            ErrorKind::MissingRequiredClaim(claim) => Self::MissingClaim(claim.clone()),
            _ => Self::Malformed,
        }
    }
}

/// Errors raised while signing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    /// The codec was built from a public key only.
    #[error("No private key configured; tokens can only be verified")]
    NoSigningKey,

    /// The signing backend failed.
    #[error("Token signing failed: {0}")]
    Failed(String),
}

/// Parameters checked by [`JwtCodec::verify`].
#[derive(Debug, Clone, Copy)]
pub struct VerifyOptions<'a> {
    /// Required issuer.
    pub issuer: &'a str,
    /// Accepted audiences; the token must name at least one.
    pub audience: &'a [String],
    /// Allowed skew for `exp` and `nbf`.
    pub clock_tolerance: Duration,
}

/// Signs and verifies compact JWTs with one algorithm and key pair.
pub struct JwtCodec {
    algorithm: Algorithm,
    encoding_key: Option<EncodingKey>,
    decoding_key: DecodingKey,
}

impl fmt::Debug for JwtCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtCodec")
            .field("algorithm", &self.algorithm)
            .field("can_sign", &self.can_sign())
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

impl JwtCodec {
    /// Build a codec, parsing the key material for `algorithm`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::KeyMismatch` if the key material does not fit the
    /// algorithm family, or `ConfigError::InvalidKey` if a PEM key cannot be
    /// parsed.
    pub fn new(algorithm: Algorithm, keys: &KeyMaterial) -> Result<Self, ConfigError> {
        let family = algorithm_family(algorithm);

        let (encoding_key, decoding_key) = match (keys, family) {
            (KeyMaterial::Secret(secret), AlgorithmFamily::Hmac) => {
                let secret = secret.expose_secret();
                (
                    Some(EncodingKey::from_secret(secret)),
                    DecodingKey::from_secret(secret),
                )
            }
            (KeyMaterial::Secret(_), _) | (_, AlgorithmFamily::Hmac) => {
                return Err(ConfigError::KeyMismatch {
                    algorithm: format!("{algorithm:?}"),
                    expected: if family == AlgorithmFamily::Hmac {
                        "a shared secret"
                    } else {
                        "an asymmetric (PEM or DER)"
                    },
                });
            }
            (
                KeyMaterial::Pem {
                    private_key,
                    public_key,
                },
                _,
            ) => {
                let encoding_key = private_key
                    .as_ref()
                    .map(|pem| encoding_key_from_pem(family, pem.expose_secret().as_bytes()))
                    .transpose()?;
                (
                    encoding_key,
                    decoding_key_from_pem(family, public_key.as_bytes())?,
                )
            }
            (
                KeyMaterial::Der {
                    private_key,
                    public_key,
                },
                _,
            ) => {
                let encoding_key = private_key
                    .as_ref()
                    .map(|der| encoding_key_from_der(family, der.expose_secret()));
                (encoding_key, decoding_key_from_der(family, public_key))
            }
        };

        Ok(Self {
            algorithm,
            encoding_key,
            decoding_key,
        })
    }

    /// The configured algorithm.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Whether this codec holds a signing key.
    #[must_use]
    pub fn can_sign(&self) -> bool {
        self.encoding_key.is_some()
    }

    /// Sign `claims` into a compact token.
    ///
    /// # Errors
    ///
    /// Returns `SigningError::NoSigningKey` for verify-only codecs and
    /// `SigningError::Failed` if the backend cannot serialize or sign.
    pub fn sign<P: Serialize>(&self, claims: &Claims<P>) -> Result<String, SigningError> {
        let encoding_key = self.encoding_key.as_ref().ok_or(SigningError::NoSigningKey)?;

        let mut header = Header::new(self.algorithm);
        header.typ = Some("JWT".to_string());

        jsonwebtoken::encode(&header, claims, encoding_key).map_err(|e| {
            tracing::debug!(target: "jwt_manager.codec", error = %e, "Token signing failed");
            SigningError::Failed(e.to_string())
        })
    }

    /// Verify `token` and return its claim set.
    ///
    /// Checks, in order: size, structure, algorithm, signature, `exp`, `nbf`,
    /// `iss`, `aud`, and presence of `exp`/`sub`/`iss`/`aud`.
    ///
    /// # Errors
    ///
    /// Returns the `TokenRejection` describing the first failed check.
    pub fn verify<P: DeserializeOwned>(
        &self,
        token: &str,
        options: &VerifyOptions<'_>,
    ) -> Result<Claims<P>, TokenRejection> {
        check_size(token)?;

        let mut validation = Validation::new(self.algorithm);
        validation.leeway = options.clock_tolerance.as_secs();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[options.issuer]);
        validation.set_audience(options.audience);
        validation.set_required_spec_claims(&REQUIRED_SPEC_CLAIMS);

        jsonwebtoken::decode::<Claims<P>>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let rejection = TokenRejection::from(e.kind());
                tracing::debug!(
                    target: "jwt_manager.codec",
                    error = %e,
                    reason = rejection.reason(),
                    "Token verification failed"
                );
                rejection
            })
    }

    /// Decode the payload of `token` without verifying anything.
    ///
    /// The result must not be trusted; it is meant for revocation and
    /// diagnostics.
    ///
    /// # Errors
    ///
    /// Returns `TokenRejection::TooLarge` or `TokenRejection::Malformed`.
    pub fn decode<P: DeserializeOwned>(token: &str) -> Result<Claims<P>, TokenRejection> {
        Self::decode_payload(token)
    }

    /// Decode the payload of `token` into any shape, without verification.
    ///
    /// # Errors
    ///
    /// Returns `TokenRejection::TooLarge` or `TokenRejection::Malformed`.
    pub fn decode_payload<T: DeserializeOwned>(token: &str) -> Result<T, TokenRejection> {
        check_size(token)?;

        // JWT format: header.payload.signature
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            tracing::debug!(
                target: "jwt_manager.codec",
                parts = parts.len(),
                "Token rejected: invalid JWT format"
            );
            return Err(TokenRejection::Malformed);
        }

        let payload_part = parts.get(1).ok_or(TokenRejection::Malformed)?;
        let payload = URL_SAFE_NO_PAD.decode(payload_part).map_err(|e| {
            tracing::debug!(target: "jwt_manager.codec", error = %e, "Failed to decode JWT payload base64");
            TokenRejection::Malformed
        })?;

        serde_json::from_slice(&payload).map_err(|e| {
            tracing::debug!(target: "jwt_manager.codec", error = %e, "Failed to parse JWT payload JSON");
            TokenRejection::Malformed
        })
    }
}

fn check_size(token: &str) -> Result<(), TokenRejection> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "jwt_manager.codec",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(TokenRejection::TooLarge);
    }
    Ok(())
}

fn encoding_key_from_pem(family: AlgorithmFamily, pem: &[u8]) -> Result<EncodingKey, ConfigError> {
    let key = match family {
        AlgorithmFamily::Rsa => EncodingKey::from_rsa_pem(pem),
        AlgorithmFamily::Ecdsa => EncodingKey::from_ec_pem(pem),
        AlgorithmFamily::Eddsa => EncodingKey::from_ed_pem(pem),
        AlgorithmFamily::Hmac => Ok(EncodingKey::from_secret(pem)),
    };
    key.map_err(|e| ConfigError::InvalidKey(format!("private key: {e}")))
}

fn decoding_key_from_pem(family: AlgorithmFamily, pem: &[u8]) -> Result<DecodingKey, ConfigError> {
    let key = match family {
        AlgorithmFamily::Rsa => DecodingKey::from_rsa_pem(pem),
        AlgorithmFamily::Ecdsa => DecodingKey::from_ec_pem(pem),
        AlgorithmFamily::Eddsa => DecodingKey::from_ed_pem(pem),
        AlgorithmFamily::Hmac => Ok(DecodingKey::from_secret(pem)),
    };
    key.map_err(|e| ConfigError::InvalidKey(format!("public key: {e}")))
}

fn encoding_key_from_der(family: AlgorithmFamily, der: &[u8]) -> EncodingKey {
    match family {
        AlgorithmFamily::Rsa => EncodingKey::from_rsa_der(der),
        AlgorithmFamily::Ecdsa => EncodingKey::from_ec_der(der),
        AlgorithmFamily::Eddsa => EncodingKey::from_ed_der(der),
        AlgorithmFamily::Hmac => EncodingKey::from_secret(der),
    }
}

fn decoding_key_from_der(family: AlgorithmFamily, der: &[u8]) -> DecodingKey {
    match family {
        AlgorithmFamily::Rsa => DecodingKey::from_rsa_der(der),
        AlgorithmFamily::Ecdsa => DecodingKey::from_ec_der(der),
        AlgorithmFamily::Eddsa => DecodingKey::from_ed_der(der),
        AlgorithmFamily::Hmac => DecodingKey::from_secret(der),
    }
}
