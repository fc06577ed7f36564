//! Manager configuration.
//!
//! A [`ManagerConfig`] is built in code (`ManagerConfig::hmac`,
//! `ManagerConfig::new` plus `with_*` methods) or loaded from environment
//! variables with [`ManagerConfig::from_env`]. It is validated once when the
//! manager is built and never changes afterwards.

use crate::secret::{secret_bytes, ExposeSecret, SecretBox, SecretString};
use crate::time::parse_timespan;
use jsonwebtoken::Algorithm;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Issuer used when none is configured.
pub const DEFAULT_ISSUER: &str = "localhost";

/// Default token lifetime (one hour).
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(3600);

/// Default clock tolerance for `exp`/`nbf` checks and authority retention.
pub const DEFAULT_CLOCK_TOLERANCE: Duration = Duration::from_secs(10);

/// Maximum accepted clock tolerance (10 minutes).
///
/// Prevents misconfiguration that would keep expired tokens usable for long
/// periods.
pub const MAX_CLOCK_TOLERANCE: Duration = Duration::from_secs(600);

/// Algorithm used when none is configured.
pub const DEFAULT_ALGORITHM: Algorithm = Algorithm::HS256;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is unset.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// A variable is set but does not parse.
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    /// `none`, `ES512` or an unknown algorithm name.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The key is empty or cannot be loaded for the algorithm.
    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    /// Shared-secret material given for an asymmetric algorithm, or the
    /// reverse.
    #[error("Algorithm {algorithm} requires {expected} key material")]
    KeyMismatch {
        algorithm: String,
        expected: &'static str,
    },

    /// Clock tolerance above the allowed maximum.
    #[error("Clock tolerance of {0}s exceeds the maximum of 600s")]
    ClockToleranceTooLarge(u64),
}

/// Key family an algorithm belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmFamily {
    /// HS256, HS384, HS512
    Hmac,
    /// RS256, RS384, RS512, PS256, PS384, PS512
    Rsa,
    /// ES256, ES384
    Ecdsa,
    /// EdDSA (Ed25519)
    Eddsa,
}

/// Key family of `algorithm`.
#[must_use]
pub fn algorithm_family(algorithm: Algorithm) -> AlgorithmFamily {
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => AlgorithmFamily::Hmac,
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => AlgorithmFamily::Rsa,
        Algorithm::ES256 | Algorithm::ES384 => AlgorithmFamily::Ecdsa,
        Algorithm::EdDSA => AlgorithmFamily::Eddsa,
    }
}

/// Parse a JOSE algorithm name.
///
/// `none` (unsigned tokens) and `ES512` are not supported by the signing
/// backend and are rejected here rather than at first use.
///
/// # Errors
///
/// Returns `ConfigError::UnsupportedAlgorithm` for unknown or unsupported names.
pub fn parse_algorithm(name: &str) -> Result<Algorithm, ConfigError> {
    let name = name.trim();
    if name.eq_ignore_ascii_case("none") || name == "ES512" {
        return Err(ConfigError::UnsupportedAlgorithm(name.to_string()));
    }
    Algorithm::from_str(name).map_err(|_| ConfigError::UnsupportedAlgorithm(name.to_string()))
}

/// Signing and verification key material.
///
/// Private parts are held in secret wrappers; Debug output is redacted.
pub enum KeyMaterial {
    /// Shared secret for HMAC algorithms.
    Secret(SecretBox<Vec<u8>>),

    /// PEM-encoded keys for RSA, ECDSA and EdDSA. Without a private key the
    /// manager can verify but not sign.
    Pem {
        private_key: Option<SecretString>,
        public_key: String,
    },

    /// DER-encoded keys (PKCS#8 private key, SubjectPublicKeyInfo or raw
    /// public key bytes as accepted by the signing backend).
    Der {
        private_key: Option<SecretBox<Vec<u8>>>,
        public_key: Vec<u8>,
    },
}

impl KeyMaterial {
    /// Shared secret for HMAC algorithms.
    #[must_use]
    pub fn secret(secret: impl Into<Vec<u8>>) -> Self {
        Self::Secret(secret_bytes(secret))
    }

    /// PEM key pair.
    #[must_use]
    pub fn pem(private_key: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self::Pem {
            private_key: Some(SecretString::from(private_key.into())),
            public_key: public_key.into(),
        }
    }

    /// PEM public key only (verify-only manager).
    #[must_use]
    pub fn public_pem(public_key: impl Into<String>) -> Self {
        Self::Pem {
            private_key: None,
            public_key: public_key.into(),
        }
    }

    /// DER key pair.
    #[must_use]
    pub fn der(private_key: impl Into<Vec<u8>>, public_key: impl Into<Vec<u8>>) -> Self {
        Self::Der {
            private_key: Some(secret_bytes(private_key)),
            public_key: public_key.into(),
        }
    }

    /// Whether this material can produce signatures.
    #[must_use]
    pub fn can_sign(&self) -> bool {
        match self {
            Self::Secret(_) => true,
            Self::Pem { private_key, .. } => private_key.is_some(),
            Self::Der { private_key, .. } => private_key.is_some(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Secret(_) => "secret",
            Self::Pem { .. } => "pem",
            Self::Der { .. } => "der",
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("kind", &self.kind())
            .field("can_sign", &self.can_sign())
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Configuration for a [`JwtManager`](crate::manager::JwtManager).
#[derive(Debug)]
pub struct ManagerConfig {
    /// Signature algorithm.
    pub algorithm: Algorithm,

    /// Signing / verification keys.
    pub keys: KeyMaterial,

    /// Issuer written to `iss` and required at verification.
    pub issuer: String,

    /// Default audience. `None` means "same as the issuer".
    pub audience: Option<Vec<String>>,

    /// Default token lifetime.
    pub expiry: Duration,

    /// Clock tolerance for `exp`/`nbf` checks and authority retention.
    pub clock_tolerance: Duration,
}

impl ManagerConfig {
    /// Create a configuration with default issuer, expiry and tolerance.
    #[must_use]
    pub fn new(algorithm: Algorithm, keys: KeyMaterial) -> Self {
        Self {
            algorithm,
            keys,
            issuer: DEFAULT_ISSUER.to_string(),
            audience: None,
            expiry: DEFAULT_EXPIRY,
            clock_tolerance: DEFAULT_CLOCK_TOLERANCE,
        }
    }

    /// HS256 configuration with a shared secret.
    #[must_use]
    pub fn hmac(secret: impl Into<Vec<u8>>) -> Self {
        Self::new(DEFAULT_ALGORITHM, KeyMaterial::secret(secret))
    }

    /// Set the algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the issuer.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Set the default audience list.
    #[must_use]
    pub fn with_audience<I, S>(mut self, audience: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.audience = Some(audience.into_iter().map(Into::into).collect());
        self
    }

    /// Set the default token lifetime.
    #[must_use]
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    /// Set the clock tolerance.
    #[must_use]
    pub fn with_clock_tolerance(mut self, tolerance: Duration) -> Self {
        self.clock_tolerance = tolerance;
        self
    }

    /// Audience used when none is given explicitly.
    #[must_use]
    pub fn effective_audience(&self) -> Vec<String> {
        match &self.audience {
            Some(audience) => audience.clone(),
            None => vec![self.issuer.clone()],
        }
    }

    /// Check the configuration for internal consistency.
    ///
    /// Key parsing itself happens when the codec is built.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "issuer".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        if let Some(audience) = &self.audience {
            if audience.is_empty() || audience.iter().any(|a| a.trim().is_empty()) {
                return Err(ConfigError::InvalidValue {
                    name: "audience".to_string(),
                    reason: "must contain at least one non-empty value".to_string(),
                });
            }
        }

        if self.expiry.as_secs() == 0 {
            return Err(ConfigError::InvalidValue {
                name: "expiry".to_string(),
                reason: "must be at least one second".to_string(),
            });
        }

        if self.clock_tolerance > MAX_CLOCK_TOLERANCE {
            return Err(ConfigError::ClockToleranceTooLarge(
                self.clock_tolerance.as_secs(),
            ));
        }

        let family = algorithm_family(self.algorithm);
        match (&self.keys, family) {
            (KeyMaterial::Secret(secret), AlgorithmFamily::Hmac) => {
                if secret.expose_secret().is_empty() {
                    return Err(ConfigError::InvalidKey("HMAC secret is empty".to_string()));
                }
            }
            (KeyMaterial::Secret(_), _) => {
                return Err(ConfigError::KeyMismatch {
                    algorithm: format!("{:?}", self.algorithm),
                    expected: "an asymmetric (PEM or DER)",
                });
            }
            (_, AlgorithmFamily::Hmac) => {
                return Err(ConfigError::KeyMismatch {
                    algorithm: format!("{:?}", self.algorithm),
                    expected: "a shared secret",
                });
            }
            _ => {}
        }

        Ok(())
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`ManagerConfig::from_vars`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// | variable | default |
    /// |---|---|
    /// | `JWT_ALGORITHM` | `HS256` |
    /// | `JWT_SECRET` | required for HMAC |
    /// | `JWT_PUBLIC_KEY_PEM` | required for asymmetric algorithms |
    /// | `JWT_PRIVATE_KEY_PEM` | optional (verify-only without it) |
    /// | `JWT_ISSUER` | `localhost` |
    /// | `JWT_AUDIENCE` | issuer, comma-separated list |
    /// | `JWT_EXPIRY` | `3600` (timespan, e.g. `"1 min"`) |
    /// | `JWT_CLOCK_TOLERANCE_SECONDS` | `10` |
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for missing keys, unparseable values, or a
    /// configuration that fails [`ManagerConfig::validate`].
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let algorithm = match vars.get("JWT_ALGORITHM") {
            Some(name) => parse_algorithm(name)?,
            None => DEFAULT_ALGORITHM,
        };

        let keys = if algorithm_family(algorithm) == AlgorithmFamily::Hmac {
            let secret = vars
                .get("JWT_SECRET")
                .ok_or_else(|| ConfigError::MissingEnvVar("JWT_SECRET".to_string()))?;
            KeyMaterial::secret(secret.as_bytes().to_vec())
        } else {
            let public_key = vars
                .get("JWT_PUBLIC_KEY_PEM")
                .ok_or_else(|| ConfigError::MissingEnvVar("JWT_PUBLIC_KEY_PEM".to_string()))?
                .clone();
            let private_key = vars
                .get("JWT_PRIVATE_KEY_PEM")
                .map(|pem| SecretString::from(pem.clone()));
            KeyMaterial::Pem {
                private_key,
                public_key,
            }
        };

        let mut config = Self::new(algorithm, keys);

        if let Some(issuer) = vars.get("JWT_ISSUER") {
            config.issuer.clone_from(issuer);
        }

        if let Some(audience) = vars.get("JWT_AUDIENCE") {
            let audience: Vec<String> = audience
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(ToString::to_string)
                .collect();
            config.audience = Some(audience);
        }

        if let Some(expiry) = vars.get("JWT_EXPIRY") {
            config.expiry = parse_timespan(expiry).map_err(|e| ConfigError::InvalidValue {
                name: "JWT_EXPIRY".to_string(),
                reason: e.to_string(),
            })?;
        }

        if let Some(tolerance) = vars.get("JWT_CLOCK_TOLERANCE_SECONDS") {
            let secs: u64 = tolerance
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                    name: "JWT_CLOCK_TOLERANCE_SECONDS".to_string(),
                    reason: e.to_string(),
                })?;
            config.clock_tolerance = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }
}
