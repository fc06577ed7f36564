//! Claim set carried by every token issued by the manager.
//!
//! Standard claims are typed fields; application-defined properties are a
//! host-chosen type `P` flattened into the same JSON object. `P` must not
//! serialize any of [`RESERVED_CLAIMS`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

/// Claim names owned by the manager. Application properties may not use them.
pub const RESERVED_CLAIMS: [&str; 7] = ["jti", "sub", "iss", "aud", "exp", "iat", "nbf"];

/// Bounds required of application property types.
///
/// Implemented for every type that satisfies them.
pub trait ClaimProperties: Serialize + DeserializeOwned + Default + Send + Sync + 'static {}

impl<T> ClaimProperties for T where T: Serialize + DeserializeOwned + Default + Send + Sync + 'static {}

/// Property type for managers that add nothing beyond the standard claims.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoProperties {}

/// Errors raised when application properties cannot be merged into a claim set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PropertiesError {
    /// A property uses a reserved claim name.
    #[error("Property name collides with reserved claim: {0}")]
    ReservedName(String),

    /// Properties did not serialize to a JSON object.
    #[error("Properties must serialize to a JSON object")]
    NotAnObject,

    /// Properties could not be serialized at all.
    #[error("Properties could not be serialized: {0}")]
    Serialization(String),
}

/// Decoded token payload.
///
/// The `sub` field is redacted in Debug output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims<P = NoProperties> {
    /// Token identifier, used for revocation tracking.
    pub jti: String,

    /// Subject (principal identifier) - redacted in Debug output.
    pub sub: String,

    /// Issuer.
    pub iss: String,

    /// Audience. Accepts a single string or an array when decoding.
    #[serde(deserialize_with = "deserialize_audience")]
    pub aud: Vec<String>,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Not-before timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Application-defined properties.
    #[serde(flatten)]
    pub properties: P,
}

impl<P: fmt::Debug> fmt::Debug for Claims<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("jti", &self.jti)
            .field("sub", &"[REDACTED]")
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("nbf", &self.nbf)
            .field("properties", &self.properties)
            .finish()
    }
}

impl<P> Claims<P> {
    /// Whether `audience` is one of the token's audiences.
    #[must_use]
    pub fn has_audience(&self, audience: &str) -> bool {
        self.aud.iter().any(|a| a == audience)
    }

    /// Lifetime in seconds as issued (`exp - iat`).
    #[must_use]
    pub fn lifetime_secs(&self) -> i64 {
        self.exp.saturating_sub(self.iat)
    }
}

/// Verify that `properties` serialize to a JSON object free of reserved names.
///
/// A unit-like value serializing to `null` is accepted as "no properties".
///
/// # Errors
///
/// Returns `PropertiesError` if a reserved name is used, the value is not an
/// object, or serialization fails.
pub fn check_properties<P: Serialize>(properties: &P) -> Result<(), PropertiesError> {
    let value = serde_json::to_value(properties)
        .map_err(|e| PropertiesError::Serialization(e.to_string()))?;

    match value {
        serde_json::Value::Object(map) => {
            if let Some(name) = map.keys().find(|k| RESERVED_CLAIMS.contains(&k.as_str())) {
                return Err(PropertiesError::ReservedName(name.clone()));
            }
            Ok(())
        }
        serde_json::Value::Null => Ok(()),
        _ => Err(PropertiesError::NotAnObject),
    }
}

fn deserialize_audience<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(aud) => vec![aud],
        OneOrMany::Many(aud) => aud,
    })
}
