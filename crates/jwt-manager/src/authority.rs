//! Identifier authority abstraction.
//!
//! An authority tracks which token identifiers (`jti`) are currently
//! acceptable. The manager consults it after a token's signature and standard
//! claims have been verified, and updates it on generation and invalidation.
//!
//! Two policy shapes are supported:
//!
//! - **Deny-list**: an unknown identifier is valid; invalidation records it
//!   until the token's own `exp` (plus tolerance) makes the record moot.
//! - **Allow-list**: only identifiers registered at generation are valid;
//!   invalidation removes them.
//!
//! Implementations must be safe to share across tasks. `invalidate` must be an
//! atomic check-and-set: when several callers race on the same identifier,
//! exactly one of them observes `true`.

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by an authority backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorityError {
    /// The backing store failed.
    #[error("Identifier authority backend error: {0}")]
    Backend(String),

    /// The backing store could not be reached.
    #[error("Identifier authority unavailable: {0}")]
    Unavailable(String),
}

/// Which policy an authority implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityPolicy {
    /// Registered identifiers are valid; everything else is not.
    AllowList,
    /// Identifiers are valid unless invalidated.
    DenyList,
}

/// Tracks the validity of token identifiers.
///
/// `expires_at` hints are Unix timestamps (seconds) taken from the token's
/// `exp` claim, so implementations can bound how long they keep records.
#[async_trait]
pub trait IdentifierAuthority: Send + Sync {
    /// The policy this authority implements.
    fn policy(&self) -> AuthorityPolicy;

    /// Record a freshly issued identifier.
    ///
    /// Deny-list authorities have nothing to record, hence the no-op default.
    ///
    /// # Errors
    ///
    /// Returns `AuthorityError` if the backing store fails.
    async fn register(&self, jti: &str, expires_at: Option<i64>) -> Result<(), AuthorityError> {
        let _ = (jti, expires_at);
        Ok(())
    }

    /// Whether `jti` is currently acceptable.
    ///
    /// # Errors
    ///
    /// Returns `AuthorityError` if the backing store fails.
    async fn validate(&self, jti: &str) -> Result<bool, AuthorityError>;

    /// Make `jti` unacceptable from now on.
    ///
    /// Returns `true` only if the identifier was acceptable before this call
    /// and is not anymore. Repeated calls return `false`.
    ///
    /// # Errors
    ///
    /// Returns `AuthorityError` if the backing store fails.
    async fn invalidate(&self, jti: &str, expires_at: Option<i64>) -> Result<bool, AuthorityError>;

    /// Drop every record.
    ///
    /// # Errors
    ///
    /// Returns `AuthorityError` if the backing store fails.
    async fn clear(&self) -> Result<(), AuthorityError>;
}
