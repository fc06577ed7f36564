//! Error types for token lifecycle operations.

use crate::authority::AuthorityError;
use crate::claims::PropertiesError;
use crate::codec::{SigningError, TokenRejection};
use thiserror::Error;

/// Errors raised by [`JwtManager`](crate::manager::JwtManager) operations.
///
/// Callback failures (resolver, validator, observer) are carried as rendered
/// messages so the error stays `Clone` and can be handed to every observer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtManagerError {
    /// Token string was empty.
    #[error("Token is empty")]
    EmptyToken,

    /// The subject resolver failed.
    #[error("Subject resolver failed: {0}")]
    Resolver(String),

    /// Signing failed.
    #[error(transparent)]
    Signing(#[from] SigningError),

    /// The token failed signature or standard-claim verification.
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] TokenRejection),

    /// The token's `jti` is not accepted by the identifier authority.
    #[error("Invalid jwt identifier")]
    InvalidIdentifier,

    /// The claims validator rejected the token.
    #[error("Invalid jwt subject or claims")]
    InvalidClaims,

    /// The claims validator failed to produce a decision.
    #[error("Claims validator failed: {0}")]
    Validator(String),

    /// The identifier authority failed.
    #[error(transparent)]
    Authority(#[from] AuthorityError),

    /// Application properties could not be merged into the claim set.
    #[error(transparent)]
    Properties(#[from] PropertiesError),

    /// A lifecycle observer failed.
    #[error("Observer failed during {event}: {message}")]
    Observer {
        /// Event being delivered.
        event: &'static str,
        /// Rendered observer error.
        message: String,
    },
}

impl JwtManagerError {
    /// Whether this failure means "the token is not acceptable" rather than
    /// "the system could not decide".
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::EmptyToken | Self::InvalidToken(_) | Self::InvalidIdentifier | Self::InvalidClaims
        )
    }

    /// Whether the token's identifier should be invalidated after this
    /// failure.
    ///
    /// Only checks that run after a valid signature qualify, so forged tokens
    /// never reach the authority.
    #[must_use]
    pub fn triggers_invalidation(&self) -> bool {
        matches!(self, Self::InvalidIdentifier | Self::InvalidClaims)
    }

    /// Bounded label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyToken => "empty_token",
            Self::Resolver(_) => "resolver",
            Self::Signing(_) => "signing",
            Self::InvalidToken(rejection) => rejection.reason(),
            Self::InvalidIdentifier => "invalid_identifier",
            Self::InvalidClaims => "invalid_claims",
            Self::Validator(_) => "validator",
            Self::Authority(_) => "authority",
            Self::Properties(_) => "properties",
            Self::Observer { .. } => "observer",
        }
    }
}
