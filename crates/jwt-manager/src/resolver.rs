//! Host callbacks: subject resolution and custom claim validation.
//!
//! Both traits have blanket implementations for closures, so most hosts never
//! implement them by hand:
//!
//! ```rust,ignore
//! let resolver = |user_id: u64| async move {
//!     let user = db.find_user(user_id).await?;
//!     Ok(user.map(|u| Resolution::Subject(u.id.to_string())))
//! };
//!
//! let validator = |claims: &Claims<Profile>| claims.properties.active;
//! ```

use crate::claims::Claims;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// A subject together with its application properties, as one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRecord<P> {
    /// Subject identifier.
    pub sub: String,

    /// Application properties.
    #[serde(flatten)]
    pub properties: P,
}

/// What a [`SubjectResolver`] found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<P> {
    /// Bare subject; properties take their default value.
    Subject(String),

    /// Subject plus properties.
    WithProperties(String, P),

    /// Record carrying `sub` next to its properties.
    Record(SubjectRecord<P>),
}

impl<P: Default> Resolution<P> {
    /// Normalize into `(subject, properties)`.
    #[must_use]
    pub fn into_parts(self) -> (String, P) {
        match self {
            Self::Subject(sub) => (sub, P::default()),
            Self::WithProperties(sub, properties) | Self::Record(SubjectRecord { sub, properties }) => {
                (sub, properties)
            }
        }
    }
}

impl<P> From<String> for Resolution<P> {
    fn from(sub: String) -> Self {
        Self::Subject(sub)
    }
}

impl<P> From<&str> for Resolution<P> {
    fn from(sub: &str) -> Self {
        Self::Subject(sub.to_string())
    }
}

impl<P> From<SubjectRecord<P>> for Resolution<P> {
    fn from(record: SubjectRecord<P>) -> Self {
        Self::Record(record)
    }
}

/// Finds the principal a token should be issued for.
///
/// `Ok(None)` means "no such subject": no token is produced and it is not
/// treated as an error.
#[async_trait]
pub trait SubjectResolver<A, P>: Send + Sync {
    /// Resolve `args` into a subject.
    ///
    /// # Errors
    ///
    /// Any error is reported as a resolver failure.
    async fn resolve(&self, args: A) -> anyhow::Result<Option<Resolution<P>>>;
}

#[async_trait]
impl<A, P, F, Fut> SubjectResolver<A, P> for F
where
    A: Send + 'static,
    P: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Option<Resolution<P>>>> + Send + 'static,
{
    async fn resolve(&self, args: A) -> anyhow::Result<Option<Resolution<P>>> {
        (self)(args).await
    }
}

/// Extra validity rule applied after signature, timing and identifier checks.
#[async_trait]
pub trait ClaimsValidator<P>: Send + Sync {
    /// `Ok(false)` rejects the token and revokes its identifier.
    ///
    /// # Errors
    ///
    /// An error means no decision could be made; the token is rejected but
    /// its identifier is left untouched.
    async fn validate(&self, claims: &Claims<P>) -> anyhow::Result<bool>;
}

#[async_trait]
impl<P, F> ClaimsValidator<P> for F
where
    P: Sync + 'static,
    F: Fn(&Claims<P>) -> bool + Send + Sync + 'static,
{
    async fn validate(&self, claims: &Claims<P>) -> anyhow::Result<bool> {
        Ok((self)(claims))
    }
}
