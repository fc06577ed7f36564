//! Mock resolvers, authorities and observers for lifecycle tests.

use crate::test_ids::TEST_SUBJECT_MISSING;
use async_trait::async_trait;
use jwt_manager::authority::{AuthorityError, AuthorityPolicy, IdentifierAuthority};
use jwt_manager::claims::Claims;
use jwt_manager::error::JwtManagerError;
use jwt_manager::events::LifecycleObserver;
use jwt_manager::memory::MemoryAuthority;
use jwt_manager::resolver::Resolution;
use jwt_manager::NoProperties;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// ============================================================================
// Resolver
// ============================================================================

/// Resolver treating its argument as the subject.
///
/// [`TEST_SUBJECT_MISSING`] resolves to nothing.
pub async fn resolve_subject(user: String) -> anyhow::Result<Option<Resolution<NoProperties>>> {
    if user == TEST_SUBJECT_MISSING {
        return Ok(None);
    }
    Ok(Some(Resolution::Subject(user)))
}

/// Resolver whose backing store is always down.
pub async fn resolve_failing(_user: String) -> anyhow::Result<Option<Resolution<NoProperties>>> {
    anyhow::bail!("user directory unavailable")
}

// ============================================================================
// Authorities
// ============================================================================

/// Deny-list authority counting every call it receives.
///
/// Delegates to a [`MemoryAuthority`], so behavior matches the default.
#[derive(Debug, Default)]
pub struct CountingAuthority {
    inner: MemoryAuthority,
    register_calls: AtomicUsize,
    validate_calls: AtomicUsize,
    invalidate_calls: AtomicUsize,
}

impl CountingAuthority {
    /// Create a counting authority over an empty memory authority.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `register` calls.
    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    /// Number of `validate` calls.
    pub fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    /// Number of `invalidate` calls.
    pub fn invalidate_calls(&self) -> usize {
        self.invalidate_calls.load(Ordering::SeqCst)
    }

    /// Total number of calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.register_calls() + self.validate_calls() + self.invalidate_calls()
    }

    /// Number of revocation records held.
    pub async fn records(&self) -> usize {
        self.inner.len().await
    }
}

#[async_trait]
impl IdentifierAuthority for CountingAuthority {
    fn policy(&self) -> AuthorityPolicy {
        self.inner.policy()
    }

    async fn register(&self, jti: &str, expires_at: Option<i64>) -> Result<(), AuthorityError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.register(jti, expires_at).await
    }

    async fn validate(&self, jti: &str) -> Result<bool, AuthorityError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.validate(jti).await
    }

    async fn invalidate(&self, jti: &str, expires_at: Option<i64>) -> Result<bool, AuthorityError> {
        self.invalidate_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.invalidate(jti, expires_at).await
    }

    async fn clear(&self) -> Result<(), AuthorityError> {
        self.inner.clear().await
    }
}

/// Which operations of a [`FailingAuthority`] fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Register,
    Validate,
    Invalidate,
    Everything,
}

/// Authority whose backend is "down" for the selected operations.
///
/// Operations that do not fail behave like an empty deny-list.
#[derive(Debug)]
pub struct FailingAuthority {
    fail_on: FailOn,
    calls: AtomicUsize,
}

impl FailingAuthority {
    /// Fail the selected operations.
    pub fn new(fail_on: FailOn) -> Self {
        Self {
            fail_on,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail every operation.
    pub fn always() -> Self {
        Self::new(FailOn::Everything)
    }

    /// Number of calls of any kind.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self, op: FailOn) -> Result<(), AuthorityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on == op || self.fail_on == FailOn::Everything {
            return Err(AuthorityError::Unavailable("mock backend is down".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentifierAuthority for FailingAuthority {
    fn policy(&self) -> AuthorityPolicy {
        AuthorityPolicy::DenyList
    }

    async fn register(&self, _jti: &str, _expires_at: Option<i64>) -> Result<(), AuthorityError> {
        self.check(FailOn::Register)
    }

    async fn validate(&self, _jti: &str) -> Result<bool, AuthorityError> {
        self.check(FailOn::Validate).map(|()| true)
    }

    async fn invalidate(&self, _jti: &str, _expires_at: Option<i64>) -> Result<bool, AuthorityError> {
        self.check(FailOn::Invalidate).map(|()| true)
    }

    async fn clear(&self) -> Result<(), AuthorityError> {
        Ok(())
    }
}

// ============================================================================
// Observer
// ============================================================================

/// An event seen by a [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    Generated { jti: String, sub: String },
    Verified { jti: String, sub: String },
    Invalidated { jti: String, sub: String },
    Error { kind: &'static str, message: String, jti: Option<String> },
}

/// Observer recording every event in delivery order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<RecordedEvent>>,
    fail_on_generate: bool,
}

impl RecordingObserver {
    /// Create an observer that accepts every event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an observer whose `on_generate` fails after recording.
    pub fn failing_on_generate() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail_on_generate: true,
        }
    }

    /// Snapshot of recorded events.
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Recorded error kinds, in order.
    pub fn error_kinds(&self) -> Vec<&'static str> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RecordedEvent::Error { kind, .. } => Some(kind),
                _ => None,
            })
            .collect()
    }

    /// Whether any error event was recorded.
    pub fn has_errors(&self) -> bool {
        !self.error_kinds().is_empty()
    }

    fn push(&self, event: RecordedEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl<P: Sync + 'static> LifecycleObserver<P> for RecordingObserver {
    async fn on_generate(&self, claims: &Claims<P>) -> anyhow::Result<()> {
        self.push(RecordedEvent::Generated {
            jti: claims.jti.clone(),
            sub: claims.sub.clone(),
        });
        if self.fail_on_generate {
            anyhow::bail!("recording observer refused generate event");
        }
        Ok(())
    }

    async fn on_verify(&self, claims: &Claims<P>) -> anyhow::Result<()> {
        self.push(RecordedEvent::Verified {
            jti: claims.jti.clone(),
            sub: claims.sub.clone(),
        });
        Ok(())
    }

    async fn on_invalidate(&self, claims: &Claims<P>) -> anyhow::Result<()> {
        self.push(RecordedEvent::Invalidated {
            jti: claims.jti.clone(),
            sub: claims.sub.clone(),
        });
        Ok(())
    }

    async fn on_error(&self, error: &JwtManagerError, claims: Option<&Claims<P>>) -> anyhow::Result<()> {
        self.push(RecordedEvent::Error {
            kind: error.kind(),
            message: error.to_string(),
            jti: claims.map(|c| c.jti.clone()),
        });
        Ok(())
    }
}
