//! Lifecycle notifications.
//!
//! Observers are registered on the manager builder or subscribed at runtime
//! and called in registration order, one at a time. A once-only subscription
//! receives a single event and is then dropped. An observer that fails while
//! handling a success event is reported to every observer's `on_error`;
//! failures inside `on_error` are logged and dropped. Observer failures never
//! change the outcome of the operation that triggered them.

use crate::claims::Claims;
use crate::error::JwtManagerError;
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Receives token lifecycle events.
///
/// Every method defaults to doing nothing, so implementors only override
/// what they care about.
#[async_trait]
pub trait LifecycleObserver<P: Sync>: Send + Sync {
    /// A token was signed and registered.
    ///
    /// # Errors
    ///
    /// Errors are routed to `on_error`.
    async fn on_generate(&self, claims: &Claims<P>) -> anyhow::Result<()> {
        let _ = claims;
        Ok(())
    }

    /// A token passed every check.
    ///
    /// # Errors
    ///
    /// Errors are routed to `on_error`.
    async fn on_verify(&self, claims: &Claims<P>) -> anyhow::Result<()> {
        let _ = claims;
        Ok(())
    }

    /// An identifier went from valid to invalid.
    ///
    /// When only an identifier was available (a bare jti, or a token whose
    /// payload no longer decodes in full), `claims` carries that jti with
    /// empty standard fields and default properties.
    ///
    /// # Errors
    ///
    /// Errors are routed to `on_error`.
    async fn on_invalidate(&self, claims: &Claims<P>) -> anyhow::Result<()> {
        let _ = claims;
        Ok(())
    }

    /// An operation failed. `claims` holds the partial claim set when one was
    /// available.
    ///
    /// # Errors
    ///
    /// Errors are logged and otherwise ignored.
    async fn on_error(&self, error: &JwtManagerError, claims: Option<&Claims<P>>) -> anyhow::Result<()> {
        let _ = (error, claims);
        Ok(())
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription<P: Sync> {
    id: SubscriptionId,
    observer: Arc<dyn LifecycleObserver<P>>,
    once: bool,
}

/// Ordered, sequential fan-out to observers.
pub struct Notifier<P: Sync> {
    subscriptions: Mutex<Vec<Subscription<P>>>,
    next_id: AtomicU64,
}

impl<P: Sync> fmt::Debug for Notifier<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("observers", &self.len())
            .finish()
    }
}

impl<P: Sync> Default for Notifier<P> {
    fn default() -> Self {
        Self {
            subscriptions: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<P: Sync> Notifier<P> {
    /// Append an observer. Delivery follows insertion order.
    pub fn push(&self, observer: Arc<dyn LifecycleObserver<P>>) -> SubscriptionId {
        self.insert(observer, false)
    }

    /// Append an observer that is dropped after the first event it receives.
    pub fn push_once(&self, observer: Arc<dyn LifecycleObserver<P>>) -> SubscriptionId {
        self.insert(observer, true)
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.lock();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        let removed = subscriptions.len() != before;
        debug!(target: "jwt_manager.events", id = id.0, removed, "Observer unsubscribed");
        removed
    }

    /// Number of observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no observer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Deliver a generate event.
    pub async fn generated(&self, claims: &Claims<P>) {
        for observer in self.snapshot() {
            if let Err(e) = observer.on_generate(claims).await {
                self.observer_failed("generate", &e, Some(claims)).await;
            }
        }
    }

    /// Deliver a verify event.
    pub async fn verified(&self, claims: &Claims<P>) {
        for observer in self.snapshot() {
            if let Err(e) = observer.on_verify(claims).await {
                self.observer_failed("verify", &e, Some(claims)).await;
            }
        }
    }

    /// Deliver an invalidate event.
    pub async fn invalidated(&self, claims: &Claims<P>) {
        for observer in self.snapshot() {
            if let Err(e) = observer.on_invalidate(claims).await {
                self.observer_failed("invalidate", &e, Some(claims)).await;
            }
        }
    }

    /// Deliver an error event.
    pub async fn error(&self, error: &JwtManagerError, claims: Option<&Claims<P>>) {
        for observer in self.snapshot() {
            if let Err(e) = observer.on_error(error, claims).await {
                warn!(
                    target: "jwt_manager.events",
                    error = %format!("{e:#}"),
                    original = error.kind(),
                    "Observer failed while handling an error event"
                );
            }
        }
    }

    fn insert(&self, observer: Arc<dyn LifecycleObserver<P>>, once: bool) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Subscription { id, observer, once });
        debug!(target: "jwt_manager.events", id = id.0, once, "Observer subscribed");
        id
    }

    /// Observers for one event, in order. Once-only subscriptions are
    /// removed here so they never see a second event.
    fn snapshot(&self) -> Vec<Arc<dyn LifecycleObserver<P>>> {
        let mut subscriptions = self.lock();
        let observers = subscriptions.iter().map(|s| Arc::clone(&s.observer)).collect();
        subscriptions.retain(|s| !s.once);
        observers
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscription<P>>> {
        self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn observer_failed(
        &self,
        event: &'static str,
        err: &anyhow::Error,
        claims: Option<&Claims<P>>,
    ) {
        let error = JwtManagerError::Observer {
            event,
            message: format!("{err:#}"),
        };
        self.error(&error, claims).await;
    }
}
