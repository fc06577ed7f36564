//! In-memory identifier authorities.
//!
//! - [`MemoryAuthority`] is the default deny-list: every identifier is valid
//!   until invalidated, and invalidation records are kept until the token's
//!   own expiration (plus clock tolerance) makes them unnecessary.
//! - [`AllowListAuthority`] accepts only identifiers registered at
//!   generation.
//!
//! Expired records are evicted lazily on access, or eagerly by a background
//! task started with [`spawn_sweeper`].

use crate::authority::{AuthorityError, AuthorityPolicy, IdentifierAuthority};
use crate::config::DEFAULT_CLOCK_TOLERANCE;
use crate::time::{is_live_at, now_seconds};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Identifier to optional expiration timestamp.
type Records = HashMap<String, Option<i64>>;

fn record_is_live(expires_at: Option<i64>, tolerance: Duration, now: i64) -> bool {
    match expires_at {
        Some(exp) => is_live_at(exp, tolerance, now),
        None => true,
    }
}

fn purge(records: &mut Records, tolerance: Duration, now: i64) -> usize {
    let before = records.len();
    records.retain(|_, exp| record_is_live(*exp, tolerance, now));
    before - records.len()
}

// ============================================================================
// Deny-list
// ============================================================================

/// Deny-list authority held in process memory.
#[derive(Debug)]
pub struct MemoryAuthority {
    revoked: Mutex<Records>,
    tolerance: Duration,
}

impl Default for MemoryAuthority {
    fn default() -> Self {
        Self::new(DEFAULT_CLOCK_TOLERANCE)
    }
}

impl MemoryAuthority {
    /// Create an empty authority keeping records until `exp + tolerance`.
    #[must_use]
    pub fn new(tolerance: Duration) -> Self {
        Self {
            revoked: Mutex::new(HashMap::new()),
            tolerance,
        }
    }

    /// [`IdentifierAuthority::validate`] evaluated at `now`.
    pub async fn validate_at(&self, jti: &str, now: i64) -> bool {
        let mut revoked = self.revoked.lock().await;
        match revoked.get(jti) {
            None => true,
            Some(&expires_at) if !record_is_live(expires_at, self.tolerance, now) => {
                revoked.remove(jti);
                trace!(target: "jwt_manager.memory", jti = %jti, "Evicted expired revocation record");
                true
            }
            Some(_) => false,
        }
    }

    /// [`IdentifierAuthority::invalidate`] evaluated at `now`.
    pub async fn invalidate_at(&self, jti: &str, expires_at: Option<i64>, now: i64) -> bool {
        let mut revoked = self.revoked.lock().await;
        if let Some(&existing) = revoked.get(jti) {
            if record_is_live(existing, self.tolerance, now) {
                return false;
            }
        }
        revoked.insert(jti.to_string(), expires_at);
        true
    }

    /// Drop records whose retention window ended before `now`.
    ///
    /// Returns the number of records removed.
    pub async fn purge_expired_at(&self, now: i64) -> usize {
        let mut revoked = self.revoked.lock().await;
        purge(&mut revoked, self.tolerance, now)
    }

    /// Number of revocation records held, including not-yet-evicted ones.
    pub async fn len(&self) -> usize {
        self.revoked.lock().await.len()
    }

    /// Whether no revocation record is held.
    pub async fn is_empty(&self) -> bool {
        self.revoked.lock().await.is_empty()
    }
}

#[async_trait]
impl IdentifierAuthority for MemoryAuthority {
    fn policy(&self) -> AuthorityPolicy {
        AuthorityPolicy::DenyList
    }

    async fn validate(&self, jti: &str) -> Result<bool, AuthorityError> {
        Ok(self.validate_at(jti, now_seconds()).await)
    }

    async fn invalidate(&self, jti: &str, expires_at: Option<i64>) -> Result<bool, AuthorityError> {
        Ok(self.invalidate_at(jti, expires_at, now_seconds()).await)
    }

    async fn clear(&self) -> Result<(), AuthorityError> {
        self.revoked.lock().await.clear();
        Ok(())
    }
}

// ============================================================================
// Allow-list
// ============================================================================

/// Allow-list authority held in process memory.
///
/// Only identifiers registered through [`IdentifierAuthority::register`] are
/// valid, and only while `now <= exp + tolerance`.
#[derive(Debug)]
pub struct AllowListAuthority {
    issued: Mutex<Records>,
    tolerance: Duration,
}

impl Default for AllowListAuthority {
    fn default() -> Self {
        Self::new(DEFAULT_CLOCK_TOLERANCE)
    }
}

impl AllowListAuthority {
    /// Create an empty allow-list.
    #[must_use]
    pub fn new(tolerance: Duration) -> Self {
        Self {
            issued: Mutex::new(HashMap::new()),
            tolerance,
        }
    }

    /// [`IdentifierAuthority::validate`] evaluated at `now`.
    pub async fn validate_at(&self, jti: &str, now: i64) -> bool {
        let mut issued = self.issued.lock().await;
        match issued.get(jti) {
            None => false,
            Some(&expires_at) if !record_is_live(expires_at, self.tolerance, now) => {
                issued.remove(jti);
                trace!(target: "jwt_manager.memory", jti = %jti, "Evicted expired identifier");
                false
            }
            Some(_) => true,
        }
    }

    /// [`IdentifierAuthority::invalidate`] evaluated at `now`.
    pub async fn invalidate_at(&self, jti: &str, now: i64) -> bool {
        match self.issued.lock().await.remove(jti) {
            Some(expires_at) => record_is_live(expires_at, self.tolerance, now),
            None => false,
        }
    }

    /// Drop identifiers whose validity window ended before `now`.
    pub async fn purge_expired_at(&self, now: i64) -> usize {
        let mut issued = self.issued.lock().await;
        purge(&mut issued, self.tolerance, now)
    }

    /// Number of identifiers held.
    pub async fn len(&self) -> usize {
        self.issued.lock().await.len()
    }

    /// Whether no identifier is held.
    pub async fn is_empty(&self) -> bool {
        self.issued.lock().await.is_empty()
    }
}

#[async_trait]
impl IdentifierAuthority for AllowListAuthority {
    fn policy(&self) -> AuthorityPolicy {
        AuthorityPolicy::AllowList
    }

    async fn register(&self, jti: &str, expires_at: Option<i64>) -> Result<(), AuthorityError> {
        self.issued.lock().await.insert(jti.to_string(), expires_at);
        Ok(())
    }

    async fn validate(&self, jti: &str) -> Result<bool, AuthorityError> {
        Ok(self.validate_at(jti, now_seconds()).await)
    }

    async fn invalidate(&self, jti: &str, _expires_at: Option<i64>) -> Result<bool, AuthorityError> {
        Ok(self.invalidate_at(jti, now_seconds()).await)
    }

    async fn clear(&self) -> Result<(), AuthorityError> {
        self.issued.lock().await.clear();
        Ok(())
    }
}

// ============================================================================
// Sweeper
// ============================================================================

/// Authorities whose expired records can be purged eagerly.
#[async_trait]
pub trait PurgeExpired: Send + Sync + 'static {
    /// Drop records past their retention window. Returns how many were removed.
    async fn purge_expired(&self) -> usize;
}

#[async_trait]
impl PurgeExpired for MemoryAuthority {
    async fn purge_expired(&self) -> usize {
        self.purge_expired_at(now_seconds()).await
    }
}

#[async_trait]
impl PurgeExpired for AllowListAuthority {
    async fn purge_expired(&self) -> usize {
        self.purge_expired_at(now_seconds()).await
    }
}

/// Spawn a background task purging expired records every `every`.
///
/// The task holds only a weak reference and stops once the authority is
/// dropped. Abort the returned handle to stop it earlier.
pub fn spawn_sweeper<T: PurgeExpired>(authority: &Arc<T>, every: Duration) -> JoinHandle<()> {
    let authority: Weak<T> = Arc::downgrade(authority);
    let period = every.max(Duration::from_millis(1));

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(period).await;

            let Some(authority) = authority.upgrade() else {
                debug!(target: "jwt_manager.memory", "Authority dropped, stopping sweeper");
                break;
            };

            let purged = authority.purge_expired().await;
            if purged > 0 {
                debug!(target: "jwt_manager.memory", purged, "Purged expired identifier records");
            }
        }
    })
}
