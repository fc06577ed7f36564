//! Token lifecycle metrics.
//!
//! All metrics follow Prometheus naming conventions:
//! - `jwt_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `status`: success, not_found, error (generation); success, rejected,
//!   error (verification); invalidated, unchanged, error (invalidation)
//! - `reason`: bounded by [`JwtManagerError::kind`](crate::error::JwtManagerError::kind)
//!
//! Subjects and identifiers are never used as labels.

use metrics::{counter, histogram};
use std::time::Duration;

// ============================================================================
// Generation
// ============================================================================

/// Record token generation outcome and duration.
///
/// Metric: `jwt_tokens_generated_total`, `jwt_token_generation_duration_seconds`
/// Labels: `status`
pub fn record_token_generation(status: &str, duration: Duration) {
    histogram!("jwt_token_generation_duration_seconds", "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("jwt_tokens_generated_total", "status" => status.to_string()).increment(1);
}

// ============================================================================
// Verification
// ============================================================================

/// Record token verification outcome.
///
/// Metric: `jwt_token_verifications_total`
/// Labels: `status`, `reason`
pub fn record_token_verification(status: &str, reason: Option<&str>) {
    let reason = reason.unwrap_or("none");
    counter!("jwt_token_verifications_total", "status" => status.to_string(), "reason" => reason.to_string())
        .increment(1);
}

/// Record an identifier revoked because a verified token failed the
/// authority or validator check.
///
/// Metric: `jwt_auto_invalidations_total`
pub fn record_auto_invalidation() {
    counter!("jwt_auto_invalidations_total").increment(1);
}

// ============================================================================
// Invalidation
// ============================================================================

/// Record an invalidation request.
///
/// Metric: `jwt_token_invalidations_total`
/// Labels: `status`
pub fn record_token_invalidation(status: &str) {
    counter!("jwt_token_invalidations_total", "status" => status.to_string()).increment(1);
}
