//! Fixed test values for deterministic tests
//!
//! Using fixed identifiers and timestamps prevents flaky tests caused by
//! random data.

use uuid::Uuid;

// Token identifiers (1-99)
pub const TEST_JTI_1: Uuid = Uuid::from_u128(1);
pub const TEST_JTI_2: Uuid = Uuid::from_u128(2);
pub const TEST_JTI_3: Uuid = Uuid::from_u128(3);

// Issuer and audiences
pub const TEST_ISSUER: &str = "svc";
pub const TEST_AUDIENCE: &str = "svc";
pub const TEST_OTHER_AUDIENCE: &str = "billing";

// Subjects
pub const TEST_SUBJECT: &str = "user-42";
pub const TEST_SUBJECT_BOB: &str = "user-7";
pub const TEST_SUBJECT_BANNED: &str = "banned";
pub const TEST_SUBJECT_MISSING: &str = "missing";

// Test secrets
pub const TEST_HMAC_SECRET: &str = "test-secret-do-not-use-in-production";
pub const TEST_WRONG_SECRET: &str = "wrong-secret-do-not-use-in-production";

// Fixed instant for clock-dependent tests (2023-11-14T22:13:20Z)
pub const TEST_NOW: i64 = 1_700_000_000;

// Default expiry used by test configurations
pub const TEST_EXPIRY_SECS: u64 = 3600;
