//! # JWT Manager Test Utilities
//!
//! Shared test utilities for the `jwt-manager` crate.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed Ed25519 keys, ready-made configs)
//! - Test data builders (TestTokenBuilder for forged or unusual tokens)
//! - Mock authorities and a recording observer
//! - Fixed test IDs (UUIDs, constants)
//! - Custom assertions (TokenAssertions trait)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use jwt_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     // Use deterministic crypto fixtures
//!     let config = test_eddsa_config(1);
//!
//!     // Use builder patterns
//!     let token = TestTokenBuilder::new()
//!         .for_subject("alice")
//!         .sign_eddsa(1);
//!
//!     // Use custom assertions
//!     token.assert_valid_jwt("EdDSA")
//!          .assert_for_subject("alice");
//! }
//! ```

pub mod assertions;
pub mod crypto_fixtures;
pub mod mocks;
pub mod test_ids;
pub mod token_builders;

// Re-export commonly used items
pub use assertions::*;
pub use crypto_fixtures::*;
pub use mocks::*;
pub use test_ids::*;
pub use token_builders::*;
