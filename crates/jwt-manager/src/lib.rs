//! Issue, verify and revoke JSON Web Tokens on behalf of a host application.
//!
//! The [`JwtManager`](manager::JwtManager) owns the token lifecycle:
//!
//! - `generate`: resolve a subject, sign a claim set, register its identifier
//! - `verify`: check signature and timing, then the identifier authority and
//!   an optional custom validator
//! - `invalidate`: revoke an identifier through the authority
//!
//! Subject discovery and custom validity rules are supplied by the host via
//! [`SubjectResolver`](resolver::SubjectResolver) and
//! [`ClaimsValidator`](resolver::ClaimsValidator). Revocation state lives
//! behind the [`IdentifierAuthority`](authority::IdentifierAuthority) trait;
//! [`MemoryAuthority`](memory::MemoryAuthority) is the default.
//!
//! # Example
//!
//! ```rust,ignore
//! use jwt_manager::config::ManagerConfig;
//! use jwt_manager::manager::JwtManager;
//! use jwt_manager::resolver::Resolution;
//!
//! let config = ManagerConfig::hmac("shared-secret").with_issuer("svc");
//! let manager = JwtManager::<String>::builder(config, |user: String| async move {
//!     Ok(Some(Resolution::Subject(user)))
//! })
//! .build()?;
//!
//! let token = manager.generate("user-42".to_string()).await;
//! ```

#![warn(clippy::pedantic)]

/// Module for the manager error type
pub mod error;

/// Module for clock and TTL policy functions
pub mod time;

/// Module for the claim set type
pub mod claims;

/// Module for secret types that prevent accidental logging of key material
pub mod secret;

/// Module for manager configuration
pub mod config;

/// Module for signing, verifying and decoding compact tokens
pub mod codec;

/// Module for the identifier authority abstraction
pub mod authority;

/// Module for in-memory identifier authorities
pub mod memory;

/// Module for host callbacks (subject resolver, claims validator)
pub mod resolver;

/// Module for lifecycle notifications
pub mod events;

/// Module for Authorization header parsing
pub mod header;

/// Module for lifecycle metrics
pub mod metrics;

/// Module for the token lifecycle manager
pub mod manager;

pub use authority::{AuthorityError, AuthorityPolicy, IdentifierAuthority};
pub use claims::{ClaimProperties, Claims, NoProperties};
pub use config::{ConfigError, KeyMaterial, ManagerConfig};
pub use error::JwtManagerError;
pub use events::{LifecycleObserver, SubscriptionId};
pub use jsonwebtoken::Algorithm;
pub use manager::{GenerateOptions, InvalidationTarget, JwtManager, JwtManagerBuilder};
pub use memory::{spawn_sweeper, AllowListAuthority, MemoryAuthority};
pub use resolver::{ClaimsValidator, Resolution, SubjectRecord, SubjectResolver};
