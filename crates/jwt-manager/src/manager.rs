//! Token lifecycle manager.
//!
//! The manager ties together the codec, the identifier authority and the host
//! callbacks:
//!
//! - **generate**: resolve subject, build claims, sign, register `jti`
//! - **verify**: size/signature/timing/`iss`/`aud` checks, then authority,
//!   then custom validator
//! - **invalidate**: structural decode (no crypto), then authority
//!
//! # Error routing
//!
//! Every operation has a swallowing form (`generate`, `verify`,
//! `verify_header`, `invalidate`) returning `Option`/`bool`, and an explicit
//! form (`try_*`) returning `Result`. Both report failures to the registered
//! observers' `on_error` before returning. The only exception is an empty
//! token passed to `try_verify*`, which is a caller contract violation
//! reported as `JwtManagerError::EmptyToken` without notification.
//!
//! # Auto-invalidation
//!
//! When a token with a valid signature is refused by the authority or by the
//! custom validator, its identifier is invalidated before the call returns.
//! Codec rejections never reach the authority.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = ManagerConfig::hmac(secret).with_issuer("svc");
//! let manager = JwtManager::<String>::builder(config, |user: String| async move {
//!     anyhow::Ok(Some(Resolution::Subject(user)))
//! })
//! .validator(|claims: &Claims| claims.sub != "banned")
//! .build()?;
//!
//! let token = manager.generate("user-42".to_string()).await.unwrap();
//! let claims = manager.verify_header(&format!("Bearer {token}")).await;
//! ```

use crate::authority::IdentifierAuthority;
use crate::claims::{check_properties, ClaimProperties, Claims, NoProperties};
use crate::codec::{JwtCodec, VerifyOptions};
use crate::config::{ConfigError, ManagerConfig};
use crate::error::JwtManagerError;
use crate::events::{LifecycleObserver, Notifier, SubscriptionId};
use crate::header::parse_bearer;
use crate::memory::MemoryAuthority;
use crate::metrics;
use crate::resolver::{ClaimsValidator, SubjectResolver};
use crate::time::{expires_at, not_before, now_seconds};
use jsonwebtoken::Algorithm;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Produces token identifiers. Must return a distinct value on every call.
pub type JtiGenerator = Arc<dyn Fn() -> String + Send + Sync>;

fn uuid_jti() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Per-call overrides for [`JwtManager::generate_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Delay after issuance before the token becomes valid (`nbf`).
    pub not_before: Option<Duration>,

    /// Lifetime overriding the configured expiry.
    pub expires_in: Option<Duration>,
}

impl GenerateOptions {
    /// Set the not-before delay.
    #[must_use]
    pub fn not_before(mut self, delay: Duration) -> Self {
        self.not_before = Some(delay);
        self
    }

    /// Set the token lifetime.
    #[must_use]
    pub fn expires_in(mut self, ttl: Duration) -> Self {
        self.expires_in = Some(ttl);
        self
    }
}

/// What [`JwtManager::invalidate`] revokes.
#[derive(Debug, Clone, Copy)]
pub enum InvalidationTarget<'a, P> {
    /// A compact token; decoded without verification.
    Token(&'a str),
    /// An already decoded claim set.
    Claims(&'a Claims<P>),
}

impl<'a, P> From<&'a str> for InvalidationTarget<'a, P> {
    fn from(token: &'a str) -> Self {
        Self::Token(token)
    }
}

impl<'a, P> From<&'a String> for InvalidationTarget<'a, P> {
    fn from(token: &'a String) -> Self {
        Self::Token(token.as_str())
    }
}

impl<'a, P> From<&'a Claims<P>> for InvalidationTarget<'a, P> {
    fn from(claims: &'a Claims<P>) -> Self {
        Self::Claims(claims)
    }
}

/// The only claims invalidation needs from a raw token.
#[derive(Debug, Deserialize)]
struct RevocationHint {
    #[serde(default)]
    jti: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
}

/// Claims of a token being revoked, plus the expiry hint for the authority.
///
/// The full claim set is preferred. A payload that only yields a `jti` (for
/// instance because host properties no longer deserialize) produces a claim
/// set carrying that `jti` and default everything else.
fn revocation_claims<P: ClaimProperties>(token: &str) -> Option<(Claims<P>, Option<i64>)> {
    if let Ok(claims) = JwtCodec::decode::<P>(token) {
        let exp = Some(claims.exp);
        return Some((claims, exp));
    }

    let RevocationHint { jti, exp } = JwtCodec::decode_payload::<RevocationHint>(token).ok()?;
    let claims = Claims {
        jti: jti?,
        sub: String::new(),
        iss: String::new(),
        aud: Vec::new(),
        exp: exp.unwrap_or_default(),
        iat: 0,
        nbf: None,
        properties: P::default(),
    };
    Some((claims, exp))
}

/// A failure plus the claim set built or decoded before it happened.
type Failure<P> = (JwtManagerError, Option<Claims<P>>);

// ============================================================================
// Builder
// ============================================================================

/// Assembles a [`JwtManager`].
pub struct JwtManagerBuilder<A, P: Sync = NoProperties> {
    config: ManagerConfig,
    resolver: Arc<dyn SubjectResolver<A, P>>,
    validator: Option<Arc<dyn ClaimsValidator<P>>>,
    authority: Option<Arc<dyn IdentifierAuthority>>,
    notifier: Notifier<P>,
    jti_generator: JtiGenerator,
}

impl<A, P: Sync> fmt::Debug for JwtManagerBuilder<A, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtManagerBuilder")
            .field("config", &self.config)
            .field("has_validator", &self.validator.is_some())
            .field("has_authority", &self.authority.is_some())
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

impl<A, P> JwtManagerBuilder<A, P>
where
    A: Send + 'static,
    P: ClaimProperties,
{
    /// Add a custom validator run after the authority check.
    #[must_use]
    pub fn validator<V>(mut self, validator: V) -> Self
    where
        V: ClaimsValidator<P> + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Replace the default in-memory deny-list authority.
    #[must_use]
    pub fn authority<T>(mut self, authority: Arc<T>) -> Self
    where
        T: IdentifierAuthority + 'static,
    {
        self.authority = Some(authority);
        self
    }

    /// Append a lifecycle observer. Observers are notified in the order they
    /// are added.
    #[must_use]
    pub fn observer<O>(self, observer: Arc<O>) -> Self
    where
        O: LifecycleObserver<P> + 'static,
    {
        self.notifier.push(observer);
        self
    }

    /// Replace the UUID v4 identifier generator.
    #[must_use]
    pub fn jti_generator<G>(mut self, generator: G) -> Self
    where
        G: Fn() -> String + Send + Sync + 'static,
    {
        self.jti_generator = Arc::new(generator);
        self
    }

    /// Validate the configuration, parse the keys and build the manager.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is inconsistent, the keys
    /// cannot be parsed for the algorithm, or the default properties use a
    /// reserved claim name.
    pub fn build(self) -> Result<JwtManager<A, P>, ConfigError> {
        self.config.validate()?;

        check_properties(&P::default()).map_err(|e| ConfigError::InvalidValue {
            name: "properties".to_string(),
            reason: e.to_string(),
        })?;

        let codec = JwtCodec::new(self.config.algorithm, &self.config.keys)?;
        let authority: Arc<dyn IdentifierAuthority> = match self.authority {
            Some(authority) => authority,
            None => Arc::new(MemoryAuthority::new(self.config.clock_tolerance)),
        };

        info!(
            target: "jwt_manager.manager",
            algorithm = ?self.config.algorithm,
            issuer = %self.config.issuer,
            can_sign = codec.can_sign(),
            policy = ?authority.policy(),
            observers = self.notifier.len(),
            "JWT manager initialized"
        );

        Ok(JwtManager {
            codec,
            audience: self.config.effective_audience(),
            issuer: self.config.issuer,
            expiry: self.config.expiry,
            clock_tolerance: self.config.clock_tolerance,
            resolver: self.resolver,
            validator: self.validator,
            authority,
            notifier: self.notifier,
            jti_generator: self.jti_generator,
        })
    }
}

// ============================================================================
// Manager
// ============================================================================

/// Issues, verifies and revokes tokens.
///
/// `A` is the argument type handed to the subject resolver; `P` the
/// application properties carried in every claim set. The manager is
/// immutable after construction and can be shared behind an `Arc`.
pub struct JwtManager<A, P: Sync = NoProperties> {
    codec: JwtCodec,
    issuer: String,
    audience: Vec<String>,
    expiry: Duration,
    clock_tolerance: Duration,
    resolver: Arc<dyn SubjectResolver<A, P>>,
    validator: Option<Arc<dyn ClaimsValidator<P>>>,
    authority: Arc<dyn IdentifierAuthority>,
    notifier: Notifier<P>,
    jti_generator: JtiGenerator,
}

impl<A, P: Sync> fmt::Debug for JwtManager<A, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtManager")
            .field("codec", &self.codec)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("expiry", &self.expiry)
            .field("clock_tolerance", &self.clock_tolerance)
            .field("policy", &self.authority.policy())
            .field("has_validator", &self.validator.is_some())
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

impl<A, P> JwtManager<A, P>
where
    A: Send + 'static,
    P: ClaimProperties,
{
    /// Start building a manager from `config` and the required resolver.
    pub fn builder<R>(config: ManagerConfig, resolver: R) -> JwtManagerBuilder<A, P>
    where
        R: SubjectResolver<A, P> + 'static,
    {
        JwtManagerBuilder {
            config,
            resolver: Arc::new(resolver),
            validator: None,
            authority: None,
            notifier: Notifier::default(),
            jti_generator: Arc::new(uuid_jti),
        }
    }

    /// The configured issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// The default audience.
    #[must_use]
    pub fn audience(&self) -> &[String] {
        &self.audience
    }

    /// The signature algorithm.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.codec.algorithm()
    }

    /// Whether this manager can issue tokens.
    #[must_use]
    pub fn can_sign(&self) -> bool {
        self.codec.can_sign()
    }

    /// The identifier authority.
    #[must_use]
    pub fn authority(&self) -> &Arc<dyn IdentifierAuthority> {
        &self.authority
    }

    // ------------------------------------------------------------------------
    // generate
    // ------------------------------------------------------------------------

    /// Issue a token for whatever the resolver finds for `args`.
    ///
    /// Returns `None` when the resolver finds nothing or any step fails.
    pub async fn generate(&self, args: A) -> Option<String> {
        self.generate_with(args, GenerateOptions::default()).await
    }

    /// [`generate`](Self::generate) with per-call overrides.
    pub async fn generate_with(&self, args: A, options: GenerateOptions) -> Option<String> {
        self.try_generate_with(args, options).await.ok().flatten()
    }

    /// Issue a token, reporting failures to the caller.
    ///
    /// # Errors
    ///
    /// See [`try_generate_with`](Self::try_generate_with).
    pub async fn try_generate(&self, args: A) -> Result<Option<String>, JwtManagerError> {
        self.try_generate_with(args, GenerateOptions::default()).await
    }

    /// Issue a token with per-call overrides, reporting failures to the
    /// caller.
    ///
    /// `Ok(None)` means the resolver found no subject; nothing is signed,
    /// registered or notified in that case.
    ///
    /// # Errors
    ///
    /// Returns the resolver, properties, signing or authority failure. The
    /// same error has already been delivered to observers.
    #[instrument(skip_all)]
    pub async fn try_generate_with(
        &self,
        args: A,
        options: GenerateOptions,
    ) -> Result<Option<String>, JwtManagerError> {
        let start = Instant::now();

        match self.issue(args, options).await {
            Ok(Some((token, claims))) => {
                metrics::record_token_generation("success", start.elapsed());
                debug!(target: "jwt_manager.manager", jti = %claims.jti, exp = claims.exp, "Token generated");
                self.notifier.generated(&claims).await;
                Ok(Some(token))
            }
            Ok(None) => {
                metrics::record_token_generation("not_found", start.elapsed());
                debug!(target: "jwt_manager.manager", "Resolver found no subject, no token generated");
                Ok(None)
            }
            Err((error, claims)) => {
                metrics::record_token_generation("error", start.elapsed());
                warn!(target: "jwt_manager.manager", error = %error, "Token generation failed");
                self.notifier.error(&error, claims.as_ref()).await;
                Err(error)
            }
        }
    }

    async fn issue(
        &self,
        args: A,
        options: GenerateOptions,
    ) -> Result<Option<(String, Claims<P>)>, Failure<P>> {
        let resolved = match self.resolver.resolve(args).await {
            Ok(resolved) => resolved,
            Err(e) => return Err((JwtManagerError::Resolver(format!("{e:#}")), None)),
        };

        let Some(resolution) = resolved else {
            return Ok(None);
        };
        let (sub, properties) = resolution.into_parts();

        let iat = now_seconds();
        let claims = Claims {
            jti: (self.jti_generator)(),
            sub,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: expires_at(iat, options.expires_in.unwrap_or(self.expiry)),
            iat,
            nbf: options.not_before.map(|delay| not_before(iat, delay)),
            properties,
        };

        if let Err(e) = check_properties(&claims.properties) {
            return Err((e.into(), Some(claims)));
        }

        let token = match self.codec.sign(&claims) {
            Ok(token) => token,
            Err(e) => return Err((e.into(), Some(claims))),
        };

        // Registered before the token leaves the manager
        if let Err(e) = self.authority.register(&claims.jti, Some(claims.exp)).await {
            return Err((e.into(), Some(claims)));
        }

        Ok(Some((token, claims)))
    }

    // ------------------------------------------------------------------------
    // verify
    // ------------------------------------------------------------------------

    /// Verify `token` against the default audience.
    pub async fn verify(&self, token: &str) -> Option<Claims<P>> {
        self.try_verify(token).await.ok()
    }

    /// Verify `token` against `audience` (the default when empty).
    pub async fn verify_for(&self, token: &str, audience: &[String]) -> Option<Claims<P>> {
        self.try_verify_for(token, audience).await.ok()
    }

    /// Verify the token carried by an `Authorization` header value.
    ///
    /// Anything but `Bearer <token>` yields `None` without verifying or
    /// notifying.
    pub async fn verify_header(&self, header: &str) -> Option<Claims<P>> {
        self.verify_header_for(header, &[]).await
    }

    /// [`verify_header`](Self::verify_header) against `audience`.
    pub async fn verify_header_for(&self, header: &str, audience: &[String]) -> Option<Claims<P>> {
        let Some(token) = parse_bearer(header) else {
            debug!(target: "jwt_manager.manager", "Authorization header is not a bearer credential");
            return None;
        };
        self.verify_for(token, audience).await
    }

    /// Verify `token` against the default audience, reporting failures.
    ///
    /// # Errors
    ///
    /// See [`try_verify_for`](Self::try_verify_for).
    pub async fn try_verify(&self, token: &str) -> Result<Claims<P>, JwtManagerError> {
        self.try_verify_for(token, &[]).await
    }

    /// Verify `token` against `audience` (the default when empty), reporting
    /// failures.
    ///
    /// # Errors
    ///
    /// - `EmptyToken` immediately, without notification
    /// - `InvalidToken` for codec rejections
    /// - `InvalidIdentifier` / `InvalidClaims` for authority or validator
    ///   refusal; the identifier has been invalidated
    /// - `Authority` / `Validator` when a decision could not be made
    #[instrument(skip_all)]
    pub async fn try_verify_for(
        &self,
        token: &str,
        audience: &[String],
    ) -> Result<Claims<P>, JwtManagerError> {
        if token.is_empty() {
            metrics::record_token_verification("rejected", Some(JwtManagerError::EmptyToken.kind()));
            return Err(JwtManagerError::EmptyToken);
        }

        let audience = if audience.is_empty() {
            self.audience.as_slice()
        } else {
            audience
        };

        match self.check(token, audience).await {
            Ok(claims) => {
                metrics::record_token_verification("success", None);
                debug!(target: "jwt_manager.manager", jti = %claims.jti, "Token verified");
                self.notifier.verified(&claims).await;
                Ok(claims)
            }
            Err((error, claims)) => {
                if error.triggers_invalidation() {
                    if let Some(claims) = &claims {
                        self.auto_invalidate(claims).await;
                    }
                }

                let status = if error.is_rejection() { "rejected" } else { "error" };
                metrics::record_token_verification(status, Some(error.kind()));
                debug!(target: "jwt_manager.manager", reason = error.kind(), "Token verification failed");

                self.notifier.error(&error, claims.as_ref()).await;
                Err(error)
            }
        }
    }

    async fn check(&self, token: &str, audience: &[String]) -> Result<Claims<P>, Failure<P>> {
        let options = VerifyOptions {
            issuer: &self.issuer,
            audience,
            clock_tolerance: self.clock_tolerance,
        };

        let claims: Claims<P> = match self.codec.verify(token, &options) {
            Ok(claims) => claims,
            Err(rejection) => return Err((rejection.into(), None)),
        };

        match self.authority.validate(&claims.jti).await {
            Ok(true) => {}
            Ok(false) => return Err((JwtManagerError::InvalidIdentifier, Some(claims))),
            Err(e) => return Err((e.into(), Some(claims))),
        }

        if let Some(validator) = &self.validator {
            match validator.validate(&claims).await {
                Ok(true) => {}
                Ok(false) => return Err((JwtManagerError::InvalidClaims, Some(claims))),
                Err(e) => {
                    return Err((JwtManagerError::Validator(format!("{e:#}")), Some(claims)));
                }
            }
        }

        Ok(claims)
    }

    async fn auto_invalidate(&self, claims: &Claims<P>) {
        match self.authority.invalidate(&claims.jti, Some(claims.exp)).await {
            Ok(true) => {
                metrics::record_auto_invalidation();
                debug!(target: "jwt_manager.manager", jti = %claims.jti, "Identifier invalidated after failed check");
                self.notifier.invalidated(claims).await;
            }
            Ok(false) => {}
            Err(e) => {
                let error = JwtManagerError::from(e);
                warn!(target: "jwt_manager.manager", error = %error, "Automatic invalidation failed");
                self.notifier.error(&error, Some(claims)).await;
            }
        }
    }

    // ------------------------------------------------------------------------
    // observers
    // ------------------------------------------------------------------------

    /// Add a lifecycle observer after construction. It receives events after
    /// every observer registered before it.
    pub fn subscribe<O>(&self, observer: Arc<O>) -> SubscriptionId
    where
        O: LifecycleObserver<P> + 'static,
    {
        self.notifier.push(observer)
    }

    /// Add an observer that receives the next event only.
    pub fn subscribe_once<O>(&self, observer: Arc<O>) -> SubscriptionId
    where
        O: LifecycleObserver<P> + 'static,
    {
        self.notifier.push_once(observer)
    }

    /// Remove an observer added with `subscribe` or `subscribe_once`.
    /// Returns `false` if it was already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.remove(id)
    }

    // ------------------------------------------------------------------------
    // invalidate / decode
    // ------------------------------------------------------------------------

    /// Revoke a token or claim set.
    ///
    /// Returns `true` only if the identifier was valid and no longer is.
    /// Invalidating twice returns `false` the second time. Tokens without a
    /// `jti` and undecodable tokens return `false`.
    pub async fn invalidate<'t>(&self, target: impl Into<InvalidationTarget<'t, P>>) -> bool {
        self.try_invalidate(target).await.unwrap_or(false)
    }

    /// Revoke a token or claim set, reporting authority failures.
    ///
    /// # Errors
    ///
    /// Returns `JwtManagerError::Authority` if the authority fails. The same
    /// error has already been delivered to observers.
    #[instrument(skip_all)]
    pub async fn try_invalidate<'t>(
        &self,
        target: impl Into<InvalidationTarget<'t, P>>,
    ) -> Result<bool, JwtManagerError> {
        let target = target.into();
        let decoded;
        let (claims, exp) = match target {
            InvalidationTarget::Claims(claims) => (claims, Some(claims.exp)),
            InvalidationTarget::Token(token) => match revocation_claims::<P>(token) {
                Some((claims, exp)) => {
                    decoded = claims;
                    (&decoded, exp)
                }
                None => {
                    debug!(target: "jwt_manager.manager", "Token carries no identifier, nothing to invalidate");
                    metrics::record_token_invalidation("unchanged");
                    return Ok(false);
                }
            },
        };

        if claims.jti.is_empty() {
            metrics::record_token_invalidation("unchanged");
            return Ok(false);
        }

        match self.authority.invalidate(&claims.jti, exp).await {
            Ok(true) => {
                metrics::record_token_invalidation("invalidated");
                debug!(target: "jwt_manager.manager", jti = %claims.jti, "Identifier invalidated");
                self.notifier.invalidated(claims).await;
                Ok(true)
            }
            Ok(false) => {
                metrics::record_token_invalidation("unchanged");
                debug!(target: "jwt_manager.manager", jti = %claims.jti, "Identifier already invalid");
                Ok(false)
            }
            Err(e) => {
                let error = JwtManagerError::from(e);
                metrics::record_token_invalidation("error");
                warn!(target: "jwt_manager.manager", error = %error, "Invalidation failed");
                self.notifier.error(&error, Some(claims)).await;
                Err(error)
            }
        }
    }

    /// Decode `token` without verifying signature, timing, authority or
    /// validator. Never trust the result for access decisions.
    #[must_use]
    pub fn decode(&self, token: &str) -> Option<Claims<P>> {
        if token.is_empty() {
            return None;
        }
        JwtCodec::decode(token).ok()
    }
}
