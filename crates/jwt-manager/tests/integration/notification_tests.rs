//! Observer notification ordering and error routing

use async_trait::async_trait;
use jwt_manager::resolver::ClaimsValidator;
use jwt_manager::{Claims, JwtManager, JwtManagerError, NoProperties};
use jwt_test_utils::*;
use std::sync::Arc;

/// Validator whose policy store is unreachable.
struct UnreachablePolicy;

#[async_trait]
impl ClaimsValidator<NoProperties> for UnreachablePolicy {
    async fn validate(&self, _claims: &Claims) -> anyhow::Result<bool> {
        anyhow::bail!("policy store unreachable")
    }
}

fn observed(observer: &Arc<RecordingObserver>) -> Result<JwtManager<String>, anyhow::Error> {
    Ok(JwtManager::<String>::builder(test_hmac_config(), resolve_subject)
        .observer(Arc::clone(observer))
        .build()?)
}

#[tokio::test]
async fn test_events_follow_operation_order() -> Result<(), anyhow::Error> {
    let observer = Arc::new(RecordingObserver::new());
    let manager = observed(&observer)?;

    let token = manager
        .generate(TEST_SUBJECT.to_string())
        .await
        .ok_or_else(|| anyhow::anyhow!("token should be generated"))?;
    let claims = manager
        .verify(&token)
        .await
        .ok_or_else(|| anyhow::anyhow!("token should verify"))?;
    assert!(manager.invalidate(&token).await);

    assert_eq!(
        observer.events(),
        vec![
            RecordedEvent::Generated {
                jti: claims.jti.clone(),
                sub: TEST_SUBJECT.to_string(),
            },
            RecordedEvent::Verified {
                jti: claims.jti.clone(),
                sub: TEST_SUBJECT.to_string(),
            },
            RecordedEvent::Invalidated {
                jti: claims.jti.clone(),
                sub: TEST_SUBJECT.to_string(),
            },
        ]
    );

    Ok(())
}

#[tokio::test]
async fn test_observers_called_in_registration_order() -> Result<(), anyhow::Error> {
    let first = Arc::new(RecordingObserver::new());
    let second = Arc::new(RecordingObserver::new());
    let manager = JwtManager::<String>::builder(test_hmac_config(), resolve_subject)
        .observer(Arc::clone(&first))
        .observer(Arc::clone(&second))
        .build()?;

    manager
        .generate(TEST_SUBJECT.to_string())
        .await
        .ok_or_else(|| anyhow::anyhow!("token should be generated"))?;

    assert_eq!(first.events().len(), 1);
    assert_eq!(first.events(), second.events());

    Ok(())
}

#[tokio::test]
async fn test_failing_observer_does_not_affect_generate() -> Result<(), anyhow::Error> {
    let failing = Arc::new(RecordingObserver::failing_on_generate());
    let witness = Arc::new(RecordingObserver::new());
    let manager = JwtManager::<String>::builder(test_hmac_config(), resolve_subject)
        .observer(Arc::clone(&failing))
        .observer(Arc::clone(&witness))
        .build()?;

    let token = manager
        .generate(TEST_SUBJECT.to_string())
        .await
        .ok_or_else(|| anyhow::anyhow!("observer failure must not lose the token"))?;
    assert!(manager.verify(&token).await.is_some());

    // Every observer hears about the failure on the error channel
    assert_eq!(failing.error_kinds(), vec!["observer"]);
    assert_eq!(witness.error_kinds(), vec!["observer"]);

    Ok(())
}

#[tokio::test]
async fn test_not_found_is_silent() -> Result<(), anyhow::Error> {
    let observer = Arc::new(RecordingObserver::new());
    let manager = observed(&observer)?;

    assert_eq!(manager.try_generate(TEST_SUBJECT_MISSING.to_string()).await, Ok(None));
    assert!(observer.events().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_resolver_error_has_no_claims() -> Result<(), anyhow::Error> {
    let observer = Arc::new(RecordingObserver::new());
    let manager = JwtManager::<String>::builder(test_hmac_config(), resolve_failing)
        .observer(Arc::clone(&observer))
        .build()?;

    let result = manager.try_generate(TEST_SUBJECT.to_string()).await;
    assert!(matches!(result, Err(JwtManagerError::Resolver(ref msg)) if msg.contains("unavailable")));

    assert_eq!(
        observer.events(),
        vec![RecordedEvent::Error {
            kind: "resolver",
            message: "Subject resolver failed: user directory unavailable".to_string(),
            jti: None,
        }]
    );

    Ok(())
}

#[tokio::test]
async fn test_auto_invalidation_precedes_error_event() -> Result<(), anyhow::Error> {
    let observer = Arc::new(RecordingObserver::new());
    let manager = JwtManager::<String>::builder(test_hmac_config(), resolve_subject)
        .validator(|claims: &Claims| claims.sub != TEST_SUBJECT_BANNED)
        .observer(Arc::clone(&observer))
        .build()?;

    let token = manager
        .generate(TEST_SUBJECT_BANNED.to_string())
        .await
        .ok_or_else(|| anyhow::anyhow!("token should be generated"))?;
    let jti = manager
        .decode(&token)
        .map(|claims| claims.jti)
        .ok_or_else(|| anyhow::anyhow!("token should decode"))?;

    assert!(manager.verify(&token).await.is_none());

    let events = observer.events();
    assert_eq!(events.len(), 3);
    assert!(matches!(events.first(), Some(RecordedEvent::Generated { .. })));
    assert!(matches!(
        events.get(1),
        Some(RecordedEvent::Invalidated { jti: revoked, .. }) if *revoked == jti
    ));
    assert!(matches!(
        events.get(2),
        Some(RecordedEvent::Error { kind: "invalid_claims", jti: Some(failed), .. }) if *failed == jti
    ));

    Ok(())
}

#[tokio::test]
async fn test_validator_error_keeps_identifier() -> Result<(), anyhow::Error> {
    let observer = Arc::new(RecordingObserver::new());
    let authority = Arc::new(CountingAuthority::new());
    let manager = JwtManager::<String>::builder(test_hmac_config(), resolve_subject)
        .validator(UnreachablePolicy)
        .authority(Arc::clone(&authority))
        .observer(Arc::clone(&observer))
        .build()?;

    let token = manager
        .generate(TEST_SUBJECT.to_string())
        .await
        .ok_or_else(|| anyhow::anyhow!("token should be generated"))?;

    let result = manager.try_verify(&token).await;
    assert!(matches!(result, Err(JwtManagerError::Validator(_))));

    assert_eq!(authority.invalidate_calls(), 0);
    assert_eq!(authority.records().await, 0);
    assert_eq!(observer.error_kinds(), vec!["validator"]);

    Ok(())
}

#[tokio::test]
async fn test_codec_rejection_is_reported_without_claims() -> Result<(), anyhow::Error> {
    let observer = Arc::new(RecordingObserver::new());
    let manager = observed(&observer)?;

    let forged = TestTokenBuilder::new().sign_hs256(TEST_WRONG_SECRET);
    assert!(manager.verify(&forged).await.is_none());

    assert!(matches!(
        observer.events().as_slice(),
        [RecordedEvent::Error { kind: "bad_signature", jti: None, .. }]
    ));

    Ok(())
}

#[tokio::test]
async fn test_empty_token_is_not_notified() -> Result<(), anyhow::Error> {
    let observer = Arc::new(RecordingObserver::new());
    let manager = observed(&observer)?;

    assert_eq!(manager.try_verify("").await, Err(JwtManagerError::EmptyToken));
    assert!(!observer.has_errors());

    Ok(())
}

#[tokio::test]
async fn test_subscribe_and_unsubscribe_at_runtime() -> Result<(), anyhow::Error> {
    let builder_observer = Arc::new(RecordingObserver::new());
    let late = Arc::new(RecordingObserver::new());
    let manager = observed(&builder_observer)?;

    let id = manager.subscribe(Arc::clone(&late));
    let token = manager
        .generate(TEST_SUBJECT.to_string())
        .await
        .ok_or_else(|| anyhow::anyhow!("token should be generated"))?;
    assert_eq!(late.events().len(), 1);

    assert!(manager.unsubscribe(id));
    assert!(!manager.unsubscribe(id));
    assert!(manager.verify(&token).await.is_some());

    assert_eq!(late.events().len(), 1);
    assert_eq!(builder_observer.events().len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_once_subscription_is_removed_after_first_event() -> Result<(), anyhow::Error> {
    let once = Arc::new(RecordingObserver::new());
    let manager = JwtManager::<String>::builder(test_hmac_config(), resolve_subject).build()?;
    let id = manager.subscribe_once(Arc::clone(&once));

    let token = manager
        .generate(TEST_SUBJECT.to_string())
        .await
        .ok_or_else(|| anyhow::anyhow!("token should be generated"))?;
    assert!(manager.verify(&token).await.is_some());
    assert!(manager.invalidate(&token).await);

    assert!(matches!(once.events().as_slice(), [RecordedEvent::Generated { .. }]));
    assert!(!manager.unsubscribe(id));

    Ok(())
}

#[tokio::test]
async fn test_invalidate_event_carries_decoded_claims() -> Result<(), anyhow::Error> {
    let observer = Arc::new(RecordingObserver::new());
    let manager = observed(&observer)?;

    // Not issued by this manager, so only the raw payload is known
    let token = TestTokenBuilder::new()
        .with_jti(&TEST_JTI_2.to_string())
        .for_subject(TEST_SUBJECT_BOB)
        .sign();
    assert!(manager.invalidate(&token).await);

    assert_eq!(
        observer.events(),
        vec![RecordedEvent::Invalidated {
            jti: TEST_JTI_2.to_string(),
            sub: TEST_SUBJECT_BOB.to_string(),
        }]
    );

    Ok(())
}
