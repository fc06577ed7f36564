//! Identifier authority integration: policies, concurrency and backend faults

use jwt_manager::authority::AuthorityPolicy;
use jwt_manager::memory::{spawn_sweeper, AllowListAuthority, MemoryAuthority};
use jwt_manager::{JwtManager, JwtManagerError};
use jwt_test_utils::*;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_invalidation_has_single_winner() -> Result<(), anyhow::Error> {
    let manager = Arc::new(JwtManager::<String>::builder(test_hmac_config(), resolve_subject).build()?);
    let token = manager
        .generate(TEST_SUBJECT.to_string())
        .await
        .ok_or_else(|| anyhow::anyhow!("token should be generated"))?;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let manager = Arc::clone(&manager);
        let token = token.clone();
        handles.push(tokio::spawn(async move { manager.invalidate(&token).await }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await? {
            winners += 1;
        }
    }

    assert_eq!(winners, 1, "exactly one invalidation should win");
    assert!(manager.verify(&token).await.is_none());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_tokens_verify_in_parallel() -> Result<(), anyhow::Error> {
    let manager = Arc::new(JwtManager::<String>::builder(test_hmac_config(), resolve_subject).build()?);

    let mut handles = Vec::new();
    for i in 0..16 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            let token = manager.generate(format!("user-{i}")).await?;
            manager.verify(&token).await.map(|claims| claims.sub)
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await?, Some(format!("user-{i}")));
    }

    Ok(())
}

// ============================================================================
// Policies
// ============================================================================

#[tokio::test]
async fn test_default_authority_is_deny_list() -> Result<(), anyhow::Error> {
    let manager = JwtManager::<String>::builder(test_hmac_config(), resolve_subject).build()?;
    assert_eq!(manager.authority().policy(), AuthorityPolicy::DenyList);

    // Correctly signed tokens from elsewhere are trusted unless revoked
    let foreign = TestTokenBuilder::new().with_jti("issued-elsewhere").sign();
    assert!(manager.verify(&foreign).await.is_some());

    Ok(())
}

#[tokio::test]
async fn test_allow_list_rejects_unregistered_tokens() -> Result<(), anyhow::Error> {
    let authority = Arc::new(AllowListAuthority::new(Duration::from_secs(10)));
    let manager = JwtManager::<String>::builder(test_hmac_config(), resolve_subject)
        .authority(Arc::clone(&authority))
        .build()?;

    let own = manager
        .generate(TEST_SUBJECT.to_string())
        .await
        .ok_or_else(|| anyhow::anyhow!("token should be generated"))?;
    assert!(manager.verify(&own).await.is_some());

    // Same key, but never registered with this authority
    let foreign = TestTokenBuilder::new().with_jti("issued-elsewhere").sign();
    assert_eq!(
        manager.try_verify(&foreign).await,
        Err(JwtManagerError::InvalidIdentifier)
    );

    assert!(manager.invalidate(&own).await);
    assert!(manager.verify(&own).await.is_none());
    assert!(authority.is_empty().await);

    Ok(())
}

#[tokio::test]
async fn test_shared_memory_authority_with_sweeper() -> Result<(), anyhow::Error> {
    let authority = Arc::new(MemoryAuthority::new(Duration::ZERO));
    let sweeper = spawn_sweeper(&authority, Duration::from_millis(20));

    let manager = JwtManager::<String>::builder(test_hmac_config(), resolve_subject)
        .authority(Arc::clone(&authority))
        .build()?;

    // Revocation record for a token that is already long expired
    let stale = TestTokenBuilder::new().with_jti("stale").expires_in(-3600).sign();
    assert!(manager.invalidate(&stale).await);

    let live = manager
        .generate(TEST_SUBJECT.to_string())
        .await
        .ok_or_else(|| anyhow::anyhow!("token should be generated"))?;
    assert!(manager.invalidate(&live).await);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(authority.len().await, 1, "only the live record should remain");

    sweeper.abort();
    Ok(())
}

// ============================================================================
// Backend Faults
// ============================================================================

#[tokio::test]
async fn test_register_failure_produces_no_token() -> Result<(), anyhow::Error> {
    let observer = Arc::new(RecordingObserver::new());
    let manager = JwtManager::<String>::builder(test_hmac_config(), resolve_subject)
        .authority(Arc::new(FailingAuthority::new(FailOn::Register)))
        .observer(Arc::clone(&observer))
        .build()?;

    assert!(manager.generate(TEST_SUBJECT.to_string()).await.is_none());
    assert_eq!(observer.error_kinds(), vec!["authority"]);

    // The partial claim set is handed to the error channel
    assert!(matches!(
        observer.events().first(),
        Some(RecordedEvent::Error { jti: Some(_), .. })
    ));

    Ok(())
}

#[tokio::test]
async fn test_validate_failure_does_not_auto_invalidate() -> Result<(), anyhow::Error> {
    let authority = Arc::new(FailingAuthority::new(FailOn::Validate));
    let manager = JwtManager::<String>::builder(test_hmac_config(), resolve_subject)
        .authority(Arc::clone(&authority))
        .build()?;

    let token = manager
        .generate(TEST_SUBJECT.to_string())
        .await
        .ok_or_else(|| anyhow::anyhow!("token should be generated"))?;
    let calls_before = authority.call_count();

    let result = manager.try_verify(&token).await;
    assert!(matches!(result, Err(JwtManagerError::Authority(_))));

    // One validate call, no invalidate call
    assert_eq!(authority.call_count(), calls_before + 1);

    Ok(())
}

#[tokio::test]
async fn test_invalidate_failure_returns_false() -> Result<(), anyhow::Error> {
    let observer = Arc::new(RecordingObserver::new());
    let manager = JwtManager::<String>::builder(test_hmac_config(), resolve_subject)
        .authority(Arc::new(FailingAuthority::new(FailOn::Invalidate)))
        .observer(Arc::clone(&observer))
        .build()?;

    let token = manager
        .generate(TEST_SUBJECT.to_string())
        .await
        .ok_or_else(|| anyhow::anyhow!("token should be generated"))?;

    assert!(!manager.invalidate(&token).await);
    assert!(matches!(
        manager.try_invalidate(&token).await,
        Err(JwtManagerError::Authority(_))
    ));
    assert_eq!(observer.error_kinds(), vec!["authority", "authority"]);

    // The decoded claims travel with the authority failure
    let jti = manager
        .decode(&token)
        .map(|claims| claims.jti)
        .ok_or_else(|| anyhow::anyhow!("token should decode"))?;
    let events = observer.events();
    assert_eq!(events.len(), 3);
    assert!(events.iter().skip(1).all(|event| matches!(
        event,
        RecordedEvent::Error { kind: "authority", jti: Some(failed), .. } if *failed == jti
    )));

    Ok(())
}
