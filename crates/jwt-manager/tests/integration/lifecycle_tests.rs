//! Generate / verify / invalidate / decode round trips
//!
//! Exercises the full pipeline with the default in-memory deny-list and the
//! HS256 test configuration (issuer `svc`, audience `svc`, expiry 3600s).

use jwt_manager::codec::TokenRejection;
use jwt_manager::resolver::{Resolution, SubjectRecord};
use jwt_manager::{Claims, GenerateOptions, JwtManager, JwtManagerError};
use jwt_test_utils::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Helper Functions
// ============================================================================

fn manager() -> Result<JwtManager<String>, anyhow::Error> {
    Ok(JwtManager::<String>::builder(test_hmac_config(), resolve_subject).build()?)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Profile {
    role: String,
    #[serde(default)]
    tenant: Option<String>,
}

// ============================================================================
// Round Trips
// ============================================================================

/// Issuer `svc`, audience `svc`, expiry 3600, resolver returning `user-42`.
#[tokio::test]
async fn test_generate_verify_scenario() -> Result<(), anyhow::Error> {
    let manager = manager()?;

    let token = manager
        .generate(TEST_SUBJECT.to_string())
        .await
        .ok_or_else(|| anyhow::anyhow!("token should be generated"))?;

    token
        .assert_valid_jwt("HS256")
        .assert_for_subject(TEST_SUBJECT)
        .assert_issued_by(TEST_ISSUER)
        .assert_has_audience(TEST_AUDIENCE)
        .assert_has_jti()
        .assert_expires_in(3600);

    let claims = manager
        .verify(&token)
        .await
        .ok_or_else(|| anyhow::anyhow!("token should verify"))?;

    assert_eq!(claims.sub, TEST_SUBJECT);
    assert_eq!(claims.iss, TEST_ISSUER);
    assert_eq!(claims.aud, vec![TEST_AUDIENCE.to_string()]);
    assert_eq!(claims.lifetime_secs(), 3600);

    Ok(())
}

#[tokio::test]
async fn test_jti_is_unique() -> Result<(), anyhow::Error> {
    let manager = manager()?;
    let mut seen = HashSet::new();

    for _ in 0..50 {
        let token = manager
            .generate(TEST_SUBJECT.to_string())
            .await
            .ok_or_else(|| anyhow::anyhow!("token should be generated"))?;
        let claims = manager
            .decode(&token)
            .ok_or_else(|| anyhow::anyhow!("token should decode"))?;
        assert!(seen.insert(claims.jti), "jti must be unique");
    }

    Ok(())
}

#[tokio::test]
async fn test_properties_round_trip_from_record() -> Result<(), anyhow::Error> {
    let manager = JwtManager::<u32, Profile>::builder(test_hmac_config(), |id: u32| async move {
        anyhow::Ok(Some(Resolution::Record(SubjectRecord {
            sub: format!("user-{id}"),
            properties: Profile {
                role: "admin".to_string(),
                tenant: Some("acme".to_string()),
            },
        })))
    })
    .build()?;

    let token = manager
        .generate(42)
        .await
        .ok_or_else(|| anyhow::anyhow!("token should be generated"))?;

    token.assert_property("role", "admin").assert_property("tenant", "acme");

    let claims: Claims<Profile> = manager
        .verify(&token)
        .await
        .ok_or_else(|| anyhow::anyhow!("token should verify"))?;
    assert_eq!(claims.sub, TEST_SUBJECT);
    assert_eq!(claims.properties.role, "admin");
    assert_eq!(claims.properties.tenant.as_deref(), Some("acme"));

    Ok(())
}

#[tokio::test]
async fn test_resolver_not_found_produces_nothing() -> Result<(), anyhow::Error> {
    let authority = Arc::new(CountingAuthority::new());
    let observer = Arc::new(RecordingObserver::new());

    let manager = JwtManager::<String>::builder(test_hmac_config(), resolve_subject)
        .authority(Arc::clone(&authority))
        .observer(Arc::clone(&observer))
        .build()?;

    let result = manager.try_generate(TEST_SUBJECT_MISSING.to_string()).await;

    assert_eq!(result, Ok(None));
    assert_eq!(authority.total_calls(), 0, "no authority record expected");
    assert!(observer.events().is_empty(), "no notification expected");

    Ok(())
}

#[tokio::test]
async fn test_per_call_expiry_and_not_before() -> Result<(), anyhow::Error> {
    let manager = manager()?;
    let options = GenerateOptions::default()
        .expires_in(Duration::from_secs(60))
        .not_before(Duration::from_secs(120));

    let token = manager
        .generate_with(TEST_SUBJECT.to_string(), options)
        .await
        .ok_or_else(|| anyhow::anyhow!("token should be generated"))?;
    token.assert_expires_in(60);

    let claims = manager
        .decode(&token)
        .ok_or_else(|| anyhow::anyhow!("token should decode"))?;
    assert_eq!(claims.nbf, Some(claims.iat + 120));

    // Not valid yet, beyond the 10s tolerance
    assert_eq!(
        manager.try_verify(&token).await,
        Err(JwtManagerError::InvalidToken(TokenRejection::NotYetValid))
    );

    Ok(())
}

// ============================================================================
// Rejections
// ============================================================================

#[tokio::test]
async fn test_tampered_token_never_reaches_authority_or_validator() -> Result<(), anyhow::Error> {
    let authority = Arc::new(CountingAuthority::new());
    let validator_calls = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&validator_calls);

    let manager = JwtManager::<String>::builder(test_hmac_config(), resolve_subject)
        .authority(Arc::clone(&authority))
        .validator(move |_: &Claims| {
            calls.fetch_add(1, Ordering::SeqCst);
            true
        })
        .build()?;

    // Same claims, signed with a different secret
    let forged = TestTokenBuilder::new().sign_hs256(TEST_WRONG_SECRET);

    assert_eq!(
        manager.try_verify(&forged).await,
        Err(JwtManagerError::InvalidToken(TokenRejection::BadSignature))
    );
    assert_eq!(authority.total_calls(), 0);
    assert_eq!(validator_calls.load(Ordering::SeqCst), 0);

    Ok(())
}

#[tokio::test]
async fn test_flipped_signature_byte_rejected() -> Result<(), anyhow::Error> {
    let authority = Arc::new(CountingAuthority::new());
    let manager = JwtManager::<String>::builder(test_hmac_config(), resolve_subject)
        .authority(Arc::clone(&authority))
        .build()?;
    let token = manager
        .generate(TEST_SUBJECT.to_string())
        .await
        .ok_or_else(|| anyhow::anyhow!("token should be generated"))?;

    // Swap the first signature character; it encodes the top bits of byte 0
    let (signed, signature) = token
        .rsplit_once('.')
        .ok_or_else(|| anyhow::anyhow!("token should have a signature segment"))?;
    let mut chars = signature.chars();
    let first = chars
        .next()
        .ok_or_else(|| anyhow::anyhow!("signature should not be empty"))?;
    let replacement = if first == 'A' { 'B' } else { 'A' };
    let tampered = format!("{signed}.{replacement}{}", chars.as_str());
    assert_ne!(tampered, token);

    assert_eq!(
        manager.try_verify(&tampered).await,
        Err(JwtManagerError::InvalidToken(TokenRejection::BadSignature))
    );
    assert_eq!(authority.validate_calls(), 0);

    // The genuine token is untouched
    assert!(manager.verify(&token).await.is_some());

    Ok(())
}

#[tokio::test]
async fn test_expired_token_rejected() -> Result<(), anyhow::Error> {
    let manager = manager()?;

    let expired = TestTokenBuilder::new().expires_in(-60).sign();
    assert_eq!(
        manager.try_verify(&expired).await,
        Err(JwtManagerError::InvalidToken(TokenRejection::Expired))
    );

    // Inside the 10s clock tolerance
    let barely = TestTokenBuilder::new().expires_in(-3).sign();
    assert!(manager.verify(&barely).await.is_some());

    Ok(())
}

#[tokio::test]
async fn test_wrong_issuer_and_audience_rejected() -> Result<(), anyhow::Error> {
    let manager = manager()?;

    let foreign_issuer = TestTokenBuilder::new().with_issuer("intruder").sign();
    assert_eq!(
        manager.try_verify(&foreign_issuer).await,
        Err(JwtManagerError::InvalidToken(TokenRejection::WrongIssuer))
    );

    let foreign_audience = TestTokenBuilder::new().with_audience(&[TEST_OTHER_AUDIENCE]).sign();
    assert_eq!(
        manager.try_verify(&foreign_audience).await,
        Err(JwtManagerError::InvalidToken(TokenRejection::WrongAudience))
    );

    // Accepted when the caller asks for that audience explicitly
    let audience = vec![TEST_OTHER_AUDIENCE.to_string()];
    assert!(manager.verify_for(&foreign_audience, &audience).await.is_some());

    Ok(())
}

#[tokio::test]
async fn test_missing_claims_rejected() -> Result<(), anyhow::Error> {
    let manager = manager()?;

    let no_exp = TestTokenBuilder::new().without_claim("exp").sign();
    assert!(matches!(
        manager.try_verify(&no_exp).await,
        Err(JwtManagerError::InvalidToken(
            TokenRejection::MissingClaim(_) | TokenRejection::Malformed
        ))
    ));

    let no_jti = TestTokenBuilder::new().without_claim("jti").sign();
    assert_eq!(
        manager.try_verify(&no_jti).await,
        Err(JwtManagerError::InvalidToken(TokenRejection::Malformed))
    );
    assert!(!manager.invalidate(&no_jti).await, "no jti, nothing to invalidate");

    Ok(())
}

#[tokio::test]
async fn test_empty_token() -> Result<(), anyhow::Error> {
    let manager = manager()?;

    assert_eq!(manager.try_verify("").await, Err(JwtManagerError::EmptyToken));
    assert!(manager.verify("").await.is_none());
    assert!(manager.decode("").is_none());
    assert!(!manager.invalidate("").await);

    Ok(())
}

// ============================================================================
// Invalidation and Decoding
// ============================================================================

#[tokio::test]
async fn test_invalidate_then_verify_fails() -> Result<(), anyhow::Error> {
    let observer = Arc::new(RecordingObserver::new());
    let manager = JwtManager::<String>::builder(test_hmac_config(), resolve_subject)
        .observer(Arc::clone(&observer))
        .build()?;
    let token = manager
        .generate(TEST_SUBJECT.to_string())
        .await
        .ok_or_else(|| anyhow::anyhow!("token should be generated"))?;
    assert!(manager.verify(&token).await.is_some());

    assert!(manager.invalidate(&token).await);
    assert_eq!(
        manager.try_verify(&token).await,
        Err(JwtManagerError::InvalidIdentifier)
    );
    assert_eq!(observer.error_kinds(), vec!["invalid_identifier"]);

    // Invalidating twice does not raise
    assert!(!manager.invalidate(&token).await);
    assert_eq!(manager.try_invalidate(&token).await, Ok(false));

    Ok(())
}

#[tokio::test]
async fn test_decode_skips_all_checks() -> Result<(), anyhow::Error> {
    let authority = Arc::new(CountingAuthority::new());
    let manager = JwtManager::<String>::builder(test_hmac_config(), resolve_subject)
        .authority(Arc::clone(&authority))
        .validator(|_: &Claims| false)
        .build()?;

    // Foreign secret, expired, wrong issuer: decode does not care
    let token = TestTokenBuilder::new()
        .with_issuer("intruder")
        .expires_in(-86_400)
        .sign_hs256(TEST_WRONG_SECRET);

    let claims = manager
        .decode(&token)
        .ok_or_else(|| anyhow::anyhow!("token should decode"))?;
    assert_eq!(claims.iss, "intruder");
    assert_eq!(authority.total_calls(), 0);

    assert!(manager.decode("garbage").is_none());

    Ok(())
}

#[tokio::test]
async fn test_decode_after_invalidation() -> Result<(), anyhow::Error> {
    let manager = manager()?;
    let token = manager
        .generate(TEST_SUBJECT.to_string())
        .await
        .ok_or_else(|| anyhow::anyhow!("token should be generated"))?;

    assert!(manager.invalidate(&token).await);

    let claims = manager
        .decode(&token)
        .ok_or_else(|| anyhow::anyhow!("token should still decode"))?;
    assert_eq!(claims.sub, TEST_SUBJECT);

    Ok(())
}

#[tokio::test]
async fn test_invalidate_by_claims() -> Result<(), anyhow::Error> {
    let manager = manager()?;
    let token = manager
        .generate(TEST_SUBJECT.to_string())
        .await
        .ok_or_else(|| anyhow::anyhow!("token should be generated"))?;
    let claims = manager
        .verify(&token)
        .await
        .ok_or_else(|| anyhow::anyhow!("token should verify"))?;

    assert!(manager.invalidate(&claims).await);
    assert!(manager.verify(&token).await.is_none());

    Ok(())
}

#[tokio::test]
async fn test_validator_rejection_auto_invalidates() -> Result<(), anyhow::Error> {
    let authority = Arc::new(CountingAuthority::new());
    let manager = JwtManager::<String>::builder(test_hmac_config(), resolve_subject)
        .authority(Arc::clone(&authority))
        .validator(|claims: &Claims| claims.sub != TEST_SUBJECT_BANNED)
        .build()?;

    let token = manager
        .generate(TEST_SUBJECT_BANNED.to_string())
        .await
        .ok_or_else(|| anyhow::anyhow!("token should be generated"))?;

    assert_eq!(
        manager.try_verify(&token).await,
        Err(JwtManagerError::InvalidClaims)
    );
    assert_eq!(authority.invalidate_calls(), 1);
    assert_eq!(authority.records().await, 1);

    // Now refused by the authority before the validator runs
    assert_eq!(
        manager.try_verify(&token).await,
        Err(JwtManagerError::InvalidIdentifier)
    );

    Ok(())
}
