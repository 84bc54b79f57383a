//! Token verification against a mocked authority key set.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use quotes_service::auth::{KeySetCache, KeySetConfig, TokenVerifier};
use quotes_service::errors::QsError;
use quotes_test_utils::{MockAuthority, TestKeypair, TestTokenBuilder, TEST_ISSUER};
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    _authority: MockAuthority,
    keypair: TestKeypair,
    verifier: TokenVerifier,
}

async fn fixture() -> Fixture {
    let authority = MockAuthority::start().await;
    let keypair = TestKeypair::new(7, "signing-key-1");
    authority.mount_jwks(&[&keypair]).await;

    let key_set = Arc::new(KeySetCache::new(KeySetConfig::new(authority.jwks_url())));
    let verifier = TokenVerifier::new(
        key_set,
        vec![TEST_ISSUER.to_string()],
        Duration::from_secs(300),
    );

    Fixture {
        _authority: authority,
        keypair,
        verifier,
    }
}

#[tokio::test]
async fn test_valid_token_yields_subject() {
    let f = fixture().await;
    let token = f
        .keypair
        .sign(&TestTokenBuilder::new().for_subject("ext-42").build());

    assert_eq!(f.verifier.verify(&token).await.unwrap(), "ext-42");
}

#[tokio::test]
async fn test_signature_by_unknown_key_is_invalid() {
    let f = fixture().await;
    let impostor = TestKeypair::new(99, "signing-key-1");
    let token = impostor.sign(&TestTokenBuilder::new().build());

    assert_eq!(f.verifier.verify(&token).await, Err(QsError::TokenInvalid));
}

#[tokio::test]
async fn test_issuer_outside_allow_list_is_invalid() {
    let f = fixture().await;
    let token = f.keypair.sign(
        &TestTokenBuilder::new()
            .issued_by("https://evil.example.com")
            .build(),
    );

    assert_eq!(f.verifier.verify(&token).await, Err(QsError::TokenInvalid));
}

#[tokio::test]
async fn test_missing_issuer_is_invalid() {
    let f = fixture().await;
    let token = f.keypair.sign(&TestTokenBuilder::new().without_issuer().build());

    assert_eq!(f.verifier.verify(&token).await, Err(QsError::TokenInvalid));
}

#[tokio::test]
async fn test_missing_or_blank_subject_is_invalid() {
    let f = fixture().await;

    let no_subject = f.keypair.sign(&TestTokenBuilder::new().without_subject().build());
    assert_eq!(f.verifier.verify(&no_subject).await, Err(QsError::TokenInvalid));

    let blank_subject = f.keypair.sign(&TestTokenBuilder::new().for_subject("  ").build());
    assert_eq!(f.verifier.verify(&blank_subject).await, Err(QsError::TokenInvalid));
}

#[tokio::test]
async fn test_unknown_kid_is_invalid() {
    let f = fixture().await;
    let token = f
        .keypair
        .sign_with_kid(&TestTokenBuilder::new().build(), "rotated-away");

    assert_eq!(f.verifier.verify(&token).await, Err(QsError::TokenInvalid));
}

#[tokio::test]
async fn test_expiry_is_enforced_with_clock_skew() {
    let f = fixture().await;

    let expired = f.keypair.sign(&TestTokenBuilder::new().expires_in(-3600).build());
    assert_eq!(f.verifier.verify(&expired).await, Err(QsError::TokenInvalid));

    let within_skew = f.keypair.sign(&TestTokenBuilder::new().expires_in(-60).build());
    assert!(f.verifier.verify(&within_skew).await.is_ok());

    let no_expiry = f.keypair.sign(&TestTokenBuilder::new().without_expiry().build());
    assert_eq!(f.verifier.verify(&no_expiry).await, Err(QsError::TokenInvalid));
}

#[tokio::test]
async fn test_iat_in_the_future_is_invalid() {
    let f = fixture().await;
    let token = f.keypair.sign(
        &TestTokenBuilder::new()
            .issued_at(Utc::now().timestamp() + 3600)
            .expires_in(7200)
            .build(),
    );

    assert_eq!(f.verifier.verify(&token).await, Err(QsError::TokenInvalid));
}

#[tokio::test]
async fn test_header_algorithm_must_match_key() {
    let f = fixture().await;
    let mut header = Header::new(jsonwebtoken::Algorithm::HS256);
    header.kid = Some(f.keypair.kid.clone());
    let token = encode(
        &header,
        &TestTokenBuilder::new().build(),
        &EncodingKey::from_secret(b"shared-secret"),
    )
    .unwrap();

    assert_eq!(f.verifier.verify(&token).await, Err(QsError::TokenInvalid));
}

#[tokio::test]
async fn test_oversized_token_is_invalid() {
    let f = fixture().await;
    let mut claims = TestTokenBuilder::new().build();
    claims["padding"] = serde_json::json!("x".repeat(9000));
    let token = f.keypair.sign(&claims);

    assert_eq!(f.verifier.verify(&token).await, Err(QsError::TokenInvalid));
}
