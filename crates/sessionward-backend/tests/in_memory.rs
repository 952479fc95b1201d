//! Integration tests for the in-process backend.

use serde_json::json;
use sessionward_backend::InMemoryBackend;
use sessionward_protocol::{
    AuthBackend, AuthEventKind, BackendError, FederatedProvider, FederatedSignIn, PromptMode,
    SignOutScope, SignUpRequest,
};
use sessionward_store::{MemoryStore, StorageKeys, StoreAdapter};

// =========================================================================
// Helpers
// =========================================================================

fn backend() -> InMemoryBackend<MemoryStore> {
    InMemoryBackend::new(StoreAdapter::new(MemoryStore::new(), StorageKeys::default()))
}

fn sign_up_request(email: &str) -> SignUpRequest {
    SignUpRequest {
        email: email.into(),
        password: "hunter22".into(),
        data: json!({ "full_name": "Ada" }),
        email_redirect_to: Some("https://app.example/auth/callback".into()),
    }
}

// =========================================================================
// Sign-in / sign-up
// =========================================================================

#[tokio::test]
async fn test_sign_in_with_password_persists_and_emits_signed_in() {
    let b = backend();
    let user = b.register("ada@example.com", "pw");
    let mut events = b.subscribe();

    let session = b.sign_in_with_password("ada@example.com", "pw").await.unwrap();

    assert_eq!(session.user.as_ref().map(|u| &u.id), Some(&user.id));
    assert_eq!(b.store().canonical(), Some(session.to_record().unwrap()));
    assert_eq!(events.try_recv().unwrap().kind, AuthEventKind::SignedIn);
}

#[tokio::test]
async fn test_sign_in_wrong_password_is_invalid_credentials() {
    let b = backend();
    b.register("ada@example.com", "pw");

    let err = b
        .sign_in_with_password("ada@example.com", "nope")
        .await
        .unwrap_err();

    assert!(matches!(err, BackendError::InvalidCredentials(_)));
    assert_eq!(b.store().canonical(), None);
}

#[tokio::test]
async fn test_sign_up_does_not_sign_in_and_rejects_duplicates() {
    let b = backend();

    let outcome = b.sign_up(&sign_up_request("new@example.com")).await.unwrap();
    assert!(outcome.confirmation_sent);
    let user = outcome.user.unwrap();
    assert_eq!(user.user_metadata.get("full_name"), Some(&json!("Ada")));
    assert_eq!(b.store().canonical(), None);

    let err = b
        .sign_up(&sign_up_request("NEW@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::AlreadyRegistered(_)));
}

#[tokio::test]
async fn test_sign_in_with_provider_returns_authorize_url() {
    let b = backend();
    let url = b
        .sign_in_with_provider(&FederatedSignIn {
            provider: FederatedProvider::Microsoft,
            redirect_to: "https://app.example/auth/callback".into(),
            scopes: vec!["openid".into(), "offline_access".into()],
            prompt: PromptMode::SelectAccount,
            query_params: vec![],
        })
        .await
        .unwrap();

    assert!(url.contains("provider=azure"));
    assert!(url.contains("prompt=select_account"));
    assert_eq!(b.provider_requests().len(), 1);
}

// =========================================================================
// Refresh
// =========================================================================

#[tokio::test]
async fn test_refresh_rotates_tokens_and_emits_token_refreshed() {
    let b = backend();
    let user = b.register("ada@example.com", "pw");
    let old = b.seed_session(&user, -60);
    let mut events = b.subscribe();

    let fresh = b.refresh_session().await.unwrap().unwrap();

    assert_ne!(fresh.refresh_token, old.refresh_token);
    assert!(b.is_revoked(&old.refresh_token));
    assert_eq!(b.store().canonical(), Some(fresh.to_record().unwrap()));
    assert_eq!(events.try_recv().unwrap().kind, AuthEventKind::TokenRefreshed);
    assert_eq!(b.refresh_calls(), 1);
}

#[tokio::test]
async fn test_refresh_with_empty_storage_returns_none() {
    let b = backend();
    assert_eq!(b.refresh_session().await.unwrap(), None);
}

#[tokio::test]
async fn test_refresh_revoked_token_is_invalid_credentials() {
    let b = backend();
    let user = b.register("ada@example.com", "pw");
    let old = b.seed_session(&user, -60);
    b.refresh_session().await.unwrap();
    b.store().write_canonical(&old.to_record().unwrap());

    let err = b.refresh_session().await.unwrap_err();
    assert!(matches!(err, BackendError::InvalidCredentials(_)));
}

#[tokio::test]
async fn test_scripted_refresh_failures_are_consumed_in_order() {
    let b = backend();
    let user = b.register("ada@example.com", "pw");
    b.seed_session(&user, -60);
    b.push_refresh_failure(BackendError::RateLimited {
        retry_after_secs: None,
    });

    assert!(b.refresh_session().await.unwrap_err().is_rate_limited());
    assert!(b.refresh_session().await.unwrap().is_some());
}

// =========================================================================
// Sign-out and faults
// =========================================================================

#[tokio::test]
async fn test_global_sign_out_revokes_every_session_of_user() {
    let b = backend();
    let user = b.register("ada@example.com", "pw");
    let phone = b.issue_session(&user, 3_600);
    let laptop = b.issue_session(&user, 3_600);

    b.sign_out(&laptop.access_token, SignOutScope::Global)
        .await
        .unwrap();

    assert!(b.is_revoked(&phone.refresh_token));
    assert!(b.is_revoked(&laptop.refresh_token));
    assert_eq!(b.sign_out_scopes(), vec![SignOutScope::Global]);
}

#[tokio::test]
async fn test_local_sign_out_revokes_only_presented_session() {
    let b = backend();
    let user = b.register("ada@example.com", "pw");
    let phone = b.issue_session(&user, 3_600);
    let laptop = b.issue_session(&user, 3_600);

    b.sign_out(&laptop.access_token, SignOutScope::Local)
        .await
        .unwrap();

    assert!(!b.is_revoked(&phone.refresh_token));
    assert!(b.is_revoked(&laptop.refresh_token));
}

#[tokio::test]
async fn test_unreachable_backend_fails_every_call_but_counts_it() {
    let b = backend();
    b.set_unreachable(true);

    assert!(matches!(
        b.get_current_session().await,
        Err(BackendError::Unavailable(_))
    ));
    assert!(b.sign_out("t", SignOutScope::Local).await.is_err());
    assert_eq!(b.session_queries(), 1);
    assert_eq!(b.sign_out_calls(), 1);
}

#[tokio::test]
async fn test_password_reset_records_redirect() {
    let b = backend();
    b.request_password_reset("ada@example.com", "https://app.example/reset-password")
        .await
        .unwrap();
    assert_eq!(
        b.password_resets(),
        vec![(
            "ada@example.com".to_string(),
            "https://app.example/reset-password".to_string()
        )]
    );
}

#[tokio::test]
async fn test_global_sign_out_after_local_still_reaches_other_devices() {
    let b = backend();
    let user = b.register("ada@example.com", "pw");
    let phone = b.issue_session(&user, 3_600);
    let laptop = b.issue_session(&user, 3_600);

    b.sign_out(&laptop.access_token, SignOutScope::Local)
        .await
        .unwrap();
    b.sign_out(&laptop.access_token, SignOutScope::Global)
        .await
        .unwrap();

    assert!(b.is_revoked(&phone.refresh_token));
    assert_eq!(
        b.sign_out_scopes(),
        vec![SignOutScope::Local, SignOutScope::Global]
    );
}
