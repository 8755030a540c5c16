//! Adopting sessions delivered on redirect URLs.

use gotrue_client::ClientError;
use gotrue_types::AuthChangeEvent;

use super::support::{credentials, session, settle, user, Call, Harness};
use crate::AuthError;

const RECOVERY: &str = "myapp://callback#access_token=abc&token_type=bearer&expires_in=3600&refresh_token=def&type=recovery";

#[tokio::test]
async fn recovery_link_signs_in_then_reports_recovery() {
    let h = Harness::new();
    h.api.push_user(Ok(user("user-123")));

    let adopted = h.engine.session_from_url(RECOVERY).await.unwrap();

    assert_eq!(adopted.access_token(), "abc");
    assert_eq!(adopted.refresh_token(), "def");
    assert_eq!(adopted.user(), &user("user-123"));
    assert_eq!(h.api.calls(), vec![Call::GetUser("abc".into())]);
    assert_eq!(
        *h.log.lock(),
        vec![
            (AuthChangeEvent::SignedIn, Some("abc".to_string())),
            (AuthChangeEvent::PasswordRecovery, Some("abc".to_string())),
        ]
    );
    assert!(h.engine.armed_timer().is_some());
}

#[tokio::test]
async fn oauth_redirect_signs_in() {
    let h = Harness::new();
    h.api.push_user(Ok(user("user-123")));

    h.engine
        .session_from_url("https://app.example.com/cb#access_token=abc&token_type=bearer&expires_in=3600&refresh_token=def&provider_token=gho_123")
        .await
        .unwrap();

    assert_eq!(h.events(), vec![AuthChangeEvent::SignedIn]);
}

#[tokio::test]
async fn malformed_redirect_makes_no_request_and_keeps_session() {
    let h = Harness::new().signed_in(session("at-1", "rt-1", 3600)).await;
    let calls_before = h.api.calls().len();

    let err = h
        .engine
        .session_from_url("myapp://callback#access_token=abc&token_type=bearer&expires_in=3600")
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::InvalidCredentials(_)));
    assert_eq!(h.api.calls().len(), calls_before);
    assert_eq!(h.engine.access_token().as_deref(), Some("at-1"));
    assert!(h.events().is_empty());
}

#[tokio::test]
async fn rejected_token_does_not_adopt() {
    let h = Harness::new().signed_in(session("at-1", "rt-1", 3600)).await;
    h.api.push_user(Err(ClientError::Api {
        status: 401,
        message: "invalid JWT".into(),
    }));

    let err = h.engine.session_from_url(RECOVERY).await.unwrap_err();

    assert!(matches!(err, AuthError::Remote { status: 401, .. }));
    assert_eq!(h.engine.access_token().as_deref(), Some("at-1"));
    assert!(h.events().is_empty());
}

#[tokio::test]
async fn redirect_and_password_sessions_persist_identically() {
    let password = Harness::new();
    password.api.push_sign_in(Ok(session("abc", "def", 3600)));
    password.engine.sign_in(&credentials()).await.unwrap();

    let redirect = Harness::new();
    redirect.api.push_user(Ok(user("user-123")));
    redirect
        .engine
        .session_from_url(
            "myapp://callback#access_token=abc&token_type=bearer&expires_in=3600&refresh_token=def",
        )
        .await
        .unwrap();
    settle().await;

    assert_eq!(
        password.storage.raw_session().unwrap(),
        redirect.storage.raw_session().unwrap()
    );
    assert_eq!(password.engine.session(), redirect.engine.session());
}
