//! Startup recovery from the session store.

use chrono::Utc;
use gotrue_client::ClientError;
use gotrue_types::AuthChangeEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use warden_storage::{PersistedSession, SecureStorage, SessionStore, StorageKeys};

use super::support::{
    credentials, session, settle, BrokenStore, Harness, MockAuthApi, SharedStorage,
};
use crate::{AuthEngine, Diagnostic, EngineConfig};

fn stored(persisted: PersistedSession) -> SharedStorage {
    let storage = SharedStorage::default();
    storage.store().save(&persisted).unwrap();
    storage
}

#[tokio::test]
async fn stored_session_is_recovered_without_network() {
    let storage = stored(PersistedSession::issued_now(session("at-1", "rt-1", 3600)));

    let h = Harness::with_storage(storage, EngineConfig::default());

    assert_eq!(h.engine.access_token().as_deref(), Some("at-1"));
    assert!(h.api.calls().is_empty());
    assert!(h.engine.armed_timer().is_some());
    assert_eq!(
        *h.log.lock(),
        vec![(AuthChangeEvent::SignedIn, Some("at-1".to_string()))]
    );
}

#[tokio::test]
async fn empty_store_starts_signed_out() {
    let h = Harness::new();

    assert!(!h.engine.is_signed_in());
    assert!(h.engine.armed_timer().is_none());
    assert!(h.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn recovered_timer_uses_persisted_expiry() {
    let storage = stored(PersistedSession::issued_now(session("at-1", "rt-1", 30)));
    let h = Harness::with_storage(storage, EngineConfig::default());
    h.api.push_refresh(Ok(session("at-2", "rt-2", 3600)));

    sleep(Duration::from_secs(29)).await;
    settle().await;
    assert!(h.api.refresh_calls().is_empty());

    sleep(Duration::from_secs(2)).await;
    settle().await;
    assert_eq!(h.api.refresh_calls(), vec!["rt-1"]);
}

#[tokio::test(start_paused = true)]
async fn expired_session_is_refreshed_immediately() {
    let issued = Utc::now() - chrono::Duration::hours(2);
    let storage = stored(PersistedSession::issued_at(
        session("at-1", "rt-1", 3600),
        issued,
    ));
    let h = Harness::with_storage(storage, EngineConfig::default());
    h.api.push_refresh(Ok(session("at-2", "rt-2", 3600)));

    // The stale session is adopted first.
    assert_eq!(h.engine.access_token().as_deref(), Some("at-1"));

    sleep(Duration::from_millis(1)).await;
    settle().await;

    assert_eq!(h.api.refresh_calls(), vec!["rt-1"]);
    assert_eq!(h.engine.access_token().as_deref(), Some("at-2"));
    assert_eq!(
        *h.log.lock(),
        vec![
            (AuthChangeEvent::SignedIn, Some("at-1".to_string())),
            (AuthChangeEvent::SignedIn, Some("at-2".to_string())),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_recovery_refresh_keeps_stale_session() {
    let issued = Utc::now() - chrono::Duration::hours(2);
    let storage = stored(PersistedSession::issued_at(
        session("at-1", "rt-1", 3600),
        issued,
    ));
    let h = Harness::with_storage(storage, EngineConfig::default());
    h.api.push_refresh(Err(ClientError::Api {
        status: 400,
        message: "Invalid Refresh Token".into(),
    }));

    sleep(Duration::from_millis(1)).await;
    settle().await;

    assert_eq!(h.api.refresh_calls(), vec!["rt-1"]);
    assert_eq!(h.engine.access_token().as_deref(), Some("at-1"));
    assert_eq!(h.events(), vec![AuthChangeEvent::SignedIn]);
}

#[tokio::test]
async fn unreadable_store_starts_signed_out() {
    let storage = SharedStorage::default();
    storage.0.set(StorageKeys::SESSION, "{not json").unwrap();

    let h = Harness::with_storage(storage, EngineConfig::default());

    assert!(!h.engine.is_signed_in());
    assert!(h.events().is_empty());
}

#[tokio::test]
async fn broken_store_does_not_fail_auth() {
    let api = MockAuthApi::new();
    let engine = AuthEngine::builder(api.clone(), Arc::new(BrokenStore)).build();
    let mut diagnostics = engine.diagnostics();
    api.push_sign_in(Ok(session("at-1", "rt-1", 3600)));

    engine.sign_in(&credentials()).await.unwrap();

    assert!(engine.is_signed_in());
    assert!(matches!(
        diagnostics.try_recv().unwrap(),
        Diagnostic::PersistFailed {
            operation: "save",
            ..
        }
    ));

    engine.sign_out().await.unwrap();
    assert!(!engine.is_signed_in());
    assert!(matches!(
        diagnostics.try_recv().unwrap(),
        Diagnostic::PersistFailed {
            operation: "remove",
            ..
        }
    ));
}

#[tokio::test]
async fn restart_recovers_what_was_persisted() {
    let storage = SharedStorage::default();
    let first = Harness::with_storage(storage.clone(), EngineConfig::default());
    first.api.push_sign_in(Ok(session("at-1", "rt-1", 3600)));
    first.engine.sign_in(&credentials()).await.unwrap();
    first.engine.shutdown();

    let second = Harness::with_storage(storage, EngineConfig::default());

    assert_eq!(second.engine.session(), first.engine.session());
}
