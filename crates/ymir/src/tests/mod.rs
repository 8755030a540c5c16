//! Integration tests for the session lifecycle engine.
//!
//! - `lifecycle.rs`   - sign-up, sign-in, provider URLs, OTP, update, sign-out
//! - `refresh.rs`     - explicit refresh, coalescing, failures, timeouts
//! - `timer.rs`       - auto-refresh scheduling and replacement
//! - `observers.rs`   - delivery order, snapshots, unsubscribe, re-entrancy
//! - `redirect.rs`    - adopting sessions from redirect URLs
//! - `recovery.rs`    - startup recovery from the session store
//! - `concurrency.rs` - interleavings and stale results

mod recovery;
mod redirect;
mod support;

use gotrue_types::AuthChangeEvent;
use support::{credentials, session, Harness};

/// Basic workflow test demonstrating core functionality.
#[tokio::test]
async fn basic_workflow() {
    let h = Harness::new();
    assert!(!h.engine.is_signed_in());

    // Sign in
    h.api.push_sign_in(Ok(session("at-1", "rt-1", 3600)));
    let signed_in = h.engine.sign_in(&credentials()).await.unwrap();
    assert_eq!(signed_in.access_token(), "at-1");
    assert_eq!(h.engine.access_token().as_deref(), Some("at-1"));
    assert!(h.storage.raw_session().is_some());

    // Refresh
    h.api.push_refresh(Ok(session("at-2", "rt-2", 3600)));
    let refreshed = h.engine.refresh_session().await.unwrap();
    assert_eq!(refreshed.access_token(), "at-2");
    assert_eq!(h.api.refresh_calls(), vec!["rt-1"]);

    // Sign out
    h.engine.sign_out().await.unwrap();
    assert!(!h.engine.is_signed_in());
    assert!(h.storage.raw_session().is_none());

    assert_eq!(
        h.events(),
        vec![
            AuthChangeEvent::SignedIn,
            AuthChangeEvent::SignedIn,
            AuthChangeEvent::SignedOut
        ]
    );
}
