//! Session lifecycle engine for Warden.
//!
//! This crate provides:
//! - [`AuthEngine`], which owns the current session, persists it, refreshes
//!   it before expiry and recovers it on startup
//! - Auth state observers with ordered, snapshot-based delivery
//! - [`RedirectSession`], the parser for OAuth and email-link redirects

mod config;
mod engine;
mod error;
mod redirect;
mod registry;
mod timer;

#[cfg(test)]
mod tests;

pub use config::{EngineConfig, DEFAULT_DIAGNOSTIC_CAPACITY, DEFAULT_REQUEST_TIMEOUT};
pub use engine::{AuthEngine, AuthEngineBuilder, AuthSnapshot, Diagnostic, RefreshTrigger};
pub use error::{AuthError, AuthResult};
pub use redirect::RedirectSession;
pub use registry::{AuthStateCallback, Subscription, SubscriptionId};
