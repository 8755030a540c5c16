//! Shared data model for the Warden auth stack.
//!
//! These types mirror the payloads exchanged with a GoTrue-compatible
//! identity provider and are shared by the HTTP client, the session store
//! and the lifecycle engine.

mod event;
mod provider;
mod request;
mod session;

pub use event::AuthChangeEvent;
pub use provider::{Provider, ProviderOptions, UnknownProvider};
pub use request::{
    Credentials, FieldUpdate, OtpType, OtpVerification, SignUpOptions, UserAttributes,
};
pub use session::{Session, SessionError, SignUpResponse, User};
