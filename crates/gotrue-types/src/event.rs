//! Auth state change events.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A transition in the locally held auth state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthChangeEvent {
    /// A session was adopted (sign-in, redirect, recovery at startup).
    SignedIn,
    /// The session was cleared by an explicit sign-out.
    SignedOut,
    /// The user record inside the current session was replaced.
    UserUpdated,
    /// The session came from a password recovery link.
    PasswordRecovery,
}

impl AuthChangeEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthChangeEvent::SignedIn => "signed_in",
            AuthChangeEvent::SignedOut => "signed_out",
            AuthChangeEvent::UserUpdated => "user_updated",
            AuthChangeEvent::PasswordRecovery => "password_recovery",
        }
    }
}

impl fmt::Display for AuthChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
