//! Request payloads sent to the identity provider.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use url::Url;

/// Password credentials, keyed by either email or phone.
///
/// Serializes to the body GoTrue expects on `/signup` and
/// `/token?grant_type=password`.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Credentials {
    Email { email: String, password: String },
    Phone { phone: String, password: String },
}

impl Credentials {
    pub fn email(email: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Email {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn phone(phone: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Phone {
            phone: phone.into(),
            password: password.into(),
        }
    }

    /// The email address or phone number, safe to log.
    pub fn identifier(&self) -> &str {
        match self {
            Credentials::Email { email, .. } => email,
            Credentials::Phone { phone, .. } => phone,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Email { email, .. } => f
                .debug_struct("Email")
                .field("email", email)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Phone { phone, .. } => f
                .debug_struct("Phone")
                .field("phone", phone)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Optional sign-up parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignUpOptions {
    /// Initial `user_metadata`.
    pub data: Option<Map<String, Value>>,
    /// Where confirmation emails should send the user.
    pub redirect_to: Option<Url>,
}

/// One field of a user update.
///
/// `Keep` leaves the field untouched and is omitted from the request body;
/// `Clear` is sent as an explicit `null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    Keep,
    Set(T),
    Clear,
}

impl<T> FieldUpdate<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, FieldUpdate::Keep)
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            FieldUpdate::Set(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        FieldUpdate::Keep
    }
}

impl<T> From<Option<T>> for FieldUpdate<T> {
    /// `Some` sets the field, `None` keeps it.
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => FieldUpdate::Set(value),
            None => FieldUpdate::Keep,
        }
    }
}

impl<T: Serialize> Serialize for FieldUpdate<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldUpdate::Set(value) => value.serialize(serializer),
            FieldUpdate::Keep | FieldUpdate::Clear => serializer.serialize_none(),
        }
    }
}

/// Changes to apply to the signed-in user (`PUT /user`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserAttributes {
    #[serde(skip_serializing_if = "FieldUpdate::is_keep")]
    pub email: FieldUpdate<String>,
    #[serde(skip_serializing_if = "FieldUpdate::is_keep")]
    pub phone: FieldUpdate<String>,
    #[serde(skip_serializing_if = "FieldUpdate::is_keep")]
    pub password: FieldUpdate<String>,
    /// Replacement `user_metadata`.
    #[serde(skip_serializing_if = "FieldUpdate::is_keep")]
    pub data: FieldUpdate<Map<String, Value>>,
}

impl UserAttributes {
    /// True when no field would be sent.
    pub fn is_empty(&self) -> bool {
        self.email.is_keep() && self.phone.is_keep() && self.password.is_keep() && self.data.is_keep()
    }
}

/// Kinds of one-time codes GoTrue can verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpType {
    Signup,
    Invite,
    #[serde(rename = "magiclink")]
    MagicLink,
    Recovery,
    EmailChange,
    Sms,
    PhoneChange,
}

/// A one-time code to exchange for a session (`POST /verify`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OtpVerification {
    Email {
        email: String,
        token: String,
        #[serde(rename = "type")]
        kind: OtpType,
    },
    Phone {
        phone: String,
        token: String,
        #[serde(rename = "type")]
        kind: OtpType,
    },
}

impl OtpVerification {
    pub fn kind(&self) -> OtpType {
        match self {
            OtpVerification::Email { kind, .. } | OtpVerification::Phone { kind, .. } => *kind,
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            OtpVerification::Email { email, .. } => email,
            OtpVerification::Phone { phone, .. } => phone,
        }
    }
}
