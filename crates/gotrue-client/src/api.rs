//! The remote auth contract.

use async_trait::async_trait;
use gotrue_types::{
    Credentials, OtpVerification, Provider, ProviderOptions, Session, SignUpOptions,
    SignUpResponse, User, UserAttributes,
};
use url::Url;

use crate::ClientResult;

/// Operations the session engine needs from an identity provider.
///
/// Implementations are stateless with respect to the local session: every
/// call that needs a token receives it explicitly.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Register a new account.
    async fn sign_up(
        &self,
        credentials: &Credentials,
        options: &SignUpOptions,
    ) -> ClientResult<SignUpResponse>;

    /// Exchange a password for a session.
    async fn sign_in_with_password(&self, credentials: &Credentials) -> ClientResult<Session>;

    /// Email a one-click sign-in link.
    async fn sign_in_with_magic_link(
        &self,
        email: &str,
        redirect_to: Option<&Url>,
    ) -> ClientResult<()>;

    /// Text a one-time code to a phone number.
    async fn send_otp(&self, phone: &str) -> ClientResult<()>;

    /// Exchange a one-time code for a session.
    async fn verify_otp(&self, verification: &OtpVerification) -> ClientResult<Session>;

    /// Exchange a refresh token for a new session.
    async fn refresh(&self, refresh_token: &str) -> ClientResult<Session>;

    /// Revoke the session server-side.
    async fn sign_out(&self, access_token: &str) -> ClientResult<()>;

    /// Apply changes to the user that owns `access_token`.
    async fn update_user(
        &self,
        access_token: &str,
        attributes: &UserAttributes,
    ) -> ClientResult<User>;

    /// Fetch the user that owns `access_token`.
    async fn get_user(&self, access_token: &str) -> ClientResult<User>;

    /// URL the user agent should open to sign in with a third-party provider.
    fn authorize_url(&self, provider: Provider, options: &ProviderOptions) -> ClientResult<Url>;
}
