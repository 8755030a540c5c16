//! Provider sign-in, redirect links and one-time codes.

use super::auth::print_session;
use super::{Identity, SessionSummary};
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use clap::ValueEnum;
use gotrue_types::{OtpType, OtpVerification, Provider, ProviderOptions};
use serde_json::json;
use url::Url;
use ymir::{AuthEngine, RedirectSession};

/// Kind of one-time code passed to `verify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OtpKind {
    Signup,
    Invite,
    Magiclink,
    Recovery,
    EmailChange,
    Sms,
    PhoneChange,
}

impl From<OtpKind> for OtpType {
    fn from(kind: OtpKind) -> Self {
        match kind {
            OtpKind::Signup => OtpType::Signup,
            OtpKind::Invite => OtpType::Invite,
            OtpKind::Magiclink => OtpType::MagicLink,
            OtpKind::Recovery => OtpType::Recovery,
            OtpKind::EmailChange => OtpType::EmailChange,
            OtpKind::Sms => OtpType::Sms,
            OtpKind::PhoneChange => OtpType::PhoneChange,
        }
    }
}

/// Print the URL that starts a third-party sign-in.
pub async fn authorize(
    engine: &AuthEngine,
    provider: Provider,
    redirect_to: Option<Url>,
    scopes: Vec<String>,
    format: &OutputFormat,
) -> Result<()> {
    let mut options = ProviderOptions::default().with_scopes(scopes);
    if let Some(redirect_to) = redirect_to {
        options = options.with_redirect_to(redirect_to);
    }

    let url = engine
        .sign_in_with_provider(provider, &options)
        .context("Could not build the sign-in URL")?;

    match format {
        OutputFormat::Text => {
            println!("Open this URL to sign in with {}:", provider);
            println!();
            println!("  {}", url);
            println!();
            println!("Then run 'warden redirect <url>' with the URL you were sent back to.");
        }
        OutputFormat::Json => output::print_json(&json!({
            "provider": provider,
            "url": url.as_str(),
        })),
    }
    Ok(())
}

/// Adopt the session carried by a redirect URL.
pub async fn redirect(engine: &AuthEngine, url: &str, format: &OutputFormat) -> Result<()> {
    let recovery = RedirectSession::parse(url)
        .map(|redirect| redirect.is_recovery())
        .unwrap_or(false);

    let session = engine
        .session_from_url(url)
        .await
        .context("Could not sign in from the redirect")?;

    print_session("Signed in as", &SessionSummary::from(&session), format);
    if recovery && matches!(format, OutputFormat::Text) {
        println!("Recovery link accepted. Set a new password with 'warden update --password'.");
    }
    Ok(())
}

/// Email a sign-in link.
pub async fn magic_link(
    engine: &AuthEngine,
    email: &str,
    redirect_to: Option<Url>,
    format: &OutputFormat,
) -> Result<()> {
    engine
        .sign_in_with_magic_link(email, redirect_to.as_ref())
        .await
        .context("Could not send the sign-in link")?;
    output::print_success(&format!("Sign-in link sent to {}", email), format);
    Ok(())
}

/// Text a one-time code.
pub async fn send_otp(engine: &AuthEngine, phone: &str, format: &OutputFormat) -> Result<()> {
    engine
        .send_otp(phone)
        .await
        .context("Could not send the code")?;
    output::print_success(&format!("Code sent to {}", phone), format);
    Ok(())
}

/// Exchange a one-time code for a session.
pub async fn verify(
    engine: &AuthEngine,
    identity: Identity,
    token: String,
    kind: OtpKind,
    format: &OutputFormat,
) -> Result<()> {
    let verification = match identity {
        Identity {
            phone: Some(phone), ..
        } => OtpVerification::Phone {
            phone,
            token,
            kind: kind.into(),
        },
        Identity {
            email: Some(email), ..
        } => OtpVerification::Email {
            email,
            token,
            kind: kind.into(),
        },
        _ => anyhow::bail!("Email or phone is required"),
    };

    let session = engine
        .verify_otp(&verification)
        .await
        .context("Verification failed")?;
    print_session("Signed in as", &SessionSummary::from(&session), format);
    Ok(())
}
