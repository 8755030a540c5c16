//! Authentication commands.

use super::{Identity, SessionSummary};
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use gotrue_types::{SignUpOptions, SignUpResponse};
use serde_json::json;
use url::Url;
use ymir::{AuthEngine, AuthError};

/// Register a new account.
pub async fn sign_up(
    engine: &AuthEngine,
    identity: Identity,
    redirect_to: Option<Url>,
    format: &OutputFormat,
) -> Result<()> {
    let credentials = identity.into_credentials()?;
    let options = SignUpOptions {
        redirect_to,
        ..Default::default()
    };

    let response = engine
        .sign_up(&credentials, &options)
        .await
        .context("Sign-up failed")?;

    match response {
        SignUpResponse::Session(session) => {
            let summary = SessionSummary::from(&session);
            match format {
                OutputFormat::Text => {
                    println!("Signed up and signed in as {}", summary.display_name())
                }
                OutputFormat::Json => output::print_json(&json!({
                    "status": "signed_in",
                    "session": summary,
                })),
            }
        }
        SignUpResponse::User(user) => match format {
            OutputFormat::Text => println!(
                "Signed up. Confirm {} to finish signing in.",
                credentials.identifier()
            ),
            OutputFormat::Json => output::print_json(&json!({
                "status": "confirmation_pending",
                "user_id": user.id,
            })),
        },
    }
    Ok(())
}

/// Sign in with a password.
pub async fn sign_in(engine: &AuthEngine, identity: Identity, format: &OutputFormat) -> Result<()> {
    let credentials = identity.into_credentials()?;

    if matches!(format, OutputFormat::Text) {
        println!("Signing in...");
    }

    let session = engine
        .sign_in(&credentials)
        .await
        .context("Sign-in failed")?;
    print_session("Signed in as", &SessionSummary::from(&session), format);
    Ok(())
}

/// Sign out and clear the stored session.
pub async fn sign_out(engine: &AuthEngine, format: &OutputFormat) -> Result<()> {
    match engine.sign_out().await {
        Ok(()) => output::print_success("Signed out", format),
        Err(AuthError::NotAuthenticated) => output::print_success("Not signed in", format),
        Err(e) => {
            // The local session is already gone at this point.
            output::print_success("Signed out locally", format);
            output::print_error(&format!("Could not revoke the session: {}", e), format);
        }
    }
    Ok(())
}

/// Exchange the refresh token for a new session.
pub async fn refresh(engine: &AuthEngine, format: &OutputFormat) -> Result<()> {
    let session = engine
        .refresh_session()
        .await
        .context("Refresh failed")?;
    print_session("Session refreshed for", &SessionSummary::from(&session), format);
    Ok(())
}

/// Show the current auth state.
pub async fn status(engine: &AuthEngine, format: &OutputFormat) -> Result<()> {
    let snapshot = engine.status();

    match format {
        OutputFormat::Text => {
            if snapshot.authenticated {
                println!("Auth:     signed in");
                if let Some(user_id) = &snapshot.user_id {
                    println!("User ID:  {}", user_id);
                }
                if let Some(email) = &snapshot.email {
                    println!("Email:    {}", email);
                }
                if let Some(expires_at) = snapshot.expires_at {
                    println!("Expires:  {}", expires_at.to_rfc3339());
                }
            } else {
                println!("Auth:     signed out");
            }
        }
        OutputFormat::Json => output::print_json(&snapshot),
    }
    Ok(())
}

pub(super) fn print_session(prefix: &str, summary: &SessionSummary, format: &OutputFormat) {
    match format {
        OutputFormat::Text => {
            println!("{} {}", prefix, summary.display_name());
            output::print_row("User ID", &summary.user_id);
            output::print_row("Expires in", &format!("{}s", summary.expires_in_secs));
        }
        OutputFormat::Json => output::print_json(summary),
    }
}
