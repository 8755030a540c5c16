//! CLI command implementations.

mod account;
mod auth;
mod links;
mod watch;

pub use account::{update, UpdateRequest};
pub use auth::{refresh, sign_in, sign_out, sign_up, status};
pub use links::{authorize, magic_link, redirect, send_otp, verify, OtpKind};
pub use watch::watch;

use anyhow::{Context, Result};
use gotrue_client::{AuthApi, GoTrueClient};
use gotrue_types::{Credentials, Session};
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::debug;
use warden_config::{Config, Paths};
use warden_storage::{FileStorage, SecretsManager, SessionStore};
use ymir::{AuthEngine, EngineConfig};

/// Build an engine over the configured provider and the on-disk session store.
///
/// Recovers any stored session, so this must run inside the Tokio runtime.
pub fn open_engine(paths: &Paths, config: &Config) -> Result<AuthEngine> {
    let client = GoTrueClient::with_timeout(
        &config.gotrue_url,
        &config.anon_key,
        config.request_timeout(),
    )
    .context("Failed to create GoTrue client")?;
    let api: Arc<dyn AuthApi> = Arc::new(client);

    let storage = FileStorage::new(paths.session_file());
    let store: Arc<dyn SessionStore> = Arc::new(SecretsManager::new(Box::new(storage)));

    let engine_config = EngineConfig::default()
        .with_auto_refresh(config.auto_refresh)
        .with_request_timeout(config.request_timeout());

    debug!(
        gotrue_url = %config.gotrue_url,
        session_file = %paths.session_file().display(),
        "Opening auth engine"
    );
    Ok(AuthEngine::builder(api, store).config(engine_config).build())
}

/// Email or phone given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Identity {
    /// Build credentials, prompting for whatever is missing.
    fn into_credentials(self) -> Result<Credentials> {
        let identity = self.or_prompt()?;
        let password = prompt_password("Password: ")?;
        match identity {
            Identity {
                phone: Some(phone), ..
            } => Ok(Credentials::phone(phone, password)),
            Identity {
                email: Some(email), ..
            } => Ok(Credentials::email(email, password)),
            _ => anyhow::bail!("Email or phone is required"),
        }
    }

    /// Fill in the email from stdin when neither identifier was given.
    fn or_prompt(self) -> Result<Self> {
        if self.email.is_some() || self.phone.is_some() {
            return Ok(self);
        }
        let email = prompt("Email: ")?;
        Ok(Self {
            email: Some(email),
            phone: None,
        })
    }
}

/// Read one non-empty line from stdin.
fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let value = line.trim().to_string();
    if value.is_empty() {
        anyhow::bail!("{} is required", label.trim_end_matches([':', ' ']));
    }
    Ok(value)
}

/// Read a password without echo.
fn prompt_password(label: &str) -> Result<String> {
    let password = rpassword::prompt_password(label)?;
    if password.is_empty() {
        anyhow::bail!("Password is required");
    }
    Ok(password)
}

/// Session details that are safe to print. Tokens are never shown.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub user_id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub token_type: String,
    pub expires_in_secs: u64,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        let user = session.user();
        Self {
            user_id: user.id.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            token_type: session.token_type().to_string(),
            expires_in_secs: session.expires_in_secs(),
        }
    }
}

impl SessionSummary {
    /// Email, phone or id, whichever is most readable.
    pub fn display_name(&self) -> &str {
        self.email
            .as_deref()
            .or(self.phone.as_deref())
            .unwrap_or(&self.user_id)
    }
}
