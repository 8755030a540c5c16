//! Session material carried on an OAuth or email-link redirect.
//!
//! Providers return the tokens as URL parameters, usually in the fragment
//! (`#access_token=...`) and occasionally in the query string. Both are
//! read; a fragment value wins over a query value with the same name.

use gotrue_types::{Session, User};
use std::collections::HashMap;
use url::{form_urlencoded, Url};

use crate::{AuthError, AuthResult};

/// Token material parsed from a redirect URL, before the user is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectSession {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: String,
    /// The `type` parameter, e.g. `recovery` or `signup`.
    pub kind: Option<String>,
}

impl RedirectSession {
    /// Parse the redirect. Pure; performs no I/O.
    pub fn parse(raw: &str) -> AuthResult<Self> {
        let url = Url::parse(raw)
            .map_err(|e| AuthError::InvalidCredentials(format!("invalid redirect URL: {}", e)))?;
        let params = collect_params(&url);

        if let Some(error) = params.get("error") {
            let description = params
                .get("error_description")
                .filter(|d| !d.is_empty())
                .unwrap_or(error);
            return Err(AuthError::InvalidCredentials(format!(
                "provider returned an error: {}",
                description
            )));
        }

        let access_token = required(&params, "access_token")?;
        let token_type = required(&params, "token_type")?;
        let refresh_token = required(&params, "refresh_token")?;
        let raw_expires_in = required(&params, "expires_in")?;
        let expires_in: u64 = raw_expires_in.parse().map_err(|_| {
            AuthError::InvalidCredentials(format!(
                "expires_in is not a whole number of seconds: {}",
                raw_expires_in
            ))
        })?;
        if expires_in == 0 {
            return Err(AuthError::InvalidCredentials(
                "expires_in must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            access_token,
            token_type,
            expires_in,
            refresh_token,
            kind: params.get("type").filter(|t| !t.is_empty()).cloned(),
        })
    }

    pub fn is_recovery(&self) -> bool {
        self.kind.as_deref() == Some("recovery")
    }

    /// Combine the parsed tokens with the user they belong to.
    pub fn into_session(self, user: User) -> AuthResult<Session> {
        Session::new(
            self.access_token,
            self.token_type,
            self.expires_in,
            self.refresh_token,
            user,
        )
        .map_err(|e| AuthError::InvalidCredentials(e.to_string()))
    }
}

fn collect_params(url: &Url) -> HashMap<String, String> {
    let mut params: HashMap<String, String> = url.query_pairs().into_owned().collect();
    if let Some(fragment) = url.fragment() {
        params.extend(form_urlencoded::parse(fragment.as_bytes()).into_owned());
    }
    params
}

fn required(params: &HashMap<String, String>, name: &str) -> AuthResult<String> {
    match params.get(name) {
        Some(value) if !value.is_empty() => Ok(value.clone()),
        _ => Err(AuthError::InvalidCredentials(format!(
            "redirect is missing {}",
            name
        ))),
    }
}
