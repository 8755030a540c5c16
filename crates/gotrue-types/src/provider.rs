//! Third-party OAuth providers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

/// OAuth providers understood by GoTrue's `/authorize` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Apple,
    Azure,
    Bitbucket,
    Discord,
    Facebook,
    Figma,
    Github,
    Gitlab,
    Google,
    Kakao,
    Keycloak,
    Linkedin,
    Notion,
    Slack,
    Spotify,
    Twitch,
    Twitter,
    Workos,
    Zoom,
}

impl Provider {
    pub const ALL: [Provider; 19] = [
        Provider::Apple,
        Provider::Azure,
        Provider::Bitbucket,
        Provider::Discord,
        Provider::Facebook,
        Provider::Figma,
        Provider::Github,
        Provider::Gitlab,
        Provider::Google,
        Provider::Kakao,
        Provider::Keycloak,
        Provider::Linkedin,
        Provider::Notion,
        Provider::Slack,
        Provider::Spotify,
        Provider::Twitch,
        Provider::Twitter,
        Provider::Workos,
        Provider::Zoom,
    ];

    /// Name used in the `provider` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Apple => "apple",
            Provider::Azure => "azure",
            Provider::Bitbucket => "bitbucket",
            Provider::Discord => "discord",
            Provider::Facebook => "facebook",
            Provider::Figma => "figma",
            Provider::Github => "github",
            Provider::Gitlab => "gitlab",
            Provider::Google => "google",
            Provider::Kakao => "kakao",
            Provider::Keycloak => "keycloak",
            Provider::Linkedin => "linkedin",
            Provider::Notion => "notion",
            Provider::Slack => "slack",
            Provider::Spotify => "spotify",
            Provider::Twitch => "twitch",
            Provider::Twitter => "twitter",
            Provider::Workos => "workos",
            Provider::Zoom => "zoom",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown OAuth provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Provider::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == needle)
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

/// Options for building a provider authorization URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderOptions {
    /// Where the provider sends the user back to (carries the session fragment).
    pub redirect_to: Option<Url>,
    /// OAuth scopes, joined with spaces on the wire.
    pub scopes: Vec<String>,
    /// Extra query parameters forwarded verbatim to the provider.
    pub query_params: Vec<(String, String)>,
}

impl ProviderOptions {
    pub fn with_redirect_to(mut self, url: Url) -> Self {
        self.redirect_to = Some(url);
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }
}
