//! `reqwest` implementation of [`AuthApi`] against the GoTrue REST API.

use async_trait::async_trait;
use gotrue_types::{
    Credentials, OtpVerification, Provider, ProviderOptions, Session, SignUpOptions,
    SignUpResponse, User, UserAttributes,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::{AuthApi, ClientError, ClientResult};

/// Fields in a GoTrue error body that carry the human-readable message, in
/// order of preference.
const ERROR_MESSAGE_FIELDS: [&str; 4] = ["msg", "message", "error_description", "error"];

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ERROR_MESSAGE_FIELDS
        .iter()
        .find_map(|field| value.get(field).and_then(Value::as_str))
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

/// GoTrue token grant response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: u64,
    refresh_token: String,
    user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl TokenResponse {
    fn into_session(self) -> ClientResult<Session> {
        Ok(Session::new(
            self.access_token,
            self.token_type,
            self.expires_in,
            self.refresh_token,
            self.user,
        )?)
    }
}

/// Client for a GoTrue-compatible `/auth/v1` API.
#[derive(Clone)]
pub struct GoTrueClient {
    http_client: Client,
    auth_url: Url,
    api_key: String,
}

impl GoTrueClient {
    /// Create a client for the project at `project_url` (e.g. `https://abc.supabase.co`).
    pub fn new(project_url: &str, api_key: &str) -> ClientResult<Self> {
        Self::with_http_client(project_url, api_key, Client::new())
    }

    /// Create a client whose requests give up after `timeout`.
    pub fn with_timeout(project_url: &str, api_key: &str, timeout: Duration) -> ClientResult<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Self::with_http_client(project_url, api_key, http_client)
    }

    /// Create a client on top of an existing `reqwest::Client`.
    pub fn with_http_client(
        project_url: &str,
        api_key: &str,
        http_client: Client,
    ) -> ClientResult<Self> {
        let mut auth_url = Url::parse(project_url)?;
        if auth_url.cannot_be_a_base() {
            return Err(ClientError::BadUrl(format!(
                "{} cannot be used as a base URL",
                project_url
            )));
        }

        let prefix = auth_url.path().trim_end_matches('/').to_string();
        auth_url.set_path(&format!("{}/auth/v1/", prefix));
        auth_url.set_query(None);
        auth_url.set_fragment(None);

        Ok(Self {
            http_client,
            auth_url,
            api_key: api_key.to_string(),
        })
    }

    /// Base URL of the auth API, always ending in `/auth/v1/`.
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        Ok(self.auth_url.join(path)?)
    }

    fn token_endpoint(&self, grant_type: &str) -> ClientResult<Url> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);
        Ok(url)
    }

    fn with_redirect(mut url: Url, redirect_to: Option<&Url>) -> Url {
        if let Some(redirect_to) = redirect_to {
            url.query_pairs_mut()
                .append_pair("redirect_to", redirect_to.as_str());
        }
        url
    }

    fn post(&self, url: Url) -> RequestBuilder {
        self.http_client.post(url).header("apikey", &self.api_key)
    }

    /// Send a request and return the body of a successful response.
    async fn execute(&self, request: RequestBuilder, operation: &'static str) -> ClientResult<String> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message =
                error_message(&body).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            warn!(
                operation,
                status = %status,
                body_summary = %summarize_response_body(&body),
                "GoTrue request failed"
            );
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!(operation, status = %status, "GoTrue request succeeded");
        Ok(body)
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &'static str,
    ) -> ClientResult<T> {
        let body = self.execute(request, operation).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn execute_session(
        &self,
        request: RequestBuilder,
        operation: &'static str,
    ) -> ClientResult<Session> {
        let token: TokenResponse = self.execute_json(request, operation).await?;
        token.into_session()
    }
}

#[async_trait]
impl AuthApi for GoTrueClient {
    async fn sign_up(
        &self,
        credentials: &Credentials,
        options: &SignUpOptions,
    ) -> ClientResult<SignUpResponse> {
        let url = Self::with_redirect(self.endpoint("signup")?, options.redirect_to.as_ref());

        let mut body = serde_json::to_value(credentials)?;
        if let Some(data) = &options.data {
            body["data"] = Value::Object(data.clone());
        }

        let value: Value = self
            .execute_json(self.post(url).json(&body), "sign_up")
            .await?;

        // Auto-confirmed accounts come back with tokens, pending ones with
        // just the user.
        if value.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(value)?;
            Ok(SignUpResponse::Session(token.into_session()?))
        } else {
            Ok(SignUpResponse::User(serde_json::from_value(value)?))
        }
    }

    async fn sign_in_with_password(&self, credentials: &Credentials) -> ClientResult<Session> {
        let url = self.token_endpoint("password")?;
        self.execute_session(self.post(url).json(credentials), "sign_in_with_password")
            .await
    }

    async fn sign_in_with_magic_link(
        &self,
        email: &str,
        redirect_to: Option<&Url>,
    ) -> ClientResult<()> {
        let url = Self::with_redirect(self.endpoint("otp")?, redirect_to);
        let body = json!({ "email": email, "create_user": true });
        self.execute(self.post(url).json(&body), "sign_in_with_magic_link")
            .await?;
        Ok(())
    }

    async fn send_otp(&self, phone: &str) -> ClientResult<()> {
        let url = self.endpoint("otp")?;
        let body = json!({ "phone": phone, "create_user": true });
        self.execute(self.post(url).json(&body), "send_otp").await?;
        Ok(())
    }

    async fn verify_otp(&self, verification: &OtpVerification) -> ClientResult<Session> {
        let url = self.endpoint("verify")?;
        self.execute_session(self.post(url).json(verification), "verify_otp")
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> ClientResult<Session> {
        let url = self.token_endpoint("refresh_token")?;
        let body = json!({ "refresh_token": refresh_token });
        self.execute_session(self.post(url).json(&body), "refresh")
            .await
    }

    async fn sign_out(&self, access_token: &str) -> ClientResult<()> {
        let url = self.endpoint("logout")?;
        self.execute(self.post(url).bearer_auth(access_token), "sign_out")
            .await?;
        Ok(())
    }

    async fn update_user(
        &self,
        access_token: &str,
        attributes: &UserAttributes,
    ) -> ClientResult<User> {
        let url = self.endpoint("user")?;
        let request = self
            .http_client
            .put(url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .json(attributes);
        self.execute_json(request, "update_user").await
    }

    async fn get_user(&self, access_token: &str) -> ClientResult<User> {
        let url = self.endpoint("user")?;
        let request = self
            .http_client
            .get(url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token);
        self.execute_json(request, "get_user").await
    }

    fn authorize_url(&self, provider: Provider, options: &ProviderOptions) -> ClientResult<Url> {
        let mut url = self.endpoint("authorize")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("provider", provider.as_str());
            if let Some(redirect_to) = &options.redirect_to {
                query.append_pair("redirect_to", redirect_to.as_str());
            }
            if !options.scopes.is_empty() {
                query.append_pair("scopes", &options.scopes.join(" "));
            }
            for (key, value) in &options.query_params {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gotrue_types::{FieldUpdate, OtpType};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token_body(access_token: &str, refresh_token: &str) -> Value {
        json!({
            "access_token": access_token,
            "token_type": "bearer",
            "expires_in": 3600,
            "expires_at": 1700003600,
            "refresh_token": refresh_token,
            "user": { "id": "user-123", "email": "test@example.com" }
        })
    }

    fn client_for(server: &MockServer) -> GoTrueClient {
        GoTrueClient::new(&server.uri(), "test-anon-key").unwrap()
    }

    #[test]
    fn test_auth_url_appends_prefix() {
        let client = GoTrueClient::new("https://abc.supabase.co", "k").unwrap();
        assert_eq!(client.auth_url().as_str(), "https://abc.supabase.co/auth/v1/");

        let client = GoTrueClient::new("https://example.com/gotrue/", "k").unwrap();
        assert_eq!(
            client.auth_url().as_str(),
            "https://example.com/gotrue/auth/v1/"
        );
    }

    #[test]
    fn test_new_rejects_bad_url() {
        assert!(matches!(
            GoTrueClient::new("not a url", "k"),
            Err(ClientError::BadUrl(_))
        ));
        assert!(matches!(
            GoTrueClient::new("mailto:someone@example.com", "k"),
            Err(ClientError::BadUrl(_))
        ));
    }

    #[test]
    fn test_authorize_url() {
        let client = GoTrueClient::new("https://abc.supabase.co", "k").unwrap();
        let options = ProviderOptions::default()
            .with_redirect_to(Url::parse("myapp://callback").unwrap())
            .with_scopes(["repo", "user"])
            .with_query_param("prompt", "consent");

        let url = client.authorize_url(Provider::Github, &options).unwrap();
        assert_eq!(url.path(), "/auth/v1/authorize");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("provider".to_string(), "github".to_string()),
                ("redirect_to".to_string(), "myapp://callback".to_string()),
                ("scopes".to_string(), "repo user".to_string()),
                ("prompt".to_string(), "consent".to_string()),
            ]
        );
    }

    #[test]
    fn test_error_message_preference() {
        assert_eq!(
            error_message(r#"{"msg":"a","message":"b"}"#),
            Some("a".to_string())
        );
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid Refresh Token"}"#),
            Some("Invalid Refresh Token".to_string())
        );
        assert_eq!(error_message("<html>502</html>"), None);
    }

    #[tokio::test]
    async fn test_sign_in_with_password() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "test-anon-key"))
            .and(body_json(json!({ "email": "test@example.com", "password": "pw" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at", "rt")))
            .expect(1)
            .mount(&server)
            .await;

        let session = client_for(&server)
            .sign_in_with_password(&Credentials::email("test@example.com", "pw"))
            .await
            .unwrap();

        assert_eq!(session.access_token(), "at");
        assert_eq!(session.refresh_token(), "rt");
        assert_eq!(session.user().id, "user-123");
    }

    #[tokio::test]
    async fn test_sign_in_rejected_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .sign_in_with_password(&Credentials::email("test@example.com", "wrong"))
            .await
            .unwrap_err();

        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid login credentials");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_without_json_body_uses_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let err = client_for(&server).refresh("rt").await.unwrap_err();
        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "HTTP 502");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_sends_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(body_json(json!({ "refresh_token": "rt-old" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-new", "rt-new")))
            .expect(1)
            .mount(&server)
            .await;

        let session = client_for(&server).refresh("rt-old").await.unwrap();
        assert_eq!(session.access_token(), "at-new");
        assert_eq!(session.refresh_token(), "rt-new");
    }

    #[tokio::test]
    async fn test_token_response_with_zero_expiry_is_invalid_session() {
        let server = MockServer::start().await;
        let mut body = token_body("at", "rt");
        body["expires_in"] = json!(0);
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let err = client_for(&server).refresh("rt").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidSession(_)));
    }

    #[tokio::test]
    async fn test_sign_up_pending_confirmation_returns_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .and(query_param("redirect_to", "https://app.example.com/welcome"))
            .and(body_json(json!({
                "email": "new@example.com",
                "password": "pw",
                "data": { "name": "New" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "user-new",
                "email": "new@example.com"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut data = serde_json::Map::new();
        data.insert("name".into(), json!("New"));
        let options = SignUpOptions {
            data: Some(data),
            redirect_to: Some(Url::parse("https://app.example.com/welcome").unwrap()),
        };

        let response = client_for(&server)
            .sign_up(&Credentials::email("new@example.com", "pw"), &options)
            .await
            .unwrap();

        match response {
            SignUpResponse::User(user) => assert_eq!(user.id, "user-new"),
            other => panic!("expected pending user, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sign_up_auto_confirmed_returns_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at", "rt")))
            .mount(&server)
            .await;

        let response = client_for(&server)
            .sign_up(&Credentials::phone("+15550100", "pw"), &SignUpOptions::default())
            .await
            .unwrap();

        assert!(matches!(response, SignUpResponse::Session(ref s) if s.access_token() == "at"));
    }

    #[tokio::test]
    async fn test_get_and_update_user_use_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer at"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "user-123" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer at"))
            .and(body_json(json!({ "email": "new@example.com", "phone": null })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "user-123",
                "email": "new@example.com"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let user = client.get_user("at").await.unwrap();
        assert_eq!(user.id, "user-123");

        let attrs = UserAttributes {
            email: FieldUpdate::Set("new@example.com".into()),
            phone: FieldUpdate::Clear,
            ..Default::default()
        };
        let user = client.update_user("at", &attrs).await.unwrap();
        assert_eq!(user.email.as_deref(), Some("new@example.com"));
    }

    #[tokio::test]
    async fn test_sign_out_posts_logout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .and(header("authorization", "Bearer at"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).sign_out("at").await.unwrap();
    }

    #[tokio::test]
    async fn test_otp_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/otp"))
            .and(body_json(json!({ "email": "a@b.c", "create_user": true })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/otp"))
            .and(body_json(json!({ "phone": "+15550100", "create_user": true })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/verify"))
            .and(body_json(json!({ "phone": "+15550100", "token": "123456", "type": "sms" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at", "rt")))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.sign_in_with_magic_link("a@b.c", None).await.unwrap();
        client.send_otp("+15550100").await.unwrap();

        let session = client
            .verify_otp(&OtpVerification::Phone {
                phone: "+15550100".into(),
                token: "123456".into(),
                kind: OtpType::Sms,
            })
            .await
            .unwrap();
        assert_eq!(session.access_token(), "at");
    }
}
