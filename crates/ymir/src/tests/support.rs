//! Scripted provider, shared storage and event recorder for engine tests.

use async_trait::async_trait;
use gotrue_client::{AuthApi, ClientError, ClientResult};
use gotrue_types::{
    AuthChangeEvent, Credentials, OtpVerification, Provider, ProviderOptions, Session,
    SignUpOptions, SignUpResponse, User, UserAttributes,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Semaphore;
use url::Url;
use warden_storage::{
    MemoryStorage, PersistedSession, SecretsManager, SecureStorage, SessionStore, StorageError,
    StorageKeys, StorageResult,
};

use crate::{AuthEngine, EngineConfig};

/// A remote call observed by the mock, with the token or identifier it carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SignUp(String),
    SignIn(String),
    MagicLink(String),
    SendOtp(String),
    VerifyOtp(String),
    Refresh(String),
    SignOut(String),
    UpdateUser(String),
    GetUser(String),
}

fn unscripted(operation: &str) -> ClientError {
    ClientError::Api {
        status: 500,
        message: format!("unscripted {}", operation),
    }
}

/// Provider double. Each operation pops its next scripted result; an empty
/// script yields a 500. Refresh and get_user can be held behind a gate.
#[derive(Default)]
pub struct MockAuthApi {
    calls: Mutex<Vec<Call>>,
    sign_up: Mutex<VecDeque<ClientResult<SignUpResponse>>>,
    sign_in: Mutex<VecDeque<ClientResult<Session>>>,
    verify: Mutex<VecDeque<ClientResult<Session>>>,
    refresh: Mutex<VecDeque<ClientResult<Session>>>,
    users: Mutex<VecDeque<ClientResult<User>>>,
    sign_out: Mutex<VecDeque<ClientResult<()>>>,
    refresh_gate: Mutex<Option<Arc<Semaphore>>>,
    user_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl MockAuthApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_sign_up(&self, result: ClientResult<SignUpResponse>) {
        self.sign_up.lock().push_back(result);
    }

    pub fn push_sign_in(&self, result: ClientResult<Session>) {
        self.sign_in.lock().push_back(result);
    }

    pub fn push_verify(&self, result: ClientResult<Session>) {
        self.verify.lock().push_back(result);
    }

    pub fn push_refresh(&self, result: ClientResult<Session>) {
        self.refresh.lock().push_back(result);
    }

    /// Response for the next `get_user` or `update_user`.
    pub fn push_user(&self, result: ClientResult<User>) {
        self.users.lock().push_back(result);
    }

    pub fn push_sign_out(&self, result: ClientResult<()>) {
        self.sign_out.lock().push_back(result);
    }

    /// Hold every refresh until a permit is added to the returned semaphore.
    pub fn gate_refresh(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.refresh_gate.lock() = Some(gate.clone());
        gate
    }

    /// Hold every `get_user` and `update_user` until a permit is added.
    pub fn gate_user(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.user_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn refresh_calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Refresh(token) => Some(token.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    async fn pass(gate: &Mutex<Option<Arc<Semaphore>>>) {
        let gate = gate.lock().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
    }
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn sign_up(
        &self,
        credentials: &Credentials,
        _options: &SignUpOptions,
    ) -> ClientResult<SignUpResponse> {
        self.record(Call::SignUp(credentials.identifier().to_string()));
        let next = self.sign_up.lock().pop_front();
        next.unwrap_or_else(|| Err(unscripted("sign_up")))
    }

    async fn sign_in_with_password(&self, credentials: &Credentials) -> ClientResult<Session> {
        self.record(Call::SignIn(credentials.identifier().to_string()));
        let next = self.sign_in.lock().pop_front();
        next.unwrap_or_else(|| Err(unscripted("sign_in")))
    }

    async fn sign_in_with_magic_link(
        &self,
        email: &str,
        _redirect_to: Option<&Url>,
    ) -> ClientResult<()> {
        self.record(Call::MagicLink(email.to_string()));
        Ok(())
    }

    async fn send_otp(&self, phone: &str) -> ClientResult<()> {
        self.record(Call::SendOtp(phone.to_string()));
        Ok(())
    }

    async fn verify_otp(&self, verification: &OtpVerification) -> ClientResult<Session> {
        self.record(Call::VerifyOtp(verification.identifier().to_string()));
        let next = self.verify.lock().pop_front();
        next.unwrap_or_else(|| Err(unscripted("verify_otp")))
    }

    async fn refresh(&self, refresh_token: &str) -> ClientResult<Session> {
        self.record(Call::Refresh(refresh_token.to_string()));
        Self::pass(&self.refresh_gate).await;
        let next = self.refresh.lock().pop_front();
        next.unwrap_or_else(|| Err(unscripted("refresh")))
    }

    async fn sign_out(&self, access_token: &str) -> ClientResult<()> {
        self.record(Call::SignOut(access_token.to_string()));
        let next = self.sign_out.lock().pop_front();
        next.unwrap_or(Ok(()))
    }

    async fn update_user(
        &self,
        access_token: &str,
        _attributes: &UserAttributes,
    ) -> ClientResult<User> {
        self.record(Call::UpdateUser(access_token.to_string()));
        Self::pass(&self.user_gate).await;
        let next = self.users.lock().pop_front();
        next.unwrap_or_else(|| Err(unscripted("update_user")))
    }

    async fn get_user(&self, access_token: &str) -> ClientResult<User> {
        self.record(Call::GetUser(access_token.to_string()));
        Self::pass(&self.user_gate).await;
        let next = self.users.lock().pop_front();
        next.unwrap_or_else(|| Err(unscripted("get_user")))
    }

    /// Gitlab stands in for a provider whose URL cannot be built.
    fn authorize_url(&self, provider: Provider, _options: &ProviderOptions) -> ClientResult<Url> {
        if provider == Provider::Gitlab {
            return Err(ClientError::BadUrl("no authorize endpoint for gitlab".into()));
        }
        Ok(Url::parse(&format!(
            "https://auth.example.com/auth/v1/authorize?provider={}",
            provider
        ))?)
    }
}

/// Storage backend shared between the engine and the test body.
#[derive(Clone, Default)]
pub struct SharedStorage(pub Arc<MemoryStorage>);

impl SharedStorage {
    pub fn raw_session(&self) -> Option<String> {
        self.0.get(StorageKeys::SESSION).unwrap()
    }

    pub fn persisted(&self) -> Option<PersistedSession> {
        SecretsManager::new(Box::new(self.clone())).get_session().unwrap()
    }

    pub fn store(&self) -> Arc<dyn SessionStore> {
        Arc::new(SecretsManager::new(Box::new(self.clone())))
    }
}

impl SecureStorage for SharedStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.0.set(key, value)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.0.get(key)
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        self.0.delete(key)
    }
}

/// A store whose every operation fails.
pub struct BrokenStore;

impl SessionStore for BrokenStore {
    fn get(&self) -> StorageResult<Option<PersistedSession>> {
        Err(StorageError::Backend("keychain locked".into()))
    }

    fn save(&self, _session: &PersistedSession) -> StorageResult<()> {
        Err(StorageError::Backend("keychain locked".into()))
    }

    fn remove(&self) -> StorageResult<()> {
        Err(StorageError::Backend("keychain locked".into()))
    }
}

/// Events as seen by an observer: the event and the access token it carried.
pub type EventLog = Arc<Mutex<Vec<(AuthChangeEvent, Option<String>)>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn record_into(
    log: &EventLog,
) -> impl Fn(AuthChangeEvent, Option<&Session>) + Send + Sync + 'static {
    let log = log.clone();
    move |event, session| {
        log.lock()
            .push((event, session.map(|s| s.access_token().to_string())))
    }
}

pub fn events(log: &EventLog) -> Vec<AuthChangeEvent> {
    log.lock().iter().map(|(event, _)| *event).collect()
}

pub fn user(id: &str) -> User {
    let mut user = User::new(id);
    user.email = Some(format!("{}@example.com", id));
    user
}

pub fn session(access: &str, refresh: &str, expires_in: u64) -> Session {
    Session::new(access, "bearer", expires_in, refresh, user("user-123")).unwrap()
}

pub fn credentials() -> Credentials {
    Credentials::email("user-123@example.com", "hunter2")
}

pub struct Harness {
    pub api: Arc<MockAuthApi>,
    pub storage: SharedStorage,
    pub engine: AuthEngine,
    pub log: EventLog,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_storage(SharedStorage::default(), config)
    }

    /// Build an engine over existing storage, recording events from recovery on.
    pub fn with_storage(storage: SharedStorage, config: EngineConfig) -> Self {
        let api = MockAuthApi::new();
        let log = event_log();
        let engine = AuthEngine::builder(api.clone(), storage.store())
            .config(config)
            .listener(record_into(&log))
            .build();
        Self {
            api,
            storage,
            engine,
            log,
        }
    }

    /// Sign in with a scripted session and forget the resulting event.
    pub async fn signed_in(self, initial: Session) -> Self {
        self.api.push_sign_in(Ok(initial));
        self.engine.sign_in(&credentials()).await.unwrap();
        self.log.lock().clear();
        self
    }

    pub fn events(&self) -> Vec<AuthChangeEvent> {
        events(&self.log)
    }
}

/// Let spawned tasks run without advancing time.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
