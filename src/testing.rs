//! In-process fakes shared by unit tests

use crate::auth::claims::fake_jwt;
use crate::auth::{AuthApi, Session, User, UserMetadata, UserUpdate};
use crate::error::{TriplogError, TriplogResult};
use crate::http::{HttpClient, HttpRequest, HttpResponse, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Fixed "now" for manual clocks, in epoch seconds
pub(crate) const NOW: i64 = 1_700_000_000;

pub(crate) fn sample_user() -> User {
    User {
        id: "u1".to_string(),
        aud: "authenticated".to_string(),
        role: "authenticated".to_string(),
        email: "driver@example.com".to_string(),
        phone: String::new(),
        email_confirmed_at: None,
        confirmed_at: None,
        last_sign_in_at: None,
        user_metadata: UserMetadata::default(),
    }
}

pub(crate) fn session(expires_at: i64, refresh_token: Option<&str>) -> Session {
    Session {
        access_token: fake_jwt(expires_at),
        refresh_token: refresh_token.map(str::to_string),
        expires_at,
        token_type: Some("bearer".to_string()),
        expires_in: Some(3600),
        user: sample_user(),
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Scripted auth service with call counters
pub(crate) struct ScriptedAuth {
    pub refresh_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub get_user_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    refresh_delay: Duration,
    refresh: Mutex<Result<(i64, bool), TriplogError>>,
    login: Mutex<Result<i64, TriplogError>>,
    user: Mutex<Result<User, TriplogError>>,
    last_token: Mutex<Option<String>>,
}

impl ScriptedAuth {
    pub fn new() -> Self {
        Self {
            refresh_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            get_user_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            refresh_delay: Duration::ZERO,
            refresh: Mutex::new(Ok((NOW + 3600, true))),
            login: Mutex::new(Ok(NOW + 3600)),
            user: Mutex::new(Ok(sample_user())),
            last_token: Mutex::new(None),
        }
    }

    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    /// Refreshes issue a token expiring at `expires_at`; `rotate` controls
    /// whether a new refresh token comes back
    pub fn refresh_issues(&self, expires_at: i64, rotate: bool) {
        *lock(&self.refresh) = Ok((expires_at, rotate));
    }

    pub fn refresh_fails(&self, error: TriplogError) {
        *lock(&self.refresh) = Err(error);
    }

    pub fn login_fails(&self, error: TriplogError) {
        *lock(&self.login) = Err(error);
    }

    pub fn user_fails(&self, error: TriplogError) {
        *lock(&self.user) = Err(error);
    }

    /// Access token passed to the last authenticated call
    pub fn last_token(&self) -> Option<String> {
        lock(&self.last_token).clone()
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn issue_login(&self) -> TriplogResult<Session> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        let expires_at = lock(&self.login).clone()?;
        Ok(session(expires_at, Some("refresh-login")))
    }
}

#[async_trait]
impl AuthApi for ScriptedAuth {
    async fn password_grant(&self, _email: &str, _password: &str) -> TriplogResult<Session> {
        self.issue_login()
    }

    async fn refresh_grant(&self, _refresh_token: &str) -> TriplogResult<Session> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.refresh_delay.is_zero() {
            tokio::time::sleep(self.refresh_delay).await;
        }
        let (expires_at, rotate) = lock(&self.refresh).clone()?;
        let rotated = format!("refresh-{}", n);
        Ok(session(expires_at, rotate.then_some(rotated.as_str())))
    }

    async fn send_otp(&self, _email: &str) -> TriplogResult<()> {
        Ok(())
    }

    async fn verify_otp(&self, _email: &str, _token: &str) -> TriplogResult<Session> {
        self.issue_login()
    }

    async fn logout(&self, access_token: &str, _refresh_token: Option<&str>) -> TriplogResult<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_token) = Some(access_token.to_string());
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> TriplogResult<User> {
        self.get_user_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_token) = Some(access_token.to_string());
        lock(&self.user).clone()
    }

    async fn update_user(&self, access_token: &str, _update: &UserUpdate) -> TriplogResult<User> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_token) = Some(access_token.to_string());
        lock(&self.user).clone()
    }
}

/// Scripted transport recording every request
#[derive(Default)]
pub(crate) struct ScriptedHttp {
    requests: Mutex<Vec<HttpRequest>>,
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
}

impl ScriptedHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, status: u16, data: Value) {
        lock(&self.responses).push_back(Ok(HttpResponse { status, data }));
    }

    pub fn fail(&self, error: TransportError) {
        lock(&self.responses).push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    pub fn last(&self) -> Option<HttpRequest> {
        lock(&self.requests).last().cloned()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        lock(&self.requests).push(request.clone());
        lock(&self.responses).pop_front().unwrap_or(Ok(HttpResponse {
            status: 200,
            data: Value::Null,
        }))
    }
}

/// Authenticated API stack over a scripted transport, signed in until
/// `NOW + 3600`
pub(crate) struct Stack {
    pub api: std::sync::Arc<crate::api::ApiClient>,
    pub cache: std::sync::Arc<crate::cache::ExpiringStore>,
    pub http: std::sync::Arc<ScriptedHttp>,
    pub clock: std::sync::Arc<crate::clock::ManualClock>,
}

pub(crate) fn signed_in_stack() -> Stack {
    use crate::api::{ApiClient, ApiTransport, RequestGate};
    use crate::auth::{TokenManager, TokenStore};
    use crate::cache::{ExpiringStore, VersionRegistry};
    use crate::clock::ManualClock;
    use crate::storage::MemoryStorage;
    use std::sync::Arc;

    let clock = Arc::new(ManualClock::new(
        chrono::DateTime::from_timestamp(NOW, 0).expect("valid timestamp"),
    ));
    let backend = Arc::new(MemoryStorage::new());
    let registry = Arc::new(VersionRegistry::load(backend.clone()));
    let cache = Arc::new(ExpiringStore::new(backend, registry, clock.clone()));

    let store = Arc::new(TokenStore::new(Arc::new(MemoryStorage::new())));
    store
        .set_auth_data(&fake_jwt(NOW + 3600), "r0", &sample_user(), NOW + 3600)
        .expect("seed session");
    let manager = Arc::new(TokenManager::new(
        store,
        Arc::new(ScriptedAuth::new()),
        cache.clone(),
        clock.clone(),
    ));

    let http = Arc::new(ScriptedHttp::new());
    let transport = ApiTransport::new(http.clone(), "https://api.example.test", "anon-key");
    let api = Arc::new(ApiClient::new(transport, RequestGate::new(manager, "anon-key")));

    Stack {
        api,
        cache,
        http,
        clock,
    }
}
