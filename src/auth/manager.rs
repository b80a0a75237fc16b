//! Token lifecycle state machine
//!
//! The manager is the only writer of the [`TokenStore`]. Every authenticated
//! request goes through [`TokenManager::ensure_fresh`], which applies the
//! refresh decision policy:
//!
//! | remaining lifetime      | action                                   |
//! |-------------------------|------------------------------------------|
//! | no usable token         | fail with `NotAuthorized`, no network    |
//! | `< 0`                   | refresh; a failed refresh fails the call |
//! | `< threshold`           | refresh; a timed-out refresh is tolerated|
//! | otherwise               | reuse the stored token                   |
//!
//! Refreshes are single-flight: concurrent callers share one in-flight
//! exchange and all observe its outcome.

use super::claims;
use super::token_store::TokenStore;
use super::types::{AuthSession, LoginFlag, LoginStatus, Session, TokenState, User, UserMetadata};
use super::{AuthApi, UserUpdate};
use crate::audit::{AuditLog, SESSION_CLEARED, SESSION_LOGIN, SESSION_LOGOUT, SESSION_REFRESH};
use crate::cache::{Expiry, ExpiringStore};
use crate::clock::Clock;
use crate::error::{ErrorKind, RemoteFailure, TriplogError, TriplogResult};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Cache key of the signed-in user's profile
pub const APP_USER_KEY: &str = "app_user";

/// Refresh when fewer than this many seconds of token lifetime remain
pub const DEFAULT_REFRESH_THRESHOLD_SECS: i64 = 300;

const OP_REFRESH: &str = "refresh_session";
const OP_GATE: &str = "before_request";

type RefreshFlight = Shared<BoxFuture<'static, TriplogResult<AuthSession>>>;

/// State shared between the manager and its in-flight refresh
struct Lifecycle {
    store: Arc<TokenStore>,
    api: Arc<dyn AuthApi>,
    cache: Arc<ExpiringStore>,
    clock: Arc<dyn Clock>,
    audit: AuditLog,
    threshold_secs: i64,
}

impl Lifecycle {
    /// Access token and expiry, if the snapshot holds a usable token.
    ///
    /// A token that is not JWT-shaped counts as absent. When the stored
    /// expiry is missing the `exp` claim stands in.
    fn effective(&self, snapshot: &AuthSession) -> Option<(String, i64)> {
        if snapshot.status != LoginFlag::LoggedIn {
            return None;
        }
        let token = snapshot.access_token.as_ref()?;
        let shape = claims::inspect(token)?;
        let expire_at = snapshot.expire_at.or(shape.exp)?;
        Some((token.clone(), expire_at))
    }

    fn classify(&self, snapshot: &AuthSession) -> TokenState {
        match self.effective(snapshot) {
            Some((_, expire_at)) => {
                TokenState::classify(expire_at, self.clock.now_secs(), self.threshold_secs)
            }
            None => TokenState::LoggedOut,
        }
    }

    /// Persist a session returned by the service.
    ///
    /// A response without a refresh token keeps `fallback_refresh`.
    fn persist(
        &self,
        session: &Session,
        fallback_refresh: Option<&str>,
    ) -> TriplogResult<AuthSession> {
        let shape = claims::inspect(&session.access_token).ok_or_else(|| {
            TriplogError::Internal(RemoteFailure::new(
                "persist_session",
                "access token in response is malformed",
            ))
        })?;

        let expire_at = if session.expires_at > 0 {
            session.expires_at
        } else if let Some(exp) = shape.exp {
            exp
        } else if let Some(expires_in) = session.expires_in {
            self.clock.now_secs() + expires_in
        } else {
            return Err(TriplogError::Internal(RemoteFailure::new(
                "persist_session",
                "response carries no expiry",
            )));
        };

        let refresh_token = session
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(fallback_refresh)
            .unwrap_or_default();

        self.store
            .set_auth_data(&session.access_token, refresh_token, &session.user, expire_at)?;

        Ok(AuthSession {
            access_token: Some(session.access_token.clone()),
            refresh_token: Some(refresh_token.to_string()).filter(|t| !t.is_empty()),
            user: Some(session.user.clone()),
            expire_at: Some(expire_at),
            status: LoginFlag::LoggedIn,
        })
    }

    async fn clear_session(&self, reason: &str) {
        warn!("Clearing session: {}", reason);
        if let Err(e) = self.store.clear_auth_data() {
            warn!("Failed to clear stored session: {}", e);
        }
        self.cache.remove(APP_USER_KEY);
        self.audit
            .log(SESSION_CLEARED, &json!({ "reason": reason }))
            .await;
    }

    /// One refresh exchange. Unless `force`, a session that became valid in
    /// the meantime is returned as is.
    async fn run_refresh(&self, force: bool) -> TriplogResult<AuthSession> {
        let snapshot = self.store.snapshot();
        match self.classify(&snapshot) {
            TokenState::LoggedOut => {
                if snapshot.status == LoginFlag::LoggedIn {
                    self.clear_session("stored access token is unusable").await;
                }
                return Err(TriplogError::not_authorized(OP_REFRESH, "not signed in"));
            }
            TokenState::Valid { .. } if !force => return Ok(snapshot),
            _ => {}
        }

        let Some(refresh_token) = snapshot.refresh_token else {
            self.clear_session("no refresh token stored").await;
            return Err(TriplogError::not_authorized(
                OP_REFRESH,
                "no refresh token stored",
            ));
        };

        debug!("Refreshing session with {}", claims::preview(&refresh_token));
        let outcome = self.api.refresh_grant(&refresh_token).await;

        // A logout or new login while the exchange was pending wins
        if self.store.refresh_token().as_deref() != Some(refresh_token.as_str()) {
            debug!("Session changed while refreshing, discarding result");
            return Err(TriplogError::not_authorized(
                OP_REFRESH,
                "session ended while refreshing",
            ));
        }

        match outcome {
            Ok(session) => match self.persist(&session, Some(&refresh_token)) {
                Ok(stored) => {
                    info!("Session refreshed, expires at {:?}", stored.expire_at);
                    self.audit
                        .log(
                            SESSION_REFRESH,
                            &json!({ "user_id": session.user.id, "expire_at": stored.expire_at }),
                        )
                        .await;
                    Ok(stored)
                }
                Err(e) => {
                    self.clear_session("refresh response could not be stored").await;
                    Err(rejected(e))
                }
            },
            Err(e) if e.kind() == ErrorKind::RequestTimeout => {
                warn!("Session refresh did not complete: {}", e);
                Err(e.during(OP_REFRESH))
            }
            Err(e) => {
                self.clear_session("refresh rejected").await;
                Err(rejected(e))
            }
        }
    }
}

/// Refresh failure surfaced as an authorization error, keeping the server's
/// message, status and code
fn rejected(error: TriplogError) -> TriplogError {
    let mut failure = error
        .remote()
        .cloned()
        .unwrap_or_else(|| RemoteFailure::new(OP_REFRESH, error.to_string()));
    failure.operation = OP_REFRESH.to_string();
    TriplogError::NotAuthorized(failure)
}

fn token_of(session: AuthSession) -> TriplogResult<String> {
    session
        .access_token
        .ok_or_else(|| TriplogError::not_authorized(OP_GATE, "no usable session"))
}

/// Owner of the session lifecycle
pub struct TokenManager {
    inner: Arc<Lifecycle>,
    flight: Mutex<Option<(u64, RefreshFlight)>>,
    next_flight: AtomicU64,
}

impl TokenManager {
    /// Create a manager with the default threshold and no audit log
    pub fn new(
        store: Arc<TokenStore>,
        api: Arc<dyn AuthApi>,
        cache: Arc<ExpiringStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_options(
            store,
            api,
            cache,
            clock,
            DEFAULT_REFRESH_THRESHOLD_SECS,
            AuditLog::disabled(),
        )
    }

    /// Create a manager with an explicit refresh threshold and audit log
    pub fn with_options(
        store: Arc<TokenStore>,
        api: Arc<dyn AuthApi>,
        cache: Arc<ExpiringStore>,
        clock: Arc<dyn Clock>,
        refresh_threshold_secs: i64,
        audit: AuditLog,
    ) -> Self {
        Self {
            inner: Arc::new(Lifecycle {
                store,
                api,
                cache,
                clock,
                audit,
                threshold_secs: refresh_threshold_secs,
            }),
            flight: Mutex::new(None),
            next_flight: AtomicU64::new(0),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<(u64, RefreshFlight)>> {
        self.flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current lifecycle state
    pub fn state(&self) -> TokenState {
        self.inner.classify(&self.inner.store.snapshot())
    }

    /// Stored access token, if usable. Never refreshes.
    pub fn access_token(&self) -> Option<String> {
        self.inner
            .effective(&self.inner.store.snapshot())
            .map(|(token, _)| token)
    }

    /// Exchange a password for a session
    pub async fn login_with_password(&self, email: &str, password: &str) -> TriplogResult<User> {
        let session = self
            .inner
            .api
            .password_grant(email, password)
            .await
            .map_err(|e| e.during("login_with_password"))?;
        self.establish(session, "password", "login_with_password").await
    }

    /// Ask the service to email a one-time code
    pub async fn send_otp(&self, email: &str) -> TriplogResult<()> {
        self.inner
            .api
            .send_otp(email)
            .await
            .map_err(|e| e.during("send_otp"))?;
        info!("One-time code sent to {}", email);
        Ok(())
    }

    /// Exchange a one-time code for a session
    pub async fn verify_otp(&self, email: &str, code: &str) -> TriplogResult<User> {
        let session = self
            .inner
            .api
            .verify_otp(email, code)
            .await
            .map_err(|e| e.during("verify_otp"))?;
        self.establish(session, "otp", "verify_otp").await
    }

    async fn establish(
        &self,
        session: Session,
        method: &str,
        operation: &str,
    ) -> TriplogResult<User> {
        let stored = self
            .inner
            .persist(&session, None)
            .map_err(|e| e.during(operation))?;

        self.inner
            .cache
            .set_as(APP_USER_KEY, &session.user, Expiry::Infinite);

        info!("Signed in as {}", session.user.email);
        self.inner
            .audit
            .log(
                SESSION_LOGIN,
                &json!({
                    "user_id": session.user.id,
                    "method": method,
                    "expire_at": stored.expire_at,
                }),
            )
            .await;
        Ok(session.user)
    }

    /// Force a refresh exchange, joining one already in flight
    pub async fn refresh(&self) -> TriplogResult<AuthSession> {
        self.join_flight(true).await
    }

    async fn join_flight(&self, force: bool) -> TriplogResult<AuthSession> {
        let (id, flight) = {
            let mut slot = self.slot();
            match slot.as_ref() {
                Some((id, flight)) => {
                    debug!("Joining in-flight refresh");
                    (*id, flight.clone())
                }
                None => {
                    let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
                    let inner = Arc::clone(&self.inner);
                    let flight = async move { inner.run_refresh(force).await }
                        .boxed()
                        .shared();
                    *slot = Some((id, flight.clone()));
                    (id, flight)
                }
            }
        };

        let outcome = flight.await;

        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|(current, _)| *current == id) {
            *slot = None;
        }
        outcome
    }

    /// Apply the refresh decision policy and return the token to send
    pub async fn ensure_fresh(&self) -> TriplogResult<String> {
        let snapshot = self.inner.store.snapshot();
        match self.inner.classify(&snapshot) {
            TokenState::LoggedOut => {
                if snapshot.status == LoginFlag::LoggedIn {
                    self.inner
                        .clear_session("stored access token is unusable")
                        .await;
                }
                Err(TriplogError::not_authorized(OP_GATE, "no usable session"))
            }
            TokenState::Valid { .. } => token_of(snapshot),
            TokenState::ExpiringSoon { .. } => match self.join_flight(false).await {
                Ok(session) => token_of(session),
                Err(e) if e.kind() == ErrorKind::RequestTimeout => {
                    warn!("Using current token until it expires");
                    token_of(snapshot)
                }
                Err(e) => Err(e),
            },
            TokenState::Expired { .. } => token_of(self.join_flight(false).await?),
        }
    }

    /// Whether the user is signed in, refreshing first when the policy says so
    pub async fn is_logged_in(&self) -> LoginStatus {
        if let Err(e) = self.ensure_fresh().await {
            debug!("Not signed in: {}", e);
            return LoginStatus::signed_out();
        }
        match self.state().expire_at() {
            Some(expire_at) => LoginStatus {
                signed_in: true,
                expire_at,
            },
            None => LoginStatus::signed_out(),
        }
    }

    /// Signed-in user's profile, from the cache when present
    pub async fn current_user(&self) -> TriplogResult<User> {
        if self.state() == TokenState::LoggedOut {
            return Err(TriplogError::not_authorized("current_user", "not signed in"));
        }
        if let Some(user) = self.inner.cache.get_as::<User>(APP_USER_KEY) {
            return Ok(user);
        }
        self.fetch_user().await
    }

    async fn fetch_user(&self) -> TriplogResult<User> {
        let token = self.ensure_fresh().await?;
        let user = self
            .inner
            .api
            .get_user(&token)
            .await
            .map_err(|e| e.during("current_user"))?;
        self.inner.cache.set_as(APP_USER_KEY, &user, Expiry::Infinite);
        Ok(user)
    }

    /// Change the password, then sign out
    pub async fn update_password(&self, password: &str) -> TriplogResult<()> {
        let token = self.ensure_fresh().await?;
        self.inner
            .api
            .update_user(&token, &UserUpdate::password(password))
            .await
            .map_err(|e| e.during("update_password"))?;
        info!("Password changed, signing out");
        self.logout().await;
        Ok(())
    }

    /// Replace profile metadata, then sign out
    pub async fn update_metadata(&self, metadata: UserMetadata) -> TriplogResult<User> {
        let token = self.ensure_fresh().await?;
        let user = self
            .inner
            .api
            .update_user(&token, &UserUpdate::metadata(metadata))
            .await
            .map_err(|e| e.during("update_metadata"))?;
        info!("Profile updated, signing out");
        self.logout().await;
        Ok(user)
    }

    /// Sign out. The remote call is best-effort; local state is always cleared.
    pub async fn logout(&self) {
        let snapshot = self.inner.store.snapshot();
        if let Some(token) = snapshot.access_token.as_deref() {
            if let Err(e) = self
                .inner
                .api
                .logout(token, snapshot.refresh_token.as_deref())
                .await
            {
                warn!("Remote logout failed: {}", e);
            }
        }

        if let Err(e) = self.inner.store.clear_auth_data() {
            warn!("Failed to clear stored session: {}", e);
        }
        self.inner.cache.remove(APP_USER_KEY);

        let user_id = snapshot.user.map(|u| u.id);
        info!("Signed out");
        self.inner
            .audit
            .log(SESSION_LOGOUT, &json!({ "user_id": user_id }))
            .await;
    }

    /// Resume a persisted session at startup.
    ///
    /// Refreshes when the policy says so, then re-reads the profile; a
    /// failed profile fetch keeps the session.
    pub async fn restore(&self) -> bool {
        if self.state() == TokenState::LoggedOut {
            return false;
        }
        if let Err(e) = self.ensure_fresh().await {
            info!("Stored session could not be restored: {}", e);
            return false;
        }
        if let Err(e) = self.fetch_user().await {
            warn!("Could not refresh user profile: {}", e);
        }
        true
    }

    /// Wait for any in-flight refresh to settle
    pub async fn settle(&self) {
        let pending = self
            .slot()
            .as_ref()
            .map(|(id, flight)| (*id, flight.clone()));
        let Some((id, flight)) = pending else {
            return;
        };
        let _ = flight.await;

        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|(current, _)| *current == id) {
            *slot = None;
        }
    }
}
