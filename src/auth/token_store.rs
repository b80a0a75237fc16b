//! Persisted session fields
//!
//! A plain read/write surface over five storage keys. It holds no policy:
//! the token manager is its only writer.

use super::types::{AuthSession, LoginFlag, User};
use crate::error::TriplogResult;
use crate::storage::{StorageBackend, StorageError};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

const ACCESS_TOKEN_KEY: &str = "access_token";
const REFRESH_TOKEN_KEY: &str = "refresh_token";
const USER_INFO_KEY: &str = "user";
const LOGIN_STATUS_KEY: &str = "login_status";
const TOKEN_EXPIRE_AT_KEY: &str = "token_expire_at";

/// Storage-backed holder of the authentication record
pub struct TokenStore {
    backend: Arc<dyn StorageBackend>,
    guard: Mutex<()>,
}

impl TokenStore {
    /// Create a store over a backend
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            guard: Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.guard.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Write all session fields together and flip the status to logged in.
    ///
    /// If any write fails the fields are cleared again so no partial session
    /// is left behind.
    pub fn set_auth_data(
        &self,
        access_token: &str,
        refresh_token: &str,
        user: &User,
        expire_at: i64,
    ) -> TriplogResult<()> {
        let user_json = serde_json::to_string(user)?;
        let _guard = self.lock();

        let result = self
            .backend
            .set_item(ACCESS_TOKEN_KEY, access_token)
            .and_then(|_| self.backend.set_item(REFRESH_TOKEN_KEY, refresh_token))
            .and_then(|_| self.backend.set_item(USER_INFO_KEY, &user_json))
            .and_then(|_| {
                self.backend
                    .set_item(TOKEN_EXPIRE_AT_KEY, &expire_at.to_string())
            })
            .and_then(|_| {
                self.backend
                    .set_item(LOGIN_STATUS_KEY, LoginFlag::LoggedIn.as_str())
            });

        if let Err(e) = result {
            warn!("Failed to persist session, clearing partial state: {}", e);
            let _ = self.clear_locked();
            return Err(e.into());
        }

        debug!("Stored session for user {} expiring at {}", user.id, expire_at);
        Ok(())
    }

    fn clear_locked(&self) -> Result<(), StorageError> {
        let mut first_error = None;
        for key in [
            ACCESS_TOKEN_KEY,
            REFRESH_TOKEN_KEY,
            USER_INFO_KEY,
            TOKEN_EXPIRE_AT_KEY,
        ] {
            if let Err(e) = self.backend.remove_item(key) {
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self
            .backend
            .set_item(LOGIN_STATUS_KEY, LoginFlag::LoggedOut.as_str())
        {
            first_error.get_or_insert(e);
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Remove every session field and flip the status to logged out
    pub fn clear_auth_data(&self) -> TriplogResult<()> {
        let _guard = self.lock();
        self.clear_locked()?;
        debug!("Cleared stored session");
        Ok(())
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.backend.get_item(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!("Failed to read {}: {}", key, e);
                None
            }
        }
    }

    fn read_user(&self) -> Option<User> {
        let raw = self.read(USER_INFO_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!("Stored user profile is unreadable: {}", e);
                None
            }
        }
    }

    fn read_expire_at(&self) -> Option<i64> {
        self.read(TOKEN_EXPIRE_AT_KEY)?.trim().parse().ok()
    }

    fn read_status(&self) -> LoginFlag {
        self.read(LOGIN_STATUS_KEY)
            .map_or(LoginFlag::LoggedOut, |raw| LoginFlag::parse(&raw))
    }

    /// Stored access token
    pub fn access_token(&self) -> Option<String> {
        let _guard = self.lock();
        self.read(ACCESS_TOKEN_KEY)
    }

    /// Stored refresh token
    pub fn refresh_token(&self) -> Option<String> {
        let _guard = self.lock();
        self.read(REFRESH_TOKEN_KEY)
    }

    /// Stored user profile; unreadable JSON is absent
    pub fn user(&self) -> Option<User> {
        let _guard = self.lock();
        self.read_user()
    }

    /// Stored expiry in epoch seconds; a non-numeric value is absent
    pub fn expire_at(&self) -> Option<i64> {
        let _guard = self.lock();
        self.read_expire_at()
    }

    /// Stored login flag
    pub fn status(&self) -> LoginFlag {
        let _guard = self.lock();
        self.read_status()
    }

    /// Consistent read of every field
    pub fn snapshot(&self) -> AuthSession {
        let _guard = self.lock();
        AuthSession {
            access_token: self.read(ACCESS_TOKEN_KEY),
            refresh_token: self.read(REFRESH_TOKEN_KEY),
            user: self.read_user(),
            expire_at: self.read_expire_at(),
            status: self.read_status(),
        }
    }
}
