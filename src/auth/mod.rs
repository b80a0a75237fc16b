//! Session persistence and token lifecycle
//!
//! [`TokenStore`] is the persisted record, [`TokenManager`] owns every
//! transition of it, and [`AuthApi`] is the remote service it talks to.

pub mod claims;
mod manager;
mod token_store;
pub mod types;

pub use manager::{TokenManager, APP_USER_KEY, DEFAULT_REFRESH_THRESHOLD_SECS};
pub use token_store::TokenStore;
pub use types::{AuthSession, LoginFlag, LoginStatus, Session, TokenState, User, UserMetadata};

use crate::error::TriplogResult;
use async_trait::async_trait;
use serde::Serialize;

/// Attributes accepted by `PUT /user`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(rename = "data", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<UserMetadata>,
}

impl UserUpdate {
    /// Password change
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            metadata: None,
        }
    }

    /// Metadata change
    pub fn metadata(metadata: UserMetadata) -> Self {
        Self {
            password: None,
            metadata: Some(metadata),
        }
    }
}

/// Remote authentication service.
///
/// Token endpoints are unauthenticated; the rest take the caller's access
/// token explicitly so the manager decides which token is used.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /token?grant_type=password`
    async fn password_grant(&self, email: &str, password: &str) -> TriplogResult<Session>;

    /// `POST /token?grant_type=refresh_token`
    async fn refresh_grant(&self, refresh_token: &str) -> TriplogResult<Session>;

    /// `POST /otp`
    async fn send_otp(&self, email: &str) -> TriplogResult<()>;

    /// `POST /verify`
    async fn verify_otp(&self, email: &str, token: &str) -> TriplogResult<Session>;

    /// `POST /logout`
    async fn logout(&self, access_token: &str, refresh_token: Option<&str>) -> TriplogResult<()>;

    /// `GET /user`
    async fn get_user(&self, access_token: &str) -> TriplogResult<User>;

    /// `PUT /user`
    async fn update_user(&self, access_token: &str, update: &UserUpdate) -> TriplogResult<User>;
}
