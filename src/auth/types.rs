//! Authentication data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Profile metadata editable by the user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
}

/// User profile as returned by the auth service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,

    #[serde(default)]
    pub aud: String,

    #[serde(default)]
    pub role: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub phone: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_confirmed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sign_in_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Token grant returned by password, one-time-code and refresh exchanges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,

    /// Absent when the service does not rotate the refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Expiry in epoch seconds; zero when the service omitted it
    #[serde(default)]
    pub expires_at: i64,

    #[serde(default)]
    pub token_type: Option<String>,

    #[serde(default)]
    pub expires_in: Option<i64>,

    pub user: User,
}

/// Persisted login flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginFlag {
    LoggedIn,
    LoggedOut,
}

impl LoginFlag {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoggedIn => "logged_in",
            Self::LoggedOut => "logged_out",
        }
    }

    /// Parse the storage representation; anything unknown is logged out
    pub fn parse(raw: &str) -> Self {
        match raw {
            "logged_in" => Self::LoggedIn,
            _ => Self::LoggedOut,
        }
    }
}

/// The process-wide authenticated identity
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSession {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
    /// Expiry in epoch seconds
    pub expire_at: Option<i64>,
    pub status: LoginFlag,
}

impl AuthSession {
    /// Session with every field cleared
    pub fn logged_out() -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            user: None,
            expire_at: None,
            status: LoginFlag::LoggedOut,
        }
    }

    /// Whether the session satisfies the logged-in invariant
    pub fn is_logged_in(&self) -> bool {
        self.status == LoginFlag::LoggedIn
            && self.access_token.is_some()
            && self.expire_at.is_some()
    }
}

/// Lifecycle state derived from a session and the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// No usable session
    LoggedOut,
    /// Token present and not expiring soon
    Valid { expire_at: i64 },
    /// Token present, within the refresh threshold of expiry
    ExpiringSoon { expire_at: i64 },
    /// Token past expiry
    Expired { expire_at: i64 },
}

impl TokenState {
    /// Classify `expire_at - now` against the refresh threshold
    pub fn classify(expire_at: i64, now: i64, threshold_secs: i64) -> Self {
        let remaining = expire_at - now;
        if remaining < 0 {
            Self::Expired { expire_at }
        } else if remaining < threshold_secs {
            Self::ExpiringSoon { expire_at }
        } else {
            Self::Valid { expire_at }
        }
    }

    /// Whether a refresh should happen before the token is used
    pub fn needs_refresh(&self) -> bool {
        matches!(self, Self::ExpiringSoon { .. } | Self::Expired { .. })
    }

    /// Expiry, when a token is present
    pub fn expire_at(&self) -> Option<i64> {
        match self {
            Self::LoggedOut => None,
            Self::Valid { expire_at }
            | Self::ExpiringSoon { expire_at }
            | Self::Expired { expire_at } => Some(*expire_at),
        }
    }
}

/// Answer to "is the user signed in", as consumed by routing guards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginStatus {
    pub signed_in: bool,
    /// Expiry in epoch seconds, `-1` when signed out
    pub expire_at: i64,
}

impl LoginStatus {
    /// Signed-out answer
    pub fn signed_out() -> Self {
        Self {
            signed_in: false,
            expire_at: -1,
        }
    }
}
