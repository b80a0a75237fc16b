//! Error types for Triplog
//!
//! All modules use `TriplogResult<T>` as their return type. The error is
//! `Clone` because a single refresh outcome is handed to every waiter.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for Triplog operations
pub type TriplogResult<T> = Result<T, TriplogError>;

/// Programmatic error taxonomy, stable across re-tagging by domain wrappers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No usable token and refresh impossible or declined
    NotAuthorized,
    /// Network timeout or connection drop
    RequestTimeout,
    /// 4xx from the remote service
    InvalidRequest,
    /// 5xx from the remote service
    InternalError,
    /// Local storage failure, recovered as a cache miss
    CacheIo,
    /// Configuration file problems
    Config,
    /// Local I/O outside the cache
    Io,
}

impl ErrorKind {
    /// Wire-style name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotAuthorized => "NOT_AUTHORIZED",
            Self::RequestTimeout => "REQUEST_TIMEOUT",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::InternalError => "INTERNAL_ERROR",
            Self::CacheIo => "CACHE_IO_ERROR",
            Self::Config => "CONFIG_ERROR",
            Self::Io => "IO_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Details of an error answered by (or on the way to) the remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFailure {
    /// Operation that produced the error (`login_with_password`, `search_trips`, ...)
    pub operation: String,
    /// Human-readable message from the server or transport
    pub message: String,
    /// HTTP status, when the server answered
    pub status: Option<u16>,
    /// Server error code (`error_code` field), when present
    pub code: Option<String>,
    /// User-facing notice attached by a domain wrapper
    pub notice: Option<String>,
}

impl RemoteFailure {
    /// Create a failure for an operation with a message
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
            status: None,
            code: None,
            notice: None,
        }
    }

    /// Attach the HTTP status
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach the server error code
    pub fn with_code(mut self, code: Option<String>) -> Self {
        self.code = code;
        self
    }
}

impl std::fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.operation, self.message)?;
        if let Some(status) = self.status {
            write!(f, " (HTTP {})", status)?;
        }
        Ok(())
    }
}

/// All errors that can occur in Triplog
#[derive(Error, Debug, Clone)]
pub enum TriplogError {
    // Remote errors
    #[error("Not authorized: {0}")]
    NotAuthorized(RemoteFailure),

    #[error("Request timed out: {0}")]
    RequestTimeout(RemoteFailure),

    #[error("Invalid request: {0}")]
    InvalidRequest(RemoteFailure),

    #[error("Remote service error: {0}")]
    Internal(RemoteFailure),

    // Cache errors (recovered locally, only surfaced by explicit maintenance commands)
    #[error("Cache storage error: {0}")]
    CacheIo(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Missing configuration value: {0}")]
    ConfigMissing(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[source] Arc<serde_json::Error>),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(String),

    #[error("{0}")]
    User(String),
}

impl From<serde_json::Error> for TriplogError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(Arc::new(e))
    }
}

impl From<crate::storage::StorageError> for TriplogError {
    fn from(e: crate::storage::StorageError) -> Self {
        Self::CacheIo(e.to_string())
    }
}

impl From<toml::ser::Error> for TriplogError {
    fn from(e: toml::ser::Error) -> Self {
        Self::TomlSerialize(e.to_string())
    }
}

impl TriplogError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    /// Authorization failure without a server response
    pub fn not_authorized(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotAuthorized(RemoteFailure::new(operation, message))
    }

    /// Timeout or dropped connection
    pub fn timeout(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RequestTimeout(RemoteFailure::new(operation, message))
    }

    /// Build the error for a non-2xx response
    pub fn from_status(
        operation: impl Into<String>,
        status: u16,
        message: impl Into<String>,
        code: Option<String>,
    ) -> Self {
        let failure = RemoteFailure::new(operation, message)
            .with_status(status)
            .with_code(code);
        match status {
            401 | 403 => Self::NotAuthorized(failure),
            408 => Self::RequestTimeout(failure),
            500..=599 => Self::Internal(failure),
            _ => Self::InvalidRequest(failure),
        }
    }

    /// Programmatic kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAuthorized(_) => ErrorKind::NotAuthorized,
            Self::RequestTimeout(_) => ErrorKind::RequestTimeout,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Internal(_) => ErrorKind::InternalError,
            Self::CacheIo(_) => ErrorKind::CacheIo,
            Self::ConfigInvalid { .. } | Self::ConfigMissing(_) => ErrorKind::Config,
            Self::Io { .. } | Self::Json(_) | Self::TomlSerialize(_) | Self::User(_) => {
                ErrorKind::Io
            }
        }
    }

    /// Remote failure details, when this error came from the remote path
    pub fn remote(&self) -> Option<&RemoteFailure> {
        match self {
            Self::NotAuthorized(f)
            | Self::RequestTimeout(f)
            | Self::InvalidRequest(f)
            | Self::Internal(f) => Some(f),
            _ => None,
        }
    }

    fn remote_mut(&mut self) -> Option<&mut RemoteFailure> {
        match self {
            Self::NotAuthorized(f)
            | Self::RequestTimeout(f)
            | Self::InvalidRequest(f)
            | Self::Internal(f) => Some(f),
            _ => None,
        }
    }

    /// Operation that produced the error
    pub fn operation(&self) -> Option<&str> {
        self.remote().map(|f| f.operation.as_str())
    }

    /// HTTP status the server answered with
    pub fn status(&self) -> Option<u16> {
        self.remote().and_then(|f| f.status)
    }

    /// Re-tag the source operation, preserving kind and status
    pub fn during(mut self, operation: &str) -> Self {
        if let Some(f) = self.remote_mut() {
            f.operation = operation.to_string();
        }
        self
    }

    /// Attach a user-facing notice, preserving kind and status.
    ///
    /// Timeouts keep the generic network notice from `hint()`.
    pub fn with_notice(mut self, notice: &str) -> Self {
        let kind = self.kind();
        if let Some(f) = self.remote_mut() {
            f.notice = Some(match kind {
                ErrorKind::NotAuthorized => "User is not authorized".to_string(),
                _ => notice.to_string(),
            });
        }
        self
    }

    /// Whether this error requires the user to sign in again
    pub fn requires_login(&self) -> bool {
        self.kind() == ErrorKind::NotAuthorized
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::NotAuthorized(_) => Some("Session expired or missing. Run: triplog login"),
            Self::RequestTimeout(_) => Some("Network unstable, please retry"),
            Self::ConfigMissing(_) => Some("Run: triplog config set <key> <value>"),
            _ => self.remote().and_then(|f| f.notice.as_deref()),
        }
    }
}
