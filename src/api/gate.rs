//! Authenticated request gate

use crate::auth::TokenManager;
use crate::error::TriplogResult;
use crate::http::HttpRequest;
use std::sync::Arc;
use tracing::debug;

/// Header carrying the static API key
pub const API_KEY_HEADER: &str = "apikey";

/// Runs before every outgoing request.
///
/// Exempt requests only get the API key. Everything else goes through the
/// manager's refresh decision and gets a bearer token, or fails with
/// `NotAuthorized` without being sent.
pub struct RequestGate {
    manager: Arc<TokenManager>,
    api_key: String,
}

impl RequestGate {
    pub fn new(manager: Arc<TokenManager>, api_key: impl Into<String>) -> Self {
        Self {
            manager,
            api_key: api_key.into(),
        }
    }

    /// Attach the API key header
    pub fn stamp_api_key(mut request: HttpRequest, api_key: &str) -> HttpRequest {
        request.set_header(API_KEY_HEADER, api_key);
        request
    }

    pub async fn before_request(&self, request: HttpRequest) -> TriplogResult<HttpRequest> {
        let mut request = Self::stamp_api_key(request, &self.api_key);
        if request.skip_auth {
            return Ok(request);
        }

        let token = self.manager.ensure_fresh().await?;
        debug!("Authorizing {}", request.operation);
        request.set_header("Authorization", format!("Bearer {}", token));
        Ok(request)
    }
}
