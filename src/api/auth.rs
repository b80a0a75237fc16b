//! Remote auth service client

use super::client::ApiTransport;
use super::gate::RequestGate;
use crate::auth::{AuthApi, Session, User, UserUpdate};
use crate::error::{RemoteFailure, TriplogError, TriplogResult};
use crate::http::{HttpRequest, Method};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

const AUTH_PREFIX: &str = "auth/v1";

/// [`AuthApi`] over HTTP
pub struct RemoteAuth {
    transport: ApiTransport,
}

impl RemoteAuth {
    pub fn new(transport: ApiTransport) -> Self {
        Self { transport }
    }

    fn build(&self, method: Method, path: &str, operation: &str) -> TriplogResult<HttpRequest> {
        let request = self
            .transport
            .request(method, &format!("{}/{}", AUTH_PREFIX, path))?
            .skip_auth()
            .operation(operation);
        Ok(RequestGate::stamp_api_key(request, self.transport.api_key()))
    }

    fn bearer(request: HttpRequest, access_token: &str) -> HttpRequest {
        request.header("Authorization", format!("Bearer {}", access_token))
    }

    fn decode<T: DeserializeOwned>(operation: &str, value: Value) -> TriplogResult<T> {
        serde_json::from_value(value).map_err(|e| {
            TriplogError::Internal(RemoteFailure::new(
                operation,
                format!("malformed response: {}", e),
            ))
        })
    }
}

#[async_trait]
impl AuthApi for RemoteAuth {
    async fn password_grant(&self, email: &str, password: &str) -> TriplogResult<Session> {
        let request = self
            .build(Method::Post, "token", "password_grant")?
            .query("grant_type", "password")
            .json(json!({ "email": email, "password": password }));
        let value = self.transport.execute(request).await?;
        Self::decode("password_grant", value)
    }

    async fn refresh_grant(&self, refresh_token: &str) -> TriplogResult<Session> {
        let request = self
            .build(Method::Post, "token", "refresh_grant")?
            .query("grant_type", "refresh_token")
            .json(json!({ "refresh_token": refresh_token }));
        let value = self.transport.execute(request).await?;
        Self::decode("refresh_grant", value)
    }

    async fn send_otp(&self, email: &str) -> TriplogResult<()> {
        let request = self
            .build(Method::Post, "otp", "send_otp")?
            .json(json!({ "email": email, "create_user": false }));
        self.transport.execute(request).await?;
        Ok(())
    }

    async fn verify_otp(&self, email: &str, token: &str) -> TriplogResult<Session> {
        let request = self
            .build(Method::Post, "verify", "verify_otp")?
            .json(json!({ "type": "email", "email": email, "token": token }));
        let value = self.transport.execute(request).await?;
        Self::decode("verify_otp", value)
    }

    async fn logout(&self, access_token: &str, refresh_token: Option<&str>) -> TriplogResult<()> {
        let request = self.build(Method::Post, "logout", "logout")?;
        let request =
            Self::bearer(request, access_token).json(json!({ "refresh_token": refresh_token }));
        self.transport.execute(request).await?;
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> TriplogResult<User> {
        let request = Self::bearer(self.build(Method::Get, "user", "get_user")?, access_token);
        let value = self.transport.execute(request).await?;
        Self::decode("get_user", value)
    }

    async fn update_user(&self, access_token: &str, update: &UserUpdate) -> TriplogResult<User> {
        let request = Self::bearer(self.build(Method::Put, "user", "update_user")?, access_token)
            .json(serde_json::to_value(update)?);
        let value = self.transport.execute(request).await?;
        Self::decode("update_user", value)
    }
}
