//! Request execution and response mapping

use super::gate::RequestGate;
use crate::error::{TriplogError, TriplogResult};
use crate::http::{HttpClient, HttpRequest, HttpResponse, Method, TransportError, DEFAULT_TIMEOUT};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Base URL, API key and transport shared by every remote call
#[derive(Clone)]
pub struct ApiTransport {
    http: Arc<dyn HttpClient>,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl ApiTransport {
    pub fn new(
        http: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Absolute URL for a service path
    pub fn url(&self, path: &str) -> TriplogResult<String> {
        let base = self.base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(TriplogError::ConfigMissing("api.base_url".to_string()));
        }
        Ok(format!("{}/{}", base, path.trim_start_matches('/')))
    }

    /// New request for a service path with the configured timeout
    pub fn request(&self, method: Method, path: &str) -> TriplogResult<HttpRequest> {
        Ok(HttpRequest::new(method, self.url(path)?).timeout(self.timeout))
    }

    /// Send a prepared request and map the outcome. Never retries.
    pub async fn execute(&self, request: HttpRequest) -> TriplogResult<Value> {
        debug!("{} {} ({})", request.method, request.url, request.operation);
        let result = self.http.send(&request).await;
        map_response(&request.operation, result)
    }
}

/// Map a transport outcome onto the error taxonomy
pub(crate) fn map_response(
    operation: &str,
    result: Result<HttpResponse, TransportError>,
) -> TriplogResult<Value> {
    match result {
        Ok(response) if response.is_success() => Ok(response.data),
        Ok(response) => {
            let (message, code) = error_details(&response.data, response.status);
            Err(TriplogError::from_status(operation, response.status, message, code))
        }
        Err(TransportError::Timeout(after)) => Err(TriplogError::timeout(
            operation,
            format!("no response within {}s", after.as_secs()),
        )),
        Err(TransportError::Connection(message)) => Err(TriplogError::timeout(operation, message)),
    }
}

fn error_details(data: &Value, status: u16) -> (String, Option<String>) {
    let message = ["msg", "message", "error_description", "error"]
        .iter()
        .find_map(|field| data.get(field).and_then(Value::as_str))
        .or_else(|| data.as_str())
        .map_or_else(|| format!("HTTP {}", status), str::to_string);

    let code = ["error_code", "code"]
        .iter()
        .find_map(|field| match data.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

    (message, code)
}

/// Authenticated client: every request passes the gate first
pub struct ApiClient {
    transport: ApiTransport,
    gate: RequestGate,
}

impl ApiClient {
    pub fn new(transport: ApiTransport, gate: RequestGate) -> Self {
        Self { transport, gate }
    }

    pub fn request(&self, method: Method, path: &str) -> TriplogResult<HttpRequest> {
        self.transport.request(method, path)
    }

    /// Gate, send, map
    pub async fn send(&self, request: HttpRequest) -> TriplogResult<Value> {
        let request = self.gate.before_request(request).await?;
        self.transport.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::ScriptedHttp;
    use serde_json::json;

    fn transport(http: Arc<ScriptedHttp>) -> ApiTransport {
        ApiTransport::new(http, "https://api.example.test/", "anon-key")
    }

    #[test]
    fn url_joins_without_double_slash() {
        let t = transport(Arc::new(ScriptedHttp::new()));
        assert_eq!(
            t.url("/rest/v1/trips").unwrap(),
            "https://api.example.test/rest/v1/trips"
        );
    }

    #[test]
    fn missing_base_url_is_a_config_error() {
        let t = ApiTransport::new(Arc::new(ScriptedHttp::new()), "", "k");
        assert_eq!(t.url("x").unwrap_err().kind(), ErrorKind::Config);
    }

    #[test]
    fn status_mapping() {
        let kind = |status| {
            map_response(
                "op",
                Ok(HttpResponse {
                    status,
                    data: Value::Null,
                }),
            )
            .unwrap_err()
            .kind()
        };
        for status in [400, 404, 409, 422, 429] {
            assert_eq!(kind(status), ErrorKind::InvalidRequest, "{}", status);
        }
        assert_eq!(kind(401), ErrorKind::NotAuthorized);
        assert_eq!(kind(403), ErrorKind::NotAuthorized);
        assert_eq!(kind(500), ErrorKind::InternalError);
        assert_eq!(kind(503), ErrorKind::InternalError);
    }

    #[test]
    fn transport_failures_are_timeouts() {
        let timeout = TransportError::Timeout(Duration::from_secs(15));
        let err = map_response("op", Err(timeout)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequestTimeout);

        let err = map_response("op", Err(TransportError::Connection("reset".into()))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequestTimeout);
        assert_eq!(err.operation(), Some("op"));
    }

    #[test]
    fn error_body_fields_are_kept() {
        let err = map_response(
            "insert_trips",
            Ok(HttpResponse {
                status: 409,
                data: json!({"code": "23505", "message": "duplicate key value"}),
            }),
        )
        .unwrap_err();

        let failure = err.remote().unwrap();
        assert_eq!(failure.message, "duplicate key value");
        assert_eq!(failure.code.as_deref(), Some("23505"));
        assert_eq!(failure.status, Some(409));
    }

    #[tokio::test]
    async fn execute_returns_data() {
        let http = Arc::new(ScriptedHttp::new());
        http.respond(200, json!([{"id": "t1"}]));
        let t = transport(http.clone());

        let request = t.request(Method::Get, "rest/v1/trips").unwrap();
        assert_eq!(request.timeout, DEFAULT_TIMEOUT);
        assert_eq!(t.execute(request).await.unwrap(), json!([{"id": "t1"}]));
        assert_eq!(http.requests().len(), 1);
    }
}
