//! Blocking `ureq` transport driven from the async runtime

use super::{HttpClient, HttpRequest, HttpResponse, Method, TransportError, DEFAULT_TIMEOUT};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Production transport.
///
/// Requests run on the blocking pool; the caller's timeout is enforced both
/// by the agent and by the runtime.
#[derive(Clone)]
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    /// Create a client whose agent gives up after `timeout`
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Default for UreqClient {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

fn decorate<B>(
    mut builder: ureq::RequestBuilder<B>,
    request: &HttpRequest,
) -> ureq::RequestBuilder<B> {
    for (key, value) in &request.query {
        builder = builder.query(key, value);
    }
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn map_error(error: ureq::Error, timeout: Duration) -> TransportError {
    match error {
        ureq::Error::Timeout(_) => TransportError::Timeout(timeout),
        ureq::Error::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => {
            TransportError::Timeout(timeout)
        }
        other => TransportError::Connection(other.to_string()),
    }
}

fn execute(agent: &ureq::Agent, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
    let body = match &request.body {
        Some(value) => value.to_string(),
        None => String::new(),
    };

    let result = match request.method {
        Method::Get => decorate(agent.get(&request.url), request).call(),
        Method::Delete => decorate(agent.delete(&request.url), request).call(),
        Method::Post => decorate(agent.post(&request.url), request).send(body),
        Method::Put => decorate(agent.put(&request.url), request).send(body),
        Method::Patch => decorate(agent.patch(&request.url), request).send(body),
    };

    let mut response = result.map_err(|e| map_error(e, request.timeout))?;
    let status = response.status().as_u16();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|e| map_error(e, request.timeout))?;

    Ok(HttpResponse::from_text(status, &text))
}

#[async_trait]
impl HttpClient for UreqClient {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!("{} {}", request.method, request.url);

        let agent = self.agent.clone();
        let owned = request.clone();
        let task = tokio::task::spawn_blocking(move || execute(&agent, &owned));

        match tokio::time::timeout(request.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(TransportError::Connection(format!(
                "transport task failed: {}",
                join
            ))),
            Err(_) => Err(TransportError::Timeout(request.timeout)),
        }
    }
}
