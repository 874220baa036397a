//! HTTP seam for the messaging API.

use std::time::Duration;

use serde_json::Value;

use crate::error::TransportError;

/// Status and body of a completed HTTP exchange, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one authenticated JSON POST.
///
/// Implementations must return `Ok` for every response that carries an HTTP
/// status, including 4xx/5xx; `Err` is reserved for requests that never got
/// a response.
pub trait MessagingClient {
    fn post_json(&self, url: &str, token: &str, body: &Value)
        -> Result<HttpResponse, TransportError>;
}

/// Blocking [`MessagingClient`] backed by a `ureq` agent.
pub struct UreqMessagingClient {
    agent: ureq::Agent,
}

impl UreqMessagingClient {
    pub const TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Self::TIMEOUT)
            .user_agent(concat!("pagepush/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

impl Default for UreqMessagingClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MessagingClient for UreqMessagingClient {
    fn post_json(
        &self,
        url: &str,
        token: &str,
        body: &Value,
    ) -> Result<HttpResponse, TransportError> {
        let result = self
            .agent
            .post(url)
            .set("Authorization", &format!("Bearer {token}"))
            .send_json(body);

        match result {
            Ok(response) => {
                let status = response.status();
                let body = response.into_string().unwrap_or_default();
                Ok(HttpResponse { status, body })
            }
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                Ok(HttpResponse { status, body })
            }
            Err(ureq::Error::Transport(transport)) => Err(TransportError(transport.to_string())),
        }
    }
}
