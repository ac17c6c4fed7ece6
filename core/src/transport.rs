//! Pluggable HTTP backend.
//!
//! The client only needs something that turns an [`HttpRequest`] into an
//! [`HttpResponse`]. [`UreqTransport`] is the blocking default; tests plug in
//! their own implementation.

use std::time::Duration;

use ureq::tls::TlsConfig;
use ureq::{Agent, RequestBuilder};

use crate::error::{Error, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(80);

/// Executes one HTTP exchange.
///
/// Implementations must return non-2xx responses as data; status
/// interpretation belongs to the client. Only failures that produce no
/// response at all are errors, and those should be [`Error::Connection`].
pub trait Transport: Send + Sync {
    /// Reported in the client user-agent metadata.
    fn name(&self) -> &'static str;

    fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Blocking transport backed by a shared `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new(verify_ssl_certs: bool) -> Self {
        let tls = TlsConfig::builder()
            .disable_verification(!verify_ssl_certs)
            .build();
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(REQUEST_TIMEOUT))
            .tls_config(tls)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Transport for UreqTransport {
    fn name(&self) -> &'static str {
        "ureq"
    }

    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let url = request.url.as_str();
        let body = request.body.as_deref().unwrap_or_default().as_bytes();
        let result = match request.method {
            HttpMethod::Get => with_headers(self.agent.get(url), &request.headers).call(),
            HttpMethod::Delete => with_headers(self.agent.delete(url), &request.headers).call(),
            HttpMethod::Post => with_headers(self.agent.post(url), &request.headers).send(body),
            HttpMethod::Put => with_headers(self.agent.put(url), &request.headers).send(body),
        };
        let mut response = result.map_err(|err| {
            tracing::warn!(url, error = %err, "transport failure");
            Error::Connection {
                message: format!(
                    "unexpected error communicating with Openpay. If this problem persists, \
                     contact support (network error: {err})"
                ),
            }
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_owned()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|err| Error::Connection {
                message: format!("failed to read response body: {err}"),
            })?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn with_headers<B>(mut builder: RequestBuilder<B>, headers: &[(String, String)]) -> RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}
