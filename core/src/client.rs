//! The request client: credentials, encoding and status classification.
//!
//! # Design
//! `ApiClient` keeps building a request apart from interpreting the
//! response. [`ApiClient::build_request`] and
//! [`interpret_response`] are pure; [`ApiClient::request`] joins them through
//! the configured [`Transport`]. Each call issues exactly one HTTP request
//! and never retries.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use percent_encoding::{utf8_percent_encode, AsciiSet};
use serde_json::{json, Value as Json};

use crate::config::Config;
use crate::error::{ApiFailure, Error, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::resource::PATH_SEGMENT;
use crate::transport::{Transport, UreqTransport};
use crate::Params;

const BINDINGS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Query keys keep their bracket syntax readable.
const QUERY_COMPONENT: &AsciiSet = &PATH_SEGMENT.remove(b'[').remove(b']');

/// Blocking client for the Openpay REST API.
///
/// Cloning is cheap; the transport is shared.
#[derive(Clone)]
pub struct ApiClient {
    config: Config,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .field("transport", &self.transport.name())
            .finish()
    }
}

impl ApiClient {
    pub fn new(config: Config) -> Self {
        let transport = Arc::new(UreqTransport::new(config.verify_ssl_certs));
        Self { config, transport }
    }

    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Client over the process-wide configuration.
    pub fn from_global() -> Result<Self> {
        Ok(Self::new(Config::global()?))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Same transport, different secret key.
    pub fn with_api_key(&self, api_key: impl Into<String>) -> Self {
        Self {
            config: self.config.clone().with_api_key(api_key),
            transport: Arc::clone(&self.transport),
        }
    }

    /// The key a request would authenticate with: an explicit override, else
    /// the configured one.
    pub fn resolve_api_key<'a>(&'a self, override_key: Option<&'a str>) -> Result<&'a str> {
        override_key
            .or(self.config.api_key.as_deref())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                Error::Authentication(ApiFailure::new(
                    "No API key provided. (HINT: set your API key with Config::with_api_key or \
                     the OPENPAY_API_KEY environment variable). API keys are generated from the \
                     Openpay dashboard.",
                ))
            })
    }

    /// Build the request for `path` (relative to the API base).
    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        params: &Params,
        api_key: &str,
    ) -> Result<HttpRequest> {
        let mut url = format!("{}{}", self.config.api_base(), path);
        let body = if method.has_body() {
            Some(serde_json::to_string(params).map_err(|err| {
                Error::Api(ApiFailure::new(format!("could not encode request parameters: {err}")))
            })?)
        } else {
            let query = encode_query(params);
            if !query.is_empty() {
                url.push(if url.contains('?') { '&' } else { '?' });
                url.push_str(&query);
            }
            None
        };

        let client_agent = json!({
            "bindings_version": BINDINGS_VERSION,
            "lang": "rust",
            "publisher": "openpay",
            "httplib": self.transport.name(),
            "platform": format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
        });
        let credentials = STANDARD.encode(format!("{api_key}:"));
        let mut headers = vec![
            ("Authorization".to_owned(), format!("Basic {credentials}")),
            (
                "User-Agent".to_owned(),
                format!("Openpay/v1 RustBindings/{BINDINGS_VERSION}"),
            ),
            ("X-Openpay-Client-User-Agent".to_owned(), client_agent.to_string()),
            ("content-type".to_owned(), "application/json".to_owned()),
        ];
        if let Some(version) = &self.config.api_version {
            headers.push(("Openpay-Version".to_owned(), version.clone()));
        }

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    /// Issue one API call. Returns the parsed body and the key that was used.
    pub fn request(
        &self,
        method: HttpMethod,
        path: &str,
        params: &Params,
        api_key: Option<&str>,
    ) -> Result<(Json, String)> {
        let api_key = self.resolve_api_key(api_key)?.to_owned();
        let request = self.build_request(method, path, params, &api_key)?;
        let response = self.transport.send(&request)?;
        tracing::info!(
            method = %method,
            url = %request.url,
            status = response.status,
            "API request returned"
        );
        tracing::debug!(body = %response.body, "API response body");
        let json = interpret_response(&response)?;
        Ok((json, api_key))
    }

    /// [`ApiClient::request`] with the method given by name.
    pub fn request_raw(
        &self,
        method: &str,
        path: &str,
        params: &Params,
        api_key: Option<&str>,
    ) -> Result<(Json, String)> {
        self.request(method.parse()?, path, params, api_key)
    }
}

/// Parse a response body and map non-2xx statuses to typed errors.
///
/// A 204 is an empty object. Any body that is not JSON is an [`Error::Api`]
/// carrying the raw body and status.
pub fn interpret_response(response: &HttpResponse) -> Result<Json> {
    let status = response.status;
    let json = if status == 204 {
        Json::Object(Params::new())
    } else {
        serde_json::from_str(&response.body).map_err(|_| {
            Error::Api(ApiFailure::from_response(
                format!(
                    "Invalid response body from API: {} (HTTP response code was {status})",
                    response.body
                ),
                &response.body,
                status,
                None,
            ))
        })?
    };
    if (200..300).contains(&status) {
        Ok(json)
    } else {
        Err(api_error(&response.body, status, json))
    }
}

fn api_error(body: &str, status: u16, json: Json) -> Error {
    let description = json
        .get("description")
        .and_then(Json::as_str)
        .unwrap_or("unknown error")
        .to_owned();
    let error_code = json.get("error_code").cloned().unwrap_or(Json::Null);
    let request_id = json
        .get("request_id")
        .and_then(Json::as_str)
        .map(str::to_owned);
    let with_code = format!("{description}, error code: {error_code}");

    match status {
        400 | 404 => Error::InvalidRequest {
            failure: ApiFailure::from_response(with_code, body, status, Some(json)),
            param: request_id,
        },
        401 => Error::Authentication(ApiFailure::from_response(
            description,
            body,
            status,
            Some(json),
        )),
        402 => Error::Card {
            code: numeric_code(&error_code),
            failure: ApiFailure::from_response(description, body, status, Some(json)),
            param: request_id,
        },
        _ => Error::Api(ApiFailure::from_response(with_code, body, status, Some(json))),
    }
}

fn numeric_code(code: &Json) -> Option<i64> {
    match code {
        Json::Number(n) => n.as_i64(),
        Json::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Encode parameters as a query string. Nested objects flatten to
/// `key[sub]=value`, arrays to repeated `key[]=value`; nulls are dropped.
pub fn encode_query(params: &Params) -> String {
    let mut pairs = Vec::new();
    for (key, value) in params {
        flatten(key.clone(), value, &mut pairs);
    }
    pairs
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                utf8_percent_encode(key, QUERY_COMPONENT),
                utf8_percent_encode(value, QUERY_COMPONENT)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn flatten(key: String, value: &Json, out: &mut Vec<(String, String)>) {
    match value {
        Json::Null => {}
        Json::Object(map) => {
            for (sub, value) in map {
                flatten(format!("{key}[{sub}]"), value, out);
            }
        }
        Json::Array(items) => {
            for item in items {
                flatten(format!("{key}[]"), item, out);
            }
        }
        Json::String(s) => out.push((key, s.clone())),
        other => out.push((key, other.to_string())),
    }
}
