//! Error types for the Openpay API client.
//!
//! # Design
//! Failures reported by the server are classified by HTTP status into one
//! variant per kind the API distinguishes (401, 402, 400/404, everything
//! else). Each of those carries an [`ApiFailure`] holding the raw body, the
//! status and the parsed JSON so callers can inspect exactly what came back.
//! Misuse of a local record (empty-string assignment, reading a field that is
//! not there) gets dedicated variants so it never looks like a server error.

use serde_json::Value as Json;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// What the server (or the transport) said about a failed request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiFailure {
    pub message: String,
    pub http_body: Option<String>,
    pub http_status: Option<u16>,
    pub json_body: Option<Json>,
}

impl ApiFailure {
    /// A failure raised locally, before or without any HTTP response.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub(crate) fn from_response(
        message: impl Into<String>,
        body: &str,
        status: u16,
        json: Option<Json>,
    ) -> Self {
        Self {
            message: message.into(),
            http_body: Some(body.to_owned()),
            http_status: Some(status),
            json_body: json,
        }
    }
}

/// Errors returned by the client, the record model and the capabilities.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or unusable local configuration (merchant id, country, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request never produced a usable HTTP exchange.
    #[error("connection error: {message}")]
    Connection { message: String },

    /// HTTP 401, or no API key available before sending.
    #[error("authentication error: {}", .0.message)]
    Authentication(ApiFailure),

    /// HTTP 400 or 404, or a request that cannot be addressed (no id).
    #[error("invalid request: {}", .failure.message)]
    InvalidRequest {
        failure: ApiFailure,
        param: Option<String>,
    },

    /// HTTP 402: the payment method was declined.
    #[error("card error: {}", .failure.message)]
    Card {
        failure: ApiFailure,
        code: Option<i64>,
        param: Option<String>,
    },

    /// Any other non-2xx status, or a body that is not JSON.
    #[error("API error: {}", .0.message)]
    Api(ApiFailure),

    /// Empty strings mean "no value"; clearing a field is done with null.
    #[error("cannot set {field} to an empty string; set it to null to clear the field")]
    EmptyValue { field: String },

    #[error("no such field: {field}")]
    MissingField { field: String },

    /// The field existed before the last full refresh but the server did not
    /// return it.
    #[error(
        "no such field: {field}. The {field} field was set in the past but wiped when the record \
         was refreshed from the API response, probably as a result of a save(). Fields currently \
         available: {}",
        .available.join(", ")
    )]
    TransientField {
        field: String,
        available: Vec<String>,
    },

    /// The resource type does not compose the requested capability.
    #[error("{resource} does not support {operation}")]
    Unsupported {
        resource: String,
        operation: &'static str,
    },
}

impl Error {
    pub(crate) fn invalid_request(message: impl Into<String>, param: &str) -> Self {
        Error::InvalidRequest {
            failure: ApiFailure::new(message),
            param: Some(param.to_owned()),
        }
    }

    pub(crate) fn unexpected_response(what: &str, json: &Json) -> Self {
        Error::Api(ApiFailure {
            message: format!("expected {what} in API response, got: {json}"),
            json_body: Some(json.clone()),
            ..ApiFailure::default()
        })
    }

    fn failure(&self) -> Option<&ApiFailure> {
        match self {
            Error::Authentication(failure) | Error::Api(failure) => Some(failure),
            Error::InvalidRequest { failure, .. } | Error::Card { failure, .. } => Some(failure),
            _ => None,
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        self.failure().and_then(|f| f.http_status)
    }

    pub fn http_body(&self) -> Option<&str> {
        self.failure().and_then(|f| f.http_body.as_deref())
    }

    pub fn json_body(&self) -> Option<&Json> {
        self.failure().and_then(|f| f.json_body.as_ref())
    }

    /// Machine-readable decline code of a card error.
    pub fn code(&self) -> Option<i64> {
        match self {
            Error::Card { code, .. } => *code,
            _ => None,
        }
    }

    /// The offending input of a card or invalid-request error, when known.
    pub fn param(&self) -> Option<&str> {
        match self {
            Error::Card { param, .. } | Error::InvalidRequest { param, .. } => param.as_deref(),
            _ => None,
        }
    }
}
