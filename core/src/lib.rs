//! Resource-object framework and blocking REST client for the Openpay API.
//!
//! # Overview
//! Server objects are held locally as [`Record`]s: dynamic field maps that
//! remember which fields were changed locally and which disappeared on the
//! last refresh. The [`convert`] module turns raw JSON into records typed by
//! their `"object"` tag, [`capability`] supplies the verb-shaped operations
//! (list, create, retrieve, refresh, save, delete), and [`ApiClient`] issues
//! the HTTP calls and maps failures onto typed [`Error`]s.
//!
//! # Design
//! - Building a request and interpreting a response are pure functions over
//!   [`HttpRequest`]/[`HttpResponse`]; the round-trip itself goes through the
//!   [`Transport`] trait, blocking `ureq` by default.
//! - A resource type is data ([`ResourceType`]): its tag, URL scope and
//!   capability set. The catalogue lives in [`resources`].
//! - Configuration is explicit ([`Config`] on the client) with an optional
//!   process-wide default for callers that prefer it.
//! - Records are not synchronized; give each thread its own.

pub mod capability;
pub mod client;
pub mod config;
pub mod convert;
pub mod error;
pub mod http;
pub mod list;
pub mod record;
pub mod resource;
pub mod resources;
pub mod transport;

#[cfg(test)]
mod testing;

/// Request parameters and raw JSON objects.
pub type Params = serde_json::Map<String, serde_json::Value>;

pub use capability::{Creatable, Deletable, Listable, Resource, Retrievable, Singleton, Updateable};
pub use client::ApiClient;
pub use config::{Config, Country};
pub use convert::Registry;
pub use error::{ApiFailure, Error, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use list::ListEnvelope;
pub use record::{Record, Value};
pub use resource::{Capabilities, ResourceType, Scope};
pub use transport::{Transport, UreqTransport};
