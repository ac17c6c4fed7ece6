//! Resource types and the URL convention derived from them.
//!
//! A [`ResourceType`] is plain data: the lowercase tag the API uses in the
//! `"object"` field, how its collection is scoped, and which capabilities it
//! composes. Paths follow
//! `/{version}/{merchant}/{name}s` or, under a customer,
//! `/{version}/{merchant}/customers/{customer}/{name}s`; instance paths append
//! the percent-encoded id.

use std::borrow::Cow;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value as Json;

use crate::config::{Config, API_PATH_VERSION};
use crate::error::{Error, Result};
use crate::Params;

/// Everything but RFC 3986 unreserved characters is escaped.
pub(crate) const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Where a resource's collection lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Under the merchant, or under a customer when a `customer` parameter is
    /// given.
    Merchant,
    /// Always under a customer. Instances find their customer through the
    /// retrieve parameters or their own `customer_id`/`customer` field.
    Customer,
    /// One object per merchant; no id in the path.
    Singleton,
}

/// Which verb-shaped operations a resource type supports. Retrieve and
/// refresh are always available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub list: bool,
    pub create: bool,
    pub update: bool,
    pub delete: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        list: false,
        create: false,
        update: false,
        delete: false,
    };

    pub const ALL: Capabilities = Capabilities {
        list: true,
        create: true,
        update: true,
        delete: true,
    };

    pub const fn list(mut self) -> Self {
        self.list = true;
        self
    }

    pub const fn create(mut self) -> Self {
        self.create = true;
        self
    }

    pub const fn update(mut self) -> Self {
        self.update = true;
        self
    }

    pub const fn delete(mut self) -> Self {
        self.delete = true;
        self
    }
}

/// A named category of server-side entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceType {
    /// Tag used in the `"object"` field, e.g. `bank_account`.
    pub name: &'static str,
    /// Collection segment when it is not simply `{name}s`.
    pub path: Option<&'static str>,
    pub scope: Scope,
    pub capabilities: Capabilities,
}

impl ResourceType {
    pub const fn new(name: &'static str, scope: Scope, capabilities: Capabilities) -> Self {
        Self {
            name,
            path: None,
            scope,
            capabilities,
        }
    }

    pub const fn with_path(mut self, path: &'static str) -> Self {
        self.path = Some(path);
        self
    }

    pub fn segment(&self) -> Cow<'static, str> {
        match self.path {
            Some(path) => Cow::Borrowed(path),
            None => Cow::Owned(format!("{}s", self.name)),
        }
    }

    pub(crate) fn require(&self, supported: bool, operation: &'static str) -> Result<()> {
        if supported {
            Ok(())
        } else {
            Err(Error::Unsupported {
                resource: self.name.to_owned(),
                operation,
            })
        }
    }

    /// Collection path, relative to the API base.
    pub fn collection_url(&self, config: &Config, customer: Option<&str>) -> Result<String> {
        if config.merchant_id.is_empty() {
            return Err(Error::Configuration(
                "no merchant id configured; set Config::merchant_id".to_owned(),
            ));
        }
        let merchant = encode_segment(&config.merchant_id);
        let segment = self.segment();
        let customer = customer.filter(|c| !c.is_empty());
        match (self.scope, customer) {
            (Scope::Singleton, _) | (Scope::Merchant, None) => {
                Ok(format!("/{API_PATH_VERSION}/{merchant}/{segment}"))
            }
            (Scope::Merchant | Scope::Customer, Some(customer)) => Ok(format!(
                "/{API_PATH_VERSION}/{merchant}/customers/{}/{segment}",
                encode_segment(customer)
            )),
            (Scope::Customer, None) => Err(Error::invalid_request(
                format!(
                    "Could not determine which URL to request: {} objects live under a \
                     customer and no customer id was given",
                    self.name
                ),
                "customer",
            )),
        }
    }

    /// Instance path. Singletons reuse the collection path.
    pub fn instance_url(
        &self,
        config: &Config,
        customer: Option<&str>,
        id: Option<&str>,
    ) -> Result<String> {
        let base = self.collection_url(config, customer)?;
        if self.scope == Scope::Singleton {
            return Ok(base);
        }
        match id.filter(|id| !id.is_empty()) {
            Some(id) => Ok(format!("{base}/{}", encode_segment(id))),
            None => Err(Error::invalid_request(
                format!(
                    "Could not determine which URL to request: {} instance has invalid ID: {id:?}",
                    self.name
                ),
                "id",
            )),
        }
    }
}

/// Percent-encode one path segment.
pub fn encode_segment(raw: &str) -> String {
    utf8_percent_encode(raw, PATH_SEGMENT).to_string()
}

/// String form of an identifier value. Ids are strings on the wire but
/// numbers are tolerated.
pub(crate) fn id_string(value: &Json) -> Option<String> {
    match value {
        Json::String(s) if !s.is_empty() => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The customer a parameter set scopes its request to, if any.
pub(crate) fn scoped_customer(params: &Params) -> Option<String> {
    params.get("customer").and_then(id_string)
}
