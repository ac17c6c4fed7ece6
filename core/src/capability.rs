//! Verb-shaped operations composed per resource type.
//!
//! # Design
//! Each capability is a free function taking the resource type explicitly:
//! [`list`], [`create`], [`retrieve`], [`refresh`], [`save`], [`delete`]. They
//! build the URL from the type's convention, issue one request through the
//! [`ApiClient`], and hand the response to the converter. A record is only
//! mutated after its request succeeded, so a failed call leaves it as it was.
//!
//! The traits ([`Listable`], [`Creatable`], ...) are the typed front door:
//! a marker type implements the ones its resource composes and gets the
//! operations as associated functions.

use serde_json::{json, Value as Json};

use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::http::HttpMethod;
use crate::list::ListEnvelope;
use crate::record::{Record, Value};
use crate::resource::{id_string, scoped_customer, ResourceType, Scope};
use crate::Params;

/// A resource type known at compile time.
pub trait Resource {
    const TYPE: &'static ResourceType;
}

pub trait Retrievable: Resource {
    fn retrieve(client: &ApiClient, id: &str, params: Params) -> Result<Record> {
        retrieve(client, Self::TYPE, Some(id), params, None)
    }
}

pub trait Singleton: Resource {
    fn retrieve(client: &ApiClient) -> Result<Record> {
        retrieve(client, Self::TYPE, None, Params::new(), None)
    }
}

pub trait Listable: Resource {
    fn all(client: &ApiClient, params: Params) -> Result<ListEnvelope> {
        list(client, Self::TYPE, params, None)
    }
}

pub trait Creatable: Resource {
    /// Adjusts parameters after the URL is built and before they are sent.
    fn clean_params(_params: &mut Params) {}

    fn create(client: &ApiClient, params: Params) -> Result<Record> {
        create(client, Self::TYPE, params, None, Self::clean_params)
    }
}

pub trait Updateable: Resource {
    fn save(client: &ApiClient, record: &mut Record) -> Result<()> {
        save(client, record)
    }
}

pub trait Deletable: Resource {
    fn delete(client: &ApiClient, record: &mut Record, params: Params) -> Result<()> {
        delete(client, record, params)
    }
}

/// GET the collection and wrap the result in a list envelope.
pub fn list(
    client: &ApiClient,
    resource: &'static ResourceType,
    params: Params,
    api_key: Option<&str>,
) -> Result<ListEnvelope> {
    resource.require(resource.capabilities.list, "list")?;
    let customer = scoped_customer(&params);
    let url = resource.collection_url(client.config(), customer.as_deref())?;
    let (response, used_key) = client.request(HttpMethod::Get, &url, &params, api_key)?;
    ListEnvelope::from_response(response, &url, resource.name, &used_key)
}

/// POST to the collection and convert the created object.
pub fn create(
    client: &ApiClient,
    resource: &'static ResourceType,
    mut params: Params,
    api_key: Option<&str>,
    clean: impl FnOnce(&mut Params),
) -> Result<Record> {
    resource.require(resource.capabilities.create, "create")?;
    let customer = scoped_customer(&params);
    let url = resource.collection_url(client.config(), customer.as_deref())?;
    clean(&mut params);
    let (response, used_key) = client.request(HttpMethod::Post, &url, &params, api_key)?;
    into_record(response, &used_key, resource)
}

/// Construct an instance with `id` and load it from the server.
pub fn retrieve(
    client: &ApiClient,
    resource: &'static ResourceType,
    id: Option<&str>,
    params: Params,
    api_key: Option<&str>,
) -> Result<Record> {
    let mut record = Record::typed(resource, id, api_key).with_retrieve_params(params);
    refresh(client, &mut record)?;
    Ok(record)
}

/// GET the instance URL and fully refresh the record.
pub fn refresh(client: &ApiClient, record: &mut Record) -> Result<()> {
    let url = instance_url(client, record)?;
    let params = record.retrieve_params().clone();
    let (response, used_key) = client.request(HttpMethod::Get, &url, &params, record.api_key())?;
    refresh_from_response(record, &response, &used_key)
}

/// PUT the unsaved changes and fully refresh from the response. Nothing is
/// sent when there is nothing to save.
pub fn save(client: &ApiClient, record: &mut Record) -> Result<()> {
    let resource = typed(record)?;
    resource.require(resource.capabilities.update, "update")?;

    let mut params = update_payload(record);
    if params.is_empty() {
        tracing::debug!(
            resource = resource.name,
            id = ?record.id(),
            "save skipped, no unsaved fields"
        );
        return Ok(());
    }
    if record.contains_key("balance") && record.contains_key("status") {
        params.insert("balance".to_owned(), Json::Null);
    }
    params.insert("status".to_owned(), Json::Null);

    let url = instance_url(client, record)?;
    let (response, used_key) = client.request(HttpMethod::Put, &url, &params, record.api_key())?;
    refresh_from_response(record, &response, &used_key)
}

/// DELETE the instance and fully refresh from what the server returns.
pub fn delete(client: &ApiClient, record: &mut Record, params: Params) -> Result<()> {
    let resource = typed(record)?;
    resource.require(resource.capabilities.delete, "delete")?;
    let url = instance_url(client, record)?;
    let (response, used_key) =
        client.request(HttpMethod::Delete, &url, &params, record.api_key())?;
    refresh_from_response(record, &response, &used_key)
}

/// POST to `<instance>/<action>` and fully refresh, for actions such as
/// refund or capture.
pub fn instance_action(
    client: &ApiClient,
    record: &mut Record,
    action: &str,
    params: Params,
) -> Result<()> {
    let url = format!("{}/{action}", instance_url(client, record)?);
    let (response, used_key) = client.request(HttpMethod::Post, &url, &params, record.api_key())?;
    refresh_from_response(record, &response, &used_key)
}

/// The parameters `save` would send, before the status conventions are
/// applied: every unsaved field except `id`, nulls as empty strings, and the
/// metadata diff.
pub fn update_payload(record: &Record) -> Params {
    let mut params = serialize_unsaved(record);
    if let Some(metadata) = record.object("metadata").filter(|m| !m.is_empty()) {
        let diff = if record.is_unsaved("metadata") {
            replace_metadata(metadata, record.previous_metadata())
        } else {
            serialize_unsaved(metadata)
        };
        if diff.is_empty() {
            params.remove("metadata");
        } else {
            params.insert("metadata".to_owned(), Json::Object(diff));
        }
    }
    params
}

/// Path of the record's instance, relative to the API base.
pub fn instance_url(client: &ApiClient, record: &Record) -> Result<String> {
    let resource = typed(record)?;
    let mut customer = scoped_customer(record.retrieve_params());
    if customer.is_none() && resource.scope == Scope::Customer {
        customer = ["customer_id", "customer"]
            .iter()
            .find_map(|field| record.get(field).map(Value::to_json).as_ref().and_then(id_string));
    }
    let id = record.id();
    resource.instance_url(client.config(), customer.as_deref(), id.as_deref())
}

fn typed(record: &Record) -> Result<&'static ResourceType> {
    record.resource_type().ok_or_else(|| Error::Unsupported {
        resource: record.object_tag().unwrap_or("untyped record").to_owned(),
        operation: "instance requests",
    })
}

fn serialize_unsaved(record: &Record) -> Params {
    record
        .unsaved_fields()
        .filter(|field| *field != "id")
        .filter_map(|field| {
            let value = match record.get(field)? {
                Value::Null => json!(""),
                value => value.to_json(),
            };
            Some((field.to_owned(), value))
        })
        .collect()
}

/// Wholesale metadata: the new object, plus an empty-string marker for every
/// key the server had that the new object drops.
fn replace_metadata(metadata: &Record, previous: &Json) -> Params {
    let mut update = match metadata.to_json() {
        Json::Object(map) => map,
        _ => Params::new(),
    };
    if let Json::Object(previous) = previous {
        for key in previous.keys() {
            if !metadata.contains_key(key) {
                update.insert(key.clone(), json!(""));
            }
        }
    }
    update
}

fn refresh_from_response(record: &mut Record, response: &Json, api_key: &str) -> Result<()> {
    let payload = response
        .as_object()
        .ok_or_else(|| Error::unexpected_response("an object", response))?;
    record.refresh_from(payload, Some(api_key), false);
    Ok(())
}

/// Convert a single-object response. Untagged objects take `resource` as
/// their type; tagged ones are dispatched through the registry.
pub(crate) fn into_record(
    response: Json,
    api_key: &str,
    resource: &'static ResourceType,
) -> Result<Record> {
    let Json::Object(payload) = response else {
        return Err(Error::unexpected_response("an object", &response));
    };
    let registry = crate::convert::global();
    let resource = match payload.get("object").and_then(Json::as_str) {
        Some(tag) if !tag.is_empty() => registry.lookup(tag),
        _ => Some(resource),
    };
    Ok(registry.construct(resource, &payload, Some(api_key)))
}
