//! Server-side collections.
//!
//! A [`ListEnvelope`] is a record tagged `list` that remembers the collection
//! URL it came from and the type of its items, so it can page, create and
//! retrieve against that same collection.

use std::ops::Deref;

use serde_json::{json, Value as Json};

use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::http::HttpMethod;
use crate::record::{Record, Value};
use crate::resource::encode_segment;
use crate::resources::LIST;
use crate::Params;

#[derive(Debug, Clone, PartialEq)]
pub struct ListEnvelope {
    record: Record,
}

impl ListEnvelope {
    /// An empty envelope for the collection at `url`.
    pub fn new(url: &str, item_type: Option<&str>, api_key: Option<&str>) -> Self {
        let payload = json!({
            "object": "list",
            "url": url,
            "count": 0,
            "item_type": item_type,
        });
        let payload = match payload {
            Json::Object(map) => map,
            _ => Params::new(),
        };
        ListEnvelope {
            record: crate::convert::global().construct(Some(&LIST), &payload, api_key),
        }
    }

    /// Wrap a collection response. Bare arrays get an envelope around them;
    /// objects are taken as the envelope itself.
    pub(crate) fn from_response(
        response: Json,
        url: &str,
        item_type: &str,
        api_key: &str,
    ) -> Result<Self> {
        let mut payload = match response {
            Json::Array(data) => {
                let mut payload = Params::new();
                payload.insert("object".to_owned(), json!("list"));
                payload.insert("url".to_owned(), json!(url));
                payload.insert("count".to_owned(), json!(data.len()));
                payload.insert("data".to_owned(), Json::Array(data));
                payload
            }
            Json::Object(map) => map,
            other => return Err(Error::unexpected_response("a list", &other)),
        };
        payload
            .entry("item_type")
            .or_insert_with(|| json!(item_type));
        payload.entry("url").or_insert_with(|| json!(url));
        Ok(ListEnvelope {
            record: crate::convert::global().construct(Some(&LIST), &payload, Some(api_key)),
        })
    }

    pub fn url(&self) -> Option<&str> {
        self.record.get_str("url")
    }

    pub fn item_type(&self) -> Option<&str> {
        self.record.get_str("item_type")
    }

    /// The items of this page, empty when the server sent none.
    pub fn data(&self) -> &[Value] {
        self.record
            .get("data")
            .and_then(Value::as_list)
            .unwrap_or_default()
    }

    /// The items that are records.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.data().iter().filter_map(Value::as_record)
    }

    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn into_record(self) -> Record {
        self.record
    }

    /// GET the collection again with `params`, returning a new page.
    pub fn all(&self, client: &ApiClient, params: Params) -> Result<ListEnvelope> {
        let url = self.require_url()?;
        let (response, used_key) =
            client.request(HttpMethod::Get, url, &params, self.record.api_key())?;
        ListEnvelope::from_response(response, url, self.item_type().unwrap_or_default(), &used_key)
    }

    /// POST a new item to the collection.
    pub fn create(&self, client: &ApiClient, params: Params) -> Result<Record> {
        let url = self.require_url()?;
        let (response, used_key) =
            client.request(HttpMethod::Post, url, &params, self.record.api_key())?;
        self.convert_item(response, &used_key)
    }

    /// GET one item of the collection by id.
    pub fn retrieve(&self, client: &ApiClient, id: &str, params: Params) -> Result<Record> {
        let url = format!("{}/{}", self.require_url()?, encode_segment(id));
        let (response, used_key) =
            client.request(HttpMethod::Get, &url, &params, self.record.api_key())?;
        self.convert_item(response, &used_key)
    }

    fn require_url(&self) -> Result<&str> {
        self.url()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| Error::invalid_request("list has no collection url", "url"))
    }

    fn convert_item(&self, response: Json, api_key: &str) -> Result<Record> {
        if !response.is_object() {
            return Err(Error::unexpected_response("an object", &response));
        }
        match crate::convert::convert(response, Some(api_key), self.item_type()) {
            Value::Record(record) => Ok(*record),
            other => Err(Error::unexpected_response("an object", &other.to_json())),
        }
    }
}

impl Deref for ListEnvelope {
    type Target = Record;

    fn deref(&self) -> &Record {
        &self.record
    }
}

impl TryFrom<Record> for ListEnvelope {
    type Error = Error;

    fn try_from(record: Record) -> Result<Self> {
        let is_list = record.resource_type().is_some_and(|r| r.name == LIST.name)
            || record.object_tag() == Some("list");
        if is_list {
            Ok(ListEnvelope { record })
        } else {
            Err(Error::unexpected_response("a list", &record.to_json()))
        }
    }
}

impl TryFrom<Value> for ListEnvelope {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Record(record) => ListEnvelope::try_from(*record),
            other => Err(Error::unexpected_response("a list", &other.to_json())),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{self, MERCHANT};

    fn charges() -> ListEnvelope {
        ListEnvelope::new(&format!("/v1/{MERCHANT}/charges"), Some("charge"), Some("listkey"))
    }

    #[test]
    fn new_envelope_is_empty() {
        let list = charges();
        assert!(list.is_empty());
        assert_eq!(list.item_type(), Some("charge"));
        assert_eq!(list.get_i64("count"), Some(0));
        assert_eq!(list.resource_type().map(|r| r.name), Some("list"));
        assert_eq!(list.unsaved_fields().count(), 0);
    }

    #[test]
    fn list_tag_converts_to_an_envelope() {
        let value = crate::convert::convert(
            json!({"object": "list", "url": "/v1/m/cards", "data": [{"id": "k1"}], "item_type": "card"}),
            None,
            None,
        );
        let list = ListEnvelope::try_from(value).unwrap();
        assert_eq!(list.len(), 1);
        let card = list.records().next().unwrap();
        assert_eq!(card.resource_type().map(|r| r.name), Some("card"));
    }

    #[test]
    fn other_records_are_not_envelopes() {
        let record = Record::construct_from(
            json!({"object": "charge"}).as_object().unwrap(),
            None,
        );
        assert!(ListEnvelope::try_from(record).is_err());
        assert!(ListEnvelope::try_from(Value::from("list")).is_err());
    }

    #[test]
    fn all_reuses_the_collection_url_and_key() {
        let (client, transport) = testing::client();
        transport.respond(200, json!([{"id": "ch1"}, {"id": "ch2"}]));
        let params = json!({"limit": 2}).as_object().cloned().unwrap();
        let page = charges().all(&client, params).unwrap();

        assert_eq!(transport.last_path(), format!("/v1/{MERCHANT}/charges?limit=2"));
        let auth = transport.last().header("Authorization").unwrap().to_owned();
        assert!(auth.starts_with("Basic "));
        assert_eq!(page.len(), 2);
        assert_eq!(page.api_key(), Some("listkey"));
        let ids: Vec<_> = page.records().filter_map(Record::id).collect();
        assert_eq!(ids, ["ch1", "ch2"]);
        assert!(page
            .records()
            .all(|r| r.resource_type().map(|t| t.name) == Some("charge")));
    }

    #[test]
    fn create_and_retrieve_target_the_collection() {
        let (client, transport) = testing::client();
        let list = charges();

        transport.respond(200, json!({"id": "ch9", "amount": 100}));
        let params = json!({"amount": 100}).as_object().cloned().unwrap();
        let created = list.create(&client, params).unwrap();
        assert_eq!(transport.last().method, HttpMethod::Post);
        assert_eq!(transport.last_path(), format!("/v1/{MERCHANT}/charges"));
        assert_eq!(created.resource_type().map(|r| r.name), Some("charge"));

        transport.respond(200, json!({"id": "ch 9"}));
        let fetched = list.retrieve(&client, "ch 9", Params::new()).unwrap();
        assert_eq!(transport.last_path(), format!("/v1/{MERCHANT}/charges/ch%209"));
        assert_eq!(fetched.id().as_deref(), Some("ch 9"));
    }

    #[test]
    fn non_object_items_are_rejected() {
        let (client, transport) = testing::client();
        transport.respond(200, json!([1, 2]));
        let err = charges().create(&client, Params::new()).unwrap_err();
        assert!(matches!(err, Error::Api(_)));
    }
}
