//! The dynamic record: a key-value object with dirty tracking.
//!
//! # Design
//! Server entities are not mapped onto fixed structs. A [`Record`] is an
//! ordered map from field name to [`Value`] that remembers which fields were
//! changed locally (unsaved) and which disappeared in the last full refresh
//! (transient). [`Record::get`] and [`Record::set`] are the named accessors;
//! [`Record::field`] is the indexed accessor and reports transient fields
//! with a dedicated error. Both go through the same backing map.
//!
//! Fields cannot be deleted. Setting an empty string is rejected because the
//! API reads empty strings as "no value"; callers clear a field with
//! [`Value::Null`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::{Number, Value as Json};

use crate::convert::{self, Registry};
use crate::error::{Error, Result};
use crate::list::ListEnvelope;
use crate::resource::ResourceType;
use crate::Params;

/// A field value: a JSON scalar, a nested record, or a list of values.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<Value>),
    Record(Box<Record>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => Json::Number(n.clone()),
            Value::String(s) => Json::String(s.clone()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Record(record) => record.to_json(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(Box::new(record))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Raw JSON goes through the converter, so tagged objects come out typed.
impl From<Json> for Value {
    fn from(json: Json) -> Self {
        convert::convert(json, None, None)
    }
}

/// A locally held API object.
#[derive(Debug, Clone, Default)]
pub struct Record {
    resource: Option<&'static ResourceType>,
    fields: BTreeMap<String, Value>,
    unsaved: BTreeSet<String>,
    transient: BTreeSet<String>,
    api_key: Option<String>,
    retrieve_params: Params,
    previous_metadata: Json,
    children: BTreeMap<&'static str, ListEnvelope>,
}

/// Records compare by type and content; bookkeeping is ignored.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.resource.map(|r| r.name) == other.resource.map(|r| r.name)
            && self.fields == other.fields
    }
}

impl Record {
    /// An untyped record, optionally carrying an id and an API key.
    pub fn new(id: Option<&str>, api_key: Option<&str>) -> Self {
        let mut record = Record {
            api_key: api_key.map(str::to_owned),
            ..Record::default()
        };
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            record.fields.insert("id".to_owned(), Value::from(id));
            record.unsaved.insert("id".to_owned());
        }
        record
    }

    /// A record of a registered resource type.
    pub fn typed(resource: &'static ResourceType, id: Option<&str>, api_key: Option<&str>) -> Self {
        Record {
            resource: Some(resource),
            ..Record::new(id, api_key)
        }
    }

    /// Parameters replayed by refresh (and used to locate the instance).
    pub fn with_retrieve_params(mut self, params: Params) -> Self {
        self.retrieve_params = params;
        self
    }

    /// Build a record from a payload: create, then fully refresh.
    pub fn construct_from(payload: &Params, api_key: Option<&str>) -> Self {
        convert::global().construct(None, payload, api_key)
    }

    pub fn resource_type(&self) -> Option<&'static ResourceType> {
        self.resource
    }

    pub(crate) fn set_resource_type(&mut self, resource: Option<&'static ResourceType>) {
        self.resource = resource;
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn retrieve_params(&self) -> &Params {
        &self.retrieve_params
    }

    /// The `metadata` object as of the last refresh, or null.
    pub fn previous_metadata(&self) -> &Json {
        &self.previous_metadata
    }

    pub fn id(&self) -> Option<String> {
        match self.fields.get("id")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// The `"object"` type tag the server sent.
    pub fn object_tag(&self) -> Option<&str> {
        self.fields.get("object").and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_or<'a>(&'a self, field: &str, default: &'a Value) -> &'a Value {
        self.fields.get(field).unwrap_or(default)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    /// Indexed access: fails for absent fields, explaining when the field
    /// was wiped by a refresh.
    pub fn field(&self, field: &str) -> Result<&Value> {
        if let Some(value) = self.fields.get(field) {
            return Ok(value);
        }
        if self.transient.contains(field) {
            Err(Error::TransientField {
                field: field.to_owned(),
                available: self.fields.keys().cloned().collect(),
            })
        } else {
            Err(Error::MissingField {
                field: field.to_owned(),
            })
        }
    }

    /// Nested record stored under `field`.
    pub fn object(&self, field: &str) -> Option<&Record> {
        self.fields.get(field).and_then(Value::as_record)
    }

    /// Mutable nested record, for per-key edits such as metadata.
    pub fn object_mut(&mut self, field: &str) -> Option<&mut Record> {
        self.fields.get_mut(field).and_then(Value::as_record_mut)
    }

    /// Store a value and mark the field unsaved.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if matches!(&value, Value::String(s) if s.is_empty()) {
            return Err(Error::EmptyValue {
                field: field.to_owned(),
            });
        }
        self.fields.insert(field.to_owned(), value);
        self.unsaved.insert(field.to_owned());
        Ok(())
    }

    /// The current value of `field`, inserting `value` first when absent.
    pub fn set_default(&mut self, field: &str, value: impl Into<Value>) -> Result<&Value> {
        if !self.fields.contains_key(field) {
            self.set(field, value)?;
        }
        self.field(field)
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn is_unsaved(&self, field: &str) -> bool {
        self.unsaved.contains(field)
    }

    pub fn unsaved_fields(&self) -> impl Iterator<Item = &str> {
        self.unsaved.iter().map(String::as_str)
    }

    pub fn is_transient(&self, field: &str) -> bool {
        self.transient.contains(field)
    }

    /// Replace state with a server payload.
    ///
    /// A full refresh clears every field and the unsaved set; fields missing
    /// from `payload` become transient. A partial refresh touches only the
    /// fields in `payload` and drops exactly those from the unsaved set.
    pub fn refresh_from(&mut self, payload: &Params, api_key: Option<&str>, partial: bool) {
        let registry = convert::global();
        self.refresh_with(&registry, payload, api_key, partial);
    }

    pub(crate) fn refresh_with(
        &mut self,
        registry: &Registry,
        payload: &Params,
        api_key: Option<&str>,
        partial: bool,
    ) {
        if let Some(key) = api_key {
            self.api_key = Some(key.to_owned());
        }

        if partial {
            self.unsaved.retain(|field| !payload.contains_key(field));
        } else {
            let removed: Vec<String> = self
                .fields
                .keys()
                .filter(|field| !payload.contains_key(*field))
                .cloned()
                .collect();
            self.transient.extend(removed);
            self.unsaved.clear();
            self.fields.clear();
        }
        self.transient.retain(|field| !payload.contains_key(field));

        // `item_type` names the type of a list's items, so it only applies to `data`.
        let item_type = payload.get("item_type").and_then(Json::as_str);
        let api_key = self.api_key.clone();
        for (field, value) in payload {
            let hint = if field == "data" { item_type } else { None };
            let value = registry.convert(value.clone(), api_key.as_deref(), hint);
            self.fields.insert(field.clone(), value);
        }

        self.previous_metadata = payload.get("metadata").cloned().unwrap_or(Json::Null);
    }

    /// The memoized child collection stored under `key`, built on first use.
    pub(crate) fn child_list(
        &mut self,
        key: &'static str,
        build: impl FnOnce(&Record) -> Result<ListEnvelope>,
    ) -> Result<&ListEnvelope> {
        if !self.children.contains_key(key) {
            let list = build(self)?;
            self.children.insert(key, list);
        }
        Ok(&self.children[key])
    }

    /// Structural JSON of the fields, without bookkeeping.
    pub fn to_json(&self) -> Json {
        Json::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Pretty JSON with sorted keys.
    pub fn as_json(&self) -> String {
        serde_json::to_string_pretty(&self.to_json()).unwrap_or_else(|_| "{}".to_owned())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_json())
    }
}
