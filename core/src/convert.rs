//! Conversion of raw JSON into records, dispatched on the `"object"` tag.
//!
//! # Design
//! Server payloads describe their own type through the `"object"` field. The
//! [`Registry`] is the dispatch table from that tag to a [`ResourceType`];
//! unknown or missing tags fall back to an untyped record, never an error.
//! The built-in catalogue is registered on first use of the global registry,
//! and callers may add their own types at start-up with [`register`].

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use serde_json::Value as Json;

use crate::record::{Record, Value};
use crate::resource::ResourceType;
use crate::resources;
use crate::Params;

static GLOBAL: LazyLock<RwLock<Arc<Registry>>> =
    LazyLock::new(|| RwLock::new(Arc::new(Registry::with_builtin())));

/// Tag-to-type dispatch table.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    types: HashMap<&'static str, &'static ResourceType>,
}

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding every resource type this crate ships.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        for resource in resources::BUILTIN {
            registry.register(*resource);
        }
        registry
    }

    /// Adds `resource` under its name, replacing any type with the same tag.
    pub fn register(&mut self, resource: &'static ResourceType) {
        self.types.insert(resource.name, resource);
    }

    /// Exact, case-sensitive lookup.
    pub fn lookup(&self, tag: &str) -> Option<&'static ResourceType> {
        self.types.get(tag).copied()
    }

    /// Turn raw JSON into a [`Value`].
    ///
    /// Arrays convert element-wise with the same hint. Objects become records
    /// typed by their `"object"` tag, or by `hint` when the tag is missing.
    /// Scalars pass through.
    pub fn convert(&self, value: Json, api_key: Option<&str>, hint: Option<&str>) -> Value {
        match value {
            Json::Array(items) => Value::List(
                items
                    .into_iter()
                    .map(|item| self.convert(item, api_key, hint))
                    .collect(),
            ),
            Json::Object(map) => {
                let tag = match map.get("object") {
                    Some(Json::String(tag)) if !tag.is_empty() => Some(tag.as_str()),
                    Some(Json::String(_) | Json::Null) | None => hint,
                    Some(_) => None,
                };
                let resource = tag.and_then(|tag| self.lookup(tag));
                Value::from(self.construct(resource, &map, api_key))
            }
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n),
            Json::String(s) => Value::String(s),
        }
    }

    /// Create a record of `resource` and fully refresh it from `payload`.
    pub fn construct(
        &self,
        resource: Option<&'static ResourceType>,
        payload: &Params,
        api_key: Option<&str>,
    ) -> Record {
        let id = payload.get("id").and_then(Json::as_str);
        let mut record = Record::new(id, api_key);
        record.set_resource_type(resource);
        record.refresh_with(self, payload, api_key, false);
        record
    }
}

/// Snapshot of the process-wide registry.
pub fn global() -> Arc<Registry> {
    Arc::clone(&GLOBAL.read().unwrap_or_else(PoisonError::into_inner))
}

/// Add a resource type to the process-wide registry.
pub fn register(resource: &'static ResourceType) {
    let mut guard = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
    Arc::make_mut(&mut guard).register(resource);
}

/// [`Registry::convert`] against the process-wide registry.
pub fn convert(value: Json, api_key: Option<&str>, hint: Option<&str>) -> Value {
    global().convert(value, api_key, hint)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::resource::{Capabilities, Scope};

    static GADGET: ResourceType = ResourceType::new("gadget", Scope::Merchant, Capabilities::ALL);

    fn type_name(value: &Value) -> Option<&'static str> {
        value.as_record().and_then(Record::resource_type).map(|r| r.name)
    }

    #[test]
    fn nested_objects_are_typed_by_tag() {
        let sample = json!({
            "foo": "bar",
            "adict": {"object": "charge", "id": 42, "amount": 7},
            "alist": [{"object": "customer", "name": "chilango"}]
        });
        let converted = convert(sample, Some("akey"), None);
        let record = converted.as_record().unwrap();
        assert!(record.resource_type().is_none());
        assert_eq!(record.get_str("foo"), Some("bar"));

        let adict = record.get("adict").unwrap();
        assert_eq!(type_name(adict), Some("charge"));
        assert_eq!(adict.as_record().unwrap().get_i64("id"), Some(42));
        assert_eq!(adict.as_record().unwrap().id().as_deref(), Some("42"));

        let alist = record.get("alist").and_then(Value::as_list).unwrap();
        assert_eq!(alist.len(), 1);
        assert_eq!(type_name(&alist[0]), Some("customer"));
        assert_eq!(alist[0].as_record().unwrap().get_str("name"), Some("chilango"));
        assert_eq!(alist[0].as_record().unwrap().api_key(), Some("akey"));
    }

    #[test]
    fn arrays_keep_order_and_fall_back_to_hint() {
        let converted = convert(
            json!([
                {"object": "customer", "n": 1},
                {"n": 2},
                {"object": "card", "n": 3}
            ]),
            None,
            Some("charge"),
        );
        let items = converted.as_list().unwrap();
        let names: Vec<_> = items.iter().map(type_name).collect();
        assert_eq!(names, [Some("customer"), Some("charge"), Some("card")]);
        let order: Vec<_> = items
            .iter()
            .map(|v| v.as_record().unwrap().get_i64("n").unwrap())
            .collect();
        assert_eq!(order, [1, 2, 3]);
    }

    #[test]
    fn unknown_tags_become_untyped_records() {
        let converted = convert(json!({"object": "spaceship"}), None, Some("charge"));
        assert!(type_name(&converted).is_none());
        assert_eq!(converted.as_record().unwrap().object_tag(), Some("spaceship"));
    }

    #[test]
    fn tags_are_case_sensitive() {
        let converted = convert(json!({"object": "Charge"}), None, None);
        assert!(type_name(&converted).is_none());
    }

    #[test]
    fn scalars_pass_through() {
        assert_eq!(convert(json!("x"), None, None), Value::from("x"));
        assert_eq!(convert(json!(3), None, None), Value::from(3));
        assert_eq!(convert(Json::Null, None, None), Value::Null);
    }

    #[test]
    fn constructed_records_start_clean() {
        let converted = convert(json!({"id": "c1", "name": "Ana"}), None, Some("customer"));
        let record = converted.as_record().unwrap();
        assert_eq!(record.unsaved_fields().count(), 0);
        assert_eq!(record.id().as_deref(), Some("c1"));
    }

    #[test]
    fn local_registries_only_know_what_they_register() {
        let mut registry = Registry::empty();
        assert!(type_name(&registry.convert(json!({"object": "gadget"}), None, None)).is_none());
        registry.register(&GADGET);
        let converted = registry.convert(json!({"object": "gadget"}), None, None);
        assert_eq!(type_name(&converted), Some("gadget"));
    }

    #[test]
    fn global_registration_is_visible_to_convert() {
        static WIDGET: ResourceType =
            ResourceType::new("registered_widget", Scope::Merchant, Capabilities::NONE);
        register(&WIDGET);
        let converted = convert(json!({"object": "registered_widget"}), None, None);
        assert_eq!(type_name(&converted), Some("registered_widget"));
    }
}
