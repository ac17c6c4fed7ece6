//! In-memory stand-in for the Openpay REST API.
//!
//! Every collection under `/v1/{merchant}/...` is served from one store:
//! `POST` creates, `GET` lists or fetches, `PUT` merges, `DELETE` removes.
//! Collections nested under `customers/{id}/` hold the same objects as the
//! flat ones, tagged with a `customer_id`. Requests must carry HTTP basic
//! auth with [`API_KEY`] as the user name and target [`MERCHANT_ID`].

use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const API_KEY: &str = "sk_e568c42a6c384b7ab02cd47d2e407cab";
pub const MERCHANT_ID: &str = "mzdtln0bmtms6o3kck8f";

/// Charges against this card number are declined with a 402.
pub const DECLINED_CARD: &str = "4000000000000002";

#[derive(Debug, Default)]
pub struct Store {
    collections: HashMap<String, Vec<Map<String, Value>>>,
}

#[derive(Clone)]
pub struct AppState {
    api_key: Arc<str>,
    merchant_id: Arc<str>,
    store: Arc<RwLock<Store>>,
}

pub fn app() -> Router {
    app_with(API_KEY, MERCHANT_ID)
}

/// The API with its own credentials and an empty store.
pub fn app_with(api_key: &str, merchant_id: &str) -> Router {
    let state = AppState {
        api_key: api_key.into(),
        merchant_id: merchant_id.into(),
        store: Arc::default(),
    };
    Router::new()
        .route("/v1/{merchant}/{*rest}", any(dispatch))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    tracing::info!(addr = ?listener.local_addr().ok(), "mock openpay listening");
    axum::serve(listener, app()).await
}

/// Openpay-shaped error body.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    error_code: u32,
    description: String,
}

impl ApiError {
    fn new(status: StatusCode, error_code: u32, description: impl Into<String>) -> Self {
        Self {
            status,
            error_code,
            description: description.into(),
        }
    }

    fn not_found() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            1005,
            "The requested resource doesn't exist",
        )
    }

    fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            1002,
            "The api key or merchant id are invalid",
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub category: String,
    pub description: String,
    pub error_code: u32,
    pub http_code: u16,
    pub request_id: Uuid,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let category = if self.status == StatusCode::PAYMENT_REQUIRED {
            "gateway"
        } else {
            "request"
        };
        let body = ErrorBody {
            category: category.to_owned(),
            description: self.description,
            error_code: self.error_code,
            http_code: self.status.as_u16(),
            request_id: Uuid::new_v4(),
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub offset: usize,
    pub limit: Option<usize>,
}

/// Where a request lands after the merchant segment.
#[derive(Debug, PartialEq)]
struct Target {
    customer: Option<String>,
    collection: String,
    id: Option<String>,
    action: Option<String>,
}

impl Target {
    fn parse(rest: &str) -> Option<Self> {
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        let (customer, segments) = match segments.as_slice() {
            ["customers", customer, tail @ ..] if !tail.is_empty() => {
                (Some((*customer).to_owned()), tail)
            }
            all => (None, all),
        };
        let (collection, id, action) = match segments {
            [collection] => (collection, None, None),
            [collection, id] => (collection, Some(id), None),
            [collection, id, action] => (collection, Some(id), Some(action)),
            _ => return None,
        };
        Some(Target {
            customer,
            collection: (*collection).to_owned(),
            id: id.map(|id| (*id).to_owned()),
            action: action.map(|a| (*a).to_owned()),
        })
    }

    /// The `"object"` tag of the collection's items.
    fn object_tag(&self) -> &str {
        match self.collection.as_str() {
            "bankaccounts" => "bank_account",
            collection => collection.strip_suffix('s').unwrap_or(collection),
        }
    }

    fn owned_by(&self, object: &Map<String, Value>) -> bool {
        match &self.customer {
            Some(customer) => {
                object.get("customer_id").and_then(Value::as_str) == Some(customer.as_str())
            }
            None => true,
        }
    }
}

async fn dispatch(
    State(state): State<AppState>,
    Path((merchant, rest)): Path<(String, String)>,
    Query(page): Query<Pagination>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    if merchant != *state.merchant_id || !authorized(&headers, &state.api_key) {
        tracing::debug!(%merchant, "rejected credentials");
        return Err(ApiError::unauthorized());
    }
    let target = Target::parse(&rest).ok_or_else(ApiError::not_found)?;
    tracing::debug!(%method, ?target, "dispatch");

    let mut store = state.store.write().await;
    if let Some(customer) = &target.customer {
        if store.find("customers", customer).is_none() {
            return Err(ApiError::not_found());
        }
    }

    match (method, target.id.is_some(), target.action.is_some()) {
        (Method::GET, false, false) => {
            let items = store.list(&target, &page);
            Ok(Json(Value::Array(items)).into_response())
        }
        (Method::POST, false, false) => {
            let created = store.create(&target, parse_body(&body)?)?;
            Ok((StatusCode::CREATED, Json(Value::Object(created))).into_response())
        }
        (Method::GET, true, false) => {
            let object = store.get(&target).ok_or_else(ApiError::not_found)?;
            Ok(Json(Value::Object(object.clone())).into_response())
        }
        (Method::PUT, true, false) => {
            let updated = store.update(&target, parse_body(&body)?)?;
            Ok(Json(Value::Object(updated)).into_response())
        }
        (Method::DELETE, true, false) => {
            store.delete(&target)?;
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        (Method::POST, true, true) => {
            let updated = store.action(&target, parse_body(&body)?)?;
            Ok(Json(Value::Object(updated)).into_response())
        }
        _ => Err(ApiError::new(
            StatusCode::METHOD_NOT_ALLOWED,
            1001,
            "The requested method is not allowed here",
        )),
    }
}

fn authorized(headers: &HeaderMap, api_key: &str) -> bool {
    let Some(encoded) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
    else {
        return false;
    };
    let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(encoded) else {
        return false;
    };
    String::from_utf8(decoded).is_ok_and(|credentials| {
        credentials
            .split_once(':')
            .is_some_and(|(user, _)| user == api_key)
    })
}

fn parse_body(body: &Bytes) -> Result<Map<String, Value>, ApiError> {
    if body.is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_slice(body) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            1001,
            "The request body is not a JSON object",
        )),
    }
}

impl Store {
    fn find(&self, collection: &str, id: &str) -> Option<&Map<String, Value>> {
        self.collections
            .get(collection)?
            .iter()
            .find(|object| object.get("id").and_then(Value::as_str) == Some(id))
    }

    fn get(&self, target: &Target) -> Option<&Map<String, Value>> {
        let id = target.id.as_deref()?;
        self.find(&target.collection, id)
            .filter(|object| target.owned_by(object))
    }

    fn get_mut(&mut self, target: &Target) -> Result<&mut Map<String, Value>, ApiError> {
        let id = target.id.as_deref().ok_or_else(ApiError::not_found)?;
        self.collections
            .get_mut(&target.collection)
            .and_then(|items| {
                items.iter_mut().find(|object| {
                    object.get("id").and_then(Value::as_str) == Some(id) && target.owned_by(object)
                })
            })
            .ok_or_else(ApiError::not_found)
    }

    fn list(&self, target: &Target, page: &Pagination) -> Vec<Value> {
        self.collections
            .get(&target.collection)
            .into_iter()
            .flatten()
            .filter(|object| target.owned_by(object))
            .skip(page.offset)
            .take(page.limit.unwrap_or(10))
            .cloned()
            .map(Value::Object)
            .collect()
    }

    fn create(
        &mut self,
        target: &Target,
        mut input: Map<String, Value>,
    ) -> Result<Map<String, Value>, ApiError> {
        if target.collection == "charges" && declined(&input) {
            return Err(ApiError::new(
                StatusCode::PAYMENT_REQUIRED,
                3001,
                "The card was declined",
            ));
        }
        input.remove("customer");
        let id = Uuid::new_v4().simple().to_string();
        input.insert("id".to_owned(), json!(id));
        input.insert("object".to_owned(), json!(target.object_tag()));
        if let Some(customer) = &target.customer {
            input.insert("customer_id".to_owned(), json!(customer));
        }
        if target.collection == "charges" {
            input.insert("status".to_owned(), json!("completed"));
        }
        tracing::info!(collection = %target.collection, %id, "created");
        self.collections
            .entry(target.collection.clone())
            .or_default()
            .push(input.clone());
        Ok(input)
    }

    fn update(
        &mut self,
        target: &Target,
        changes: Map<String, Value>,
    ) -> Result<Map<String, Value>, ApiError> {
        let object = self.get_mut(target)?;
        merge(object, changes);
        Ok(object.clone())
    }

    fn delete(&mut self, target: &Target) -> Result<(), ApiError> {
        let id = target.id.as_deref().ok_or_else(ApiError::not_found)?;
        let items = self
            .collections
            .get_mut(&target.collection)
            .ok_or_else(ApiError::not_found)?;
        let before = items.len();
        items.retain(|object| {
            object.get("id").and_then(Value::as_str) != Some(id) || !target.owned_by(object)
        });
        if items.len() == before {
            return Err(ApiError::not_found());
        }
        Ok(())
    }

    fn action(
        &mut self,
        target: &Target,
        params: Map<String, Value>,
    ) -> Result<Map<String, Value>, ApiError> {
        if target.collection != "charges" {
            return Err(ApiError::not_found());
        }
        let charge = self.get_mut(target)?;
        match target.action.as_deref() {
            Some("refund") => {
                let amount = params
                    .get("amount")
                    .cloned()
                    .or_else(|| charge.get("amount").cloned())
                    .unwrap_or(Value::Null);
                charge.insert("status".to_owned(), json!("refunded"));
                charge.insert(
                    "refund".to_owned(),
                    json!({
                        "id": Uuid::new_v4().simple().to_string(),
                        "object": "refund",
                        "amount": amount,
                        "description": params.get("description").cloned().unwrap_or(Value::Null),
                    }),
                );
            }
            Some("capture") => {
                charge.insert("status".to_owned(), json!("completed"));
            }
            _ => return Err(ApiError::not_found()),
        }
        Ok(charge.clone())
    }
}

fn declined(input: &Map<String, Value>) -> bool {
    input
        .get("card")
        .and_then(|card| card.get("card_number"))
        .and_then(Value::as_str)
        == Some(DECLINED_CARD)
}

/// Apply an update body: nulls are ignored, empty strings delete the key and
/// nested objects merge key by key.
fn merge(object: &mut Map<String, Value>, changes: Map<String, Value>) {
    for (key, value) in changes {
        match value {
            Value::Null => {}
            Value::String(s) if s.is_empty() => {
                object.remove(&key);
            }
            Value::Object(nested) => match object.get_mut(&key) {
                Some(Value::Object(existing)) => merge(existing, nested),
                _ => {
                    let mut fresh = Map::new();
                    merge(&mut fresh, nested);
                    object.insert(key, Value::Object(fresh));
                }
            },
            value => {
                object.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn target_parses_flat_and_nested_paths() {
        assert_eq!(
            Target::parse("charges").unwrap(),
            Target {
                customer: None,
                collection: "charges".into(),
                id: None,
                action: None,
            }
        );
        assert_eq!(
            Target::parse("customers/c1/cards/k1").unwrap(),
            Target {
                customer: Some("c1".into()),
                collection: "cards".into(),
                id: Some("k1".into()),
                action: None,
            }
        );
        let refund = Target::parse("customers/c1/charges/ch1/refund").unwrap();
        assert_eq!(refund.action.as_deref(), Some("refund"));
        assert!(Target::parse("a/b/c/d").is_none());
    }

    #[test]
    fn customers_collection_is_not_nested() {
        let target = Target::parse("customers/c1").unwrap();
        assert_eq!(target.customer, None);
        assert_eq!(target.collection, "customers");
        assert_eq!(target.id.as_deref(), Some("c1"));
    }

    #[test]
    fn object_tag_is_singular() {
        let accounts = Target::parse("customers/c1/bankaccounts").unwrap();
        assert_eq!(accounts.object_tag(), "bank_account");
        assert_eq!(Target::parse("charges").unwrap().object_tag(), "charge");
    }

    #[test]
    fn merge_follows_update_conventions() {
        let mut object = map(json!({
            "name": "Ana",
            "status": "active",
            "metadata": {"size": "l", "height": 10}
        }));
        merge(
            &mut object,
            map(json!({
                "name": "Bea",
                "status": null,
                "metadata": {"size": "m", "height": "", "info": "a2"}
            })),
        );
        assert_eq!(
            Value::Object(object),
            json!({"name": "Bea", "status": "active", "metadata": {"size": "m", "info": "a2"}})
        );
    }

    #[test]
    fn error_body_has_openpay_shape() {
        let response = ApiError::not_found().into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: ErrorBody = serde_json::from_value(json!({
            "category": "request",
            "description": "x",
            "error_code": 1005,
            "http_code": 404,
            "request_id": Uuid::nil()
        }))
        .unwrap();
        assert_eq!(body.request_id, Uuid::nil());
    }

    #[test]
    fn pagination_defaults() {
        let page: Pagination = serde_json::from_value(json!({})).unwrap();
        assert_eq!(page.offset, 0);
        assert!(page.limit.is_none());
    }

    #[test]
    fn declined_card_is_detected() {
        assert!(declined(&map(json!({"card": {"card_number": DECLINED_CARD}}))));
        assert!(!declined(&map(json!({"source_id": "k1"}))));
    }

    #[test]
    fn authorization_requires_matching_user() {
        let mut headers = HeaderMap::new();
        assert!(!authorized(&headers, "key"));
        let encoded = base64::engine::general_purpose::STANDARD.encode("key:");
        headers.insert(header::AUTHORIZATION, format!("Basic {encoded}").parse().unwrap());
        assert!(authorized(&headers, "key"));
        assert!(!authorized(&headers, "other"));
    }
}
