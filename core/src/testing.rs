//! In-memory transport for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::Value as Json;

use crate::client::ApiClient;
use crate::config::Config;
use crate::error::Result;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;

pub(crate) const MERCHANT: &str = "mmerchant";
pub(crate) const KEY: &str = "sk_test";

/// Replays queued responses and records every request it receives.
#[derive(Default)]
pub(crate) struct MockTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub(crate) fn respond(&self, status: u16, body: Json) {
        self.responses
            .lock()
            .unwrap()
            .push_back(HttpResponse::new(status, body.to_string()));
    }

    pub(crate) fn respond_no_content(&self) {
        self.responses
            .lock()
            .unwrap()
            .push_back(HttpResponse::new(204, ""));
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn last(&self) -> HttpRequest {
        self.requests.lock().unwrap().last().cloned().expect("no request sent")
    }

    /// Path and query of the last request, relative to the API base.
    pub(crate) fn last_path(&self) -> String {
        self.last().url.trim_start_matches(BASE).to_owned()
    }

    pub(crate) fn last_body(&self) -> Json {
        serde_json::from_str(self.last().body.as_deref().expect("request had no body")).unwrap()
    }
}

impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("no response queued"))
    }
}

pub(crate) const BASE: &str = "https://mock.test";

pub(crate) fn client() -> (ApiClient, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::default());
    let config = Config::new(MERCHANT).with_api_key(KEY).with_api_base(BASE);
    (ApiClient::with_transport(config, transport.clone()), transport)
}
