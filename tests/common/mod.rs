//! In-memory transport shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value as Json, json};
use tempoiq_stream::{Client, Error, Request, Response, Result, Transport};

/// Replays scripted responses in order and records every request.
///
/// When the script runs out every further request gets a 500, so a test
/// that fetches more than expected fails loudly.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<Response>>>,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, response: Response) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_json(&self, status: u16, body: Json) {
        self.push(Response::new(status, reason(status), body.to_string()));
    }

    pub fn push_error(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(Error::Transport(message.to_string().into())));
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Body of the `n`th request, parsed as JSON.
    pub fn body(&self, n: usize) -> Json {
        let requests = self.requests.lock().unwrap();
        let body = requests[n].body.as_deref().expect("request has no body");
        serde_json::from_str(body).unwrap()
    }

    pub fn client(self: &Arc<Self>) -> Client {
        Client::with_shared_transport(self.clone())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: Request) -> Result<Response> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(Response::new(500, "Internal Server Error", "unscripted request"))
            })
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        207 => "Multi-Status",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        503 => "Service Unavailable",
        _ => "",
    }
}

/// Continuation token carrying `next_query`.
pub fn next_page(next_query: Json) -> Json {
    json!({ "next_query": next_query })
}

/// A find-devices query as the service echoes it back in `next_page`.
pub fn find_devices_query() -> Json {
    json!({
        "search": {"select": "devices", "filters": {"devices": "all"}},
        "find": {"quantifier": "all"}
    })
}

/// A read query as the service echoes it back in `next_page`.
pub fn read_query() -> Json {
    json!({
        "search": {"select": "sensors", "filters": {"devices": {"key": "therm.0"}}},
        "read": {
            "start": "2015-01-01T00:00:00.000Z",
            "stop": "2015-01-02T00:00:00.000Z",
            "include_selection": false
        }
    })
}

/// Device page body.
pub fn device_page(keys: &[&str], next: Option<Json>) -> Json {
    let data: Vec<Json> = keys.iter().map(|k| json!({"key": k})).collect();
    page(data, next)
}

/// Page body around arbitrary items.
pub fn page(data: Vec<Json>, next: Option<Json>) -> Json {
    match next {
        Some(next) => json!({"data": data, "next_page": next}),
        None => json!({"data": data}),
    }
}

/// One row in wire shape.
pub fn row(t: &str, data: Json) -> Json {
    json!({"t": t, "data": data})
}
