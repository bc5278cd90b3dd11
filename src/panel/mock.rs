//! In-process panel for tests
//!
//! Serves every path under one fallback handler: GET returns the configured
//! profile payload, POST records the body and returns the upload reply.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use url::Url;

use super::{PanelClient, PanelFlavor};

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub authorization: Option<String>,
}

struct MockState {
    status: Mutex<StatusCode>,
    profiles: Mutex<Value>,
    upload_reply: Mutex<Value>,
    requests: Mutex<Vec<RecordedRequest>>,
    uploads: Mutex<Vec<Value>>,
}

pub(crate) struct MockPanel {
    pub url: Url,
    state: Arc<MockState>,
}

impl MockPanel {
    pub async fn spawn() -> Self {
        let state = Arc::new(MockState {
            status: Mutex::new(StatusCode::OK),
            profiles: Mutex::new(json!([])),
            upload_reply: Mutex::new(json!({"code": 200})),
            requests: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
        });

        let app = Router::new().fallback(handle).with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: Url::parse(&format!("http://{}/panel/", addr)).unwrap(),
            state,
        }
    }

    pub fn client(&self, flavor: PanelFlavor) -> PanelClient {
        PanelClient::new(
            self.url.clone(),
            flavor,
            "node-1",
            "psk",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    pub fn set_status(&self, status: StatusCode) {
        *self.state.status.lock() = status;
    }

    pub fn set_profiles(&self, profiles: Value) {
        *self.state.profiles.lock() = profiles;
    }

    pub fn set_upload_reply(&self, reply: Value) {
        *self.state.upload_reply.lock() = reply;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    /// Every POST body received, accepted or not
    pub fn uploads(&self) -> Vec<Value> {
        self.state.uploads.lock().clone()
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.requests.lock().push(RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().unwrap_or("").to_string(),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    if method == Method::POST {
        if let Ok(value) = serde_json::from_slice::<Value>(&body) {
            state.uploads.lock().push(value);
        }
    }

    let status = *state.status.lock();
    if status != StatusCode::OK {
        return status.into_response();
    }

    let reply = if method == Method::POST {
        state.upload_reply.lock().clone()
    } else {
        state.profiles.lock().clone()
    };
    (status, Json(reply)).into_response()
}
