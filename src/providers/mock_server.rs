//! In-process chat completions endpoint for tests

use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::post,
    Router,
};
use serde_json::{json, Value};

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    body: String,
    requests: Arc<Mutex<Vec<Value>>>,
    authorizations: Arc<Mutex<Vec<Option<String>>>>,
}

pub struct MockServer {
    /// Full endpoint URL, ready for `OpenAICompatConfig::endpoint`
    pub url: String,
    state: MockState,
}

impl MockServer {
    /// Serve `status` + `body` for every POST to `/v1/chat/completions`
    pub async fn start(status: StatusCode, body: impl Into<String>) -> Self {
        let state = MockState {
            status,
            body: body.into(),
            requests: Arc::default(),
            authorizations: Arc::default(),
        };

        let app = Router::new()
            .route("/v1/chat/completions", post(handle))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}/v1/chat/completions", addr),
            state,
        }
    }

    /// A well-formed single-choice response body
    pub fn reply(content: &str) -> String {
        json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
        .to_string()
    }

    pub fn hits(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn authorizations(&self) -> Vec<Option<String>> {
        self.state.authorizations.lock().unwrap().clone()
    }
}

async fn handle(
    State(state): State<MockState>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.authorizations.lock().unwrap().push(auth);
    state
        .requests
        .lock()
        .unwrap()
        .push(serde_json::from_str(&body).unwrap_or(Value::Null));

    (state.status, state.body.clone())
}
