//! Local HTTP server for adapter tests.
//!
//! An axum router with a single fallback handler: every request is
//! recorded (method, path with query, body) and answered by the closure
//! the test passes in.

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::Response;
use futures::StreamExt;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

enum MockBody {
    Full(Vec<u8>),
    /// Sent as separate chunks with a short pause between them
    Chunked(Vec<Vec<u8>>),
}

pub struct MockResponse {
    status: u16,
    content_type: &'static str,
    body: MockBody,
}

impl MockResponse {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: MockBody::Full(body.to_string().into_bytes()),
        }
    }

    pub fn bytes(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type,
            body: MockBody::Full(body.into()),
        }
    }

    pub fn chunked(content_type: &'static str, chunks: &[&str]) -> Self {
        Self {
            status: 200,
            content_type,
            body: MockBody::Chunked(chunks.iter().map(|c| c.as_bytes().to_vec()).collect()),
        }
    }

    fn into_response(self) -> Response {
        let body = match self.body {
            MockBody::Full(bytes) => Body::from(bytes),
            MockBody::Chunked(chunks) => Body::from_stream(futures::stream::iter(chunks).then(
                |chunk| async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, Infallible>(chunk)
                },
            )),
        };
        Response::builder()
            .status(StatusCode::from_u16(self.status).expect("valid mock status"))
            .header(header::CONTENT_TYPE, self.content_type)
            .body(body)
            .expect("mock response")
    }
}

type Responder = dyn Fn(&RecordedRequest) -> MockResponse + Send + Sync;

#[derive(Clone)]
struct MockState {
    responder: Arc<Responder>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

async fn respond(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let request = RecordedRequest {
        method: method.to_string(),
        path: uri
            .path_and_query()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string()),
        body: String::from_utf8_lossy(&body).to_string(),
    };
    let response = (state.responder)(&request);
    state.requests.lock().expect("requests lock").push(request);
    response.into_response()
}

pub struct MockHttpServer {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockHttpServer {
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&RecordedRequest) -> MockResponse + Send + Sync + 'static,
    {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            responder: Arc::new(responder),
            requests: requests.clone(),
        };
        let app = Router::new().fallback(respond).with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server listener");
        let addr = listener.local_addr().expect("mock server address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("run mock server");
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}
