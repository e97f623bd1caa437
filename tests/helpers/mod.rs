//! Test helper utilities: a local mock of the image API and an in-process app.

#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use image_gen_service::app_state::{AppState, Upstream};
use image_gen_service::routes;
use image_gen_service::services::generator::ImageGenerator;
use image_gen_service::services::storage::ImageStore;

pub const TEST_API_KEY: &str = "sk-test-key";

/// Bytes served by the mock for every downloaded image.
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake image payload";

/// How the mock upstream answers generation calls.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    Success,
    /// Answer every generation call with this status and an OpenAI-style error body.
    Fail {
        status: u16,
        message: &'static str,
        retry_after: Option<&'static str>,
    },
    /// Serve the first `n` downloads, then answer 404.
    BrokenDownloadAfter(usize),
    /// Hold every generation call for this long before answering.
    SlowGeneration(Duration),
    /// Hold every download for this long before answering.
    SlowDownload(Duration),
}

#[derive(Clone)]
struct MockState {
    addr: SocketAddr,
    behavior: MockBehavior,
    generation_calls: Arc<AtomicUsize>,
    download_calls: Arc<AtomicUsize>,
    payloads: Arc<Mutex<Vec<Value>>>,
}

/// Handle to a mock image API running on an ephemeral local port.
pub struct MockUpstream {
    pub addr: SocketAddr,
    generation_calls: Arc<AtomicUsize>,
    payloads: Arc<Mutex<Vec<Value>>>,
}

impl MockUpstream {
    pub async fn start(behavior: MockBehavior) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock upstream");
        let addr = listener.local_addr().unwrap();

        let state = MockState {
            addr,
            behavior,
            generation_calls: Arc::new(AtomicUsize::new(0)),
            download_calls: Arc::new(AtomicUsize::new(0)),
            payloads: Arc::new(Mutex::new(Vec::new())),
        };

        let app = Router::new()
            .route("/v1/images/generations", post(mock_generate))
            .route("/files/{name}", get(mock_download))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            generation_calls: state.generation_calls,
            payloads: state.payloads,
        }
    }

    pub fn api_url(&self) -> String {
        format!("http://{}/v1/images/generations", self.addr)
    }

    pub fn generation_calls(&self) -> usize {
        self.generation_calls.load(Ordering::SeqCst)
    }

    /// JSON payloads received by the generation endpoint, in call order.
    pub fn payloads(&self) -> Vec<Value> {
        self.payloads.lock().unwrap().clone()
    }
}

async fn mock_generate(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response {
    let call = state.generation_calls.fetch_add(1, Ordering::SeqCst);
    state.payloads.lock().unwrap().push(payload.clone());

    if let MockBehavior::SlowGeneration(delay) = state.behavior {
        tokio::time::sleep(delay).await;
    }

    let expected_auth = format!("Bearer {}", TEST_API_KEY);
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if auth != Some(expected_auth.as_str()) {
        return error_reply(StatusCode::UNAUTHORIZED, "Incorrect API key provided", None);
    }

    if let MockBehavior::Fail {
        status,
        message,
        retry_after,
    } = &state.behavior
    {
        return error_reply(StatusCode::from_u16(*status).unwrap(), message, *retry_after);
    }

    let n = payload["n"].as_u64().unwrap_or(1);
    let prompt = payload["prompt"].as_str().unwrap_or_default();
    let data: Vec<Value> = (0..n)
        .map(|i| {
            json!({
                "url": format!("http://{}/files/{}-{}.png", state.addr, call, i),
                "revised_prompt": format!("revised: {}", prompt),
            })
        })
        .collect();

    Json(json!({ "created": 1700000000, "data": data })).into_response()
}

async fn mock_download(State(state): State<MockState>, Path(_name): Path<String>) -> Response {
    let served = state.download_calls.fetch_add(1, Ordering::SeqCst);
    match state.behavior {
        MockBehavior::BrokenDownloadAfter(limit) if served >= limit => {
            return StatusCode::NOT_FOUND.into_response();
        }
        MockBehavior::SlowDownload(delay) => tokio::time::sleep(delay).await,
        _ => {}
    }
    ([(header::CONTENT_TYPE, "image/png")], PNG_BYTES).into_response()
}

fn error_reply(status: StatusCode, message: &str, retry_after: Option<&str>) -> Response {
    let body = Json(json!({ "error": { "message": message, "type": "test_error" } }));
    let mut response = (status, body).into_response();
    if let Some(value) = retry_after {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, value.parse().unwrap());
    }
    response
}

/// The gateway under test with its own temporary images root.
pub struct TestApp {
    pub router: Router,
    pub images_dir: TempDir,
    pub upstream: Option<MockUpstream>,
}

impl TestApp {
    /// App wired to a mock upstream with the given behavior.
    pub async fn with_upstream(behavior: MockBehavior) -> Self {
        Self::with_upstream_timeouts(behavior, Duration::from_secs(5), Duration::from_secs(5)).await
    }

    /// App wired to a mock upstream, with explicit client timeouts.
    pub async fn with_upstream_timeouts(
        behavior: MockBehavior,
        generation_timeout: Duration,
        download_timeout: Duration,
    ) -> Self {
        let upstream = MockUpstream::start(behavior).await;
        let generator = ImageGenerator::new(
            TEST_API_KEY.to_string(),
            upstream.api_url(),
            generation_timeout,
            download_timeout,
        )
        .expect("Failed to build generator");

        Self::build(Upstream::Ready(generator), Some(upstream)).await
    }

    /// App configured against an address nothing listens on.
    pub async fn with_unreachable_upstream() -> Self {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0")
                .expect("Failed to reserve a local port");
            listener.local_addr().unwrap()
        };
        let generator = ImageGenerator::new(
            TEST_API_KEY.to_string(),
            format!("http://{}/v1/images/generations", addr),
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .expect("Failed to build generator");

        Self::build(Upstream::Ready(generator), None).await
    }

    /// App started without a usable credential.
    pub async fn unconfigured() -> Self {
        Self::build(Upstream::Unconfigured("no secret mounted".to_string()), None).await
    }

    async fn build(upstream: Upstream, mock: Option<MockUpstream>) -> Self {
        let images_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = ImageStore::new(images_dir.path());
        store.init().await.expect("Failed to init image store");

        let router = routes::router(AppState::new(upstream, store));
        Self {
            router,
            images_dir,
            upstream: mock,
        }
    }

    pub fn upstream(&self) -> &MockUpstream {
        self.upstream.as_ref().expect("App has no mock upstream")
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        let request = builder
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn generate(&self, body: Value) -> TestResponse {
        self.request(Method::POST, "/generate", Some(&body.to_string()))
            .await
    }

    /// Job directories currently present under the images root.
    pub fn job_dirs(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.images_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.is_dir())
            .collect()
    }

    /// Sorted file names inside a job directory.
    pub fn files_in(&self, job_dir: &std::path::Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(job_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| {
            panic!(
                "Response body is not JSON ({}): {}",
                e,
                String::from_utf8_lossy(&self.body)
            )
        })
    }

    /// Assert the standard error envelope and return its message.
    pub fn assert_error(&self, status: StatusCode, code: &str) -> String {
        assert_eq!(
            self.status,
            status,
            "unexpected status, body: {}",
            String::from_utf8_lossy(&self.body)
        );
        let body = self.json();
        assert_eq!(body["status"], "failed");
        assert_eq!(body["code"], code);
        body["error"].as_str().unwrap().to_string()
    }
}
