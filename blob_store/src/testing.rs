//! In-process fake of an S3-style object store for tests.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use axum::{
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use bytes::Bytes;
use dashmap::DashMap;

#[derive(Clone, Default)]
struct FakeState {
    objects: Arc<DashMap<String, Bytes>>,
    requests: Arc<AtomicU32>,
    failures_left: Arc<AtomicU32>,
    failure_status: Arc<AtomicU32>,
}

/// Serves PUT/GET/DELETE on `/<bucket>/<key>` from memory.
///
/// Keys are stored exactly as they appear in the request path, without the
/// leading slash and without percent-decoding.
pub struct FakeObjectStore {
    pub endpoint: String,
    state: FakeState,
}

impl FakeObjectStore {
    pub async fn start() -> Self {
        let state = FakeState::default();
        let router = Router::new().fallback(handle).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind fake object store");
        let addr = listener.local_addr().expect("fake object store address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Self {
            endpoint: format!("http://{}", addr),
            state,
        }
    }

    /// Answer the next `count` requests with `status` without touching the
    /// stored objects.
    pub fn fail_next(&self, count: u32, status: u16) {
        self.state
            .failure_status
            .store(status as u32, Ordering::SeqCst);
        self.state.failures_left.store(count, Ordering::SeqCst);
    }

    /// Number of requests received so far.
    pub fn requests(&self) -> u32 {
        self.state.requests.load(Ordering::SeqCst)
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.state.objects.get(key).map(|v| v.value().clone())
    }

    pub fn remove_object(&self, key: &str) -> Option<Bytes> {
        self.state.objects.remove(key).map(|(_, v)| v)
    }
}

async fn handle(State(state): State<FakeState>, method: Method, uri: Uri, body: Bytes) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);

    let failing = state
        .failures_left
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok();
    if failing {
        let status = state.failure_status.load(Ordering::SeqCst) as u16;
        return StatusCode::from_u16(status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response();
    }

    let key = uri.path().trim_start_matches('/').to_string();
    match method {
        Method::PUT => {
            state.objects.insert(key, body);
            StatusCode::OK.into_response()
        }
        Method::GET => match state.objects.get(&key) {
            Some(object) => object.value().clone().into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        Method::DELETE => match state.objects.remove(&key) {
            Some(_) => StatusCode::NO_CONTENT.into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}
