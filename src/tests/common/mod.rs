// tests/common/mod.rs
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Form, Json, Router,
};
use reqwest::Client;
use serde_json::json;
use tokio::task::JoinHandle;

use crate::error::TokenCacheError;
use crate::sources::{IssueCredential, IssuedToken};

/// 2023-11-14T22:13:20Z
pub const T0: i64 = 1_700_000_000_000;

/// In-process issuer: plays scripted results first, then mints `tok-<n>`.
#[derive(Clone)]
pub struct ScriptedIssuer {
    calls: Arc<AtomicUsize>,
    script: Arc<Mutex<VecDeque<Result<IssuedToken, TokenCacheError>>>>,
    ttl_secs: u64,
    delay: Duration,
}

impl ScriptedIssuer {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            script: Arc::new(Mutex::new(VecDeque::new())),
            ttl_secs,
            delay: Duration::ZERO,
        }
    }

    pub fn then(self, result: Result<IssuedToken, TokenCacheError>) -> Self {
        self.push(result);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push(&self, result: Result<IssuedToken, TokenCacheError>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IssueCredential for ScriptedIssuer {
    async fn issue(&self, _subject: &str) -> Result<IssuedToken, TokenCacheError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let scripted = self.script.lock().unwrap().pop_front();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        scripted.unwrap_or_else(|| Ok(IssuedToken::new(format!("tok-{}", n), self.ttl_secs)))
    }
}

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

/// What a recording issuer saw for one request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub headers: HeaderMap,
    pub form: HashMap<String, String>,
}

#[derive(Clone)]
pub struct RecordingIssuer {
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
    pub delay: Duration,
    pub status: StatusCode,
}

impl Default for RecordingIssuer {
    fn default() -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
            status: StatusCode::OK,
        }
    }
}

impl RecordingIssuer {
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay, ..Self::default() }
    }

    /// Records requests but always answers `status`.
    pub fn failing(status: StatusCode) -> Self {
        Self { status, ..Self::default() }
    }

    pub fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last(&self) -> RecordedRequest {
        self.requests.lock().unwrap().last().cloned().expect("no request recorded")
    }

    /// Serve `POST /oauth/token` and return the full token url.
    pub async fn spawn(&self) -> (JoinHandle<()>, String) {
        let router = Router::new()
            .route("/oauth/token", post(record_and_issue))
            .with_state(self.clone());
        let (handle, addr) = spawn_axum(router).await;
        (handle, format!("http://{}/oauth/token", addr))
    }
}

async fn record_and_issue(
    State(issuer): State<RecordingIssuer>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let n = {
        let mut requests = issuer.requests.lock().unwrap();
        requests.push(RecordedRequest { headers, form });
        requests.len()
    };
    if !issuer.delay.is_zero() {
        tokio::time::sleep(issuer.delay).await;
    }
    if issuer.status != StatusCode::OK {
        return (issuer.status, "rejected").into_response();
    }
    Json(json!({"access_token": format!("recorded-{}", n), "token_type": "Bearer", "expires_in": 3600})).into_response()
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}
