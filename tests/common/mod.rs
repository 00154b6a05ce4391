#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::task::JoinHandle;

use publiceye::config::ServerConfig;

/// Aborts the spawned server when the test ends.
pub struct Guard(pub JoinHandle<()>);
impl Drop for Guard { fn drop(&mut self) { self.0.abort(); } }

async fn serve(app: Router) -> (SocketAddr, Guard) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind 127.0.0.1:0");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("test server error: {e:?}");
        }
    });
    (addr, Guard(handle))
}

pub const UPSTREAM_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub body: Value,
}

/// In-process stand-in for the spending API.
#[derive(Clone, Default)]
pub struct FakeUpstream {
    pub hits: Arc<AtomicUsize>,
    pub requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeUpstream {
    pub fn hit_count(&self) -> usize { self.hits.load(Ordering::SeqCst) }
    pub fn last(&self) -> Option<Recorded> { self.requests.lock().last().cloned() }
}

// Behavior keyed on the request path:
// - `download/status` answers 404 unless file_name=ready.zip
// - paths containing `broken` answer 200 with a non-JSON body
// - paths containing `fail` answer 502
// - paths containing `slow` echo after UPSTREAM_DELAY
// - everything else echoes the request as JSON
async fn fake_handler(State(up): State<FakeUpstream>, method: Method, uri: Uri, body: Bytes) -> Response {
    up.hits.fetch_add(1, Ordering::SeqCst);
    let body_json: Value = if body.is_empty() { Value::Null } else { serde_json::from_slice(&body).unwrap_or(Value::Null) };
    let rec = Recorded {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(|q| q.to_string()),
        body: body_json.clone(),
    };
    up.requests.lock().push(rec.clone());

    let path = uri.path();
    if path.ends_with("/download/status") {
        if rec.query.as_deref() == Some("file_name=ready.zip") {
            return axum::Json(json!({"status": "finished", "file_name": "ready.zip"})).into_response();
        }
        return (StatusCode::NOT_FOUND, axum::Json(json!({"detail": "not here"}))).into_response();
    }
    if path.contains("broken") {
        return (StatusCode::OK, "<html>oops</html>").into_response();
    }
    if path.contains("fail") {
        return (StatusCode::BAD_GATEWAY, "upstream down").into_response();
    }
    if path.contains("slow") {
        tokio::time::sleep(UPSTREAM_DELAY).await;
    }
    axum::Json(json!({
        "method": rec.method,
        "path": rec.path,
        "query": rec.query,
        "body": body_json,
    })).into_response()
}

pub async fn start_fake_upstream() -> (FakeUpstream, String, Guard) {
    let up = FakeUpstream::default();
    let app = Router::new().fallback(fake_handler).with_state(up.clone());
    let (addr, guard) = serve(app).await;
    (up, format!("http://{}/api/v2/", addr), guard)
}

pub struct TestServer {
    pub base: String,
    pub client: reqwest::Client,
    pub tmp: TempDir,
    _guard: Guard,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String { format!("{}{}", self.base, path) }
}

pub fn test_config(tmp: &TempDir, upstream: &str) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        http_port: 0,
        data_root: tmp.path().to_path_buf(),
        upstream_url: upstream.to_string(),
        upstream_timeout: Some(Duration::from_secs(5)),
        ..Default::default()
    }
}

/// Start the API on an ephemeral port with a fresh data root.
pub async fn start_server_with(configure: impl FnOnce(&mut ServerConfig), upstream: &str) -> TestServer {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = test_config(&tmp, upstream);
    configure(&mut config);
    start_server_in(tmp, config).await
}

pub async fn start_server_in(tmp: TempDir, config: ServerConfig) -> TestServer {
    let app = publiceye::server::app(&config).expect("build app");
    let (addr, guard) = serve(app).await;
    TestServer {
        base: format!("http://{}", addr),
        client: reqwest::Client::new(),
        tmp,
        _guard: guard,
    }
}

pub async fn start_server(upstream: &str) -> TestServer {
    start_server_with(|_| {}, upstream).await
}

/// Register and return the token.
pub async fn register(srv: &TestServer, email: &str, password: &str) -> String {
    let resp = srv.client.post(srv.url("/api/v1/users/register/"))
        .json(&json!({"email": email, "password": password}))
        .send().await.unwrap();
    assert_eq!(resp.status(), 201, "register {email}");
    let v: Value = resp.json().await.unwrap();
    v["token"].as_str().unwrap().to_string()
}

pub fn token_header(token: &str) -> String { format!("Token {}", token) }

/// `name=value` from a Set-Cookie header.
pub fn session_cookie(resp: &reqwest::Response) -> Option<String> {
    resp.headers().get_all(reqwest::header::SET_COOKIE).iter()
        .filter_map(|v| v.to_str().ok())
        .find(|s| s.starts_with("publiceye_session="))
        .and_then(|s| s.split_once(';').map(|(nv, _)| nv.trim().to_string()))
}
