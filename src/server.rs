//!
//! publiceye HTTP server
//! ---------------------
//! Axum application serving the `/api/v1/` surface.
//!
//! Responsibilities:
//! - Token (`Authorization: Token <key>`) and cookie-session authentication.
//! - User registration, login/logout and account deletion (`users`).
//! - Profile and affiliation catalog endpoints (`profile`, `affiliations`).
//! - Catalog-driven proxy routes to the spending API (`proxy`).
//! - First-run affiliation seeding, startup logs and the session prune ticker.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::routing::get;
use axum::Router;
use tracing::{debug, info, warn};

use crate::config::{validate_admin_path, ServerConfig};
use crate::error::{AppError, AppResult};
use crate::identity::{AuthProvider, LocalAuthProvider, Principal, SessionManager};
use crate::spending::SpendingClient;
use crate::storage::{SharedStore, DEFAULT_AFFILIATIONS};

pub mod users;
pub mod profile;
pub mod affiliations;
pub mod proxy;

pub const SESSION_COOKIE: &str = "publiceye_session";
const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub sessions: SessionManager,
    pub auth: Arc<dyn AuthProvider>,
    pub spending: SpendingClient,
    pub admin_requires_superuser: bool,
}

impl AppState {
    pub fn new(store: SharedStore, config: &ServerConfig) -> anyhow::Result<Self> {
        let sessions = SessionManager::new(config.session_ttl);
        let auth: Arc<dyn AuthProvider> = Arc::new(LocalAuthProvider::new(store.clone(), sessions.clone()));
        let spending = SpendingClient::new(&config.upstream_url, config.upstream_timeout)?;
        Ok(Self {
            store,
            sessions,
            auth,
            spending,
            admin_requires_superuser: config.admin_requires_superuser,
        })
    }
}

fn log_startup(config: &ServerConfig) {
    info!(
        target: "publiceye::server",
        "publiceye starting: host={} http_port={} data_root={:?} upstream={} upstream_timeout={:?} session_ttl_secs={} admin_route={} admin_requires_superuser={}",
        config.host,
        config.http_port,
        config.data_root,
        config.upstream_url,
        config.upstream_timeout,
        config.session_ttl.as_secs(),
        if config.admin_path.is_some() { "mounted" } else { "disabled" },
        config.admin_requires_superuser,
    );
}

/// Open the store under the configured data root and seed the affiliation
/// catalog on first run.
pub fn open_store(config: &ServerConfig) -> anyhow::Result<SharedStore> {
    let store = SharedStore::open(&config.data_root)
        .with_context(|| format!("While opening store under data root: {}", config.data_root.display()))?;
    if config.seed_affiliations {
        let added = store.0.lock().seed_affiliations(DEFAULT_AFFILIATIONS)
            .map_err(|e| anyhow::anyhow!("seeding affiliations: {}", e))?;
        if added > 0 {
            info!(target: "publiceye::server", "Empty affiliation catalog detected, seeded {} entries", added);
        }
    }
    Ok(store)
}

/// Mount every route. The admin registration route exists only when
/// `admin_path` is set; a path that is not a plain segment is refused.
pub fn build_router(state: AppState, admin_path: Option<&str>) -> anyhow::Result<Router> {
    let mut api = Router::new()
        .merge(users::routes())
        .merge(profile::routes())
        .merge(affiliations::routes())
        .merge(proxy::routes());
    if let Some(path) = admin_path {
        validate_admin_path(path).context("invalid PUBLICEYE_ADMIN_PATH")?;
        api = api.merge(users::admin_route(path));
    }
    Ok(Router::new()
        .route("/", get(|| async { "publiceye ok" }))
        .nest("/api/v1", api)
        .with_state(state))
}

/// Periodically drop expired cookie sessions.
pub fn spawn_session_pruner(sessions: SessionManager) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(SESSION_PRUNE_INTERVAL).await;
            let removed = sessions.prune_expired();
            if removed > 0 { debug!(target: "publiceye::auth", removed = removed, "session_prune"); }
        }
    })
}

/// Build the full application for `config`: store, state, background tasks and routes.
pub fn app(config: &ServerConfig) -> anyhow::Result<Router> {
    let store = open_store(config)?;
    let state = AppState::new(store, config)?;
    let sessions = state.sessions.clone();
    let router = build_router(state, config.admin_path.as_deref())?;
    spawn_session_pruner(sessions);
    Ok(router)
}

/// Start the HTTP server and serve until the process exits.
pub async fn run_with_config(config: ServerConfig) -> anyhow::Result<()> {
    log_startup(&config);
    let app = app(&config)?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.http_port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.host, config.http_port))?;
    info!(target: "publiceye::server", "Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Convenience entry point using defaults plus environment overrides.
pub async fn run() -> anyhow::Result<()> {
    run_with_config(ServerConfig::from_env_and_args(&[])).await
}

// ---- credentials ----

pub(crate) fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get(COOKIE)?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some((k, v)) = p.split_once('=') {
            if k == name { return Some(v.to_string()); }
        }
    }
    None
}

pub(crate) fn set_session_cookie(sid: &str, ttl: Duration) -> HeaderValue {
    // HttpOnly cookie scoped to path / with SameSite=Strict
    let v = format!("{}={}; Max-Age={}; HttpOnly; Secure; SameSite=Strict; Path=/", SESSION_COOKIE, sid, ttl.as_secs());
    HeaderValue::from_str(&v).unwrap_or_else(|_| HeaderValue::from_static("publiceye_session=; Path=/"))
}

pub(crate) fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("publiceye_session=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/")
}

fn not_authenticated() -> AppError {
    AppError::auth("not_authenticated", "Authentication credentials were not provided.")
}

/// Resolve the caller: a `Token` authorization header wins; otherwise the
/// session cookie is tried.
pub(crate) fn authenticate(state: &AppState, headers: &HeaderMap) -> AppResult<Principal> {
    if let Some(raw) = headers.get(AUTHORIZATION) {
        let value = raw.to_str()
            .map_err(|_| AppError::auth("invalid_token", "Invalid token header. Token string should not contain invalid characters."))?;
        let mut parts = value.split_whitespace();
        if parts.next().is_some_and(|scheme| scheme.eq_ignore_ascii_case("token")) {
            let key = parts.next()
                .ok_or_else(|| AppError::auth("invalid_token", "Invalid token header. No credentials provided."))?;
            if parts.next().is_some() {
                return Err(AppError::auth("invalid_token", "Invalid token header. Token string should not contain spaces."));
            }
            return state.auth.authenticate_token(key);
        }
    }
    if let Some(sid) = parse_cookie(headers, SESSION_COOKIE) {
        if let Some(p) = state.auth.authenticate_session(&sid) {
            return Ok(p);
        }
        warn!(target: "publiceye::auth", "stale or unknown session cookie ignored");
    }
    Err(not_authenticated())
}
