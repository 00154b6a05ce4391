//!
//! publiceye server configuration
//! ------------------------------
//! Settings are resolved from CLI flags first, then environment variables,
//! then built-in defaults. Parsing is kept free of global state so tests can
//! feed their own argument list and environment lookup.

use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

pub const DEFAULT_HTTP_PORT: u16 = 8000;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_DATA_ROOT: &str = "data";
pub const DEFAULT_UPSTREAM_URL: &str = "https://api.usaspending.gov/api/v2/";
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60 * 24 * 14;

pub const USAGE: &str = "publiceye Server\n\nUSAGE:\n  publiceye_server [--http-port N] [--host ADDR] [--data-root PATH] [--upstream URL] [--upstream-timeout SECS] [--no-seed]\n\nOPTIONS:\n  --http-port N             HTTP API port (env: PUBLICEYE_HTTP_PORT, default 8000)\n  --host ADDR               Bind address (env: PUBLICEYE_HOST, default 0.0.0.0)\n  --data-root PATH          Folder holding the JSON tables (env: PUBLICEYE_DATA_ROOT, default data)\n  --upstream URL            Spending API base URL (env: PUBLICEYE_UPSTREAM_URL)\n  --upstream-timeout SECS   Upstream request timeout, 0 disables (env: PUBLICEYE_UPSTREAM_TIMEOUT_SECS, default 30)\n  --no-seed                 Do not seed the affiliation catalog on first run (env: PUBLICEYE_SEED_AFFILIATIONS)\n\nADMIN:\n  PUBLICEYE_ADMIN_PATH (or REGISTER_ADMIN) mounts the admin registration route under /api/v1/users/<path>/.\n  PUBLICEYE_ADMIN_REQUIRES_SUPERUSER=true additionally requires a superuser token on that route.\n";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    pub data_root: PathBuf,
    pub upstream_url: String,
    /// `None` disables the outbound timeout.
    pub upstream_timeout: Option<Duration>,
    /// Secret path segment for admin registration; route is not mounted when unset.
    pub admin_path: Option<String>,
    pub admin_requires_superuser: bool,
    pub session_ttl: Duration,
    pub seed_affiliations: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            data_root: PathBuf::from(DEFAULT_DATA_ROOT),
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            upstream_timeout: Some(Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS)),
            admin_path: None,
            admin_requires_superuser: false,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            seed_affiliations: true,
        }
    }
}

pub fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

/// Value following `flag`, if any.
pub fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

/// Static routes under `/api/v1/users/` that an admin path would collide with.
pub const RESERVED_USER_ROUTES: &[&str] = &["register", "login", "logout", "delete_user"];

static ADMIN_PATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("admin path regex"));

/// The admin path becomes a literal route segment: it must be a plain
/// `[A-Za-z0-9_-]+` token and must not shadow a user route.
pub fn validate_admin_path(path: &str) -> anyhow::Result<()> {
    if !ADMIN_PATH_RE.is_match(path) {
        anyhow::bail!("admin path must match [A-Za-z0-9_-]+");
    }
    if RESERVED_USER_ROUTES.contains(&path) {
        anyhow::bail!("admin path '{}' collides with the /users/{}/ route", path, path);
    }
    Ok(())
}

/// Strip surrounding slashes; empty values mean "unset".
fn normalize_admin_path(raw: &str) -> Option<String> {
    let p = raw.trim().trim_matches('/');
    if p.is_empty() { None } else { Some(p.to_string()) }
}

impl ServerConfig {
    /// Resolve configuration from the process arguments and environment.
    pub fn from_env_and_args(args: &[String]) -> Self {
        Self::from_sources(args, |name| std::env::var(name).ok())
    }

    pub fn from_sources<F>(args: &[String], env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServerConfig::default();

        let http_port = arg_value(args, "--http-port").and_then(|v| v.parse::<u16>().ok())
            .or_else(|| env("PUBLICEYE_HTTP_PORT").and_then(|v| v.parse::<u16>().ok()))
            .unwrap_or(defaults.http_port);
        let host = arg_value(args, "--host")
            .or_else(|| env("PUBLICEYE_HOST"))
            .unwrap_or(defaults.host);
        let data_root = arg_value(args, "--data-root")
            .or_else(|| env("PUBLICEYE_DATA_ROOT"))
            .map(PathBuf::from)
            .unwrap_or(defaults.data_root);
        let mut upstream_url = arg_value(args, "--upstream")
            .or_else(|| env("PUBLICEYE_UPSTREAM_URL"))
            .unwrap_or(defaults.upstream_url);
        // Url::join drops the last segment unless the base ends with '/'
        if !upstream_url.ends_with('/') { upstream_url.push('/'); }

        let timeout_secs = arg_value(args, "--upstream-timeout").and_then(|v| v.parse::<u64>().ok())
            .or_else(|| env("PUBLICEYE_UPSTREAM_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()))
            .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS);
        let upstream_timeout = if timeout_secs == 0 { None } else { Some(Duration::from_secs(timeout_secs)) };

        let admin_path = env("PUBLICEYE_ADMIN_PATH")
            .or_else(|| env("REGISTER_ADMIN"))
            .and_then(|p| normalize_admin_path(&p));
        let admin_requires_superuser = env("PUBLICEYE_ADMIN_REQUIRES_SUPERUSER")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(false);
        let session_ttl = env("PUBLICEYE_SESSION_TTL_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.session_ttl);
        let seed_affiliations = if has_flag(args, "--no-seed") {
            false
        } else {
            env("PUBLICEYE_SEED_AFFILIATIONS").and_then(|v| parse_bool(&v)).unwrap_or(true)
        };

        Self {
            host,
            http_port,
            data_root,
            upstream_url,
            upstream_timeout,
            admin_path,
            admin_requires_superuser,
            session_ttl,
            seed_affiliations,
        }
    }
}
