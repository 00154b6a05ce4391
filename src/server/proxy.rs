//! `/api/v1/spending/`: one route per catalog entry, forwarded to the spending API.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post, MethodRouter};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::error::{AppError, AppResult};
use crate::spending::params;
use crate::spending::{Endpoint, Method, ParamMode, UpstreamError, ENDPOINTS};

use super::AppState;

pub fn routes() -> Router<AppState> {
    let mut router = Router::new().route("/spending/", get(list_catalog));
    for ep in ENDPOINTS {
        router = router.route(&format!("/spending/{}", ep.route), method_router(ep));
    }
    router
}

type QueryPairs = Vec<(String, String)>;
type PathValues = HashMap<String, String>;

/// Routes without `{param}` segments must not ask for `Path`, which rejects
/// when nothing was captured.
fn method_router(ep: &'static Endpoint) -> MethodRouter<AppState> {
    let with_path = !ep.path_params().is_empty();
    match ep.method {
        Method::Get if with_path => get(
            move |State(state): State<AppState>, Path(path): Path<PathValues>, Query(query): Query<QueryPairs>| async move {
                forward(state, ep, path, query, Bytes::new()).await
            },
        ),
        Method::Get => get(move |State(state): State<AppState>, Query(query): Query<QueryPairs>| async move {
            forward(state, ep, PathValues::new(), query, Bytes::new()).await
        }),
        Method::Post if with_path => post(
            move |State(state): State<AppState>, Path(path): Path<PathValues>, body: Bytes| async move {
                forward(state, ep, path, QueryPairs::new(), body).await
            },
        ),
        Method::Post => post(move |State(state): State<AppState>, body: Bytes| async move {
            forward(state, ep, PathValues::new(), QueryPairs::new(), body).await
        }),
    }
}

async fn list_catalog() -> Json<Value> {
    let rows: Vec<Value> = ENDPOINTS.iter()
        .map(|e| json!({
            "name": e.name,
            "method": e.method,
            "route": format!("/api/v1/spending/{}", e.route),
            "upstream": e.upstream,
        }))
        .collect();
    Json(Value::Array(rows))
}

/// Check, shape and forward one request. Required fields are verified before
/// any outbound traffic.
async fn forward(
    state: AppState,
    ep: &'static Endpoint,
    path: PathValues,
    query: QueryPairs,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let upstream_path = params::fill_path(ep.upstream, &path)?;
    let result = match ep.method {
        Method::Get => {
            params::check_required(ep.required, &params::query_input(&query))?;
            let forwarded = match ep.params {
                ParamMode::Query(list) => params::shape_query(list, &query),
                _ => Vec::new(),
            };
            debug!(target: "publiceye::proxy", "endpoint={} GET {} params={:?}", ep.name, upstream_path, forwarded);
            state.spending.get(&upstream_path, &forwarded).await
        }
        Method::Post => {
            let input = params::parse_body(&body)?;
            params::check_required(ep.required, &input)?;
            let outbound = match ep.params {
                ParamMode::Body(list) => params::shape_body(list, &input),
                ParamMode::Passthrough => input,
                ParamMode::None | ParamMode::Query(_) => json!({}),
            };
            debug!(target: "publiceye::proxy", "endpoint={} POST {}", ep.name, upstream_path);
            state.spending.post(&upstream_path, &outbound).await
        }
    };
    result.map(Json).map_err(|e| upstream_error(ep, e))
}

fn upstream_error(ep: &Endpoint, err: UpstreamError) -> AppError {
    if ep.relay_not_found && err.is_not_found() {
        debug!(target: "publiceye::proxy", "endpoint={} upstream 404 relayed", ep.name);
        return AppError::upstream_with_status("upstream_not_found", "File not found", 404);
    }
    error!(target: "publiceye::proxy", "endpoint={} upstream failure: {}", ep.name, err);
    match err {
        UpstreamError::Decode(_) => AppError::upstream("upstream_decode", "Invalid JSON response from external API"),
        _ => AppError::upstream("upstream_failed", "Failed to retrieve data from external API"),
    }
}
