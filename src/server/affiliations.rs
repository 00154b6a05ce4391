//! `/api/v1/affiliations/`: the affiliation catalog.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::security::title_case;
use crate::storage::Affiliation;

use super::{authenticate, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/affiliations/", get(list))
        .route("/affiliations/{category}/", get(get_one).post(create))
}

fn affiliation_json(a: &Affiliation) -> Value {
    json!({ "id": a.id, "category": a.category })
}

async fn list(State(state): State<AppState>) -> Json<Value> {
    let rows: Vec<Value> = state.store.0.lock().affiliations().into_iter().map(affiliation_json).collect();
    Json(Value::Array(rows))
}

async fn get_one(State(state): State<AppState>, Path(category): Path<String>) -> AppResult<Json<Value>> {
    let label = title_case(category.trim());
    let found = state.store.0.lock().affiliation_by_category(&label).map(affiliation_json);
    found.map(Json).ok_or_else(|| AppError::not_found("not_found", "Not found."))
}

async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(category): Path<String>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let principal = authenticate(&state, &headers)?;
    if !principal.is_staff {
        return Err(AppError::forbidden("permission_denied", "You do not have permission to perform this action."));
    }
    let row = state.store.0.lock().create_affiliation(&category)?;
    info!(target: "publiceye::server", "affiliation created id={} by user id={}", row.id, principal.user_id);
    Ok((StatusCode::CREATED, Json(affiliation_json(&row))))
}
