//! `/api/v1/profile/`: the caller's profile and display name.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult, FieldErrors};
use crate::spending::params::parse_body;
use crate::storage::{Profile, ProfileEdit, Store};

use super::{authenticate, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profile/", get(current_profile))
        .route("/profile/edit_profile/", put(edit_profile))
        .route("/profile/display_name/", get(display_name))
}

fn not_found() -> AppError { AppError::not_found("not_found", "Not found.") }

fn profile_json(store: &Store, profile: &Profile) -> Value {
    let affiliations: Vec<Value> = store.profile_affiliations(profile).into_iter()
        .map(|a| json!({ "id": a.id, "category": a.category }))
        .collect();
    json!({
        "id": profile.id,
        "display_name": profile.display_name,
        "affiliations": affiliations,
    })
}

/// Decode an edit body. Type errors are collected per field like the store's
/// own validation errors.
fn parse_edit(body: &Value) -> AppResult<ProfileEdit> {
    let Some(obj) = body.as_object() else {
        return Err(AppError::field("non_field_errors", "Invalid data. Expected a dictionary."));
    };
    let mut errors = FieldErrors::new();
    let mut edit = ProfileEdit::default();

    match obj.get("display_name") {
        None => {}
        Some(Value::Null) => edit.display_name = Some(None),
        Some(Value::String(s)) => edit.display_name = Some(Some(s.clone())),
        Some(_) => { errors.insert("display_name".into(), vec!["Not a valid string.".into()]); }
    }

    match obj.get("affiliations") {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            let mut ids = Vec::with_capacity(items.len());
            for item in items {
                match item.as_i64() {
                    Some(id) => ids.push(id),
                    None => errors.entry("affiliations".into()).or_default()
                        .push(format!("Incorrect type. Expected pk value, received {}.", json_type(item))),
                }
            }
            edit.affiliations = Some(ids);
        }
        Some(other) => {
            errors.insert("affiliations".into(),
                vec![format!("Expected a list of items but got type \"{}\".", json_type(other))]);
        }
    }

    if !errors.is_empty() { return Err(AppError::validation(errors)); }
    Ok(edit)
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

async fn current_profile(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let principal = authenticate(&state, &headers)?;
    let guard = state.store.0.lock();
    let profile = guard.profile_for_user(principal.user_id).ok_or_else(not_found)?;
    Ok(Json(profile_json(&guard, profile)))
}

async fn edit_profile(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> AppResult<Json<Value>> {
    let principal = authenticate(&state, &headers)?;
    let edit = parse_edit(&parse_body(&body)?)?;
    let mut guard = state.store.0.lock();
    let updated = guard.edit_profile(principal.user_id, edit)?;
    Ok(Json(profile_json(&guard, &updated)))
}

async fn display_name(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let principal = authenticate(&state, &headers)?;
    let guard = state.store.0.lock();
    let profile = guard.profile_for_user(principal.user_id).ok_or_else(not_found)?;
    Ok(Json(json!({ "display_name": profile.display_name })))
}
