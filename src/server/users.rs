//! `/api/v1/users/`: registration, login, logout, account info and deletion.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::error::{AppError, AppResult, FieldErrors};
use crate::identity::{LoginRequest, LoginResponse};
use crate::spending::params::parse_body;

use super::{authenticate, clear_session_cookie, set_session_cookie, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/", get(info))
        .route("/users/register/", post(register))
        .route("/users/login/", post(login))
        .route("/users/logout/", post(logout))
        .route("/users/delete_user/", delete(delete_user))
}

/// The capability route for creating staff/superuser accounts.
pub fn admin_route(path: &str) -> Router<AppState> {
    Router::new().route(&format!("/users/{}/", path), post(register_admin))
}

fn string_field(body: &Value, name: &str) -> Option<String> {
    match body.get(name) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    }
}

/// Email and password from a register body; missing fields are reported per field.
fn credentials(bytes: &[u8]) -> AppResult<LoginRequest> {
    let body = parse_body(bytes)?;
    let email = string_field(&body, "email");
    let password = string_field(&body, "password");
    let mut errors = FieldErrors::new();
    if email.is_none() { errors.insert("email".into(), vec!["This field is required.".into()]); }
    if password.is_none() { errors.insert("password".into(), vec!["This field is required.".into()]); }
    if !errors.is_empty() { return Err(AppError::validation(errors)); }
    Ok(LoginRequest { email: email.unwrap_or_default(), password: password.unwrap_or_default() })
}

/// Argon2 hashing and verification run on the blocking pool.
async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await
        .map_err(|e| AppError::internal("internal_error".to_string(), format!("auth worker failed: {}", e)))?
}

fn session_response(state: &AppState, status: StatusCode, resp: LoginResponse) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Set-Cookie", set_session_cookie(&resp.session.session_id, state.sessions.ttl));
    let body = json!({ "user": resp.principal.email, "token": resp.token });
    (status, headers, Json(body)).into_response()
}

async fn info(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let principal = authenticate(&state, &headers)?;
    Ok(Json(Value::String(principal.email)))
}

async fn register(State(state): State<AppState>, body: Bytes) -> AppResult<Response> {
    let req = credentials(&body)?;
    let auth = state.auth.clone();
    let resp = blocking(move || auth.register(&req, false)).await?;
    Ok(session_response(&state, StatusCode::CREATED, resp))
}

async fn register_admin(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> AppResult<Response> {
    if state.admin_requires_superuser {
        let caller = authenticate(&state, &headers)?;
        if !caller.is_superuser {
            warn!(target: "publiceye::auth", "admin registration refused for non-superuser id={}", caller.user_id);
            return Err(AppError::forbidden("permission_denied", "You do not have permission to perform this action."));
        }
    }
    let req = credentials(&body)?;
    let auth = state.auth.clone();
    let resp = blocking(move || auth.register(&req, true)).await?;
    Ok(session_response(&state, StatusCode::CREATED, resp))
}

async fn login(State(state): State<AppState>, body: Bytes) -> Response {
    let req = match parse_body(&body) {
        Ok(v) => LoginRequest {
            email: string_field(&v, "email").unwrap_or_default(),
            password: string_field(&v, "password").unwrap_or_default(),
        },
        Err(e) => return e.into_response(),
    };
    let auth = state.auth.clone();
    match blocking(move || auth.login(&req)).await {
        Ok(resp) => session_response(&state, StatusCode::OK, resp),
        Err(e) if e.http_status() == 404 => (StatusCode::NOT_FOUND, Json(json!("Invalid credentials."))).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let principal = authenticate(&state, &headers)?;
    state.auth.logout(&principal)?;
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    Ok((StatusCode::NO_CONTENT, h).into_response())
}

async fn delete_user(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let principal = authenticate(&state, &headers)?;
    if let Err(e) = state.auth.delete_user(&principal) {
        error!(target: "publiceye::auth", "delete_user failed for id={}: {}", principal.user_id, e);
        return Ok((StatusCode::BAD_REQUEST, Json(json!("Bad request."))).into_response());
    }
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    Ok((StatusCode::NO_CONTENT, h).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_report_missing_fields() {
        let err = credentials(b"{}").unwrap_err();
        let body = err.body();
        assert_eq!(body["email"][0], "This field is required.");
        assert_eq!(body["password"][0], "This field is required.");

        let req = credentials(br#"{"email": "a@example.com", "password": "pw"}"#).unwrap();
        assert_eq!(req.email, "a@example.com");
        assert_eq!(req.password, "pw");
    }

    #[test]
    fn non_string_values_are_stringified() {
        let v = json!({"password": 1234, "email": null});
        assert_eq!(string_field(&v, "password").as_deref(), Some("1234"));
        assert!(string_field(&v, "email").is_none());
    }
}
