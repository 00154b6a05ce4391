//! Unified application error model and mapping helpers.
//! Handlers across the auth, profile, affiliation and proxy surfaces return
//! `AppResult<T>`; this module turns the error side into an HTTP response.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Field name -> list of human readable messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    Validation { code: String, message: String, fields: FieldErrors },
    BadRequest { code: String, message: String },
    Auth { code: String, message: String },
    Forbidden { code: String, message: String },
    NotFound { code: String, message: String },
    Upstream { code: String, message: String, status: u16 },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Validation { code, .. }
            | AppError::BadRequest { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Upstream { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Validation { message, .. }
            | AppError::BadRequest { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Upstream { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn validation(fields: FieldErrors) -> Self {
        AppError::Validation { code: "invalid".into(), message: "validation failed".into(), fields }
    }

    /// Single-field validation error.
    pub fn field<F: Into<String>, M: Into<String>>(field: F, msg: M) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.into(), vec![msg.into()]);
        Self::validation(fields)
    }

    pub fn bad_request<S: Into<String>>(code: S, msg: S) -> Self { AppError::BadRequest { code: code.into(), message: msg.into() } }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn forbidden<S: Into<String>>(code: S, msg: S) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn upstream<S: Into<String>>(code: S, msg: S) -> Self { AppError::Upstream { code: code.into(), message: msg.into(), status: 500 } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Upstream failure that is relayed to the caller with its own status (e.g. 404).
    pub fn upstream_with_status<S: Into<String>>(code: S, msg: S, status: u16) -> Self {
        AppError::Upstream { code: code.into(), message: msg.into(), status }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Validation { .. } => 400,
            AppError::BadRequest { .. } => 400,
            AppError::Auth { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::NotFound { .. } => 404,
            AppError::Upstream { status, .. } => *status,
            AppError::Internal { .. } => 500,
        }
    }

    /// JSON body sent to clients. Validation errors are the bare field map,
    /// upstream failures use the `error` envelope, everything else `detail`.
    pub fn body(&self) -> serde_json::Value {
        match self {
            AppError::Validation { fields, .. } => json!(fields),
            AppError::Upstream { status: 500, message, .. } => json!({ "error": message }),
            other => json!({ "detail": other.message() }),
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Validation { fields, .. } => {
                let keys: Vec<&str> = fields.keys().map(|k| k.as_str()).collect();
                write!(f, "{}: {} ({})", self.code_str(), self.message(), keys.join(", "))
            }
            _ => write!(f, "{}: {}", self.code_str(), self.message()),
        }
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Storage and startup paths report through anyhow; surface as internal.
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(target: "publiceye::server", "request failed: {}", self);
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::field("email", "bad").http_status(), 400);
        assert_eq!(AppError::bad_request("bad_input", "oops").http_status(), 400);
        assert_eq!(AppError::auth("auth", "no").http_status(), 401);
        assert_eq!(AppError::forbidden("forbidden", "staff only").http_status(), 403);
        assert_eq!(AppError::not_found("not_found", "missing").http_status(), 404);
        assert_eq!(AppError::upstream("upstream", "down").http_status(), 500);
        assert_eq!(AppError::upstream_with_status("not_found", "File not found", 404).http_status(), 404);
        assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
    }

    #[test]
    fn validation_body_is_field_map() {
        let mut fields = FieldErrors::new();
        fields.insert("email".into(), vec!["Enter a valid email address.".into()]);
        fields.insert("password".into(), vec!["This field cannot be blank.".into()]);
        let body = AppError::validation(fields).body();
        assert_eq!(body["email"][0], "Enter a valid email address.");
        assert_eq!(body["password"][0], "This field cannot be blank.");
        assert!(body.get("detail").is_none());
    }

    #[test]
    fn envelopes_by_variant() {
        let up = AppError::upstream("upstream_status", "Failed to retrieve data from external API").body();
        assert_eq!(up, json!({"error": "Failed to retrieve data from external API"}));

        let relayed = AppError::upstream_with_status("upstream_not_found", "File not found", 404).body();
        assert_eq!(relayed, json!({"detail": "File not found"}));

        let nf = AppError::not_found("not_found", "Not found.").body();
        assert_eq!(nf, json!({"detail": "Not found."}));
    }

    #[test]
    fn anyhow_maps_to_internal() {
        let err: AppError = anyhow::anyhow!("disk full").into();
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.code_str(), "internal_error");
        assert_eq!(err.message(), "disk full");
    }
}
