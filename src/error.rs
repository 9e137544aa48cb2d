// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use std::fmt;

/// A single failed authoring constraint, addressed by its field path
/// (e.g. `questions[1].options`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 400 Bad Request, one entry per violated field constraint
    Validation(Vec<FieldError>),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden (actor does not own the resource)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 404 Not Found (a child id belongs to a different parent)
    Integrity(String),

    // 409 Conflict (e.g., stale quiz version)
    Conflict(String),
}

impl AppError {
    /// Machine-readable discriminator so clients can branch on
    /// "fix your input" vs "you can't do this".
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InternalServerError(_) => "storage",
            AppError::BadRequest(_) => "bad_request",
            AppError::Validation(_) => "validation",
            AppError::AuthError(_) => "auth",
            AppError::Forbidden(_) => "ownership",
            AppError::NotFound(_) => "not_found",
            AppError::Integrity(_) => "integrity",
            AppError::Conflict(_) => "conflict",
        }
    }

    pub fn invalid(field: impl Into<String>, code: &str, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldError::new(field, code, message)])
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, error_message, fields) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    None,
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                Some(fields),
            ),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::Integrity(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
        };

        let body = match fields {
            Some(fields) => json!({
                "error": error_message,
                "kind": kind,
                "fields": fields,
            }),
            None => json!({
                "error": error_message,
                "kind": kind,
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Flattens `validator` output into field errors rooted at `path`.
pub fn field_errors(path: &str, errors: &validator::ValidationErrors) -> Vec<FieldError> {
    let mut out = Vec::new();
    for (field, errs) in errors.field_errors() {
        let field_path = if path.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", path, field)
        };
        for err in errs.iter() {
            let message = err
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("invalid value ({})", err.code));
            out.push(FieldError::new(field_path.clone(), &err.code, message));
        }
    }
    out.sort_by(|a, b| a.field.cmp(&b.field));
    out
}
