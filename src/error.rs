use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Errors surfaced at the HTTP boundary.
///
/// Only `Validation` and `Unauthorized` carry a message meant for the user.
/// Every other kind carries an internal cause that is logged and replaced by
/// a fixed message before it reaches the client.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    Csrf(String),
    Exchange(String),
    Identity(String),
    Unauthorized(String),
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn csrf(cause: impl Into<String>) -> Self {
        AppError::Csrf(cause.into())
    }

    pub fn exchange(cause: impl Into<String>) -> Self {
        AppError::Exchange(cause.into())
    }

    pub fn identity(cause: impl Into<String>) -> Self {
        AppError::Identity(cause.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::Unauthorized(msg.into())
    }

    pub fn internal(cause: impl Into<String>) -> Self {
        AppError::Internal(cause.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "invalid_request",
            AppError::Csrf(_) => "csrf_failed",
            AppError::Exchange(_) => "exchange_failed",
            AppError::Identity(_) => "identity_failed",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Csrf(_) => StatusCode::BAD_REQUEST,
            AppError::Exchange(_) => StatusCode::BAD_GATEWAY,
            AppError::Identity(_) => StatusCode::BAD_GATEWAY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The human-safe message. Never includes internal detail.
    pub fn message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::Csrf(_) => "Couldn't verify your confirmation, please try again.".to_string(),
            AppError::Exchange(_) => "Couldn't complete the login, please try again.".to_string(),
            AppError::Identity(_) => "Couldn't look up your chat account.".to_string(),
            AppError::Internal(_) => "Something went wrong! Please try again.".to_string(),
        }
    }

    fn log(&self) {
        match self {
            AppError::Validation(msg) | AppError::Unauthorized(msg) => {
                tracing::debug!(kind = self.kind(), "rejected request: {msg}");
            }
            AppError::Csrf(cause) => tracing::warn!("csrf check failed: {cause}"),
            AppError::Exchange(cause) => tracing::error!("code exchange failed: {cause}"),
            AppError::Identity(cause) => tracing::error!("identity lookup failed: {cause}"),
            AppError::Internal(cause) => tracing::error!("internal error: {cause}"),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Validation(detail)
            | AppError::Csrf(detail)
            | AppError::Exchange(detail)
            | AppError::Identity(detail)
            | AppError::Unauthorized(detail)
            | AppError::Internal(detail) => write!(f, "{}: {detail}", self.kind()),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        let body = json!({
            "error": {
                "code": self.kind(),
                "message": self.message()
            }
        });
        (self.status(), Json(body)).into_response()
    }
}
