use std::sync::Arc;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::error::Error;
use crate::server::AppState;
use crate::types::FlashLevel;

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }
}

/// API error that converts to a proper HTTP response
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "data": null, "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// Queues a flash message for the session and redirects to the dashboard.
/// This is the completion path for every form-style mutation endpoint.
pub fn flash_redirect(
    state: &Arc<AppState>,
    session_id: &str,
    level: FlashLevel,
    message: impl Into<String>,
) -> Response {
    let message = message.into();
    if let Err(e) = state.store.push_flash(session_id, level, &message) {
        tracing::warn!("Failed to queue flash message: {e}");
    }
    Redirect::to("/dashboard").into_response()
}

/// Recovers a domain error at the request boundary: role and state failures
/// become an error flash plus redirect, store failures surface as 500.
pub fn recover(state: &Arc<AppState>, session_id: &str, err: Error) -> Response {
    let message = match &err {
        Error::Forbidden => "You do not have permission to do that".to_string(),
        Error::NotFound => "That item no longer exists".to_string(),
        Error::InvalidState(m) | Error::InvariantViolation(m) | Error::Validation(m) => m.clone(),
        _ => {
            tracing::error!("Request failed: {err}");
            return ApiError::internal("Internal server error").into_response();
        }
    };
    flash_redirect(state, session_id, FlashLevel::Error, message)
}

/// Extension trait for converting store results to API errors with a custom message.
pub trait StoreResultExt<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreResultExt<T> for crate::error::Result<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError> {
        self.map_err(|_| ApiError::internal(message))
    }
}

/// Extension for Option types from store operations.
pub trait StoreOptionExt<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreOptionExt<T> for Option<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, ApiError> {
        self.ok_or_else(|| ApiError::not_found(message))
    }
}
