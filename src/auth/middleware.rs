use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;

use super::helpers::{SessionValidationError, ValidatedSession, extract_token_from_header, validate_session};
use crate::server::AppState;
use crate::types::{FlashLevel, Session, User};

/// Extractor that requires a valid login session.
pub struct RequireAuth {
    pub session: Session,
    pub user: User,
}

/// Extractor that requires a staff (or superuser) session. A non-staff caller
/// gets an error flash and is redirected back to the dashboard.
pub struct RequireStaff {
    pub session: Session,
    pub user: User,
}

/// Extractor that requires a superuser session.
pub struct RequireSuperuser {
    pub session: Session,
    pub user: User,
}

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidToken,
    SessionExpired,
    InternalError,
    /// Role precondition failed. The flash is already queued; the caller is
    /// sent back to the dashboard for the message to surface.
    Forbidden,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::InvalidScheme => (StatusCode::UNAUTHORIZED, "Invalid authorization scheme"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid session token"),
            AuthError::SessionExpired => (StatusCode::UNAUTHORIZED, "Session expired"),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AuthError::Forbidden => return Redirect::to("/dashboard").into_response(),
        };

        let body = json!({ "data": null, "error": message });

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                "WWW-Authenticate",
                "Bearer realm=\"opsdesk\"".parse().unwrap(),
            );
        }

        response
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let validated = extract_and_validate(parts, state)?;
        Ok(RequireAuth {
            session: validated.session,
            user: validated.user,
        })
    }
}

impl FromRequestParts<Arc<AppState>> for RequireStaff {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let validated = extract_and_validate(parts, state)?;

        if !validated.user.role().is_staff() {
            flash_forbidden(state, &validated.session, "Staff access required");
            return Err(AuthError::Forbidden);
        }

        Ok(RequireStaff {
            session: validated.session,
            user: validated.user,
        })
    }
}

impl FromRequestParts<Arc<AppState>> for RequireSuperuser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let validated = extract_and_validate(parts, state)?;

        if !validated.user.role().is_superuser() {
            flash_forbidden(state, &validated.session, "Superuser access required");
            return Err(AuthError::Forbidden);
        }

        Ok(RequireSuperuser {
            session: validated.session,
            user: validated.user,
        })
    }
}

fn flash_forbidden(state: &Arc<AppState>, session: &Session, message: &str) {
    if let Err(e) = state.store.push_flash(&session.id, FlashLevel::Error, message) {
        tracing::warn!("Failed to queue flash message: {e}");
    }
}

fn extract_and_validate(
    parts: &mut Parts,
    state: &Arc<AppState>,
) -> Result<ValidatedSession, AuthError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let raw_token = extract_token_from_header(auth_header)
        .map_err(|e| match e {
            SessionValidationError::InvalidScheme => AuthError::InvalidScheme,
            SessionValidationError::InvalidToken => AuthError::InvalidToken,
            _ => AuthError::InternalError,
        })?
        .ok_or(AuthError::MissingAuth)?;

    validate_session(state, &raw_token).map_err(|e| match e {
        SessionValidationError::InvalidScheme => AuthError::InvalidScheme,
        SessionValidationError::InvalidToken => AuthError::InvalidToken,
        SessionValidationError::SessionExpired => AuthError::SessionExpired,
        SessionValidationError::InternalError => AuthError::InternalError,
    })
}
