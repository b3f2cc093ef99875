use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};
use chrono::Utc;

use crate::auth::{RequireAuth, RequireSuperuser};
use crate::roles;
use crate::server::AppState;
use crate::server::response::{flash_redirect, recover};
use crate::types::FlashLevel;

/// Files a staff access request for the caller. Submitting again while a
/// request is still pending is a benign no-op.
pub async fn create(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    body: Option<Json<crate::server::dto::AccessRequestForm>>,
) -> Response {
    let note = body.map(|Json(form)| form.note).unwrap_or_default();

    let already_pending = match state.store.find_pending_request(&auth.user.id) {
        Ok(existing) => existing.is_some(),
        Err(e) => return recover(&state, &auth.session.id, e),
    };

    if let Err(e) = roles::request_access(state.store.as_ref(), &auth.user, &note, Utc::now()) {
        return recover(&state, &auth.session.id, e);
    }

    if already_pending {
        return flash_redirect(
            &state,
            &auth.session.id,
            FlashLevel::Info,
            "Your access request is already pending",
        );
    }

    flash_redirect(
        &state,
        &auth.session.id,
        FlashLevel::Success,
        "Access request submitted",
    )
}

pub async fn approve(
    superuser: RequireSuperuser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let request =
        match roles::approve_request(state.store.as_ref(), &id, &superuser.user, Utc::now()) {
            Ok(r) => r,
            Err(e) => return recover(&state, &superuser.session.id, e),
        };

    let username = state
        .store
        .get_user(&request.user_id)
        .ok()
        .flatten()
        .map(|u| u.username)
        .unwrap_or_else(|| request.user_id.clone());

    flash_redirect(
        &state,
        &superuser.session.id,
        FlashLevel::Success,
        format!("Access request from '{username}' approved"),
    )
}

pub async fn deny(
    superuser: RequireSuperuser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let request = match roles::deny_request(state.store.as_ref(), &id, &superuser.user, Utc::now())
    {
        Ok(r) => r,
        Err(e) => return recover(&state, &superuser.session.id, e),
    };

    let username = state
        .store
        .get_user(&request.user_id)
        .ok()
        .flatten()
        .map(|u| u.username)
        .unwrap_or_else(|| request.user_id.clone());

    flash_redirect(
        &state,
        &superuser.session.id,
        FlashLevel::Info,
        format!("Access request from '{username}' denied"),
    )
}
