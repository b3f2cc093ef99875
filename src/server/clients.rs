use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::auth::RequireStaff;
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::ClientForm;
use crate::server::response::{
    ApiError, ApiResponse, StoreOptionExt, StoreResultExt, flash_redirect, recover,
};
use crate::server::validation::validate_display_name;
use crate::types::{Client, FlashLevel};

/// Blank form context for the new-client page.
pub async fn new_client_context(_staff: RequireStaff) -> impl IntoResponse {
    Json(ApiResponse::success(json!({
        "page": "client_new",
        "fields": ["name", "company", "email", "phone", "notes"]
    })))
}

pub async fn create_client(
    staff: RequireStaff,
    State(state): State<Arc<AppState>>,
    Json(form): Json<ClientForm>,
) -> Response {
    if let Err(e) = validate_display_name(&form.name, "Client") {
        return recover(&state, &staff.session.id, e);
    }

    let client = Client {
        id: Uuid::new_v4().to_string(),
        name: form.name,
        company: form.company,
        email: form.email,
        phone: form.phone,
        notes: form.notes,
        created_by: staff.user.id.clone(),
        created_at: Utc::now(),
    };

    if let Err(e) = state.store.create_client(&client) {
        return recover(&state, &staff.session.id, e);
    }

    flash_redirect(
        &state,
        &staff.session.id,
        FlashLevel::Success,
        format!("Client '{}' created", client.name),
    )
}

pub async fn edit_client_context(
    _staff: RequireStaff,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let client = state
        .store
        .get_client(&id)
        .api_err("Failed to get client")?
        .or_not_found("Client not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(client)))
}

/// Any staff member may edit any client; there is no owner restriction.
/// `created_by` is stamped on create only and never reassigned.
pub async fn edit_client(
    staff: RequireStaff,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(form): Json<ClientForm>,
) -> Response {
    if let Err(e) = validate_display_name(&form.name, "Client") {
        return recover(&state, &staff.session.id, e);
    }

    let mut client = match state.store.get_client(&id) {
        Ok(Some(c)) => c,
        Ok(None) => return recover(&state, &staff.session.id, Error::NotFound),
        Err(e) => return recover(&state, &staff.session.id, e),
    };

    client.name = form.name;
    client.company = form.company;
    client.email = form.email;
    client.phone = form.phone;
    client.notes = form.notes;

    if let Err(e) = state.store.update_client(&client) {
        return recover(&state, &staff.session.id, e);
    }

    flash_redirect(
        &state,
        &staff.session.id,
        FlashLevel::Success,
        format!("Client '{}' updated", client.name),
    )
}

pub async fn delete_client(
    staff: RequireStaff,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.store.delete_client(&id) {
        Ok(true) => {}
        Ok(false) => return recover(&state, &staff.session.id, Error::NotFound),
        Err(e) => return recover(&state, &staff.session.id, e),
    }

    flash_redirect(&state, &staff.session.id, FlashLevel::Success, "Client deleted")
}
