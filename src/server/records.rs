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
use crate::server::dto::RecordForm;
use crate::server::response::{ApiResponse, flash_redirect, recover};
use crate::server::validation::validate_display_name;
use crate::types::{FlashLevel, Record};

/// Blank form context for the new-record page.
pub async fn new_record_context(_staff: RequireStaff) -> impl IntoResponse {
    Json(ApiResponse::success(json!({
        "page": "record_new",
        "fields": ["title", "category", "notes"]
    })))
}

pub async fn create_record(
    staff: RequireStaff,
    State(state): State<Arc<AppState>>,
    Json(form): Json<RecordForm>,
) -> Response {
    if let Err(e) = validate_display_name(&form.title, "Record") {
        return recover(&state, &staff.session.id, e);
    }

    let record = Record {
        id: Uuid::new_v4().to_string(),
        title: form.title,
        category: form.category,
        notes: form.notes,
        created_by: staff.user.id.clone(),
        created_at: Utc::now(),
    };

    if let Err(e) = state.store.create_record(&record) {
        return recover(&state, &staff.session.id, e);
    }

    flash_redirect(
        &state,
        &staff.session.id,
        FlashLevel::Success,
        format!("Record '{}' created", record.title),
    )
}

pub async fn delete_record(
    staff: RequireStaff,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.store.delete_record(&id) {
        Ok(true) => {}
        Ok(false) => return recover(&state, &staff.session.id, Error::NotFound),
        Err(e) => return recover(&state, &staff.session.id, e),
    }

    flash_redirect(&state, &staff.session.id, FlashLevel::Success, "Record deleted")
}
