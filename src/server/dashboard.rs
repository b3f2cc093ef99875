use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::dto::{
    AccessPromptContext, AccessRequestView, DashboardContext, StaffContext, UserResponse,
};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::server::users::resolve_avatar;
use crate::types::AccessRequestStatus;

const MAX_DASHBOARD_USERS: i32 = 500;

/// The dashboard context. Staff get the full management view; everyone else
/// gets the access-request prompt. The session's flash queue is flushed here.
pub async fn dashboard(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let messages = state
        .store
        .take_flash(&auth.session.id)
        .api_err("Failed to read messages")?;

    let avatar = resolve_avatar(state.store.as_ref(), &auth.user);
    let mut context = DashboardContext {
        user: UserResponse::new(&auth.user, avatar),
        messages,
        staff: None,
        access_prompt: None,
    };

    if !auth.user.role().is_staff() {
        // Denied requests stay visible so the user can see the outcome
        let request = state
            .store
            .latest_access_request(&auth.user.id)
            .api_err("Failed to look up access request")?;
        context.access_prompt = Some(AccessPromptContext { request });
        return Ok::<_, ApiError>(Json(ApiResponse::success(context)));
    }

    let clients = state.store.list_clients().api_err("Failed to list clients")?;
    let records = state.store.list_records().api_err("Failed to list records")?;

    let users = state
        .store
        .list_users("", MAX_DASHBOARD_USERS)
        .api_err("Failed to list users")?
        .iter()
        .map(|u| {
            let avatar = resolve_avatar(state.store.as_ref(), u);
            UserResponse::new(u, avatar)
        })
        .collect();

    let pending_requests = if auth.user.role().is_superuser() {
        let pending = state
            .store
            .list_access_requests(Some(AccessRequestStatus::Pending))
            .api_err("Failed to list access requests")?;

        let mut views = Vec::with_capacity(pending.len());
        for request in pending {
            let username = state
                .store
                .get_user(&request.user_id)
                .api_err("Failed to look up requester")?
                .map(|u| u.username)
                .unwrap_or_default();
            views.push(AccessRequestView { request, username });
        }
        Some(views)
    } else {
        None
    };

    context.staff = Some(StaffContext {
        clients,
        records,
        users,
        pending_requests,
    });

    Ok::<_, ApiError>(Json(ApiResponse::success(context)))
}
