use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

use crate::auth::{RequireStaff, RequireSuperuser, hash_password};
use crate::error::Error;
use crate::roles;
use crate::server::AppState;
use crate::server::dto::{
    CreateUserRequest, ToggleStaffRequest, ToggleSuperuserRequest, UpdateUserRequest, UserResponse,
};
use crate::server::response::{
    ApiError, ApiResponse, StoreOptionExt, StoreResultExt, flash_redirect, recover,
};
use crate::server::validation::{validate_password, validate_username};
use crate::store::Store;
use crate::types::{FlashLevel, User, pick_avatar, stable_avatar};

/// The stored avatar if one exists, else the deterministic fallback so the
/// presentation layer never renders a missing image.
pub(super) fn resolve_avatar(store: &dyn Store, user: &User) -> String {
    match store.get_profile(&user.id) {
        Ok(Some(profile)) if !profile.avatar.is_empty() => profile.avatar,
        _ => stable_avatar(&user.username).to_string(),
    }
}

pub async fn create_user(
    staff: RequireStaff,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Response {
    if let Err(e) = validate_username(&req.username) {
        return recover(&state, &staff.session.id, e);
    }
    if let Err(e) = validate_password(&req.password) {
        return recover(&state, &staff.session.id, e);
    }

    let password_hash = match hash_password(&req.password) {
        Ok(h) => h,
        Err(e) => return recover(&state, &staff.session.id, e),
    };

    let user = User {
        id: Uuid::new_v4().to_string(),
        username: req.username,
        password_hash,
        email: req.email,
        is_staff: false,
        is_superuser: false,
        date_joined: Utc::now(),
    };

    match state.store.create_user(&user) {
        Ok(()) => {}
        Err(Error::AlreadyExists) => {
            return recover(
                &state,
                &staff.session.id,
                Error::Validation("Username is already taken".to_string()),
            );
        }
        Err(e) => return recover(&state, &staff.session.id, e),
    }

    let avatar = pick_avatar(rand::thread_rng().r#gen());
    if let Err(e) = state.store.ensure_profile(&user.id, avatar) {
        return recover(&state, &staff.session.id, e);
    }

    flash_redirect(
        &state,
        &staff.session.id,
        FlashLevel::Success,
        format!("User '{}' created", user.username),
    )
}

pub async fn edit_user_context(
    _staff: RequireStaff,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let user = state
        .store
        .get_user(&id)
        .api_err("Failed to get user")?
        .or_not_found("User not found")?;

    let avatar = resolve_avatar(state.store.as_ref(), &user);
    Ok::<_, ApiError>(Json(ApiResponse::success(UserResponse::new(&user, avatar))))
}

pub async fn edit_user(
    staff: RequireStaff,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Response {
    let mut user = match state.store.get_user(&id) {
        Ok(Some(u)) => u,
        Ok(None) => return recover(&state, &staff.session.id, Error::NotFound),
        Err(e) => return recover(&state, &staff.session.id, e),
    };

    // Same target protection as the toggles and delete: a staff-only actor
    // may not rewrite a superuser's credentials.
    if user.is_superuser && !staff.user.role().is_superuser() {
        return recover(&state, &staff.session.id, Error::Forbidden);
    }

    if let Some(username) = req.username {
        if let Err(e) = validate_username(&username) {
            return recover(&state, &staff.session.id, e);
        }
        if username != user.username {
            match state.store.get_user_by_username(&username) {
                Ok(Some(_)) => {
                    return recover(
                        &state,
                        &staff.session.id,
                        Error::Validation("Username is already taken".to_string()),
                    );
                }
                Ok(None) => {}
                Err(e) => return recover(&state, &staff.session.id, e),
            }
        }
        user.username = username;
    }

    if let Some(email) = req.email {
        user.email = email;
    }

    if let Some(password) = req.password {
        if let Err(e) = validate_password(&password) {
            return recover(&state, &staff.session.id, e);
        }
        user.password_hash = match hash_password(&password) {
            Ok(h) => h,
            Err(e) => return recover(&state, &staff.session.id, e),
        };
    }

    if let Err(e) = state.store.update_user(&user) {
        return recover(&state, &staff.session.id, e);
    }

    flash_redirect(
        &state,
        &staff.session.id,
        FlashLevel::Success,
        format!("User '{}' updated", user.username),
    )
}

pub async fn delete_user(
    staff: RequireStaff,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let self_delete = id == staff.user.id;

    match roles::delete_user(state.store.as_ref(), &id, &staff.user) {
        Ok(()) => {}
        Err(e) => return recover(&state, &staff.session.id, e),
    }

    if self_delete {
        // The actor's sessions cascade with the user row; nothing to flash
        // into. Send them to the landing page.
        return Redirect::to("/").into_response();
    }

    flash_redirect(&state, &staff.session.id, FlashLevel::Success, "User deleted")
}

pub async fn toggle_staff(
    staff: RequireStaff,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ToggleStaffRequest>,
) -> Response {
    let updated = match roles::set_staff(state.store.as_ref(), &id, req.staff, &staff.user) {
        Ok(u) => u,
        Err(e) => return recover(&state, &staff.session.id, e),
    };

    if updated.id == staff.user.id && !updated.is_staff {
        // Self-demotion: the dashboard will show the access prompt next
        return flash_redirect(
            &state,
            &staff.session.id,
            FlashLevel::Info,
            "You no longer have staff access",
        );
    }

    let verb = if updated.is_staff { "granted to" } else { "revoked from" };
    flash_redirect(
        &state,
        &staff.session.id,
        FlashLevel::Success,
        format!("Staff access {verb} '{}'", updated.username),
    )
}

pub async fn toggle_superuser(
    superuser: RequireSuperuser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ToggleSuperuserRequest>,
) -> Response {
    let updated = match roles::set_superuser(
        state.store.as_ref(),
        &id,
        req.superuser,
        &superuser.user,
    ) {
        Ok(u) => u,
        Err(e) => return recover(&state, &superuser.session.id, e),
    };

    let verb = if updated.is_superuser { "granted to" } else { "revoked from" };
    flash_redirect(
        &state,
        &superuser.session.id,
        FlashLevel::Success,
        format!("Superuser access {verb} '{}'", updated.username),
    )
}
