use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::auth::{RequireAuth, SessionTokenGenerator, hash_password, verify_password};
use crate::server::AppState;
use crate::server::dto::{LoginRequest, LoginResponse, RegisterRequest, UserResponse};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::server::validation::{validate_password, validate_username};
use crate::types::{Session, User, pick_avatar};

const SESSION_TTL_DAYS: i64 = 14;
const MAX_SESSION_RETRIES: u32 = 3;

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    if let Err(e) = validate_username(&req.username) {
        return Err(ApiError::bad_request(e.to_string()));
    }
    if let Err(e) = validate_password(&req.password) {
        return Err(ApiError::bad_request(e.to_string()));
    }

    let existing = state
        .store
        .get_user_by_username(&req.username)
        .api_err("Failed to check username")?;
    if existing.is_some() {
        return Err(ApiError::conflict("Username is already taken"));
    }

    let password_hash =
        hash_password(&req.password).map_err(|_| ApiError::internal("Failed to hash password"))?;

    let user = User {
        id: Uuid::new_v4().to_string(),
        username: req.username,
        password_hash,
        email: req.email,
        is_staff: false,
        is_superuser: false,
        date_joined: Utc::now(),
    };

    state
        .store
        .create_user(&user)
        .map_err(|e| match e {
            crate::error::Error::AlreadyExists => ApiError::conflict("Username is already taken"),
            _ => ApiError::internal("Failed to create user"),
        })?;

    // Every new identity gets a profile with a randomly chosen avatar
    let avatar = pick_avatar(rand::thread_rng().r#gen());
    let profile = state
        .store
        .ensure_profile(&user.id, avatar)
        .api_err("Failed to create profile")?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(UserResponse::new(
            &user,
            profile.avatar,
        ))),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let user = state
        .store
        .get_user_by_username(&req.username)
        .api_err("Failed to look up user")?
        .ok_or_else(|| ApiError::unauthorized("Invalid username or password"))?;

    let valid = verify_password(&req.password, &user.password_hash)
        .map_err(|_| ApiError::internal("Failed to verify password"))?;
    if !valid {
        return Err(ApiError::unauthorized("Invalid username or password"));
    }

    let generator = SessionTokenGenerator::new();
    let expires_at = Some(Utc::now() + Duration::days(SESSION_TTL_DAYS));

    for _ in 0..MAX_SESSION_RETRIES {
        let (raw_token, lookup, hash) = generator
            .generate()
            .map_err(|_| ApiError::internal("Failed to generate session token"))?;

        let session = Session {
            id: Uuid::new_v4().to_string(),
            token_hash: hash,
            token_lookup: lookup,
            user_id: user.id.clone(),
            created_at: Utc::now(),
            expires_at,
            last_used_at: None,
        };

        match state.store.create_session(&session) {
            Ok(()) => {
                let avatar = super::users::resolve_avatar(state.store.as_ref(), &user);
                return Ok(Json(ApiResponse::success(LoginResponse {
                    token: raw_token,
                    user: UserResponse::new(&user, avatar),
                })));
            }
            Err(crate::error::Error::SessionLookupCollision) => continue,
            Err(_) => return Err(ApiError::internal("Failed to create session")),
        }
    }

    Err(ApiError::internal("Failed to create session after retries"))
}

pub async fn logout(auth: RequireAuth, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state
        .store
        .delete_session(&auth.session.id)
        .api_err("Failed to delete session")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
