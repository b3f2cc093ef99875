use serde::{Deserialize, Serialize};

use crate::types::{AccessRequest, FlashMessage, Role, User};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Typed toggle bodies. Role changes are explicit booleans, not form-flag
/// presence checks.
#[derive(Debug, Deserialize)]
pub struct ToggleStaffRequest {
    pub staff: bool,
}

#[derive(Debug, Deserialize)]
pub struct ToggleSuperuserRequest {
    pub superuser: bool,
}

#[derive(Debug, Deserialize)]
pub struct ClientForm {
    pub name: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordForm {
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AccessRequestForm {
    #[serde(default)]
    pub note: String,
}

/// User as handed to the presentation layer: flags plus the derived role and
/// the resolved avatar, never the credential.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub role: Role,
    pub avatar: String,
    pub date_joined: chrono::DateTime<chrono::Utc>,
}

impl UserResponse {
    #[must_use]
    pub fn new(user: &User, avatar: String) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            role: user.role(),
            avatar,
            date_joined: user.date_joined,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccessRequestView {
    #[serde(flatten)]
    pub request: AccessRequest,
    pub username: String,
}

/// The whole context object for the dashboard page. Exactly one of `staff`
/// and `access_prompt` is present, depending on the caller's role.
#[derive(Debug, Serialize)]
pub struct DashboardContext {
    pub user: UserResponse,
    pub messages: Vec<FlashMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staff: Option<StaffContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_prompt: Option<AccessPromptContext>,
}

#[derive(Debug, Serialize)]
pub struct StaffContext {
    pub clients: Vec<crate::types::Client>,
    pub records: Vec<crate::types::Record>,
    pub users: Vec<UserResponse>,
    /// Pending petitions, superusers only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_requests: Option<Vec<AccessRequestView>>,
}

/// What a non-staff caller sees instead of the dashboard: the request-access
/// flow, with their most recent petition if they ever filed one.
#[derive(Debug, Serialize)]
pub struct AccessPromptContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<AccessRequest>,
}
