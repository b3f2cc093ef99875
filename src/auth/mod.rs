mod helpers;
mod middleware;
mod password;
mod session;

pub use helpers::{SessionValidationError, ValidatedSession, extract_token_from_header, validate_session};
pub use middleware::{AuthError, RequireAuth, RequireStaff, RequireSuperuser};
pub use password::{hash_password, verify_password};
pub use session::{SessionTokenGenerator, parse_token};
