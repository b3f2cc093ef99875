mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
///
/// Plain operations are single statements. The role-lifecycle operations
/// (`set_superuser_flag`, `delete_user`, `request_access`,
/// `approve_access_request`, `deny_access_request`) run their check-then-act
/// sequence inside one transaction so the last-superuser guard and the
/// pending-request dedup cannot race. Actor permission checks live above the
/// store, in `roles`.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    fn list_users(&self, cursor: &str, limit: i32) -> Result<Vec<User>>;
    fn update_user(&self, user: &User) -> Result<()>;
    /// Sets the staff flag, floored at the superuser flag in the same
    /// statement. A superuser's staff flag never drops, whatever the caller
    /// read beforehand.
    fn set_staff_flag(&self, id: &str, value: bool) -> Result<()>;
    fn set_superuser_flag(&self, id: &str, value: bool) -> Result<()>;
    /// Deletes a user. Fails with `InvariantViolation` if the target is the
    /// last remaining superuser.
    fn delete_user(&self, id: &str) -> Result<bool>;
    fn has_superuser(&self) -> Result<bool>;

    // Profile operations
    fn get_profile(&self, user_id: &str) -> Result<Option<Profile>>;
    /// Creates the profile if missing, or fills an empty avatar. Existing
    /// non-empty avatars are left alone.
    fn ensure_profile(&self, user_id: &str, avatar: &str) -> Result<Profile>;

    // Client operations
    fn create_client(&self, client: &Client) -> Result<()>;
    fn get_client(&self, id: &str) -> Result<Option<Client>>;
    fn list_clients(&self) -> Result<Vec<Client>>;
    /// Updates the descriptive fields. `created_by` is never reassigned.
    fn update_client(&self, client: &Client) -> Result<()>;
    fn delete_client(&self, id: &str) -> Result<bool>;

    // Record operations
    fn create_record(&self, record: &Record) -> Result<()>;
    fn get_record(&self, id: &str) -> Result<Option<Record>>;
    fn list_records(&self) -> Result<Vec<Record>>;
    fn delete_record(&self, id: &str) -> Result<bool>;

    // Access request operations
    fn get_access_request(&self, id: &str) -> Result<Option<AccessRequest>>;
    fn find_pending_request(&self, user_id: &str) -> Result<Option<AccessRequest>>;
    /// The user's most recently filed request, whatever its status.
    fn latest_access_request(&self, user_id: &str) -> Result<Option<AccessRequest>>;
    fn list_access_requests(&self, status: Option<AccessRequestStatus>)
    -> Result<Vec<AccessRequest>>;
    /// Returns the existing pending request for this user if one exists,
    /// otherwise creates a new pending request. Idempotent.
    fn request_access(&self, user_id: &str, note: &str, now: DateTime<Utc>)
    -> Result<AccessRequest>;
    /// Pending -> approved; also sets the requester's staff flag.
    fn approve_access_request(&self, id: &str, now: DateTime<Utc>) -> Result<AccessRequest>;
    /// Pending -> denied. No flag change.
    fn deny_access_request(&self, id: &str, now: DateTime<Utc>) -> Result<AccessRequest>;

    // Session operations
    fn create_session(&self, session: &Session) -> Result<()>;
    fn get_session_by_lookup(&self, lookup: &str) -> Result<Option<Session>>;
    fn delete_session(&self, id: &str) -> Result<bool>;
    fn update_session_last_used(&self, id: &str) -> Result<()>;

    // Flash queue operations
    fn push_flash(&self, session_id: &str, level: FlashLevel, message: &str) -> Result<()>;
    /// Drains the session's queue: returns the messages and deletes them.
    fn take_flash(&self, session_id: &str) -> Result<Vec<FlashMessage>>;

    fn close(&self) -> Result<()>;
}
