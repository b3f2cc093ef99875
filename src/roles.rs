//! Role-lifecycle operations: the access request state machine and the
//! staff/superuser toggle controller.
//!
//! Actor preconditions are checked here; state invariants (last superuser,
//! privilege floor, pending-request dedup, terminal states) are enforced
//! atomically by the store underneath. Handlers call these functions and translate the error
//! taxonomy into flash messages.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{AccessRequest, User};

/// Files a staff access request for the actor. Staff already have access, so
/// a staff actor is rejected. Calling twice without an intervening response
/// returns the same pending request.
pub fn request_access(
    store: &dyn Store,
    actor: &User,
    note: &str,
    now: DateTime<Utc>,
) -> Result<AccessRequest> {
    if actor.role().is_staff() {
        return Err(Error::Forbidden);
    }
    store.request_access(&actor.id, note, now)
}

/// Approves a pending request and grants the requester staff access.
pub fn approve_request(
    store: &dyn Store,
    request_id: &str,
    actor: &User,
    now: DateTime<Utc>,
) -> Result<AccessRequest> {
    if !actor.role().is_superuser() {
        return Err(Error::Forbidden);
    }
    store.approve_access_request(request_id, now)
}

/// Denies a pending request. The requester's flags are untouched.
pub fn deny_request(
    store: &dyn Store,
    request_id: &str,
    actor: &User,
    now: DateTime<Utc>,
) -> Result<AccessRequest> {
    if !actor.role().is_superuser() {
        return Err(Error::Forbidden);
    }
    store.deny_access_request(request_id, now)
}

/// Sets the target's staff flag.
///
/// A staff-but-not-superuser actor may not touch a superuser target. The
/// store floors the flag at the superuser flag in the write itself, so the
/// privilege floor holds even if the target is promoted after the read here.
/// Self-demotion is allowed; the caller loses dashboard access immediately
/// and must handle the redirect.
pub fn set_staff(store: &dyn Store, target_id: &str, value: bool, actor: &User) -> Result<User> {
    if !actor.role().is_staff() {
        return Err(Error::Forbidden);
    }

    let target = store.get_user(target_id)?.ok_or(Error::NotFound)?;
    if target.is_superuser && !actor.role().is_superuser() {
        return Err(Error::Forbidden);
    }

    store.set_staff_flag(target_id, value)?;
    store.get_user(target_id)?.ok_or(Error::NotFound)
}

/// Sets the target's superuser flag. Demoting the last superuser fails with
/// `InvariantViolation`; promotion also raises the staff flag.
pub fn set_superuser(
    store: &dyn Store,
    target_id: &str,
    value: bool,
    actor: &User,
) -> Result<User> {
    if !actor.role().is_superuser() {
        return Err(Error::Forbidden);
    }

    store.set_superuser_flag(target_id, value)?;
    store.get_user(target_id)?.ok_or(Error::NotFound)
}

/// Deletes the target user. A superuser target requires a superuser actor and
/// another surviving superuser. If the actor deletes themselves, the caller
/// must also terminate the actor's sessions.
pub fn delete_user(store: &dyn Store, target_id: &str, actor: &User) -> Result<()> {
    if !actor.role().is_staff() {
        return Err(Error::Forbidden);
    }

    let target = store.get_user(target_id)?.ok_or(Error::NotFound)?;
    if target.is_superuser && !actor.role().is_superuser() {
        return Err(Error::Forbidden);
    }

    if !store.delete_user(target_id)? {
        return Err(Error::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::AccessRequestStatus;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, SqliteStore) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        (temp, store)
    }

    fn add_user(store: &SqliteStore, username: &str, is_staff: bool, is_superuser: bool) -> User {
        let user = User {
            id: format!("id-{username}"),
            username: username.to_string(),
            password_hash: "$argon2id$test".to_string(),
            email: String::new(),
            is_staff,
            is_superuser,
            date_joined: Utc::now(),
        };
        store.create_user(&user).unwrap();
        store.get_user(&user.id).unwrap().unwrap()
    }

    #[test]
    fn test_staff_cannot_request_access() {
        let (_temp, store) = test_store();
        let staff = add_user(&store, "staffer", true, false);

        let result = request_access(&store, &staff, "", Utc::now());
        assert!(matches!(result, Err(Error::Forbidden)));
    }

    #[test]
    fn test_request_approve_flow() {
        let (_temp, store) = test_store();
        let requester = add_user(&store, "newbie", false, false);
        let superuser = add_user(&store, "root", true, true);

        let request = request_access(&store, &requester, "please", Utc::now()).unwrap();
        assert_eq!(request.status, AccessRequestStatus::Pending);

        let approved = approve_request(&store, &request.id, &superuser, Utc::now()).unwrap();
        assert_eq!(approved.status, AccessRequestStatus::Approved);
        assert!(approved.responded_at.is_some());

        let requester = store.get_user(&requester.id).unwrap().unwrap();
        assert!(requester.is_staff);

        // Terminal: the resolved request cannot be denied afterwards
        let result = deny_request(&store, &request.id, &superuser, Utc::now());
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_duplicate_request_returns_existing() {
        let (_temp, store) = test_store();
        let requester = add_user(&store, "newbie", false, false);

        let first = request_access(&store, &requester, "", Utc::now()).unwrap();
        let second = request_access(&store, &requester, "", Utc::now()).unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_only_superuser_can_respond() {
        let (_temp, store) = test_store();
        let requester = add_user(&store, "newbie", false, false);
        let staff = add_user(&store, "staffer", true, false);
        add_user(&store, "root", true, true);

        let request = request_access(&store, &requester, "", Utc::now()).unwrap();

        let result = approve_request(&store, &request.id, &staff, Utc::now());
        assert!(matches!(result, Err(Error::Forbidden)));

        let result = deny_request(&store, &request.id, &staff, Utc::now());
        assert!(matches!(result, Err(Error::Forbidden)));

        // The request is still pending and the requester unchanged
        let request = store.get_access_request(&request.id).unwrap().unwrap();
        assert_eq!(request.status, AccessRequestStatus::Pending);
        assert!(!store.get_user(&requester.id).unwrap().unwrap().is_staff);
    }

    #[test]
    fn test_approve_missing_request() {
        let (_temp, store) = test_store();
        let superuser = add_user(&store, "root", true, true);

        let result = approve_request(&store, "no-such-id", &superuser, Utc::now());
        assert!(matches!(result, Err(Error::NotFound)));
    }

    #[test]
    fn test_standard_actor_cannot_toggle_staff() {
        let (_temp, store) = test_store();
        let standard = add_user(&store, "nobody", false, false);
        let target = add_user(&store, "target", false, false);

        let result = set_staff(&store, &target.id, true, &standard);
        assert!(matches!(result, Err(Error::Forbidden)));
    }

    #[test]
    fn test_staff_actor_cannot_touch_superuser_target() {
        let (_temp, store) = test_store();
        let staff = add_user(&store, "staffer", true, false);
        let superuser = add_user(&store, "root", true, true);
        add_user(&store, "backup", true, true);

        let result = set_staff(&store, &superuser.id, false, &staff);
        assert!(matches!(result, Err(Error::Forbidden)));

        // A superuser actor may make the same call
        let backup = store.get_user_by_username("backup").unwrap().unwrap();
        set_staff(&store, &superuser.id, false, &backup).unwrap();
    }

    #[test]
    fn test_privilege_floor_keeps_superuser_staff() {
        let (_temp, store) = test_store();
        let superuser = add_user(&store, "root", true, true);
        let other = add_user(&store, "backup", true, true);

        let updated = set_staff(&store, &superuser.id, false, &other).unwrap();
        assert!(updated.is_staff);
        assert!(updated.is_superuser);
    }

    #[test]
    fn test_staff_self_demotion_allowed() {
        let (_temp, store) = test_store();
        let staff = add_user(&store, "staffer", true, false);

        let updated = set_staff(&store, &staff.id, false, &staff).unwrap();
        assert!(!updated.is_staff);
    }

    #[test]
    fn test_last_superuser_demotion_rejected() {
        let (_temp, store) = test_store();
        let superuser = add_user(&store, "root", true, true);

        let result = set_superuser(&store, &superuser.id, false, &superuser);
        assert!(matches!(result, Err(Error::InvariantViolation(_))));

        let unchanged = store.get_user(&superuser.id).unwrap().unwrap();
        assert!(unchanged.is_superuser);
    }

    #[test]
    fn test_staff_actor_cannot_toggle_superuser() {
        let (_temp, store) = test_store();
        let staff = add_user(&store, "staffer", true, false);
        let target = add_user(&store, "target", true, false);
        add_user(&store, "root", true, true);

        let result = set_superuser(&store, &target.id, true, &staff);
        assert!(matches!(result, Err(Error::Forbidden)));
    }

    #[test]
    fn test_superuser_promotion_implies_staff() {
        let (_temp, store) = test_store();
        let superuser = add_user(&store, "root", true, true);
        let target = add_user(&store, "target", false, false);

        let updated = set_superuser(&store, &target.id, true, &superuser).unwrap();
        assert!(updated.is_superuser);
        assert!(updated.is_staff);
    }

    #[test]
    fn test_staff_cannot_delete_superuser() {
        let (_temp, store) = test_store();
        let staff = add_user(&store, "staffer", true, false);
        let superuser = add_user(&store, "root", true, true);
        add_user(&store, "backup", true, true);

        let result = delete_user(&store, &superuser.id, &staff);
        assert!(matches!(result, Err(Error::Forbidden)));
    }

    #[test]
    fn test_last_superuser_cannot_be_deleted() {
        let (_temp, store) = test_store();
        let superuser = add_user(&store, "root", true, true);

        let result = delete_user(&store, &superuser.id, &superuser);
        assert!(matches!(result, Err(Error::InvariantViolation(_))));
        assert!(store.get_user(&superuser.id).unwrap().is_some());
    }

    #[test]
    fn test_superuser_delete_with_survivor() {
        let (_temp, store) = test_store();
        let superuser = add_user(&store, "root", true, true);
        let backup = add_user(&store, "backup", true, true);

        delete_user(&store, &backup.id, &superuser).unwrap();
        assert!(store.get_user(&backup.id).unwrap().is_none());
    }
}
