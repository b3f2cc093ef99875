//! CLI integration tests for opsdesk admin commands.
//!
//! Each test uses an isolated temp directory for the database, ensuring tests
//! can run in parallel safely.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

use std::path::Path;

use assert_cmd::Command;
use assert_fs::TempDir;
use chrono::Utc;
use opsdesk::auth::verify_password;
use opsdesk::store::{SqliteStore, Store};
use opsdesk::types::User;
use predicates::prelude::*;
use uuid::Uuid;

struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    fn data_dir_str(&self) -> String {
        self.data_dir().to_string_lossy().to_string()
    }

    fn init(&self) -> assert_cmd::assert::Assert {
        self.cmd()
            .args([
                "admin",
                "init",
                "--data-dir",
                &self.data_dir_str(),
                "--non-interactive",
            ])
            .assert()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("opsdesk").expect("failed to find binary");
        cmd.env("NO_COLOR", "1");
        cmd
    }

    fn assign_avatars(&self) -> assert_cmd::assert::Assert {
        self.cmd()
            .args(["admin", "assign-avatars", "--data-dir", &self.data_dir_str()])
            .assert()
    }

    fn open_store(&self) -> SqliteStore {
        let db_path = self.data_dir().join("opsdesk.db");
        SqliteStore::new(&db_path).expect("open store")
    }

    fn superuser_password(&self) -> String {
        std::fs::read_to_string(self.data_dir().join(".superuser_password"))
            .expect("read password file")
            .trim()
            .to_string()
    }
}

fn add_user_directly(ctx: &TestContext, username: &str) -> String {
    let store = ctx.open_store();
    let user = User {
        id: Uuid::new_v4().to_string(),
        username: username.to_string(),
        password_hash: String::new(),
        email: String::new(),
        is_staff: false,
        is_superuser: false,
        date_joined: Utc::now(),
    };
    store.create_user(&user).expect("create user");
    user.id
}

// ============================================================================
// Init Command Tests
// ============================================================================

#[test]
fn init_creates_database_and_password_file() {
    let ctx = TestContext::new();

    ctx.init()
        .success()
        .stdout(predicate::str::contains("Superuser 'root' created"));

    assert!(ctx.data_dir().join("opsdesk.db").exists());
    assert!(ctx.data_dir().join(".superuser_password").exists());
    assert!(!ctx.superuser_password().is_empty());
}

#[test]
fn init_password_file_matches_stored_credential() {
    let ctx = TestContext::new();
    ctx.init().success();

    let store = ctx.open_store();
    let root = store
        .get_user_by_username("root")
        .expect("look up root")
        .expect("root exists");
    assert!(root.is_superuser);
    assert!(root.is_staff);

    let valid = verify_password(&ctx.superuser_password(), &root.password_hash)
        .expect("verify password");
    assert!(valid, "password file should authenticate the superuser");
}

#[test]
fn init_bootstrap_superuser_gets_a_profile() {
    let ctx = TestContext::new();
    ctx.init().success();

    let store = ctx.open_store();
    let root = store
        .get_user_by_username("root")
        .expect("look up root")
        .expect("root exists");
    let profile = store
        .get_profile(&root.id)
        .expect("look up profile")
        .expect("profile exists");
    assert!(profile.avatar.starts_with("img/avatars/"));
}

#[test]
fn init_rejects_second_initialization() {
    let ctx = TestContext::new();

    ctx.init().success();
    ctx.init()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn init_preserves_existing_users_when_reinitialization_rejected() {
    let ctx = TestContext::new();

    ctx.init().success();
    add_user_directly(&ctx, "testuser");

    ctx.init().failure();

    let store = ctx.open_store();
    assert!(
        store
            .get_user_by_username("testuser")
            .expect("look up user")
            .is_some()
    );
}

// ============================================================================
// Assign Avatars Tests
// ============================================================================

#[test]
fn assign_avatars_creates_missing_profiles() {
    let ctx = TestContext::new();
    ctx.init().success();

    let user_id = add_user_directly(&ctx, "alice");

    ctx.assign_avatars()
        .success()
        .stdout(predicate::str::contains("Profiles created: 1, avatars set: 1"));

    let store = ctx.open_store();
    let profile = store
        .get_profile(&user_id)
        .expect("look up profile")
        .expect("profile exists");
    assert!(profile.avatar.starts_with("img/avatars/"));
}

#[test]
fn assign_avatars_fills_empty_avatars_without_recounting_creates() {
    let ctx = TestContext::new();
    ctx.init().success();

    let user_id = add_user_directly(&ctx, "bob");
    {
        let store = ctx.open_store();
        store.ensure_profile(&user_id, "").expect("create blank profile");
    }

    ctx.assign_avatars()
        .success()
        .stdout(predicate::str::contains("Profiles created: 0, avatars set: 1"));
}

#[test]
fn assign_avatars_leaves_existing_avatars_alone() {
    let ctx = TestContext::new();
    ctx.init().success();

    let store = ctx.open_store();
    let root = store
        .get_user_by_username("root")
        .expect("look up root")
        .expect("root exists");
    let before = store
        .get_profile(&root.id)
        .expect("look up profile")
        .expect("profile exists")
        .avatar;
    drop(store);

    ctx.assign_avatars()
        .success()
        .stdout(predicate::str::contains("Profiles created: 0, avatars set: 0"));

    let store = ctx.open_store();
    let after = store
        .get_profile(&root.id)
        .expect("look up profile")
        .expect("profile exists")
        .avatar;
    assert_eq!(before, after);
}

// ============================================================================
// Serve Command Tests
// ============================================================================

#[test]
fn serve_requires_initialization() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Command::cargo_bin("opsdesk")
        .expect("failed to find binary")
        .args(["serve", "--data-dir"])
        .arg(temp_dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Server not initialized"));
}
