//! # Opsdesk
//!
//! A small administration dashboard service, usable both as a standalone
//! binary and as a library. Staff manage clients, records, and user accounts;
//! non-staff users can petition for staff access, which a superuser approves
//! or denies.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! opsdesk = { version = "0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::path::PathBuf;
//! use opsdesk::server::{AppState, create_router};
//! use opsdesk::store::SqliteStore;
//!
//! let store = SqliteStore::new(&PathBuf::from("./data/opsdesk.db")).unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState::new(Arc::new(store)));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes the CLI binary. Disable with `default-features = false`.

pub mod auth;
pub mod config;
pub mod error;
pub mod roles;
pub mod server;
pub mod store;
pub mod types;
