use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{
    Router,
    routing::{get, post},
};

use super::{access_requests, auth, clients, dashboard, pages, records, users};
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(pages::home))
        .route("/health", get(health))
        // Auth flows
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        // Dashboard
        .route("/dashboard", get(dashboard::dashboard))
        // User management
        .route("/users/new", post(users::create_user))
        .route("/users/{id}/edit", get(users::edit_user_context))
        .route("/users/{id}/edit", post(users::edit_user))
        .route("/users/{id}/delete", post(users::delete_user))
        .route("/users/{id}/toggle-staff", post(users::toggle_staff))
        .route("/users/{id}/toggle-superuser", post(users::toggle_superuser))
        // Client CRUD
        .route("/clients/new", get(clients::new_client_context))
        .route("/clients/new", post(clients::create_client))
        .route("/clients/{id}/edit", get(clients::edit_client_context))
        .route("/clients/{id}/edit", post(clients::edit_client))
        .route("/clients/{id}/delete", post(clients::delete_client))
        // Record CRUD (no edit)
        .route("/records/new", get(records::new_record_context))
        .route("/records/new", post(records::create_record))
        .route("/records/{id}/delete", post(records::delete_record))
        // Access request lifecycle
        .route("/access-requests", post(access_requests::create))
        .route("/access-requests/{id}/approve", post(access_requests::approve))
        .route("/access-requests/{id}/deny", post(access_requests::deny))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
