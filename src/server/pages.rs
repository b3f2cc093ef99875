use axum::Json;
use serde_json::{Value, json};

/// Landing page context. Public; the presentation layer renders it.
pub async fn home() -> Json<Value> {
    Json(json!({
        "data": {
            "page": "index",
            "title": "opsdesk",
            "links": { "login": "/login", "register": "/register", "dashboard": "/dashboard" }
        },
        "error": null
    }))
}
