pub mod events;
pub mod jobs;
pub mod projects;

use axum::Json;

/// GET / — service banner.
pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "projgen build service is running",
        "status": "active",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
