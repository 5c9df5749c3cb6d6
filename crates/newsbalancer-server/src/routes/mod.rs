//! Route modules for the NewsBalancer API server.

pub mod admin;
pub mod analysis;
pub mod articles;
pub mod feedback;
pub mod health;

use axum::Json;
use serde_json::json;

/// Wrap response data in the uniform success envelope.
pub fn envelope(data: impl serde::Serialize) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "data": data }))
}
