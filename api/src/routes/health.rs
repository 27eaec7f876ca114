use axum::Json;
use serde_json::{json, Value};

/// `GET /health` — liveness probe for the orchestrator that schedules jobs.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
