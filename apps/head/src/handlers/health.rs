// [apps/head/src/handlers/health.rs]
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

pub async fn healthz() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
