// [apps/head/src/handlers/secrets.rs]
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use certslurp_secrets::PendingNode;
use serde::Deserialize;
use tracing::instrument;

use crate::errors::ApiError;
use crate::state::AppState;

#[instrument(skip(state))]
pub async fn list_pending_nodes(State(state): State<AppState>) -> Result<Json<Vec<PendingNode>>, ApiError> {
    Ok(Json(state.secrets_admin.list_pending().await?))
}

#[derive(Debug, Deserialize)]
pub struct ApprovePayload {
    pub node_id: String,
}

/// Seals the head's own cluster key to the pending node. The head must
/// already be enrolled — it's the only node with a
/// standing reason to approve anyone else.
#[instrument(skip(state, payload))]
pub async fn approve_node(
    State(state): State<AppState>,
    Json(payload): Json<ApprovePayload>,
) -> Result<StatusCode, ApiError> {
    let cluster_key = state.secrets_client.cluster_key()?;
    state.secrets_admin.approve(&payload.node_id, &cluster_key).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct PrefixQuery {
    pub prefix: Option<String>,
}

#[instrument(skip(state))]
pub async fn list_store_keys(
    State(state): State<AppState>,
    Query(q): Query<PrefixQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    let prefix = q.prefix.unwrap_or_default();
    Ok(Json(state.secrets_client.list(&prefix).await?))
}

#[instrument(skip(state))]
pub async fn get_store_value(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let value = state
        .secrets_client
        .get(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no secret at key {key}")))?;
    Ok(Json(serde_json::json!({ "value": BASE64.encode(value) })))
}

#[derive(Debug, Deserialize)]
pub struct PutValuePayload {
    pub value: String,
}

#[instrument(skip(state, payload))]
pub async fn put_store_value(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(payload): Json<PutValuePayload>,
) -> Result<StatusCode, ApiError> {
    let plaintext = BASE64
        .decode(&payload.value)
        .map_err(|e| ApiError::BadRequest(format!("value is not valid base64: {e}")))?;
    state.secrets_client.set(&key, &plaintext).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn delete_store_value(State(state): State<AppState>, Path(key): Path<String>) -> Result<StatusCode, ApiError> {
    state.secrets_client.delete(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}
