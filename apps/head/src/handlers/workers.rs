// [apps/head/src/handlers/workers.rs]
//! Assembles `WorkerSnapshot`s straight off the coordination store —
//! there's no dedicated worker-registry engine crate, since the
//! read side here is a plain prefix scan and merge.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::Json;
use certslurp_domain_models::{keys, WorkerInfo, WorkerMetrics, WorkerSnapshot};
use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Default)]
struct Partial {
    info: Option<WorkerInfo>,
    last_seen: Option<DateTime<Utc>>,
    metrics: WorkerMetrics,
    last_updated: Option<DateTime<Utc>>,
}

async fn assemble_all(state: &AppState) -> Result<Vec<WorkerSnapshot>, ApiError> {
    let prefix = keys::workers_prefix(&state.root);
    let entries = state.store.list(&prefix).await?;

    let mut partials: BTreeMap<String, Partial> = BTreeMap::new();
    for kv in entries {
        let Some(rest) = kv.key.strip_prefix(&prefix) else { continue };
        let mut parts = rest.splitn(2, '/');
        let Some(worker_id) = parts.next() else { continue };
        let entry = partials.entry(worker_id.to_string()).or_default();
        match parts.next() {
            None => entry.info = kv.json().ok(),
            Some("last_seen") => entry.last_seen = kv.json().ok(),
            Some("shards_processed") => entry.metrics.shards_processed = kv.json().unwrap_or_default(),
            Some("shards_failed") => entry.metrics.shards_failed = kv.json().unwrap_or_default(),
            Some("processing_time_ns") => entry.metrics.processing_time_ns = kv.json().unwrap_or_default(),
            Some("last_updated") => entry.last_updated = kv.json().ok(),
            _ => {}
        }
    }

    Ok(partials
        .into_values()
        .filter_map(|p| {
            let info = p.info?;
            Some(WorkerSnapshot {
                info,
                last_seen: p.last_seen.unwrap_or_else(Utc::now),
                metrics: p.metrics,
                last_updated: p.last_updated.unwrap_or_else(Utc::now),
            })
        })
        .collect())
}

#[instrument(skip(state))]
pub async fn list_workers(State(state): State<AppState>) -> Result<Json<Vec<WorkerSnapshot>>, ApiError> {
    Ok(Json(assemble_all(&state).await?))
}

#[instrument(skip(state))]
pub async fn get_worker(
    State(state): State<AppState>,
    Path(worker_id): Path<String>,
) -> Result<Json<WorkerSnapshot>, ApiError> {
    assemble_all(&state)
        .await?
        .into_iter()
        .find(|w| w.info.worker_id == worker_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no worker with id {worker_id}")))
}
