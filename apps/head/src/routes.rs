// [apps/head/src/routes.rs]
//! Assembles the admin HTTP/JSON API. Every route is
//! bearer-token gated except `/healthz`.

use axum::routing::{get, patch, post};
use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

use crate::handlers::{health, jobs, secrets, shards, workers};
use crate::middleware::auth_guard;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/jobs", post(jobs::submit_job).get(jobs::list_jobs))
        .route("/jobs/:job_id", get(jobs::get_job))
        .route("/jobs/:job_id/status", patch(jobs::update_job_status))
        .route("/jobs/:job_id/start", post(jobs::start_job))
        .route("/jobs/:job_id/complete", post(jobs::complete_job))
        .route("/jobs/:job_id/cancel", post(jobs::cancel_job))
        .route("/jobs/:job_id/shards", get(shards::list_shards))
        .route("/jobs/:job_id/shards/reset-failed", post(shards::reset_failed_shards))
        .route("/jobs/:job_id/shards/:shard_id", get(shards::get_shard))
        .route("/jobs/:job_id/shards/:shard_id/reset-failed", post(shards::reset_failed_shard))
        .route("/workers", get(workers::list_workers))
        .route("/workers/:worker_id", get(workers::get_worker))
        .route("/secrets/nodes/pending", get(secrets::list_pending_nodes))
        .route("/secrets/nodes/approve", post(secrets::approve_node))
        .route("/secrets/store", get(secrets::list_store_keys))
        .route(
            "/secrets/store/:key",
            get(secrets::get_store_value)
                .put(secrets::put_store_value)
                .delete(secrets::delete_store_value),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    Router::new()
        .route("/healthz", get(health::healthz))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
