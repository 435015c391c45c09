// [apps/worker/src/heartbeat.rs]
//! Keeps the worker's lease alive. Workers renew at ≤⅓ TTL — the
//! heartbeat runs far more often than that so a single missed tick
//! never loses the lease.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, instrument};

use crate::metrics::jittered;
use crate::state::WorkerState;

#[instrument(skip(state, shutdown))]
pub async fn run(state: Arc<WorkerState>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(jittered(period)) => {
                if let Err(e) = state.store.keep_alive_once(state.lease).await {
                    error!(error = %e, "lease keep-alive failed; assuming the lease may be lost");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}
