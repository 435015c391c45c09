// [apps/worker/src/kernel.rs]
//! Composition root: wires the coordination-store connection, node
//! enrollment, worker registration, and the three background loops
//! into one process.

use std::sync::Arc;
use std::time::Duration;

use certslurp_config::ClusterConfig;
use certslurp_coordination_store::{to_json_bytes, CoordinationStore, EtcdStore};
use certslurp_domain_models::{keys, WorkerInfo};
use certslurp_job_engine::JobEngine;
use certslurp_secrets::{NodeKeypair, SecretsClient};
use certslurp_shard_engine::ShardEngine;
use chrono::Utc;
use tracing::{info, instrument};

use crate::heartbeat;
use crate::metrics::{self, WorkerMetricsCounters};
use crate::state::WorkerState;
use crate::supervisor;

/// WorkerInfo's lease TTL. Heartbeats renew far more often than this.
const WORKER_LEASE_TTL_SECS: i64 = 150;
const HEARTBEAT_PERIOD_SECS: u64 = 10;
const METRICS_PUSH_PERIOD_SECS: u64 = 10;

pub struct WorkerKernel {
    state: Arc<WorkerState>,
    poll_period: Duration,
}

impl WorkerKernel {
    #[instrument(skip(config))]
    pub async fn ignite(config: &ClusterConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn CoordinationStore> = Arc::new(
            EtcdStore::connect(&config.etcd.endpoints, config.etcd.username.clone(), config.etcd.password.clone())
                .await?,
        );

        let keypair = NodeKeypair::load_or_generate(&config.secrets.keychain_file)?;
        let root = config.etcd.prefix.clone();
        let worker_id = config.node_id.clone();
        let secrets_client =
            Arc::new(SecretsClient::new(store.clone(), root.clone(), worker_id.clone(), keypair));

        if let Some(cluster_key) = &config.secrets.cluster_key {
            if !secrets_client.is_enrolled() {
                secrets_client.bootstrap_with_cluster_key(cluster_key).await?;
            }
        } else if !secrets_client.is_enrolled() {
            secrets_client.register_pending().await?;
            info!("worker is not self-bootstrapped; awaiting operator approval for cluster key");
        }

        let lease = store.grant_lease(WORKER_LEASE_TTL_SECS).await?;
        let info = WorkerInfo {
            worker_id: worker_id.clone(),
            host: hostname(),
            registered_at: Utc::now(),
        };
        store
            .put(&keys::worker_key(&root, &worker_id), to_json_bytes(&info), Some(lease))
            .await?;
        info!(worker_id = %worker_id, lease, "registered worker with the coordination store");

        let state = Arc::new(WorkerState {
            jobs: Arc::new(JobEngine::new(store.clone(), root.clone())),
            shards: Arc::new(ShardEngine::new(store.clone(), root.clone(), config.shard)),
            secrets_client,
            root,
            worker_id,
            lease,
            metrics: Arc::new(WorkerMetricsCounters::new()),
            config: config.worker.clone(),
            store,
        });

        Ok(WorkerKernel {
            state,
            poll_period: Duration::from_secs(config.worker.poll_period_secs.max(1)),
        })
    }

    pub async fn launch(self) -> anyhow::Result<()> {
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        let heartbeat_handle = tokio::spawn(heartbeat::run(
            self.state.clone(),
            Duration::from_secs(HEARTBEAT_PERIOD_SECS),
            shutdown_rx.clone(),
        ));
        let metrics_handle = tokio::spawn(metrics::run(
            self.state.clone(),
            Duration::from_secs(METRICS_PUSH_PERIOD_SECS),
            shutdown_rx.clone(),
        ));
        let supervisor_handle = tokio::spawn(supervisor::run(self.state.clone(), self.poll_period, shutdown_rx));

        tokio::signal::ctrl_c().await?;
        info!("shutdown signal received, draining in-flight shards");
        let _ = shutdown_tx.send(true);

        let _ = supervisor_handle.await;
        let _ = heartbeat_handle.await;
        let _ = metrics_handle.await;

        self.state.store.revoke(self.state.lease).await?;
        info!("worker lease revoked, exiting");
        Ok(())
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty()).unwrap_or_else(|| "unknown".to_string())
}
