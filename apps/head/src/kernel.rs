// [apps/head/src/kernel.rs]
//! Composition root: wires the coordination-store connection, node
//! enrollment, and the admin API + monitor loop into one process.

use std::sync::Arc;

use certslurp_config::ClusterConfig;
use certslurp_coordination_store::{CoordinationStore, EtcdStore};
use certslurp_secrets::NodeKeypair;
use tracing::{info, instrument};

use crate::monitor;
use crate::routes::build_router;
use crate::state::AppState;

pub struct HeadKernel {
    state: AppState,
    listen_addr: String,
    monitor_period_secs: u64,
    orphan_batch_size: u32,
}

impl HeadKernel {
    #[instrument(skip(config))]
    pub async fn ignite(config: &ClusterConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn CoordinationStore> = Arc::new(
            EtcdStore::connect(&config.etcd.endpoints, config.etcd.username.clone(), config.etcd.password.clone())
                .await?,
        );

        let keypair = NodeKeypair::load_or_generate(&config.secrets.keychain_file)?;
        let state = AppState::new(store, config, keypair);

        if let Some(cluster_key) = &config.secrets.cluster_key {
            if !state.secrets_client.is_enrolled() {
                state.secrets_client.bootstrap_with_cluster_key(cluster_key).await?;
            }
        } else if !state.secrets_client.is_enrolled() {
            state.secrets_client.register_pending().await?;
            info!("head is not self-bootstrapped; awaiting operator approval for cluster key");
        }

        Ok(HeadKernel {
            state,
            listen_addr: config.api.listen_addr.clone(),
            monitor_period_secs: config.head.monitor_period_secs,
            orphan_batch_size: config.head.orphan_batch_size,
        })
    }

    pub async fn launch(self) -> anyhow::Result<()> {
        let monitor_state = self.state.clone();
        tokio::spawn(monitor::run(monitor_state, self.monitor_period_secs, self.orphan_batch_size));

        let router = build_router(self.state);
        let listener = tokio::net::TcpListener::bind(&self.listen_addr).await?;
        info!(addr = %self.listen_addr, "admin API listening");
        axum::serve(listener, router).await?;
        Ok(())
    }
}
