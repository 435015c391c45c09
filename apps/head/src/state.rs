// [apps/head/src/state.rs]
use std::collections::HashSet;
use std::sync::Arc;

use certslurp_config::ClusterConfig;
use certslurp_coordination_store::CoordinationStore;
use certslurp_job_engine::JobEngine;
use certslurp_secrets::{NodeKeypair, SecretsAdmin, SecretsClient};
use certslurp_shard_engine::ShardEngine;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CoordinationStore>,
    pub jobs: Arc<JobEngine>,
    pub shards: Arc<ShardEngine>,
    pub secrets_admin: Arc<SecretsAdmin>,
    pub secrets_client: Arc<SecretsClient>,
    pub auth_tokens: Arc<HashSet<String>>,
    pub root: String,
}

impl AppState {
    pub fn new(store: Arc<dyn CoordinationStore>, config: &ClusterConfig, keypair: NodeKeypair) -> Self {
        let root = config.etcd.prefix.clone();
        let client = SecretsClient::new(store.clone(), root.clone(), config.node_id.clone(), keypair);
        AppState {
            jobs: Arc::new(JobEngine::new(store.clone(), root.clone())),
            shards: Arc::new(ShardEngine::new(store.clone(), root.clone(), config.shard)),
            secrets_admin: Arc::new(SecretsAdmin::new(store.clone(), root.clone())),
            secrets_client: Arc::new(client),
            auth_tokens: Arc::new(config.api.auth_tokens.iter().cloned().collect()),
            store,
            root,
        }
    }
}
