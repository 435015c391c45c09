// [libs/shared/config/src/lib.rs]
//! Configuration loading and policy constants shared by `apps/head`
//! and `apps/worker`: `env > file > defaults` precedence, the shard
//! retry/backoff policy, and the auto-sharding table.

pub mod cluster_config;
pub mod retry;
pub mod sharding;

pub use cluster_config::{
    ApiConfig, ClusterConfig, ConfigError, ConfigFile, EtcdConfig, HeadRuntimeConfig,
    SecretsConfig, WorkerRuntimeConfig,
};
pub use retry::{exp_backoff, exp_backoff_with_rng, ShardPolicy};
pub use sharding::{auto_shard_size, effective_shard_size, plan_shards};
