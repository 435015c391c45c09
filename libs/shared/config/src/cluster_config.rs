// [libs/shared/config/src/cluster_config.rs]
//! `ClusterConfig` loading: env > file > defaults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::ShardPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("[CONFIG_IO_FAULT]: could not read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("[CONFIG_PARSE_FAULT]: could not parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("[CONFIG_MISSING_FAULT]: required setting '{0}' was not provided by env, file or default")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EtcdFileConfig {
    pub endpoints: Option<Vec<String>>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecretsFileConfig {
    pub keychain_file: Option<String>,
    pub cluster_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiFileConfig {
    pub listen_addr: Option<String>,
    pub auth_tokens: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkerFileConfig {
    pub parallelism: Option<u32>,
    pub batch_size: Option<u32>,
    pub poll_period_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeFileConfig {
    pub id: Option<String>,
}

/// The on-disk / serialized shape of a config file. Every field is
/// optional: the file layer only overrides what it sets, and anything
/// it leaves unset falls through to env vars or defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub node: NodeFileConfig,
    #[serde(default)]
    pub etcd: EtcdFileConfig,
    #[serde(default)]
    pub secrets: SecretsFileConfig,
    #[serde(default)]
    pub api: ApiFileConfig,
    #[serde(default)]
    pub worker: WorkerFileConfig,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yml") | Some("yaml")
        );
        if is_yaml {
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                source: Box::new(e),
            })
        } else {
            serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                source: Box::new(e),
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct EtcdConfig {
    pub endpoints: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub prefix: String,
}

#[derive(Debug, Clone)]
pub struct SecretsConfig {
    pub keychain_file: PathBuf,
    pub cluster_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub listen_addr: String,
    pub auth_tokens: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct WorkerRuntimeConfig {
    pub parallelism: u32,
    pub batch_size: u32,
    pub poll_period_secs: u64,
    pub max_parallel: u32,
    pub max_empty_windows: u32,
    pub max_assign_shard_retries: u32,
    pub main_loop_error_threshold: u32,
    pub max_main_loop_backoff_secs: u64,
}

#[derive(Debug, Clone)]
pub struct HeadRuntimeConfig {
    pub monitor_period_secs: u64,
    pub orphan_batch_size: u32,
}

/// Fully resolved configuration used by both `apps/head` and
/// `apps/worker`.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub node_id: String,
    pub etcd: EtcdConfig,
    pub secrets: SecretsConfig,
    pub api: ApiConfig,
    pub worker: WorkerRuntimeConfig,
    pub shard: ShardPolicy,
    pub head: HeadRuntimeConfig,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_list(key: &str) -> Option<Vec<String>> {
    env_string(key).map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse().ok())
}

impl ClusterConfig {
    /// `env > file > defaults`. `file` is the optional parsed contents
    /// of `--config`/`CERTSLURP_CONFIG`; pass `None` to use only env
    /// vars and defaults.
    pub fn load(file: Option<ConfigFile>) -> Result<Self, ConfigError> {
        let file = file.unwrap_or_default();

        let node_id = env_string("NODE_ID")
            .or(file.node.id)
            .unwrap_or_else(default_node_id);

        let endpoints = env_list("ETCD_ENDPOINTS")
            .or(file.etcd.endpoints)
            .ok_or(ConfigError::Missing("etcd.endpoints"))?;
        let etcd = EtcdConfig {
            endpoints,
            username: env_string("ETCD_USERNAME").or(file.etcd.username),
            password: env_string("ETCD_PASSWORD").or(file.etcd.password),
            prefix: env_string("ETCD_PREFIX")
                .or(file.etcd.prefix)
                .unwrap_or_else(|| "/certslurp".to_string()),
        };

        let secrets = SecretsConfig {
            keychain_file: env_string("SECRETS_KEYCHAIN_FILE")
                .or(file.secrets.keychain_file)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("certslurp.keychain")),
            cluster_key: env_string("SECRETS_CLUSTER_KEY").or(file.secrets.cluster_key),
        };

        let api = ApiConfig {
            listen_addr: env_string("API_LISTEN_ADDR")
                .or(file.api.listen_addr)
                .unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            auth_tokens: env_list("API_AUTH_TOKENS").or(file.api.auth_tokens).unwrap_or_default(),
        };

        let worker = WorkerRuntimeConfig {
            parallelism: env_parse("WORKER_PARALLELISM").or(file.worker.parallelism).unwrap_or(4),
            batch_size: env_parse("WORKER_BATCH_SIZE").or(file.worker.batch_size).unwrap_or(8),
            poll_period_secs: env_parse("WORKER_POLL_PERIOD_SECS")
                .or(file.worker.poll_period_secs)
                .unwrap_or(1),
            max_parallel: env_parse("WORKER_MAX_PARALLEL").unwrap_or(4),
            max_empty_windows: env_parse("WORKER_MAX_EMPTY_WINDOWS").unwrap_or(5),
            max_assign_shard_retries: env_parse("WORKER_MAX_ASSIGN_SHARD_RETRIES").unwrap_or(5),
            main_loop_error_threshold: env_parse("WORKER_MAIN_LOOP_ERROR_THRESHOLD").unwrap_or(5),
            max_main_loop_backoff_secs: env_parse("WORKER_MAX_MAIN_LOOP_BACKOFF_SECS").unwrap_or(120),
        };

        let shard = ShardPolicy {
            lease_secs: env_parse("SHARD_LEASE_SECS").unwrap_or(60),
            max_retries: env_parse("SHARD_MAX_RETRIES").unwrap_or(3),
            backoff_base_ms: env_parse("SHARD_BACKOFF_BASE_MS").unwrap_or(1_000),
            backoff_cap_ms: env_parse("SHARD_BACKOFF_CAP_MS").unwrap_or(300_000),
            backoff_jitter_pct: env_parse("SHARD_BACKOFF_JITTER_PCT").unwrap_or(25),
        };

        let head = HeadRuntimeConfig {
            monitor_period_secs: env_parse("HEAD_MONITOR_PERIOD_SECS").unwrap_or(30),
            orphan_batch_size: env_parse("HEAD_ORPHAN_BATCH_SIZE").unwrap_or(50),
        };

        Ok(ClusterConfig {
            node_id,
            etcd,
            secrets,
            api,
            worker,
            shard,
            head,
        })
    }

    /// Convenience for tests and local single-node runs: defaults plus
    /// an explicit etcd endpoint, no file layer involved.
    pub fn for_endpoints(node_id: &str, endpoints: Vec<String>) -> Result<Self, ConfigError> {
        std::env::set_var("ETCD_ENDPOINTS", endpoints.join(","));
        std::env::set_var("NODE_ID", node_id);
        Self::load(None)
    }
}

fn default_node_id() -> String {
    hostname_or_random()
}

fn hostname_or_random() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| format!("node-{:08x}", rand::random::<u32>()))
}

/// Serializable snapshot of the resolved config's non-secret fields,
/// used by the admin API's `/healthz` and startup log line.
pub fn redacted_summary(config: &ClusterConfig) -> HashMap<&'static str, String> {
    let mut summary = HashMap::new();
    summary.insert("node_id", config.node_id.clone());
    summary.insert("etcd_prefix", config.etcd.prefix.clone());
    summary.insert("etcd_endpoints", config.etcd.endpoints.join(","));
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "NODE_ID",
            "ETCD_ENDPOINTS",
            "ETCD_USERNAME",
            "ETCD_PASSWORD",
            "ETCD_PREFIX",
            "API_LISTEN_ADDR",
            "API_AUTH_TOKENS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn env_overrides_file_overrides_defaults() {
        clear_env();
        let mut file = ConfigFile::default();
        file.etcd.endpoints = Some(vec!["http://file-etcd:2379".into()]);
        file.etcd.prefix = Some("/from-file".into());

        std::env::set_var("ETCD_PREFIX", "/from-env");

        let config = ClusterConfig::load(Some(file)).unwrap();
        assert_eq!(config.etcd.endpoints, vec!["http://file-etcd:2379".to_string()]);
        assert_eq!(config.etcd.prefix, "/from-env");
        clear_env();
    }

    #[test]
    #[serial]
    fn missing_endpoints_is_an_error() {
        clear_env();
        let result = ClusterConfig::load(None);
        assert!(matches!(result, Err(ConfigError::Missing("etcd.endpoints"))));
    }

    #[test]
    #[serial]
    fn defaults_fill_every_unset_field() {
        clear_env();
        std::env::set_var("ETCD_ENDPOINTS", "http://127.0.0.1:2379");
        let config = ClusterConfig::load(None).unwrap();
        assert_eq!(config.etcd.prefix, "/certslurp");
        assert_eq!(config.worker.parallelism, 4);
        assert_eq!(config.shard.lease_secs, 60);
        clear_env();
    }
}
