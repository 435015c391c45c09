// [apps/worker/src/main.rs]
use std::path::PathBuf;

use anyhow::{Context, Result};
use certslurp_config::{ClusterConfig, ConfigFile};
use certslurp_worker::WorkerKernel;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "certslurp-worker", about = "Shard-claiming CT log scanning worker")]
struct Args {
    /// Path to a YAML or JSON config file, layered under env vars and defaults.
    #[arg(long, env = "CERTSLURP_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    certslurp_telemetry::init_tracing("certslurp-worker");

    let args = Args::parse();
    let file = args
        .config
        .as_deref()
        .map(ConfigFile::load)
        .transpose()
        .context("failed to load config file")?;
    let config = ClusterConfig::load(file).context("failed to resolve cluster config")?;

    WorkerKernel::ignite(&config).await?.launch().await
}
