// [libs/infra/pipeline/src/errors.rs]
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("[PIPE_UNKNOWN_COMPONENT]: no {kind} named '{name}'")]
    UnknownComponent { kind: &'static str, name: String },

    #[error("[PIPE_EXTRACT_FAULT]: {0}")]
    Extract(String),

    #[error("[PIPE_TRANSFORM_FAULT]: {0}")]
    Transform(String),

    #[error("[PIPE_SINK_FAULT]: {0}")]
    Sink(String),

    #[error("[PIPE_FETCH_UNAVAILABLE]: {0}")]
    FetchUnavailable(#[from] reqwest::Error),

    #[error("[PIPE_FETCH_MALFORMED]: {0}")]
    FetchMalformed(String),
}
