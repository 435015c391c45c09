// [libs/infra/coordination-store/src/errors.rs]
//! Error catalog for the coordination-store adapter.

use thiserror::Error;

/// Failures surfaced by the coordination-store adapter.
///
/// Every variant here maps onto the "store-unavailable" error kind of
/// the core's error taxonomy: background loops retry these with
/// backoff, API handlers turn them into a 500.
#[derive(Error, Debug)]
pub enum CoordinationStoreError {
    #[error("[CS_CONN_FAULT]: could not reach coordination store: {0}")]
    Unavailable(String),

    #[error("[CS_TXN_FAULT]: transaction build or execution failed: {0}")]
    Transaction(String),

    #[error("[CS_LEASE_FAULT]: lease operation failed: {0}")]
    Lease(String),

    #[error("[CS_WATCH_FAULT]: watch stream failed: {0}")]
    Watch(String),

    #[error("[CS_CODEC_FAULT]: value at key '{key}' is not valid UTF-8/JSON: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("[CS_NOT_FOUND]: key '{0}' does not exist")]
    NotFound(String),
}

impl From<etcd_client::Error> for CoordinationStoreError {
    fn from(err: etcd_client::Error) -> Self {
        CoordinationStoreError::Unavailable(err.to_string())
    }
}
