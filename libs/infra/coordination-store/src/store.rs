// [libs/infra/coordination-store/src/store.rs]
//! The only surface the rest of the core is allowed to depend on.
//!
//! Real deployments bind `CoordinationStore` to [`crate::etcd_store::EtcdStore`];
//! tests bind it to [`crate::memory_store::MemoryStore`]. Nothing above
//! this module touches `etcd_client` directly.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::errors::CoordinationStoreError;
use crate::types::{KeyValue, LeaseId, Predicate, TxnOp, TxnResult, WatchEvent};

/// A live watch subscription. Dropping it cancels the subscription.
pub type WatchStream = BoxStream<'static, Result<WatchEvent, CoordinationStoreError>>;

#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Reads a single key. `Ok(None)` means the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<KeyValue>, CoordinationStoreError>;

    /// Lists every key under `prefix`, ordered by key.
    async fn list(&self, prefix: &str) -> Result<Vec<KeyValue>, CoordinationStoreError>;

    /// Unconditionally writes `key`, optionally tying its lifetime to `lease`.
    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        lease: Option<LeaseId>,
    ) -> Result<(), CoordinationStoreError>;

    /// Deletes a single key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CoordinationStoreError>;

    /// Deletes every key under `prefix`.
    async fn delete_prefix(&self, prefix: &str) -> Result<(), CoordinationStoreError>;

    /// Atomic compare-and-swap across multiple keys: if every predicate
    /// holds, `on_true` is applied; otherwise `on_false` is applied.
    /// Either branch may be empty.
    async fn txn(
        &self,
        predicates: Vec<Predicate>,
        on_true: Vec<TxnOp>,
        on_false: Vec<TxnOp>,
    ) -> Result<TxnResult, CoordinationStoreError>;

    /// Grants a new lease with the given TTL, returning its id.
    async fn grant_lease(&self, ttl_seconds: i64) -> Result<LeaseId, CoordinationStoreError>;

    /// Sends a single keep-alive for `lease`, resetting its TTL countdown.
    async fn keep_alive_once(&self, lease: LeaseId) -> Result<(), CoordinationStoreError>;

    /// Revokes a lease immediately, deleting every key attached to it.
    async fn revoke(&self, lease: LeaseId) -> Result<(), CoordinationStoreError>;

    /// Opens a watch stream over a single key or, when `prefix` is
    /// true, every key under it.
    async fn watch(&self, key_or_prefix: &str, prefix: bool) -> Result<WatchStream, CoordinationStoreError>;
}
