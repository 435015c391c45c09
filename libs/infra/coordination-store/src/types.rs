// [libs/infra/coordination-store/src/types.rs]
//! Primitive types shared by every coordination-store backend.

use serde::{de::DeserializeOwned, Serialize};

use crate::errors::CoordinationStoreError;

/// Opaque lease identifier returned by `grant_lease`.
pub type LeaseId = i64;

/// A single key/value pair as read back from the store, including the
/// modification revision used to build compare-and-swap predicates.
#[derive(Debug, Clone)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
    pub mod_revision: i64,
}

impl KeyValue {
    /// Deserializes the value as JSON into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, CoordinationStoreError> {
        serde_json::from_slice(&self.value).map_err(|source| CoordinationStoreError::Codec {
            key: self.key.clone(),
            source,
        })
    }
}

/// Serializes `value` to JSON bytes, panicking only on a programmer
/// error (a type that cannot serialize at all); callers pass plain
/// domain structs that always serialize.
pub fn to_json_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("domain value must serialize to JSON")
}

/// A guard predicate evaluated atomically against the current store
/// state inside a `Txn`. All predicates in a transaction must hold for
/// `on_true` to run; if any fails, `on_false` runs instead.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// The key's current modification revision equals `revision`.
    ModRevisionEquals { key: String, revision: i64 },
    /// The key does not currently exist (`create_revision == 0`).
    KeyAbsent { key: String },
    /// The key currently exists (`create_revision > 0`).
    KeyPresent { key: String },
}

/// A write performed as part of a `Txn`'s `on_true`/`on_false` branch.
#[derive(Debug, Clone)]
pub enum TxnOp {
    Put {
        key: String,
        value: Vec<u8>,
        lease: Option<LeaseId>,
    },
    Delete {
        key: String,
    },
}

impl TxnOp {
    pub fn put(key: impl Into<String>, value: Vec<u8>) -> Self {
        TxnOp::Put {
            key: key.into(),
            value,
            lease: None,
        }
    }

    pub fn put_leased(key: impl Into<String>, value: Vec<u8>, lease: LeaseId) -> Self {
        TxnOp::Put {
            key: key.into(),
            value,
            lease: Some(lease),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        TxnOp::Delete { key: key.into() }
    }
}

/// Outcome of a `Txn`: which branch ran, plus any `Get` results the
/// backend chooses to echo back (unused by the core today, reserved
/// for callers that want read-modify-write in one round trip).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxnResult {
    pub succeeded: bool,
}

/// An event delivered over a `watch` stream.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Put(KeyValue),
    Delete { key: String },
}
