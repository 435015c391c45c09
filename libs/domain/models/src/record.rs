// [libs/domain/models/src/record.rs]
//! Types that flow through the ETL pipeline. The
//! pipeline's `Extractor`/`Transformer`/`Sink` traits live in
//! `certslurp-pipeline`; the shapes they pass between each other live
//! here so the worker crate can depend on the shapes without pulling
//! in pipeline implementations.

use serde::{Deserialize, Serialize};

/// One raw entry pulled from a CT log's `get-entries` window, keyed by
/// its position in the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLogEntry {
    pub index: u64,
    pub leaf_input: Vec<u8>,
    pub extra_data: Vec<u8>,
}

/// A record produced by an `Extractor` and threaded through
/// `Transformer`s before reaching a `Sink`. Intentionally a loose JSON
/// object: the concrete shape is a property of the extractor/transformer
/// pair named in the job spec, not of the coordination plane.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Record(pub serde_json::Map<String, serde_json::Value>);

impl Record {
    pub fn new() -> Self {
        Self(serde_json::Map::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }
}
