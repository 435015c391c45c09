// [libs/infra/pipeline/src/traits.rs]
//! The extractor → transformer → sink seam: each is a capability
//! set, and the pipeline is a composition chosen by names in the job
//! spec.

use async_trait::async_trait;
use certslurp_domain_models::{Manifest, RawLogEntry, Record};

use crate::errors::PipelineError;

/// Produces a record map from a raw log entry. Pure and synchronous —
/// an extractor does not perform I/O.
pub trait Extractor: Send + Sync {
    fn extract(&self, entry: &RawLogEntry) -> Result<Record, PipelineError>;
}

/// Maps a record to zero or one records. Returning `Ok(None)` drops
/// the record from the stream (a filter, not a fault).
pub trait Transformer: Send + Sync {
    fn transform(&self, record: Record) -> Result<Option<Record>, PipelineError>;
}

/// Consumes records and, on `finish`, emits the manifest a shard
/// reports through `ReportShardDone`. A sink owns its own I/O and may
/// suspend on every `write`.
#[async_trait]
pub trait Sink: Send {
    async fn write(&mut self, record: Record) -> Result<(), PipelineError>;

    async fn finish(&mut self) -> Result<Manifest, PipelineError>;
}
