// [libs/infra/pipeline/src/pipeline.rs]
//! The consumer half of the per-shard producer/consumer pair. The
//! producer (a `CtLogFetcher` stream) and
//! the bounded channel connecting the two live in the worker
//! supervisor, which also owns cancellation and lease renewal around
//! this loop.

use certslurp_domain_models::{Manifest, RawLogEntry};
use tokio::sync::mpsc::Receiver;
use tracing::instrument;

use crate::errors::PipelineError;
use crate::traits::{Extractor, Sink, Transformer};

pub struct Pipeline {
    extractor: Box<dyn Extractor>,
    transformer: Box<dyn Transformer>,
    sink: Box<dyn Sink>,
}

impl Pipeline {
    pub fn new(extractor: Box<dyn Extractor>, transformer: Box<dyn Transformer>, sink: Box<dyn Sink>) -> Self {
        Pipeline { extractor, transformer, sink }
    }

    /// Builds a pipeline by resolving the three names from a job's
    /// `output` options through [`crate::registry`].
    pub fn from_names(extractor: &str, transformer: &str, sink: &str) -> Result<Self, PipelineError> {
        Ok(Pipeline::new(
            crate::registry::build_extractor(extractor)?,
            crate::registry::build_transformer(transformer)?,
            crate::registry::build_sink(sink)?,
        ))
    }

    /// Processes one raw entry through extract → transform, returning
    /// `Ok(None)` if the transformer filtered it out.
    fn process(&self, entry: &RawLogEntry) -> Result<Option<certslurp_domain_models::Record>, PipelineError> {
        let record = self.extractor.extract(entry)?;
        self.transformer.transform(record)
    }

    /// Drains `rx` until the producer closes it (normal completion) or
    /// an extract/transform/sink error occurs (propagated so the
    /// caller can `ReportShardFailed`).
    #[instrument(skip(self, rx))]
    pub async fn run(mut self, mut rx: Receiver<RawLogEntry>) -> Result<Manifest, PipelineError> {
        while let Some(entry) = rx.recv().await {
            if let Some(record) = self.process(&entry)? {
                self.sink.write(record).await?;
            }
        }
        self.sink.finish().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certslurp_domain_models::RawLogEntry;

    #[tokio::test]
    async fn runs_entries_through_to_a_manifest() {
        let pipeline = Pipeline::from_names("raw", "passthrough", "null").unwrap();
        let (tx, rx) = tokio::sync::mpsc::channel(8);

        for i in 0..4u64 {
            tx.send(RawLogEntry { index: i, leaf_input: vec![i as u8], extra_data: vec![] })
                .await
                .unwrap();
        }
        drop(tx);

        let manifest = pipeline.run(rx).await.unwrap();
        assert_eq!(manifest.record_count, 4);
    }

    #[tokio::test]
    async fn unknown_component_name_fails_fast_before_any_entry_is_read() {
        let err = Pipeline::from_names("nonexistent", "passthrough", "null").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownComponent { .. }));
    }
}
