// [libs/infra/pipeline/src/sinks/null.rs]
use async_trait::async_trait;
use certslurp_domain_models::{Manifest, Record};
use chrono::Utc;

use crate::errors::PipelineError;
use crate::traits::Sink;

/// `null` sink: discards every record, counting what it would have
/// written. Used to exercise the supervisor end to end without a real
/// downstream store.
pub struct NullSink {
    record_count: u64,
    byte_count: u64,
}

impl NullSink {
    pub fn new() -> Self {
        NullSink { record_count: 0, byte_count: 0 }
    }
}

impl Default for NullSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sink for NullSink {
    async fn write(&mut self, record: Record) -> Result<(), PipelineError> {
        self.record_count += 1;
        self.byte_count += serde_json::to_vec(&record.0)
            .map_err(|e| PipelineError::Sink(e.to_string()))?
            .len() as u64;
        Ok(())
    }

    async fn finish(&mut self) -> Result<Manifest, PipelineError> {
        Ok(Manifest {
            record_count: self.record_count,
            byte_count: self.byte_count,
            sink_locator: "null://".to_string(),
            completed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_records_and_bytes_without_storing_them() {
        let mut sink = NullSink::new();
        let mut record = Record::new();
        record.insert("index", 1);
        sink.write(record).await.unwrap();
        sink.write(Record::new()).await.unwrap();

        let manifest = sink.finish().await.unwrap();
        assert_eq!(manifest.record_count, 2);
        assert!(manifest.byte_count > 0);
    }
}
