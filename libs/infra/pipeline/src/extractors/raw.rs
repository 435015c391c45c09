// [libs/infra/pipeline/src/extractors/raw.rs]
//! `raw` extractor: passes a log entry through as base64-encoded
//! leaf/extra bytes, without parsing the certificate inside. Full
//! certificate parsing (subject/issuer/domains) is outside this
//! crate's scope — the `raw` extractor is the one named in the
//! happy-path scenario and the baseline every other extractor builds on.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use certslurp_domain_models::{RawLogEntry, Record};

use crate::errors::PipelineError;
use crate::traits::Extractor;

pub struct RawExtractor;

impl Extractor for RawExtractor {
    fn extract(&self, entry: &RawLogEntry) -> Result<Record, PipelineError> {
        let mut record = Record::new();
        record.insert("index", entry.index);
        record.insert("leaf_input", STANDARD.encode(&entry.leaf_input));
        record.insert("extra_data", STANDARD.encode(&entry.extra_data));
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_index_and_base64_payloads() {
        let entry = RawLogEntry { index: 7, leaf_input: vec![1, 2, 3], extra_data: vec![] };
        let record = RawExtractor.extract(&entry).unwrap();
        assert_eq!(record.get("index").unwrap(), 7);
        assert_eq!(record.get("leaf_input").unwrap(), &STANDARD.encode([1, 2, 3]));
    }
}
