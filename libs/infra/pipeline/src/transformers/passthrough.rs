// [libs/infra/pipeline/src/transformers/passthrough.rs]
use certslurp_domain_models::Record;

use crate::errors::PipelineError;
use crate::traits::Transformer;

/// `passthrough` transformer: the identity map, used when a job wants
/// every extracted record written as-is.
pub struct PassthroughTransformer;

impl Transformer for PassthroughTransformer {
    fn transform(&self, record: Record) -> Result<Option<Record>, PipelineError> {
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_the_record_through_unchanged() {
        let mut record = Record::new();
        record.insert("index", 1);
        let out = PassthroughTransformer.transform(record.clone()).unwrap().unwrap();
        assert_eq!(out.get("index"), record.get("index"));
    }
}
