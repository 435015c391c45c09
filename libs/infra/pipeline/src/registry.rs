// [libs/infra/pipeline/src/registry.rs]
//! Resolves the extractor/transformer/sink names carried in a job's
//! `output` options into concrete implementations — the pipeline is
//! a composition chosen by names in the job spec.

use crate::errors::PipelineError;
use crate::extractors::raw::RawExtractor;
use crate::sinks::null::NullSink;
use crate::traits::{Extractor, Sink, Transformer};
use crate::transformers::passthrough::PassthroughTransformer;

pub fn build_extractor(name: &str) -> Result<Box<dyn Extractor>, PipelineError> {
    match name {
        "raw" => Ok(Box::new(RawExtractor)),
        other => Err(PipelineError::UnknownComponent { kind: "extractor", name: other.to_string() }),
    }
}

pub fn build_transformer(name: &str) -> Result<Box<dyn Transformer>, PipelineError> {
    match name {
        "passthrough" => Ok(Box::new(PassthroughTransformer)),
        other => Err(PipelineError::UnknownComponent { kind: "transformer", name: other.to_string() }),
    }
}

pub fn build_sink(name: &str) -> Result<Box<dyn Sink>, PipelineError> {
    match name {
        "null" => Ok(Box::new(NullSink::new())),
        other => Err(PipelineError::UnknownComponent { kind: "sink", name: other.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_the_three_named_components() {
        assert!(build_extractor("raw").is_ok());
        assert!(build_transformer("passthrough").is_ok());
        assert!(build_sink("null").is_ok());
    }

    #[test]
    fn unknown_names_are_rejected() {
        let err = build_extractor("nonexistent").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownComponent { kind: "extractor", .. }));
    }
}
