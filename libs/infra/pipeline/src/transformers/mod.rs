// [libs/infra/pipeline/src/transformers/mod.rs]
pub mod passthrough;
