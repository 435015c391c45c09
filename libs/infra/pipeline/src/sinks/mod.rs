// [libs/infra/pipeline/src/sinks/mod.rs]
pub mod null;
