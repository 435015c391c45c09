// [apps/head/src/handlers/mod.rs]
pub mod health;
pub mod jobs;
pub mod secrets;
pub mod shards;
pub mod workers;
