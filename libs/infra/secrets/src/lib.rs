// [libs/infra/secrets/src/lib.rs]
//! Node enrollment, sealed cluster-key distribution, and encrypted
//! secret storage. This crate is the only place that touches the two
//! fixed crypto primitives; nothing above it sees plaintext key
//! material.

pub mod client;
pub mod crypto;
pub mod errors;
pub mod keypair;

pub use client::{EnrollmentOutcome, PendingNode, SecretsAdmin, SecretsClient};
pub use crypto::CLUSTER_KEY_LEN;
pub use errors::SecretsError;
pub use keypair::NodeKeypair;
