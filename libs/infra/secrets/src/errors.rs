// [libs/infra/secrets/src/errors.rs]
use certslurp_coordination_store::CoordinationStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("[SEC_STORE_FAULT]: coordination store error: {0}")]
    Store(#[from] CoordinationStoreError),

    #[error("[SEC_IO_FAULT]: keychain file error at {path}: {source}")]
    KeychainIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("[SEC_ENCODE_FAULT]: base64 decode failed: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("[SEC_SEAL_FAULT]: failed to seal payload to recipient public key")]
    Seal,

    #[error("[SEC_OPEN_FAULT]: failed to open sealed envelope — wrong key or corrupt input")]
    Open,

    #[error("[SEC_ENCRYPT_FAULT]: failed to encrypt secret value")]
    Encrypt,

    #[error("[SEC_DECRYPT_FAULT]: failed to decrypt secret value — wrong cluster key or corrupt ciphertext")]
    Decrypt,

    #[error("[SEC_MALFORMED_ENVELOPE]: envelope shorter than the minimum header length")]
    MalformedEnvelope,

    #[error("[SEC_KEY_LENGTH_FAULT]: cluster key material was {0} bytes, expected exactly 32")]
    InvalidClusterKeyLength(usize),

    #[error("[SEC_NOT_ENROLLED]: node has no cluster key in memory; register() has not completed")]
    NotEnrolled,

    #[error("[SEC_NOT_FOUND]: no pending registration for node {0}")]
    NoPendingRegistration(String),
}
