// [libs/infra/secrets/src/keypair.rs]
//! The node's long-lived X25519 key-pair, persisted to a keychain
//! file so a restarted node does not need to re-enroll.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crypto_box::aead::OsRng;
use crypto_box::{PublicKey, SecretKey};
use serde::{Deserialize, Serialize};

use crate::errors::SecretsError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeychainFile {
    secret_key_base64: String,
}

pub struct NodeKeypair {
    pub secret: SecretKey,
}

impl NodeKeypair {
    pub fn generate() -> Self {
        NodeKeypair {
            secret: SecretKey::generate(&mut OsRng),
        }
    }

    pub fn public(&self) -> PublicKey {
        self.secret.public_key()
    }

    pub fn public_base64(&self) -> String {
        BASE64.encode(self.public().as_bytes())
    }

    /// Loads the keypair from `path` if it exists, otherwise generates
    /// a fresh one and writes it with owner-only permissions.
    pub fn load_or_generate(path: &Path) -> Result<Self, SecretsError> {
        if path.exists() {
            Self::load(path)
        } else {
            let keypair = Self::generate();
            keypair.save(path)?;
            Ok(keypair)
        }
    }

    pub fn load(path: &Path) -> Result<Self, SecretsError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SecretsError::KeychainIo {
            path: path.display().to_string(),
            source,
        })?;
        let file: KeychainFile = serde_json::from_str(&contents).map_err(|_| SecretsError::MalformedEnvelope)?;
        let bytes = BASE64.decode(file.secret_key_base64)?;
        if bytes.len() != 32 {
            return Err(SecretsError::InvalidClusterKeyLength(bytes.len()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(NodeKeypair { secret: SecretKey::from(arr) })
    }

    pub fn save(&self, path: &Path) -> Result<(), SecretsError> {
        let file = KeychainFile {
            secret_key_base64: BASE64.encode(self.secret.to_bytes()),
        };
        let contents = serde_json::to_string(&file).expect("keychain file is always serializable");
        std::fs::write(path, contents).map_err(|source| SecretsError::KeychainIo {
            path: path.display().to_string(),
            source,
        })?;
        restrict_to_owner(path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> Result<(), SecretsError> {
    use std::fs::Permissions;
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, Permissions::from_mode(0o600)).map_err(|source| SecretsError::KeychainIo {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> Result<(), SecretsError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_or_generate_persists_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.keychain");

        let first = NodeKeypair::load_or_generate(&path).unwrap();
        let second = NodeKeypair::load_or_generate(&path).unwrap();

        assert_eq!(first.public().as_bytes(), second.public().as_bytes());
    }

    #[cfg(unix)]
    #[test]
    fn keychain_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.keychain");
        NodeKeypair::generate().save(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
