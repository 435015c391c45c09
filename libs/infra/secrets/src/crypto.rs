// [libs/infra/secrets/src/crypto.rs]
//! The two fixed crypto primitives: an anonymous public-key seal
//! for distributing the cluster key to a node, and an
//! authenticated 192-bit-nonce stream cipher for values at rest under
//! that key. Neither is configurable — a second algorithm here would
//! be a downgrade path, not a feature.

use crypto_box::aead::{Aead, OsRng};
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use xsalsa20poly1305::aead::{KeyInit, Nonce as XNonce};
use xsalsa20poly1305::{Key as XKey, XSalsa20Poly1305};

use crate::errors::SecretsError;

pub const CLUSTER_KEY_LEN: usize = 32;
const SEAL_NONCE_LEN: usize = 24;
const SEAL_HEADER_LEN: usize = 32 + SEAL_NONCE_LEN; // ephemeral pubkey || nonce

/// An ephemeral-sender sealed envelope: `ephemeral_pub(32) ‖ nonce(24) ‖
/// ciphertext`. The recipient's public key never needs to be known to
/// anyone but the sender; only the recipient's secret key can open it.
pub fn seal(recipient_public: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, SecretsError> {
    let ephemeral_secret = SecretKey::generate(&mut OsRng);
    let ephemeral_public = ephemeral_secret.public_key();
    let sender_box = SalsaBox::new(recipient_public, &ephemeral_secret);
    let nonce = SalsaBox::generate_nonce(&mut OsRng);

    let ciphertext = sender_box
        .encrypt(&nonce, plaintext)
        .map_err(|_| SecretsError::Seal)?;

    let mut envelope = Vec::with_capacity(SEAL_HEADER_LEN + ciphertext.len());
    envelope.extend_from_slice(ephemeral_public.as_bytes());
    envelope.extend_from_slice(nonce.as_slice());
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

/// Opens an envelope produced by [`seal`] using the recipient's secret
/// key. Fails closed: any length or authentication mismatch is
/// [`SecretsError::Open`]/[`SecretsError::MalformedEnvelope`], never a
/// partial plaintext.
pub fn open(recipient_secret: &SecretKey, envelope: &[u8]) -> Result<Vec<u8>, SecretsError> {
    if envelope.len() < SEAL_HEADER_LEN {
        return Err(SecretsError::MalformedEnvelope);
    }
    let (ephemeral_public_bytes, rest) = envelope.split_at(32);
    let (nonce_bytes, ciphertext) = rest.split_at(SEAL_NONCE_LEN);

    let mut pub_arr = [0u8; 32];
    pub_arr.copy_from_slice(ephemeral_public_bytes);
    let ephemeral_public = PublicKey::from(pub_arr);

    let receiver_box = SalsaBox::new(&ephemeral_public, recipient_secret);
    let nonce = crypto_box::Nonce::clone_from_slice(nonce_bytes);

    receiver_box
        .decrypt(&nonce, ciphertext)
        .map_err(|_| SecretsError::Open)
}

/// `Set(key, plaintext)`: fresh random 24-byte nonce, `nonce ‖
/// secretbox(plaintext, nonce, clusterKey)`.
pub fn encrypt_secret(cluster_key: &[u8; CLUSTER_KEY_LEN], plaintext: &[u8]) -> Result<Vec<u8>, SecretsError> {
    let cipher = XSalsa20Poly1305::new(XKey::from_slice(cluster_key));
    let mut nonce_bytes = [0u8; SEAL_NONCE_LEN];
    crypto_box::aead::rand_core::RngCore::fill_bytes(&mut OsRng, &mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher.encrypt(nonce, plaintext).map_err(|_| SecretsError::Encrypt)?;
    let mut out = Vec::with_capacity(SEAL_NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub fn decrypt_secret(cluster_key: &[u8; CLUSTER_KEY_LEN], blob: &[u8]) -> Result<Vec<u8>, SecretsError> {
    if blob.len() < SEAL_NONCE_LEN {
        return Err(SecretsError::MalformedEnvelope);
    }
    let (nonce_bytes, ciphertext) = blob.split_at(SEAL_NONCE_LEN);
    let cipher = XSalsa20Poly1305::new(XKey::from_slice(cluster_key));
    let nonce = XNonce::from_slice(nonce_bytes);
    cipher.decrypt(nonce, ciphertext).map_err(|_| SecretsError::Decrypt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrips() {
        let recipient = SecretKey::generate(&mut OsRng);
        let envelope = seal(&recipient.public_key(), b"the cluster key material").unwrap();
        let opened = open(&recipient, &envelope).unwrap();
        assert_eq!(opened, b"the cluster key material");
    }

    #[test]
    fn open_fails_for_wrong_recipient() {
        let recipient = SecretKey::generate(&mut OsRng);
        let impostor = SecretKey::generate(&mut OsRng);
        let envelope = seal(&recipient.public_key(), b"secret").unwrap();
        assert!(open(&impostor, &envelope).is_err());
    }

    #[test]
    fn secretbox_roundtrips() {
        let key = [7u8; CLUSTER_KEY_LEN];
        let blob = encrypt_secret(&key, b"hunter2").unwrap();
        assert_eq!(decrypt_secret(&key, &blob).unwrap(), b"hunter2");
    }

    #[test]
    fn secretbox_fails_under_wrong_key() {
        let key = [7u8; CLUSTER_KEY_LEN];
        let other = [9u8; CLUSTER_KEY_LEN];
        let blob = encrypt_secret(&key, b"hunter2").unwrap();
        assert!(decrypt_secret(&other, &blob).is_err());
    }

    #[test]
    fn two_seals_of_the_same_plaintext_differ() {
        let recipient = SecretKey::generate(&mut OsRng);
        let a = seal(&recipient.public_key(), b"same").unwrap();
        let b = seal(&recipient.public_key(), b"same").unwrap();
        assert_ne!(a, b);
    }
}
