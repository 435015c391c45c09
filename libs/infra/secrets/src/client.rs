// [libs/infra/secrets/src/client.rs]
//! Enrollment and secret CRUD for a single node. Every node in the
//! cluster — head or worker — holds one of these.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use certslurp_coordination_store::{CoordinationStore, TxnOp, WatchEvent};
use certslurp_domain_models::keys;
use crypto_box::PublicKey;
use futures::StreamExt;
use parking_lot::RwLock;
use tracing::{info, instrument};

use crate::crypto::{self, CLUSTER_KEY_LEN};
use crate::errors::SecretsError;
use crate::keypair::NodeKeypair;

/// The result of enrollment: either the node already had a cluster
/// key (self-bootstrap) or it must wait for an operator to approve it.
pub enum EnrollmentOutcome {
    Enrolled,
    AwaitingApproval,
}

pub struct SecretsClient {
    store: Arc<dyn CoordinationStore>,
    root: String,
    node_id: String,
    keypair: NodeKeypair,
    cluster_key: RwLock<Option<[u8; CLUSTER_KEY_LEN]>>,
}

impl SecretsClient {
    pub fn new(store: Arc<dyn CoordinationStore>, root: impl Into<String>, node_id: impl Into<String>, keypair: NodeKeypair) -> Self {
        SecretsClient {
            store,
            root: root.into(),
            node_id: node_id.into(),
            keypair,
            cluster_key: RwLock::new(None),
        }
    }

    pub fn is_enrolled(&self) -> bool {
        self.cluster_key.read().is_some()
    }

    pub fn public_key_base64(&self) -> String {
        self.keypair.public_base64()
    }

    /// Self-bootstrap path: the operator handed this node the cluster
    /// key directly on disk.
    /// The node immediately seals its own `SealedNodeKey` entry (so it
    /// shows up as already-enrolled to anyone listing the cluster) and
    /// injects the key into memory — no operator round-trip needed, so
    /// the very first head can come up without anyone to approve it.
    #[instrument(skip(self, cluster_key_base64), fields(node_id = %self.node_id))]
    pub async fn bootstrap_with_cluster_key(&self, cluster_key_base64: &str) -> Result<(), SecretsError> {
        let bytes = BASE64.decode(cluster_key_base64)?;
        if bytes.len() != CLUSTER_KEY_LEN {
            return Err(SecretsError::InvalidClusterKeyLength(bytes.len()));
        }
        let mut arr = [0u8; CLUSTER_KEY_LEN];
        arr.copy_from_slice(&bytes);

        let envelope = crypto::seal(&self.keypair.public(), &arr)?;
        let sealed_key = keys::secrets_sealed_key(&self.root, &self.node_id);
        self.store.put(&sealed_key, envelope, None).await?;

        *self.cluster_key.write() = Some(arr);
        info!("enrolled via self-bootstrap cluster key");
        Ok(())
    }

    /// Writes `PendingRegistration` with this node's public key.
    /// Idempotent: re-registering overwrites the same key with the
    /// same public key.
    #[instrument(skip(self), fields(node_id = %self.node_id))]
    pub async fn register_pending(&self) -> Result<(), SecretsError> {
        let key = keys::secrets_pending_key(&self.root, &self.node_id);
        let payload = serde_json::json!({ "public_key": self.public_key_base64() });
        self.store
            .put(&key, certslurp_coordination_store::to_json_bytes(&payload), None)
            .await?;
        info!("wrote pending registration, awaiting operator approval");
        Ok(())
    }

    /// Watches `SealedNodeKey` until an approver writes one, opens it
    /// with this node's secret key, and keeps the cluster key in
    /// memory. Blocks until enrollment completes or the watch stream
    /// ends.
    #[instrument(skip(self), fields(node_id = %self.node_id))]
    pub async fn await_approval(&self) -> Result<(), SecretsError> {
        let key = keys::secrets_sealed_key(&self.root, &self.node_id);

        if let Some(existing) = self.store.get(&key).await? {
            return self.open_and_store_cluster_key(&existing.value);
        }

        let mut watch = self.store.watch(&key, false).await?;
        while let Some(event) = watch.next().await {
            match event? {
                WatchEvent::Put(kv) if kv.key == key => {
                    return self.open_and_store_cluster_key(&kv.value);
                }
                _ => continue,
            }
        }
        Err(SecretsError::NotEnrolled)
    }

    fn open_and_store_cluster_key(&self, sealed: &[u8]) -> Result<(), SecretsError> {
        let opened = crypto::open(&self.keypair.secret, sealed)?;
        if opened.len() != CLUSTER_KEY_LEN {
            return Err(SecretsError::InvalidClusterKeyLength(opened.len()));
        }
        let mut arr = [0u8; CLUSTER_KEY_LEN];
        arr.copy_from_slice(&opened);
        *self.cluster_key.write() = Some(arr);
        info!("enrolled via operator-approved sealed cluster key");
        Ok(())
    }

    /// The cluster key held in memory, if enrollment has completed.
    /// Exposed so an enrolled head can seal it to newly-approved nodes
    /// via [`SecretsAdmin::approve`] without a second copy of the key
    /// material living anywhere else.
    pub fn cluster_key(&self) -> Result<[u8; CLUSTER_KEY_LEN], SecretsError> {
        self.cluster_key.read().ok_or(SecretsError::NotEnrolled)
    }

    /// `Set(key, plaintext)`: client-seal — encrypted here, before the
    /// coordination store ever sees a byte of plaintext.
    #[instrument(skip(self, plaintext), fields(node_id = %self.node_id))]
    pub async fn set(&self, key: &str, plaintext: &[u8]) -> Result<(), SecretsError> {
        let cluster_key = self.cluster_key()?;
        let ciphertext = crypto::encrypt_secret(&cluster_key, plaintext)?;
        let store_key = keys::secrets_store_key(&self.root, key);
        self.store.put(&store_key, ciphertext, None).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(node_id = %self.node_id))]
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SecretsError> {
        let cluster_key = self.cluster_key()?;
        let store_key = keys::secrets_store_key(&self.root, key);
        match self.store.get(&store_key).await? {
            Some(kv) => Ok(Some(crypto::decrypt_secret(&cluster_key, &kv.value)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(node_id = %self.node_id))]
    pub async fn delete(&self, key: &str) -> Result<(), SecretsError> {
        let store_key = keys::secrets_store_key(&self.root, key);
        self.store.delete(&store_key).await?;
        Ok(())
    }

    /// Lists stored secret key names (not values) under an optional
    /// sub-prefix.
    #[instrument(skip(self), fields(node_id = %self.node_id))]
    pub async fn list(&self, sub_prefix: &str) -> Result<Vec<String>, SecretsError> {
        let base = keys::secrets_store_prefix(&self.root);
        let full_prefix = format!("{base}{sub_prefix}");
        let entries = self.store.list(&full_prefix).await?;
        Ok(entries
            .into_iter()
            .filter_map(|kv| kv.key.strip_prefix(&base).map(str::to_string))
            .collect())
    }
}

/// Admin-side operations, used only by the head API's `/secrets/nodes`
/// endpoints — these never need a node's own cluster key.
pub struct SecretsAdmin {
    store: Arc<dyn CoordinationStore>,
    root: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PendingNode {
    pub node_id: String,
    pub public_key_base64: String,
}

impl SecretsAdmin {
    pub fn new(store: Arc<dyn CoordinationStore>, root: impl Into<String>) -> Self {
        SecretsAdmin { store, root: root.into() }
    }

    #[instrument(skip(self))]
    pub async fn list_pending(&self) -> Result<Vec<PendingNode>, SecretsError> {
        let prefix = keys::secrets_pending_prefix(&self.root);
        let entries = self.store.list(&prefix).await?;
        let mut pending = Vec::with_capacity(entries.len());
        for kv in entries {
            let node_id = kv
                .key
                .strip_prefix(&prefix)
                .unwrap_or(&kv.key)
                .to_string();
            let payload: serde_json::Value = kv.json()?;
            let public_key_base64 = payload
                .get("public_key")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            pending.push(PendingNode { node_id, public_key_base64 });
        }
        Ok(pending)
    }

    /// Seals `cluster_key` to the pending node's public key, writes
    /// `SealedNodeKey`, and deletes the pending entry — atomically, so
    /// a crash never leaves both present or both absent in a torn
    /// state.
    #[instrument(skip(self, cluster_key), fields(node_id = %node_id))]
    pub async fn approve(&self, node_id: &str, cluster_key: &[u8; CLUSTER_KEY_LEN]) -> Result<(), SecretsError> {
        let pending_key = keys::secrets_pending_key(&self.root, node_id);
        let pending = self
            .store
            .get(&pending_key)
            .await?
            .ok_or_else(|| SecretsError::NoPendingRegistration(node_id.to_string()))?;
        let payload: serde_json::Value = pending.json()?;
        let public_key_base64 = payload
            .get("public_key")
            .and_then(|v| v.as_str())
            .ok_or(SecretsError::MalformedEnvelope)?;
        let public_key_bytes = BASE64.decode(public_key_base64)?;
        if public_key_bytes.len() != 32 {
            return Err(SecretsError::InvalidClusterKeyLength(public_key_bytes.len()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&public_key_bytes);
        let recipient = PublicKey::from(arr);

        let envelope = crypto::seal(&recipient, cluster_key)?;
        let sealed_key = keys::secrets_sealed_key(&self.root, node_id);

        self.store
            .txn(
                vec![certslurp_coordination_store::Predicate::KeyPresent { key: pending_key.clone() }],
                vec![TxnOp::put(&sealed_key, envelope), TxnOp::delete(&pending_key)],
                vec![],
            )
            .await?;
        info!("approved node enrollment, cluster key sealed and delivered");
        Ok(())
    }
}
