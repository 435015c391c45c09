// [libs/infra/secrets/tests/enrollment.rs]
//! N1 registers pending, is approved with a random cluster key,
//! round-trips a secret; N2 registers, is approved with the same
//! cluster key, and reads what N1 wrote.

use std::sync::Arc;

use certslurp_coordination_store::MemoryStore;
use certslurp_secrets::{NodeKeypair, SecretsAdmin, SecretsClient};

fn random_cluster_key() -> [u8; 32] {
    use rand_core::RngCore;
    let mut key = [0u8; 32];
    crypto_box::aead::OsRng.fill_bytes(&mut key);
    key
}

#[tokio::test]
async fn scenario_s5_two_nodes_share_a_cluster_key() {
    let store: Arc<dyn certslurp_coordination_store::CoordinationStore> = Arc::new(MemoryStore::new());
    let admin = SecretsAdmin::new(store.clone(), "/certslurp");
    let cluster_key = random_cluster_key();

    let n1 = SecretsClient::new(store.clone(), "/certslurp", "n1", NodeKeypair::generate());
    n1.register_pending().await.unwrap();

    let pending = admin.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].node_id, "n1");

    admin.approve("n1", &cluster_key).await.unwrap();
    n1.await_approval().await.unwrap();
    assert!(n1.is_enrolled());

    n1.set("k", b"v").await.unwrap();
    assert_eq!(n1.get("k").await.unwrap().unwrap(), b"v");

    let n2 = SecretsClient::new(store.clone(), "/certslurp", "n2", NodeKeypair::generate());
    n2.register_pending().await.unwrap();
    admin.approve("n2", &cluster_key).await.unwrap();
    n2.await_approval().await.unwrap();

    assert_eq!(n2.get("k").await.unwrap().unwrap(), b"v");

    // the pending entry was consumed by approval, not left dangling
    assert!(admin.list_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn self_bootstrap_skips_the_pending_round_trip() {
    let store: Arc<dyn certslurp_coordination_store::CoordinationStore> = Arc::new(MemoryStore::new());
    let key = random_cluster_key();
    let node = SecretsClient::new(store, "/certslurp", "solo", NodeKeypair::generate());

    use base64::Engine;
    let key_b64 = base64::engine::general_purpose::STANDARD.encode(key);
    node.bootstrap_with_cluster_key(&key_b64).await.unwrap();

    assert!(node.is_enrolled());
    node.set("a", b"b").await.unwrap();
    assert_eq!(node.get("a").await.unwrap().unwrap(), b"b");
}

#[tokio::test]
async fn unenrolled_node_cannot_read_or_write_secrets() {
    let store: Arc<dyn certslurp_coordination_store::CoordinationStore> = Arc::new(MemoryStore::new());
    let node = SecretsClient::new(store, "/certslurp", "n1", NodeKeypair::generate());
    assert!(node.set("k", b"v").await.is_err());
    assert!(node.get("k").await.is_err());
}
