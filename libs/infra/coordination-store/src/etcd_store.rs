// [libs/infra/coordination-store/src/etcd_store.rs]
//! Production `CoordinationStore` binding: an etcd v3 cluster reached
//! through `etcd_client`'s gRPC client.

use async_trait::async_trait;
use etcd_client::{
    Client, Compare, CompareOp, ConnectOptions, DeleteOptions, EventType, GetOptions,
    PutOptions, Txn, TxnOp as EtcdTxnOp, WatchOptions,
};
use futures::StreamExt;
use tracing::{debug, instrument};

use crate::errors::CoordinationStoreError;
use crate::store::{CoordinationStore, WatchStream};
use crate::types::{KeyValue, LeaseId, Predicate, TxnOp, TxnResult, WatchEvent};

/// Wraps a connected etcd client. Cheap to clone: `etcd_client::Client`
/// is itself a thin handle over a shared gRPC channel.
#[derive(Clone)]
pub struct EtcdStore {
    client: Client,
}

impl EtcdStore {
    /// Connects to the given etcd endpoints, optionally authenticating
    /// with a username/password pair.
    #[instrument(skip(password))]
    pub async fn connect(
        endpoints: &[String],
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self, CoordinationStoreError> {
        let options = match (username, password) {
            (Some(user), Some(pass)) => Some(ConnectOptions::new().with_user(user, pass)),
            _ => None,
        };
        let client = Client::connect(endpoints, options)
            .await
            .map_err(|e| CoordinationStoreError::Unavailable(e.to_string()))?;
        debug!("connected to coordination store at {:?}", endpoints);
        Ok(Self { client })
    }

    fn to_kv(kv: &etcd_client::KeyValue) -> KeyValue {
        KeyValue {
            key: String::from_utf8_lossy(kv.key()).into_owned(),
            value: kv.value().to_vec(),
            mod_revision: kv.mod_revision(),
        }
    }

    fn to_compare(predicate: Predicate) -> Compare {
        match predicate {
            Predicate::ModRevisionEquals { key, revision } => {
                Compare::mod_revision(key, CompareOp::Equal, revision)
            }
            Predicate::KeyAbsent { key } => Compare::create_revision(key, CompareOp::Equal, 0),
            Predicate::KeyPresent { key } => Compare::create_revision(key, CompareOp::Greater, 0),
        }
    }

    fn to_etcd_op(op: TxnOp) -> EtcdTxnOp {
        match op {
            TxnOp::Put { key, value, lease } => {
                let mut opts = PutOptions::new();
                if let Some(lease_id) = lease {
                    opts = opts.with_lease(lease_id);
                }
                EtcdTxnOp::put(key, value, Some(opts))
            }
            TxnOp::Delete { key } => EtcdTxnOp::delete(key, None),
        }
    }
}

#[async_trait]
impl CoordinationStore for EtcdStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<KeyValue>, CoordinationStoreError> {
        let mut kv_client = self.client.kv_client();
        let response = kv_client.get(key, None).await?;
        Ok(response.kvs().first().map(Self::to_kv))
    }

    #[instrument(skip(self))]
    async fn list(&self, prefix: &str) -> Result<Vec<KeyValue>, CoordinationStoreError> {
        let mut kv_client = self.client.kv_client();
        let response = kv_client
            .get(prefix, Some(GetOptions::new().with_prefix()))
            .await?;
        Ok(response.kvs().iter().map(Self::to_kv).collect())
    }

    #[instrument(skip(self, value))]
    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        lease: Option<LeaseId>,
    ) -> Result<(), CoordinationStoreError> {
        let mut kv_client = self.client.kv_client();
        let mut opts = PutOptions::new();
        if let Some(lease_id) = lease {
            opts = opts.with_lease(lease_id);
        }
        kv_client.put(key, value, Some(opts)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), CoordinationStoreError> {
        let mut kv_client = self.client.kv_client();
        kv_client.delete(key, None).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_prefix(&self, prefix: &str) -> Result<(), CoordinationStoreError> {
        let mut kv_client = self.client.kv_client();
        kv_client
            .delete(prefix, Some(DeleteOptions::new().with_prefix()))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, predicates, on_true, on_false))]
    async fn txn(
        &self,
        predicates: Vec<Predicate>,
        on_true: Vec<TxnOp>,
        on_false: Vec<TxnOp>,
    ) -> Result<TxnResult, CoordinationStoreError> {
        let mut kv_client = self.client.kv_client();
        let compares: Vec<Compare> = predicates.into_iter().map(Self::to_compare).collect();
        let then_ops: Vec<EtcdTxnOp> = on_true.into_iter().map(Self::to_etcd_op).collect();
        let else_ops: Vec<EtcdTxnOp> = on_false.into_iter().map(Self::to_etcd_op).collect();

        let txn = Txn::new().when(compares).and_then(then_ops).or_else(else_ops);
        let response = kv_client
            .txn(txn)
            .await
            .map_err(|e| CoordinationStoreError::Transaction(e.to_string()))?;
        Ok(TxnResult {
            succeeded: response.succeeded(),
        })
    }

    #[instrument(skip(self))]
    async fn grant_lease(&self, ttl_seconds: i64) -> Result<LeaseId, CoordinationStoreError> {
        let mut lease_client = self.client.lease_client();
        let response = lease_client
            .grant(ttl_seconds, None)
            .await
            .map_err(|e| CoordinationStoreError::Lease(e.to_string()))?;
        Ok(response.id())
    }

    #[instrument(skip(self))]
    async fn keep_alive_once(&self, lease: LeaseId) -> Result<(), CoordinationStoreError> {
        let mut lease_client = self.client.lease_client();
        let (mut keeper, mut stream) = lease_client
            .keep_alive(lease)
            .await
            .map_err(|e| CoordinationStoreError::Lease(e.to_string()))?;
        keeper
            .keep_alive()
            .await
            .map_err(|e| CoordinationStoreError::Lease(e.to_string()))?;
        stream
            .message()
            .await
            .map_err(|e| CoordinationStoreError::Lease(e.to_string()))?
            .ok_or_else(|| CoordinationStoreError::Lease("keep-alive stream closed".into()))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn revoke(&self, lease: LeaseId) -> Result<(), CoordinationStoreError> {
        let mut lease_client = self.client.lease_client();
        lease_client
            .revoke(lease)
            .await
            .map_err(|e| CoordinationStoreError::Lease(e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn watch(&self, key_or_prefix: &str, prefix: bool) -> Result<WatchStream, CoordinationStoreError> {
        let mut watch_client = self.client.watch_client();
        let options = if prefix {
            Some(WatchOptions::new().with_prefix())
        } else {
            None
        };
        let (watcher, stream) = watch_client
            .watch(key_or_prefix, options)
            .await
            .map_err(|e| CoordinationStoreError::Watch(e.to_string()))?;

        let mapped = futures::stream::unfold((stream, watcher), |(mut stream, watcher)| async move {
            match stream.message().await {
                Ok(Some(response)) => {
                    let events: Vec<Result<WatchEvent, CoordinationStoreError>> = response
                        .events()
                        .iter()
                        .filter_map(|event| {
                            let kv = event.kv()?;
                            Some(Ok(match event.event_type() {
                                EventType::Put => WatchEvent::Put(EtcdStore::to_kv(kv)),
                                EventType::Delete => WatchEvent::Delete {
                                    key: String::from_utf8_lossy(kv.key()).into_owned(),
                                },
                            }))
                        })
                        .collect();
                    Some((futures::stream::iter(events), (stream, watcher)))
                }
                Ok(None) => None,
                Err(e) => Some((
                    futures::stream::iter(vec![Err(CoordinationStoreError::Watch(e.to_string()))]),
                    (stream, watcher),
                )),
            }
        })
        .flatten();

        Ok(Box::pin(mapped))
    }
}
