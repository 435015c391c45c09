// [libs/infra/coordination-store/src/memory_store.rs]
//! An in-process `CoordinationStore` double used by unit and
//! integration tests so the shard/job engines never need a live etcd
//! cluster to exercise their claim/lease/transaction logic.
//!
//! Lease TTLs are bookkept but not actively reaped on a timer: nothing
//! in the core depends on the coordination store evicting an expired
//! lease's keys by itself (orphan detection reads the `leaseExpiry`
//! field the shard engine stores in the assignment JSON). `revoke`
//! does delete every key attached to a lease, which is enough to
//! exercise WorkerInfo and its metrics disappearing together.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::errors::CoordinationStoreError;
use crate::store::{CoordinationStore, WatchStream};
use crate::types::{KeyValue, LeaseId, Predicate, TxnOp, TxnResult, WatchEvent};

struct Entry {
    value: Vec<u8>,
    mod_revision: i64,
    create_revision: i64,
    lease: Option<LeaseId>,
}

#[derive(Default)]
struct Inner {
    entries: BTreeMap<String, Entry>,
    lease_members: HashMap<LeaseId, Vec<String>>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
    revision: AtomicI64,
    next_lease: AtomicI64,
    events: broadcast::Sender<WatchEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _rx) = broadcast::channel(1024);
        Self {
            inner: Mutex::new(Inner::default()),
            revision: AtomicI64::new(1),
            next_lease: AtomicI64::new(1),
            events,
        }
    }

    fn next_revision(&self) -> i64 {
        self.revision.fetch_add(1, Ordering::SeqCst)
    }

    fn to_kv(key: &str, entry: &Entry) -> KeyValue {
        KeyValue {
            key: key.to_string(),
            value: entry.value.clone(),
            mod_revision: entry.mod_revision,
        }
    }

    fn apply_put(&self, inner: &mut Inner, key: String, value: Vec<u8>, lease: Option<LeaseId>) {
        let revision = self.next_revision();
        let create_revision = inner
            .entries
            .get(&key)
            .map(|e| e.create_revision)
            .unwrap_or(revision);
        if let Some(lease_id) = lease {
            inner.lease_members.entry(lease_id).or_default().push(key.clone());
        }
        let entry = Entry {
            value: value.clone(),
            mod_revision: revision,
            create_revision,
            lease,
        };
        let _ = self.events.send(WatchEvent::Put(KeyValue {
            key: key.clone(),
            value,
            mod_revision: revision,
        }));
        inner.entries.insert(key, entry);
    }

    fn apply_delete(&self, inner: &mut Inner, key: &str) {
        if inner.entries.remove(key).is_some() {
            let _ = self.events.send(WatchEvent::Delete { key: key.to_string() });
        }
    }

    fn evaluate(&self, inner: &Inner, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::ModRevisionEquals { key, revision } => inner
                .entries
                .get(key)
                .map(|e| e.mod_revision == *revision)
                .unwrap_or(false),
            Predicate::KeyAbsent { key } => !inner.entries.contains_key(key),
            Predicate::KeyPresent { key } => inner.entries.contains_key(key),
        }
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<KeyValue>, CoordinationStoreError> {
        let inner = self.inner.lock();
        Ok(inner.entries.get(key).map(|e| Self::to_kv(key, e)))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<KeyValue>, CoordinationStoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, e)| Self::to_kv(k, e))
            .collect())
    }

    async fn put(&self, key: &str, value: Vec<u8>, lease: Option<LeaseId>) -> Result<(), CoordinationStoreError> {
        let mut inner = self.inner.lock();
        self.apply_put(&mut inner, key.to_string(), value, lease);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CoordinationStoreError> {
        let mut inner = self.inner.lock();
        self.apply_delete(&mut inner, key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), CoordinationStoreError> {
        let mut inner = self.inner.lock();
        let keys: Vec<String> = inner
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in keys {
            self.apply_delete(&mut inner, &key);
        }
        Ok(())
    }

    async fn txn(
        &self,
        predicates: Vec<Predicate>,
        on_true: Vec<TxnOp>,
        on_false: Vec<TxnOp>,
    ) -> Result<TxnResult, CoordinationStoreError> {
        let mut inner = self.inner.lock();
        let succeeded = predicates.iter().all(|p| self.evaluate(&inner, p));
        let ops = if succeeded { on_true } else { on_false };
        for op in ops {
            match op {
                TxnOp::Put { key, value, lease } => self.apply_put(&mut inner, key, value, lease),
                TxnOp::Delete { key } => self.apply_delete(&mut inner, &key),
            }
        }
        Ok(TxnResult { succeeded })
    }

    async fn grant_lease(&self, _ttl_seconds: i64) -> Result<LeaseId, CoordinationStoreError> {
        Ok(self.next_lease.fetch_add(1, Ordering::SeqCst))
    }

    async fn keep_alive_once(&self, _lease: LeaseId) -> Result<(), CoordinationStoreError> {
        Ok(())
    }

    async fn revoke(&self, lease: LeaseId) -> Result<(), CoordinationStoreError> {
        let mut inner = self.inner.lock();
        if let Some(keys) = inner.lease_members.remove(&lease) {
            for key in keys {
                self.apply_delete(&mut inner, &key);
            }
        }
        Ok(())
    }

    async fn watch(&self, key_or_prefix: &str, prefix: bool) -> Result<WatchStream, CoordinationStoreError> {
        let target = key_or_prefix.to_string();
        let rx = self.events.subscribe();
        let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(move |event| {
            let target = target.clone();
            async move {
                let event = match event {
                    Ok(e) => e,
                    Err(_lagged) => return None,
                };
                let matches = match &event {
                    WatchEvent::Put(kv) => {
                        if prefix {
                            kv.key.starts_with(&target)
                        } else {
                            kv.key == target
                        }
                    }
                    WatchEvent::Delete { key } => {
                        if prefix {
                            key.starts_with(&target)
                        } else {
                            key == &target
                        }
                    }
                };
                matches.then_some(Ok(event))
            }
        });
        Ok(Box::pin(stream))
    }
}
