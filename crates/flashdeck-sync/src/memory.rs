//! # In-Memory Remote
//!
//! A [`RemoteStore`] living inside the process. Every write is broadcast to
//! the owner's subscribers, including the writer's own, the way a hosted
//! document database echoes local writes back.
//!
//! Used by the scenario tests and for running a session without a server.
//! Other clients are simulated with [`MemoryRemote::publish`]; failures with
//! [`MemoryRemote::fail_writes`] and [`MemoryRemote::fail_stream`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use flashdeck_core::Snapshot;

use crate::error::{SyncError, SyncResult};
use crate::remote::{broadcast, RemoteStore, SnapshotSink, SnapshotStream};

#[derive(Debug, Default)]
struct Documents {
    documents: HashMap<String, Snapshot>,
    subscribers: HashMap<String, Vec<SnapshotSink>>,
    fail_writes: Option<String>,
    writes: u64,
    creates: u64,
}

/// Shared in-process document store. Clones see the same documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    inner: Arc<Mutex<Documents>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Documents> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current document for `owner`.
    pub fn document(&self, owner: &str) -> Option<Snapshot> {
        self.lock().documents.get(owner).cloned()
    }

    /// Stores `snapshot` as if another client wrote it, notifying subscribers.
    pub fn publish(&self, owner: &str, snapshot: Snapshot) {
        let mut docs = self.lock();
        docs.documents.insert(owner.to_string(), snapshot.clone());
        if let Some(sinks) = docs.subscribers.get_mut(owner) {
            broadcast(sinks, || Ok(snapshot.clone()));
        }
    }

    /// Makes every following `write` and `create` fail with `message`.
    /// `None` heals the store.
    pub fn fail_writes(&self, message: Option<&str>) {
        self.lock().fail_writes = message.map(str::to_string);
    }

    /// Pushes an error into every subscription of `owner`.
    pub fn fail_stream(&self, owner: &str, message: &str) {
        let mut docs = self.lock();
        if let Some(sinks) = docs.subscribers.get_mut(owner) {
            broadcast(sinks, || Err(SyncError::Remote(message.to_string())));
        }
    }

    /// Drops every subscription of `owner`, ending their streams.
    pub fn disconnect(&self, owner: &str) {
        self.lock().subscribers.remove(owner);
    }

    /// Successful `write` calls so far.
    pub fn writes(&self) -> u64 {
        self.lock().writes
    }

    /// Successful `create` calls so far.
    pub fn creates(&self) -> u64 {
        self.lock().creates
    }

    /// Live subscriptions for `owner`.
    pub fn subscriber_count(&self, owner: &str) -> usize {
        self.lock()
            .subscribers
            .get(owner)
            .map(|sinks| sinks.iter().filter(|sink| !sink.is_closed()).count())
            .unwrap_or(0)
    }

    fn store(docs: &mut Documents, owner: &str, snapshot: &Snapshot) {
        docs.documents.insert(owner.to_string(), snapshot.clone());
        if let Some(sinks) = docs.subscribers.get_mut(owner) {
            broadcast(sinks, || Ok(snapshot.clone()));
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn read(&self, owner: &str) -> SyncResult<Option<Snapshot>> {
        Ok(self.document(owner))
    }

    async fn write(&self, owner: &str, snapshot: &Snapshot) -> SyncResult<()> {
        let mut docs = self.lock();
        if let Some(message) = &docs.fail_writes {
            return Err(SyncError::Remote(message.clone()));
        }
        if !docs.documents.contains_key(owner) {
            return Err(SyncError::DocumentNotFound(owner.to_string()));
        }

        Self::store(&mut docs, owner, snapshot);
        docs.writes += 1;
        debug!(owner = %owner, items = snapshot.len(), "Memory remote document written");
        Ok(())
    }

    async fn create(&self, owner: &str, snapshot: &Snapshot) -> SyncResult<()> {
        let mut docs = self.lock();
        if let Some(message) = &docs.fail_writes {
            return Err(SyncError::Remote(message.clone()));
        }

        Self::store(&mut docs, owner, snapshot);
        docs.creates += 1;
        debug!(owner = %owner, items = snapshot.len(), "Memory remote document created");
        Ok(())
    }

    async fn subscribe(&self, owner: &str) -> SyncResult<SnapshotStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut docs = self.lock();

        if let Some(current) = docs.documents.get(owner) {
            let _ = tx.send(Ok(current.clone()));
        }
        docs.subscribers.entry(owner.to_string()).or_default().push(tx);

        Ok(rx)
    }
}
