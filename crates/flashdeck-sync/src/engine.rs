//! # Sync Engine
//!
//! Keeps one owner's local tree and remote document converging.
//!
//! ## Engine Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  local mutation (Session)                                               │
//! │       │ full snapshot                                                   │
//! │       ▼                                                                 │
//! │  ┌──────────────────────────┐        write ──► DocumentNotFound?       │
//! │  │  push worker             │ ─────────────────────┐                    │
//! │  │  newest queued snapshot  │                      ▼                    │
//! │  │  wins, never retried     │                   create                  │
//! │  └──────────────────────────┘                                           │
//! │                                                                         │
//! │  ┌──────────────────────────┐   reconcile(local, remote, now, window)  │
//! │  │  pull loop               │ ──► MergePlan empty? ──► nothing         │
//! │  │  SnapshotStream          │                │                          │
//! │  └──────────────────────────┘                ▼                          │
//! │                                   apply_merge + LocalCache::save        │
//! │                                   (never pushes: no echo loop)          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use flashdeck_core::{reconcile, ItemStore, Snapshot};
use flashdeck_db::LocalCache;

use crate::error::SyncError;
use crate::remote::{RemoteStore, SnapshotStream};
use crate::status::{StatusCell, SyncEventEmitter, SyncStatus};

/// The item store shared between the session and the pull loop.
pub type SharedStore = Arc<Mutex<ItemStore>>;

/// Locks the shared store. A poisoned lock still yields the tree.
pub fn lock_store(store: &SharedStore) -> MutexGuard<'_, ItemStore> {
    store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Sync Context
// =============================================================================

/// Everything the engine tasks and the session share for one owner.
pub struct SyncContext {
    pub cache_key: String,
    pub store: SharedStore,
    pub cache: LocalCache,
    pub recency_window: Duration,
    pub status: StatusCell,
    pub emitter: Arc<dyn SyncEventEmitter>,
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("cache_key", &self.cache_key)
            .field("recency_window", &self.recency_window)
            .finish_non_exhaustive()
    }
}

impl SyncContext {
    /// Updates the status and notifies the emitter.
    pub fn update_status(&self, change: impl FnOnce(&mut SyncStatus)) {
        let status = self.status.update(change);
        self.emitter.emit_status(&status);
    }

    fn record_error(&self, err: &SyncError) {
        let message = err.to_string();
        self.emitter.emit_error(&message, err.is_retryable());
        self.update_status(|s| s.last_error = Some(message));
    }

    /// Persists the current tree. Caller holds the store lock so saves
    /// are queued in mutation order.
    pub fn persist(&self, store: &ItemStore) {
        self.cache.save(&self.cache_key, store.snapshot());
    }
}

/// Merges one remote snapshot into the local tree.
///
/// Returns whether anything changed. An empty plan touches neither the
/// store nor the cache, so replaying a snapshot is free.
pub fn merge_remote(ctx: &SyncContext, remote: &Snapshot) -> bool {
    let mut store = lock_store(&ctx.store);
    let now = store.now();

    let plan = reconcile(store.snapshot(), remote, now, ctx.recency_window);
    if plan.is_empty() {
        debug!(cache_key = %ctx.cache_key, "Remote snapshot already merged");
        return false;
    }

    let adopted = plan.adopt.len();
    let removed = plan.remove.len();
    store.apply_merge(plan);
    ctx.persist(&store);
    drop(store);

    info!(cache_key = %ctx.cache_key, adopted, removed, "Merged remote snapshot");
    ctx.emitter.emit_merge(adopted, removed);
    ctx.update_status(|s| {
        s.merges_applied += 1;
        s.last_merge = Some(now);
    });
    true
}

// =============================================================================
// Sync Engine
// =============================================================================

enum PushCommand {
    Push(Snapshot),
    Flush(oneshot::Sender<()>),
}

/// Running push worker and pull loop for one owner.
///
/// Dropping the engine stops the pull loop at once; the push worker
/// finishes the pushes already queued and exits.
#[derive(Debug)]
pub struct SyncEngine {
    push_tx: mpsc::UnboundedSender<PushCommand>,
    pull_task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for PushCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PushCommand::Push(snapshot) => write!(f, "Push({} items)", snapshot.len()),
            PushCommand::Flush(_) => write!(f, "Flush"),
        }
    }
}

impl SyncEngine {
    /// Starts pushing to and pulling from `remote` for `owner`.
    ///
    /// A failed subscription is logged and recorded; pushes still run.
    pub async fn start(ctx: Arc<SyncContext>, remote: Arc<dyn RemoteStore>, owner: String) -> Self {
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_push_worker(ctx.clone(), remote.clone(), owner.clone(), push_rx));

        let pull_task = match remote.subscribe(&owner).await {
            Ok(stream) => {
                ctx.update_status(|s| s.subscribed = true);
                Some(tokio::spawn(run_pull_loop(ctx.clone(), stream)))
            }
            Err(e) => {
                warn!(owner = %owner, error = %e, "Remote subscribe failed, continuing with local state");
                ctx.record_error(&e);
                None
            }
        };

        info!(owner = %owner, backend = remote.name(), "Sync engine started");
        SyncEngine { push_tx, pull_task }
    }

    /// Queues a full-tree push.
    pub fn push(&self, snapshot: Snapshot) {
        if self.push_tx.send(PushCommand::Push(snapshot)).is_err() {
            warn!("{}", SyncError::ShuttingDown);
        }
    }

    /// Waits until every push queued so far has been attempted.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.push_tx.send(PushCommand::Flush(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }

    /// Flushes pending pushes, then stops both tasks.
    pub async fn shutdown(self) {
        self.flush().await;
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        if let Some(task) = self.pull_task.take() {
            task.abort();
        }
    }
}

async fn run_push_worker(
    ctx: Arc<SyncContext>,
    remote: Arc<dyn RemoteStore>,
    owner: String,
    mut rx: mpsc::UnboundedReceiver<PushCommand>,
) {
    debug!(owner = %owner, "Push worker started");

    while let Some(command) = rx.recv().await {
        let mut snapshot = match command {
            PushCommand::Push(snapshot) => snapshot,
            PushCommand::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };

        // Only the newest tree matters; flushes wait for it.
        let mut waiters = Vec::new();
        while let Ok(next) = rx.try_recv() {
            match next {
                PushCommand::Push(newer) => snapshot = newer,
                PushCommand::Flush(done) => waiters.push(done),
            }
        }

        push_snapshot(&ctx, remote.as_ref(), &owner, &snapshot).await;

        for done in waiters {
            let _ = done.send(());
        }
    }

    debug!(owner = %owner, "Push worker stopped");
}

async fn push_snapshot(ctx: &SyncContext, remote: &dyn RemoteStore, owner: &str, snapshot: &Snapshot) {
    let now = lock_store(&ctx.store).now();

    let result = match remote.write(owner, snapshot).await {
        Err(e) if e.is_not_found() => {
            info!(owner = %owner, "No remote document yet, creating it");
            let created = remote.create(owner, snapshot).await;
            if created.is_ok() {
                ctx.update_status(|s| s.documents_created += 1);
            }
            created
        }
        other => other,
    };

    match result {
        Ok(()) => {
            debug!(owner = %owner, items = snapshot.len(), "Pushed snapshot");
            ctx.update_status(|s| {
                s.pushes += 1;
                s.last_push = Some(now);
            });
        }
        Err(e) => {
            warn!(owner = %owner, error = %e, "Push failed, local state kept");
            ctx.update_status(|s| s.failed_pushes += 1);
            ctx.record_error(&e);
        }
    }
}

async fn run_pull_loop(ctx: Arc<SyncContext>, mut stream: SnapshotStream) {
    debug!(cache_key = %ctx.cache_key, "Pull loop started");

    while let Some(next) = stream.recv().await {
        match next {
            Ok(snapshot) => {
                merge_remote(&ctx, &snapshot);
            }
            Err(e) => {
                warn!(cache_key = %ctx.cache_key, error = %e, "Remote snapshot stream error");
                ctx.record_error(&e);
            }
        }
    }

    ctx.update_status(|s| s.subscribed = false);
    debug!(cache_key = %ctx.cache_key, "Pull loop stopped");
}

// =============================================================================
// Unit Tests
// =============================================================================
