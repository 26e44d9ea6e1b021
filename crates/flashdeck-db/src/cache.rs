//! # Local Cache
//!
//! The persistence adapter: read-through on session start, write-through on
//! every change, never in the caller's way.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Session mutation                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  LocalCache::save(key, &snapshot)   ← serialize, enqueue, return       │
//! │       │                                                                 │
//! │       │  mpsc::unbounded                                                │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  writer task                                                     │   │
//! │  │  CacheRepository::put(key, payload)                              │   │
//! │  │  Err → warn!, dropped                                            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writes for the same key land in the order they were queued, so the last
//! save always wins.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use flashdeck_core::validation::validate_owner_id;
use flashdeck_core::{root_only_snapshot, Item, Snapshot, ANONYMOUS_OWNER, ROOT_ID};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::cache::CacheRepository;

/// Builds the cache key for an owner: `"<namespace>_<owner>"`, or
/// `"<namespace>_local"` when nobody is signed in.
///
/// A blank or oversized owner id falls back to the anonymous key.
///
/// ```rust
/// use flashdeck_db::cache_key;
///
/// assert_eq!(cache_key("flashcards_data", Some("u1")), "flashcards_data_u1");
/// assert_eq!(cache_key("flashcards_data", None), "flashcards_data_local");
/// ```
pub fn cache_key(namespace: &str, owner: Option<&str>) -> String {
    let owner = owner
        .filter(|id| validate_owner_id(id).is_ok())
        .unwrap_or(ANONYMOUS_OWNER);
    format!("{}_{}", namespace, owner)
}

enum WriteCommand {
    Save { key: String, payload: String },
    Flush(oneshot::Sender<()>),
}

/// Durable per-owner snapshot store.
///
/// Cheap to clone; clones feed the same writer task. The writer stops once
/// every clone is dropped.
#[derive(Debug, Clone)]
pub struct LocalCache {
    repo: CacheRepository,
    tx: mpsc::UnboundedSender<WriteCommand>,
    queued: Arc<AtomicU64>,
}

impl std::fmt::Debug for WriteCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteCommand::Save { key, .. } => write!(f, "Save({key})"),
            WriteCommand::Flush(_) => write!(f, "Flush"),
        }
    }
}

impl LocalCache {
    /// Creates the adapter and spawns its writer task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(db: &Database) -> Self {
        let repo = db.cache();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(repo.clone(), rx));

        LocalCache {
            repo,
            tx,
            queued: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Reads the snapshot stored under `key`.
    ///
    /// Never fails: a missing row, an unreadable row or a database error all
    /// yield a tree holding only the root. A stored tree with a missing or
    /// malformed root gets a fresh one.
    pub async fn load(&self, key: &str) -> Snapshot {
        match self.try_load(key).await {
            Ok(Some(mut snapshot)) => {
                if !snapshot.get(ROOT_ID).is_some_and(Item::is_valid_root) {
                    warn!(cache_key = %key, "Cached tree has no valid root, repairing");
                    let root = Item::root();
                    snapshot.insert(root.id.clone(), root);
                }
                info!(cache_key = %key, items = snapshot.len(), "Loaded cached tree");
                snapshot
            }
            Ok(None) => {
                debug!(cache_key = %key, "No cached tree, starting fresh");
                root_only_snapshot()
            }
            Err(e) => {
                warn!(cache_key = %key, error = %e, "Failed to load cached tree, starting fresh");
                root_only_snapshot()
            }
        }
    }

    async fn try_load(&self, key: &str) -> DbResult<Option<Snapshot>> {
        let Some(record) = self.repo.get(key).await? else {
            return Ok(None);
        };
        let snapshot: Snapshot = serde_json::from_str(&record.payload)?;
        Ok(Some(snapshot))
    }

    /// Queues `snapshot` to be written under `key` and returns immediately.
    ///
    /// Failures are logged by the writer, never reported here.
    pub fn save(&self, key: &str, snapshot: &Snapshot) {
        let payload = match serde_json::to_string(snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(cache_key = %key, error = %e, "Failed to encode tree, not cached");
                return;
            }
        };

        let command = WriteCommand::Save {
            key: key.to_string(),
            payload,
        };
        if self.tx.send(command).is_err() {
            warn!(cache_key = %key, "{}", DbError::WriterClosed);
            return;
        }
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    /// Waits until every save queued so far has been attempted.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(WriteCommand::Flush(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }

    /// Number of saves queued since this cache was created.
    pub fn writes_queued(&self) -> u64 {
        self.queued.load(Ordering::Relaxed)
    }

    /// Drops the cached tree for `key` (after pending writes).
    pub async fn forget(&self, key: &str) -> DbResult<bool> {
        self.flush().await;
        self.repo.remove(key).await
    }
}

async fn run_writer(repo: CacheRepository, mut rx: mpsc::UnboundedReceiver<WriteCommand>) {
    debug!("Cache writer started");

    while let Some(command) = rx.recv().await {
        match command {
            WriteCommand::Save { key, payload } => {
                if let Err(e) = repo.put(&key, &payload).await {
                    warn!(cache_key = %key, error = %e, "Cache write failed");
                }
            }
            WriteCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    debug!("Cache writer stopped");
}

// =============================================================================
// Unit Tests
// =============================================================================
