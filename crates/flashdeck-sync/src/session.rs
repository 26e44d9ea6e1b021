//! # Owner Session
//!
//! One signed-in (or anonymous) owner's tree, from cache load to close.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Session::open(owner, deps)                                             │
//! │     │  LocalCache::load("<namespace>_<owner|local>")                    │
//! │     │  ItemStore::from_snapshot                                         │
//! │     │  SyncEngine::start      (only with owner + remote + mode=auto)    │
//! │     ▼                                                                   │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  create / rename / update_* / delete / move_items / paste / ...  │  │
//! │  │     changed? ──► LocalCache::save + SyncEngine::push             │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  switch_owner(other)  ──► close, then open for `other`                 │
//! │  close()              ──► flush pushes + cache, drop the tree          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation runs synchronously against the in-memory tree and is
//! visible to the next read. Persistence and pushes happen behind it.

use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use flashdeck_core::validation::validate_owner_id;
use flashdeck_core::{
    Clipboard, ClipboardAction, ClipboardEntry, Clock, CoreError, Item, ItemId, ItemKind,
    ItemStore, PasteOutcome, Permission, SetContent, Snapshot,
};
use flashdeck_db::{cache_key, LocalCache};

use crate::config::FlashdeckConfig;
use crate::engine::{lock_store, merge_remote, SyncContext, SyncEngine};
use crate::error::SyncResult;
use crate::remote::RemoteStore;
use crate::status::{NoOpEmitter, StatusCell, SyncEventEmitter, SyncStatus};

// =============================================================================
// Session Dependencies
// =============================================================================

/// What a session needs from the outside world.
#[derive(Clone)]
pub struct SessionDeps {
    /// Local persistence.
    pub cache: LocalCache,

    /// Source of `now` for timestamps and the merge window.
    pub clock: Arc<dyn Clock>,

    /// Remote document store; `None` runs local-only.
    pub remote: Option<Arc<dyn RemoteStore>>,

    /// Namespace, sync mode and recency window.
    pub config: FlashdeckConfig,

    /// Receives status, merge and error events.
    pub emitter: Arc<dyn SyncEventEmitter>,
}

impl SessionDeps {
    /// Local-only dependencies with default configuration.
    pub fn new(cache: LocalCache, clock: Arc<dyn Clock>) -> Self {
        SessionDeps {
            cache,
            clock,
            remote: None,
            config: FlashdeckConfig::default(),
            emitter: Arc::new(NoOpEmitter),
        }
    }

    /// Attaches a remote document store.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: FlashdeckConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the event emitter.
    pub fn with_emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }
}

impl std::fmt::Debug for SessionDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDeps")
            .field("remote", &self.remote.as_ref().map(|r| r.name()))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Session
// =============================================================================

/// The item tree of one owner, kept in sync with cache and remote.
#[derive(Debug)]
pub struct Session {
    deps: SessionDeps,
    owner: Option<String>,
    ctx: Arc<SyncContext>,
    clipboard: Clipboard,
    engine: Option<SyncEngine>,
}

impl Session {
    /// Opens the session for `owner` (`None` = signed out).
    ///
    /// Loads the cached tree and, when an owner, a remote and sync mode
    /// `auto` are all present, starts the sync engine. Fails only for an
    /// invalid owner id.
    pub async fn open(owner: Option<&str>, deps: SessionDeps) -> SyncResult<Self> {
        if let Some(id) = owner {
            validate_owner_id(id).map_err(CoreError::from)?;
        }
        let owner = owner.map(str::to_string);

        let key = cache_key(deps.config.namespace(), owner.as_deref());
        let snapshot = deps.cache.load(&key).await;
        let store = ItemStore::from_snapshot(snapshot, deps.clock.clone());

        let status = SyncStatus {
            owner: owner.clone(),
            mode: deps.config.mode(),
            remote: deps.remote.as_ref().map(|r| r.name()),
            ..Default::default()
        };

        let ctx = Arc::new(SyncContext {
            cache_key: key,
            store: Arc::new(Mutex::new(store)),
            cache: deps.cache.clone(),
            recency_window: deps.config.recency_window(),
            status: StatusCell::new(status),
            emitter: deps.emitter.clone(),
        });

        let engine = match (&owner, &deps.remote) {
            (Some(owner), Some(remote)) if deps.config.is_sync_enabled() => {
                Some(SyncEngine::start(ctx.clone(), remote.clone(), owner.clone()).await)
            }
            _ => None,
        };

        info!(
            cache_key = %ctx.cache_key,
            items = lock_store(&ctx.store).item_count(),
            syncing = engine.is_some(),
            "Session opened"
        );

        Ok(Session {
            deps,
            owner,
            ctx,
            clipboard: Clipboard::new(),
            engine,
        })
    }

    /// Closes this session and opens one for `owner`.
    ///
    /// The new owner id is validated first; on failure this session stays
    /// open and unchanged.
    pub async fn switch_owner(&mut self, owner: Option<&str>) -> SyncResult<()> {
        if let Some(id) = owner {
            validate_owner_id(id).map_err(CoreError::from)?;
        }

        info!(from = ?self.owner, to = ?owner, "Switching owner");
        self.shutdown().await;
        *self = Session::open(owner, self.deps.clone()).await?;
        Ok(())
    }

    /// Flushes pending pushes and cache writes, then stops syncing.
    pub async fn close(mut self) {
        self.shutdown().await;
        debug!(cache_key = %self.ctx.cache_key, "Session closed");
    }

    async fn shutdown(&mut self) {
        if let Some(engine) = self.engine.take() {
            engine.shutdown().await;
        }
        self.ctx.cache.flush().await;
        self.clipboard.clear();
    }

    /// Waits for queued pushes and cache writes.
    pub async fn flush(&self) {
        if let Some(engine) = &self.engine {
            engine.flush().await;
        }
        self.ctx.cache.flush().await;
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The signed-in owner, if any.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Cache key this session persists under.
    pub fn cache_key(&self) -> &str {
        &self.ctx.cache_key
    }

    /// Current sync status.
    pub fn status(&self) -> SyncStatus {
        self.ctx.status.get()
    }

    /// True while the sync engine runs.
    pub fn is_syncing(&self) -> bool {
        self.engine.is_some()
    }

    /// Runs `read` against the current tree.
    pub fn with_store<R>(&self, read: impl FnOnce(&ItemStore) -> R) -> R {
        read(&*lock_store(&self.ctx.store))
    }

    /// A copy of the whole tree.
    pub fn snapshot(&self) -> Snapshot {
        self.with_store(ItemStore::to_snapshot)
    }

    pub fn get(&self, id: &str) -> Option<Item> {
        self.with_store(|store| store.get(id).cloned())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.with_store(|store| store.contains(id))
    }

    pub fn item_count(&self) -> usize {
        self.with_store(ItemStore::item_count)
    }

    /// Children in insertion order.
    pub fn children_of(&self, folder_id: &str) -> Vec<Item> {
        self.with_store(|store| store.children_of(folder_id).into_iter().cloned().collect())
    }

    /// Children with folders first, then by name.
    pub fn children_of_sorted(&self, folder_id: &str) -> Vec<Item> {
        self.with_store(|store| {
            store
                .children_of_sorted(folder_id)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// Breadcrumb from the root down to `id`.
    pub fn path_to(&self, id: &str) -> Vec<Item> {
        self.with_store(|store| store.path_to(id).into_iter().cloned().collect())
    }

    /// The pending clipboard entry.
    pub fn clipboard(&self) -> Option<&ClipboardEntry> {
        self.clipboard.entry()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Creates a folder or set under `parent_id`.
    pub fn create(
        &mut self,
        kind: ItemKind,
        name: &str,
        parent_id: &str,
        content: Option<SetContent>,
    ) -> SyncResult<ItemId> {
        let id = mutate(&self.ctx, self.engine.as_ref(), Result::is_ok, |store| {
            store.create(kind, name, parent_id, content)
        })?;
        Ok(id)
    }

    pub fn rename(&mut self, id: &str, name: &str) -> bool {
        mutate(&self.ctx, self.engine.as_ref(), changed, |store| store.rename(id, name))
    }

    /// Replaces a set's content. Callers debounce rapid edits.
    pub fn update_content(&mut self, id: &str, content: SetContent) -> bool {
        mutate(&self.ctx, self.engine.as_ref(), changed, |store| {
            store.update_content(id, content)
        })
    }

    pub fn update_permissions(&mut self, id: &str, permission: Permission) -> bool {
        mutate(&self.ctx, self.engine.as_ref(), changed, |store| {
            store.update_permissions(id, permission)
        })
    }

    /// Deletes items and every descendant of deleted folders.
    pub fn delete<S: AsRef<str>>(&mut self, ids: &[S]) -> Vec<ItemId> {
        mutate(&self.ctx, self.engine.as_ref(), |removed: &Vec<ItemId>| !removed.is_empty(), |store| {
            store.delete(ids)
        })
    }

    /// Reparents items under `target_id`; returns how many moved.
    pub fn move_items<S: AsRef<str>>(&mut self, ids: &[S], target_id: &str) -> usize {
        mutate(&self.ctx, self.engine.as_ref(), |moved: &usize| *moved > 0, |store| {
            store.move_items(ids, target_id)
        })
    }

    /// Splits an oversized set into continuation sets.
    pub fn split_set(&mut self, id: &str, max_cards: usize) -> SyncResult<Vec<ItemId>> {
        let created = mutate(
            &self.ctx,
            self.engine.as_ref(),
            |result: &Result<Vec<ItemId>, CoreError>| result.as_ref().is_ok_and(|ids| !ids.is_empty()),
            |store| store.split_set(id, max_cards),
        )?;
        Ok(created)
    }

    /// Marks items for a later paste, replacing any earlier mark.
    pub fn mark<S: AsRef<str>>(&mut self, ids: &[S], action: ClipboardAction) {
        self.clipboard.mark(ids, action);
    }

    pub fn clear_clipboard(&mut self) {
        self.clipboard.clear();
    }

    /// Moves (cut) or clones (copy) the marked items under `target_id`.
    pub fn paste(&mut self, target_id: &str) -> PasteOutcome {
        let clipboard = &mut self.clipboard;
        mutate(&self.ctx, self.engine.as_ref(), PasteOutcome::changed, |store| {
            clipboard.paste(store, target_id)
        })
    }

    // =========================================================================
    // Remote Input
    // =========================================================================

    /// Merges `remote` as if it had arrived on the snapshot stream.
    ///
    /// Returns whether the local tree changed. Never pushes.
    pub fn apply_remote_snapshot(&self, remote: &Snapshot) -> bool {
        merge_remote(&self.ctx, remote)
    }
}

fn changed(result: &bool) -> bool {
    *result
}

/// Runs `op` under the store lock; persists and pushes if `did_change`.
fn mutate<R>(
    ctx: &SyncContext,
    engine: Option<&SyncEngine>,
    did_change: impl FnOnce(&R) -> bool,
    op: impl FnOnce(&mut ItemStore) -> R,
) -> R {
    let mut store = lock_store(&ctx.store);
    let result = op(&mut store);

    if did_change(&result) {
        ctx.persist(&store);
        if let Some(engine) = engine {
            engine.push(store.to_snapshot());
        }
    }
    result
}

// =============================================================================
// Unit Tests
// =============================================================================
