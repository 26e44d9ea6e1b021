//! # Sync Status
//!
//! Counters and last-error bookkeeping for one session, plus the hook the
//! UI layer implements to hear about them.
//!
//! ```text
//! push worker ──┐
//!               ├──► StatusCell::update ──► SyncEventEmitter::emit_status
//! pull loop ────┘
//! ```

use std::sync::{Arc, Mutex};

use flashdeck_core::Timestamp;

use crate::config::SyncMode;

// =============================================================================
// Sync Status
// =============================================================================

/// Current sync status for external queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// Owner this session syncs for; `None` when signed out.
    pub owner: Option<String>,

    /// Sync mode.
    pub mode: SyncMode,

    /// Backend name when a remote is attached.
    pub remote: Option<&'static str>,

    /// Whether the remote snapshot stream is open.
    pub subscribed: bool,

    /// Snapshots written or created remotely.
    pub pushes: u64,

    /// Remote documents created because a write found none.
    pub documents_created: u64,

    /// Pushes that failed and were dropped.
    pub failed_pushes: u64,

    /// Remote snapshots that changed the local tree.
    pub merges_applied: u64,

    /// Time of the last successful push.
    pub last_push: Option<Timestamp>,

    /// Time of the last applied merge.
    pub last_merge: Option<Timestamp>,

    /// Last error message (if any).
    pub last_error: Option<String>,
}

impl SyncStatus {
    /// True when this session talks to a remote.
    pub fn is_syncing(&self) -> bool {
        self.remote.is_some() && self.owner.is_some() && self.mode.is_sync_enabled()
    }
}

/// Shared, synchronously updatable [`SyncStatus`].
#[derive(Debug, Clone, Default)]
pub struct StatusCell {
    inner: Arc<Mutex<SyncStatus>>,
}

impl StatusCell {
    pub fn new(status: SyncStatus) -> Self {
        StatusCell {
            inner: Arc::new(Mutex::new(status)),
        }
    }

    /// A copy of the current status.
    pub fn get(&self) -> SyncStatus {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Applies `change` and returns the resulting status.
    pub fn update(&self, change: impl FnOnce(&mut SyncStatus)) -> SyncStatus {
        let mut status = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        change(&mut status);
        status.clone()
    }
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Trait for emitting sync events (implemented by the UI integration).
pub trait SyncEventEmitter: Send + Sync {
    /// Emits a sync status change event.
    fn emit_status(&self, status: &SyncStatus);

    /// Emits a merge event after a remote snapshot changed the local tree.
    fn emit_merge(&self, adopted: usize, removed: usize);

    /// Emits a sync error event.
    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op event emitter for testing.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &SyncStatus) {}
    fn emit_merge(&self, _adopted: usize, _removed: usize) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_status_default() {
        let status = SyncStatus::default();
        assert_eq!(status.mode, SyncMode::Auto);
        assert!(!status.is_syncing());
        assert_eq!(status.pushes, 0);
        assert!(status.last_error.is_none());
    }

    #[test]
    fn test_status_cell_updates_are_shared() {
        let cell = StatusCell::new(SyncStatus {
            owner: Some("u1".into()),
            remote: Some("memory"),
            ..Default::default()
        });
        let other = cell.clone();

        let after = other.update(|s| s.pushes += 2);
        assert_eq!(after.pushes, 2);
        assert_eq!(cell.get().pushes, 2);
        assert!(cell.get().is_syncing());
    }
}
