//! # Remote Store
//!
//! The seam between the sync engine and whatever hosts the per-owner
//! documents. One document per owner holds the whole id → item snapshot.
//!
//! ```text
//! ┌──────────────┐   read / write / create   ┌──────────────────────────┐
//! │  SyncEngine  │ ────────────────────────► │  dyn RemoteStore         │
//! │              │                           │                          │
//! │  pull loop   │ ◄──── SnapshotStream ──── │  MemoryRemote (tests)    │
//! └──────────────┘                           │  WsRemote     (network)  │
//!                                            └──────────────────────────┘
//! ```
//!
//! `write` must fail with [`SyncError::DocumentNotFound`] when the owner has
//! no document yet; the push worker turns that into a `create`.
//!
//! [`SyncError::DocumentNotFound`]: crate::error::SyncError::DocumentNotFound

use async_trait::async_trait;
use tokio::sync::mpsc;

use flashdeck_core::Snapshot;

use crate::error::SyncResult;

/// Live feed of remote snapshots for one owner.
///
/// Yields `Err` for transient stream failures; the stream ends when the
/// backend drops the subscription.
pub type SnapshotStream = mpsc::UnboundedReceiver<SyncResult<Snapshot>>;

/// Sender half of a [`SnapshotStream`], held by backends.
pub type SnapshotSink = mpsc::UnboundedSender<SyncResult<Snapshot>>;

/// Document store holding one snapshot per owner.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Fetches the owner's document, `None` if it does not exist.
    async fn read(&self, owner: &str) -> SyncResult<Option<Snapshot>>;

    /// Overwrites the owner's document.
    async fn write(&self, owner: &str, snapshot: &Snapshot) -> SyncResult<()>;

    /// Creates the owner's document.
    async fn create(&self, owner: &str, snapshot: &Snapshot) -> SyncResult<()>;

    /// Subscribes to every future version of the owner's document. The
    /// current version, if any, is delivered first.
    async fn subscribe(&self, owner: &str) -> SyncResult<SnapshotStream>;
}

/// Delivers `item` to every live sink and forgets closed ones.
pub(crate) fn broadcast(sinks: &mut Vec<SnapshotSink>, item: impl Fn() -> SyncResult<Snapshot>) {
    sinks.retain(|sink| sink.send(item()).is_ok());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use flashdeck_core::root_only_snapshot;

    #[tokio::test]
    async fn test_broadcast_drops_closed_sinks() {
        let (open_tx, mut open_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        drop(closed_rx);

        let mut sinks = vec![open_tx, closed_tx];
        broadcast(&mut sinks, || Ok(root_only_snapshot()));

        assert_eq!(sinks.len(), 1);
        assert_eq!(open_rx.recv().await.unwrap().unwrap().len(), 1);

        broadcast(&mut sinks, || Err(SyncError::Disconnected));
        assert!(matches!(open_rx.recv().await, Some(Err(SyncError::Disconnected))));
    }
}
