//! # WebSocket Remote
//!
//! [`RemoteStore`] backed by a remote document service, spoken to through
//! the reconnecting [`Transport`].
//!
//! ```text
//! ┌──────────────┐  request(id)   ┌───────────┐   JSON    ┌──────────────┐
//! │   WsRemote   │ ─────────────► │ Transport │ ────────► │   service    │
//! │              │                └─────┬─────┘           └──────────────┘
//! │  pending:    │                      │ TransportEvent
//! │  id → oneshot│ ◄──── router task ───┘
//! │  owner → sinks
//! └──────────────┘
//! ```
//!
//! - Replies are matched to requests by `request_id`.
//! - Pushed snapshots (no `request_id`) fan out to the owner's subscribers.
//! - On every (re)connect the router resubscribes each owner.
//! - On disconnect every pending request fails with `Disconnected`;
//!   requests made while disconnected fail immediately.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use flashdeck_core::Snapshot;

use crate::error::{SyncError, SyncResult};
use crate::protocol::{error_to_sync, RemoteMessage, SnapshotPayload};
use crate::remote::{broadcast, RemoteStore, SnapshotSink, SnapshotStream};
use crate::transport::{ConnectionState, Transport, TransportConfig, TransportEvent, TransportHandle};

#[derive(Debug, Default)]
struct Routing {
    pending: HashMap<u64, oneshot::Sender<RemoteMessage>>,
    subscribers: HashMap<String, Vec<SnapshotSink>>,
}

/// Remote store client over WebSocket.
#[derive(Debug, Clone)]
pub struct WsRemote {
    transport: TransportHandle,
    routing: Arc<Mutex<Routing>>,
    next_id: Arc<AtomicU64>,
}

impl WsRemote {
    /// Spawns the transport and the reply router.
    ///
    /// Returns immediately; the connection is established in the background.
    pub fn connect(config: TransportConfig) -> Self {
        let (transport, events) = Transport::spawn(config);
        let remote = WsRemote {
            transport,
            routing: Arc::new(Mutex::new(Routing::default())),
            next_id: Arc::new(AtomicU64::new(1)),
        };

        tokio::spawn(route_events(remote.clone(), events));
        remote
    }

    /// Current transport state.
    pub async fn state(&self) -> ConnectionState {
        self.transport.state().await
    }

    /// Closes the connection and stops reconnecting.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.transport.shutdown().await
    }

    fn routing(&self) -> MutexGuard<'_, Routing> {
        self.routing.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Sends a request and waits for its correlated reply.
    async fn request(&self, build: impl FnOnce(u64) -> RemoteMessage) -> SyncResult<RemoteMessage> {
        if !self.transport.is_connected().await {
            return Err(SyncError::Disconnected);
        }

        let request_id = self.next_request_id();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.routing().pending.insert(request_id, reply_tx);

        if let Err(e) = self.transport.send(build(request_id)).await {
            self.routing().pending.remove(&request_id);
            return Err(e);
        }

        reply_rx.await.map_err(|_| SyncError::Disconnected)
    }

    async fn send_subscribe(&self, owner: &str) -> SyncResult<()> {
        let message = RemoteMessage::Subscribe {
            request_id: self.next_request_id(),
            owner: owner.to_string(),
        };
        self.transport.send(message).await
    }

    fn expect_ack(owner: &str, reply: RemoteMessage) -> SyncResult<()> {
        match reply {
            RemoteMessage::WriteAck { .. } => Ok(()),
            RemoteMessage::Error { code, message, .. } => Err(error_to_sync(owner, &code, &message)),
            other => Err(SyncError::UnexpectedMessageType {
                expected: "WriteAck".into(),
                actual: other.type_name().into(),
            }),
        }
    }
}

#[async_trait]
impl RemoteStore for WsRemote {
    fn name(&self) -> &'static str {
        "websocket"
    }

    async fn read(&self, owner: &str) -> SyncResult<Option<Snapshot>> {
        let reply = self
            .request(|request_id| RemoteMessage::Read {
                request_id,
                owner: owner.to_string(),
            })
            .await?;

        match reply {
            RemoteMessage::Snapshot(SnapshotPayload { items, .. }) => Ok(items),
            RemoteMessage::Error { code, message, .. } => {
                match error_to_sync(owner, &code, &message) {
                    SyncError::DocumentNotFound(_) => Ok(None),
                    other => Err(other),
                }
            }
            other => Err(SyncError::UnexpectedMessageType {
                expected: "Snapshot".into(),
                actual: other.type_name().into(),
            }),
        }
    }

    async fn write(&self, owner: &str, snapshot: &Snapshot) -> SyncResult<()> {
        let reply = self
            .request(|request_id| RemoteMessage::Write {
                request_id,
                owner: owner.to_string(),
                items: snapshot.clone(),
            })
            .await?;
        Self::expect_ack(owner, reply)
    }

    async fn create(&self, owner: &str, snapshot: &Snapshot) -> SyncResult<()> {
        let reply = self
            .request(|request_id| RemoteMessage::Create {
                request_id,
                owner: owner.to_string(),
                items: snapshot.clone(),
            })
            .await?;
        Self::expect_ack(owner, reply)
    }

    async fn subscribe(&self, owner: &str) -> SyncResult<SnapshotStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.routing()
            .subscribers
            .entry(owner.to_string())
            .or_default()
            .push(tx);

        // Otherwise the router subscribes once the connection is up.
        if self.transport.is_connected().await {
            self.send_subscribe(owner).await?;
        }
        Ok(rx)
    }
}

/// Routes transport events until the transport stops.
async fn route_events(remote: WsRemote, mut events: mpsc::Receiver<TransportEvent>) {
    debug!("WebSocket remote router started");

    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Connected => {
                let owners: Vec<String> = remote.routing().subscribers.keys().cloned().collect();
                for owner in owners {
                    if let Err(e) = remote.send_subscribe(&owner).await {
                        warn!(owner = %owner, error = %e, "Resubscribe failed");
                    }
                }
            }
            TransportEvent::Disconnected => {
                let mut routing = remote.routing();
                let dropped = routing.pending.len();
                // Dropping the senders fails each waiting request.
                routing.pending.clear();
                for sinks in routing.subscribers.values_mut() {
                    broadcast(sinks, || Err(SyncError::Disconnected));
                }
                if dropped > 0 {
                    info!(dropped, "Connection lost with requests in flight");
                }
            }
            TransportEvent::Message(message) => handle_message(&remote, message).await,
        }
    }

    remote.routing().subscribers.clear();
    debug!("WebSocket remote router stopped");
}

async fn handle_message(remote: &WsRemote, message: RemoteMessage) {
    if let Some(request_id) = message.request_id() {
        let waiter = remote.routing().pending.remove(&request_id);
        if let Some(waiter) = waiter {
            let _ = waiter.send(message);
            return;
        }
    }

    match message {
        RemoteMessage::Snapshot(SnapshotPayload {
            owner,
            items: Some(items),
            ..
        }) => {
            let mut routing = remote.routing();
            if let Some(sinks) = routing.subscribers.get_mut(&owner) {
                broadcast(sinks, || Ok(items.clone()));
            }
        }
        RemoteMessage::Ping { timestamp } => {
            if let Err(e) = remote.transport.send(RemoteMessage::pong(timestamp)).await {
                debug!(error = %e, "Failed to answer ping");
            }
        }
        RemoteMessage::Error { code, message, .. } => {
            warn!(code = %code, message = %message, "Remote reported an error");
        }
        other => {
            debug!(msg_type = %other.type_name(), "Unhandled message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashdeck_core::root_only_snapshot;

    #[test]
    fn test_expect_ack() {
        assert!(WsRemote::expect_ack("u1", RemoteMessage::WriteAck { request_id: 1 }).is_ok());

        let err = WsRemote::expect_ack(
            "u1",
            RemoteMessage::error(Some(1), "not_found", "no such document"),
        )
        .unwrap_err();
        assert!(err.is_not_found());

        let err = WsRemote::expect_ack("u1", RemoteMessage::pong(0)).unwrap_err();
        assert!(matches!(err, SyncError::UnexpectedMessageType { .. }));
    }

    #[tokio::test]
    async fn test_requests_fail_fast_while_disconnected() {
        let remote = WsRemote::connect(TransportConfig {
            url: "ws://127.0.0.1:9/docs".into(),
            initial_backoff: std::time::Duration::from_secs(30),
            max_backoff: std::time::Duration::from_secs(60),
            ..Default::default()
        });

        let err = remote.write("u1", &root_only_snapshot()).await.unwrap_err();
        assert!(matches!(err, SyncError::Disconnected));

        // Subscribing offline is accepted and deferred until connect.
        let _stream = remote.subscribe("u1").await.unwrap();
        assert_eq!(remote.routing().subscribers.len(), 1);

        remote.shutdown().await.unwrap();
    }
}
