//! # Remote Document Protocol
//!
//! Messages exchanged with the remote document service over WebSocket.
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Remote Document Messages                             │
//! │                                                                         │
//! │  SUBSCRIPTION                                                          │
//! │  ────────────                                                          │
//! │  client ───► Subscribe { request_id, owner }                           │
//! │  server ───► Snapshot { request_id: null, owner, items }  (every       │
//! │              version of the document, current one first)               │
//! │                                                                         │
//! │  READ                                                                  │
//! │  ────                                                                  │
//! │  client ───► Read { request_id, owner }                                │
//! │  server ───► Snapshot { request_id, owner, items | null }              │
//! │                                                                         │
//! │  WRITE / CREATE                                                        │
//! │  ──────────────                                                        │
//! │  client ───► Write { request_id, owner, items }                        │
//! │  client ───► Create { request_id, owner, items }                       │
//! │  server ───► WriteAck { request_id }                                   │
//! │          or  Error { request_id, code: "not_found", ... }              │
//! │                                                                         │
//! │  KEEPALIVE                                                             │
//! │  ─────────                                                             │
//! │  Both    ◄──► Ping { timestamp } / Pong { timestamp }                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Adjacently tagged JSON:
//! ```json
//! { "type": "Write", "payload": { "request_id": 7, "owner": "u1", "items": { ... } } }
//! ```

use serde::{Deserialize, Serialize};

use flashdeck_core::Snapshot;

use crate::error::SyncError;

/// Current protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Error code for "the owner has no document yet".
pub const ERROR_NOT_FOUND: &str = "not_found";

// =============================================================================
// Main Message Enum (Tagged Union)
// =============================================================================

/// All remote document messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum RemoteMessage {
    // =========================================================================
    // Client Requests
    // =========================================================================
    /// Start receiving every version of the owner's document.
    Subscribe { request_id: u64, owner: String },

    /// Fetch the owner's document once.
    Read { request_id: u64, owner: String },

    /// Overwrite the owner's document.
    Write {
        request_id: u64,
        owner: String,
        items: Snapshot,
    },

    /// Create the owner's document.
    Create {
        request_id: u64,
        owner: String,
        items: Snapshot,
    },

    // =========================================================================
    // Server Replies
    // =========================================================================
    /// A version of the owner's document. `request_id` is set when this
    /// answers a `Read`; `items` is `None` when the document does not exist.
    Snapshot(SnapshotPayload),

    /// A `Write` or `Create` succeeded.
    WriteAck { request_id: u64 },

    /// A request failed.
    Error {
        #[serde(default)]
        request_id: Option<u64>,
        code: String,
        message: String,
    },

    // =========================================================================
    // Keepalive Messages
    // =========================================================================
    Ping { timestamp: i64 },

    Pong { timestamp: i64 },
}

/// Body of [`RemoteMessage::Snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    #[serde(default)]
    pub request_id: Option<u64>,
    pub owner: String,
    #[serde(default)]
    pub items: Option<Snapshot>,
}

// =============================================================================
// Helper Functions
// =============================================================================

impl RemoteMessage {
    /// Returns the message type name as a string (for logging).
    pub fn type_name(&self) -> &'static str {
        match self {
            RemoteMessage::Subscribe { .. } => "Subscribe",
            RemoteMessage::Read { .. } => "Read",
            RemoteMessage::Write { .. } => "Write",
            RemoteMessage::Create { .. } => "Create",
            RemoteMessage::Snapshot(_) => "Snapshot",
            RemoteMessage::WriteAck { .. } => "WriteAck",
            RemoteMessage::Error { .. } => "Error",
            RemoteMessage::Ping { .. } => "Ping",
            RemoteMessage::Pong { .. } => "Pong",
        }
    }

    /// The request this message belongs to, if it is a correlated reply
    /// or a request.
    pub fn request_id(&self) -> Option<u64> {
        match self {
            RemoteMessage::Subscribe { request_id, .. }
            | RemoteMessage::Read { request_id, .. }
            | RemoteMessage::Write { request_id, .. }
            | RemoteMessage::Create { request_id, .. }
            | RemoteMessage::WriteAck { request_id } => Some(*request_id),
            RemoteMessage::Snapshot(payload) => payload.request_id,
            RemoteMessage::Error { request_id, .. } => *request_id,
            RemoteMessage::Ping { .. } | RemoteMessage::Pong { .. } => None,
        }
    }

    /// Creates a Ping message.
    pub fn ping() -> Self {
        RemoteMessage::Ping {
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Creates the Pong answering a Ping.
    pub fn pong(ping_timestamp: i64) -> Self {
        RemoteMessage::Pong {
            timestamp: ping_timestamp,
        }
    }

    /// Creates an Error reply.
    pub fn error(request_id: Option<u64>, code: &str, message: &str) -> Self {
        RemoteMessage::Error {
            request_id,
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    /// Serializes to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Maps an `Error` reply to the matching [`SyncError`].
pub fn error_to_sync(owner: &str, code: &str, message: &str) -> SyncError {
    if code == ERROR_NOT_FOUND {
        SyncError::DocumentNotFound(owner.to_string())
    } else {
        SyncError::Remote(format!("{}: {}", code, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashdeck_core::root_only_snapshot;

    #[test]
    fn test_message_serialization() {
        let write = RemoteMessage::Write {
            request_id: 7,
            owner: "u1".to_string(),
            items: root_only_snapshot(),
        };
        let json = write.to_json().unwrap();
        assert!(json.contains("\"type\":\"Write\""));
        assert!(json.contains("\"parentId\":null"));

        let parsed = RemoteMessage::from_json(&json).unwrap();
        assert_eq!(parsed, write);
        assert_eq!(parsed.request_id(), Some(7));
    }

    #[test]
    fn test_snapshot_without_document() {
        let json = r#"{"type":"Snapshot","payload":{"request_id":3,"owner":"u1","items":null}}"#;
        match RemoteMessage::from_json(json).unwrap() {
            RemoteMessage::Snapshot(payload) => {
                assert_eq!(payload.request_id, Some(3));
                assert!(payload.items.is_none());
            }
            other => panic!("Expected Snapshot, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_pushed_snapshot_has_no_request_id() {
        let json = r#"{"type":"Snapshot","payload":{"owner":"u1","items":{}}}"#;
        let parsed = RemoteMessage::from_json(json).unwrap();
        assert_eq!(parsed.request_id(), None);
    }

    #[test]
    fn test_error_mapping() {
        assert!(error_to_sync("u1", ERROR_NOT_FOUND, "no document").is_not_found());

        let err = error_to_sync("u1", "permission_denied", "read only");
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("permission_denied"));
    }

    #[test]
    fn test_error_message() {
        let error = RemoteMessage::error(None, "bad_request", "unknown owner");
        let json = error.to_json().unwrap();
        assert!(json.contains("bad_request"));
        assert_eq!(RemoteMessage::pong(42), RemoteMessage::Pong { timestamp: 42 });
    }
}
