//! # flashdeck-sync: Sync Engine for Flashdeck
//!
//! This crate keeps each owner's item tree available offline and converging
//! with the owner's remote document.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Layer Architecture                          │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      Session (per owner)                         │  │
//! │  │                                                                  │  │
//! │  │  Loads the cached tree, runs every store operation, persists    │  │
//! │  │  and pushes each change                                          │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  LocalCache    │  │  Push worker   │  │  Pull loop             │    │
//! │  │  (flashdeck-db)│  │                │  │                        │    │
//! │  │                │  │ write, create  │  │ reconcile remote       │    │
//! │  │ SQLite, write- │  │ if not found,  │  │ snapshots within the   │    │
//! │  │ behind queue   │  │ never retried  │  │ recency window         │    │
//! │  └────────────────┘  └───────┬────────┘  └───────────▲────────────┘    │
//! │                              │                       │                  │
//! │                              ▼                       │                  │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                    dyn RemoteStore                               │  │
//! │  │   MemoryRemote (in process)   │   WsRemote (Transport + backoff) │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  STATUS EVENTS (SyncEventEmitter):                                     │
//! │  • emit_status - counters and last error changed                       │
//! │  • emit_merge  - a remote snapshot changed the local tree              │
//! │  • emit_error  - a push or the snapshot stream failed                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`session`] - Owner-scoped `Session`
//! - [`engine`] - Push worker, pull loop, merge step
//! - [`remote`] - `RemoteStore` trait
//! - [`memory`] - In-process remote
//! - [`ws`] - WebSocket remote
//! - [`transport`] - WebSocket client with reconnection
//! - [`protocol`] - Message types for the remote document service
//! - [`status`] - Sync status and event emitter
//! - [`config`] - Configuration (namespace, mode, remote URL, window)
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use flashdeck_core::{ItemKind, SystemClock, ROOT_ID};
//! use flashdeck_db::{Database, DbConfig, LocalCache};
//! use flashdeck_sync::{FlashdeckConfig, Session, SessionDeps, TransportConfig, WsRemote};
//!
//! let config = FlashdeckConfig::load_or_default(None);
//! let db = Database::new(DbConfig::new("flashdeck.db")).await?;
//! let remote = WsRemote::connect(TransportConfig::from_config(&config)?);
//!
//! let deps = SessionDeps::new(LocalCache::new(&db), Arc::new(SystemClock))
//!     .with_remote(Arc::new(remote))
//!     .with_config(config);
//!
//! let mut session = Session::open(Some("user-42"), deps).await?;
//! session.create(ItemKind::Folder, "Spanish", ROOT_ID, None)?;
//! println!("Pushes so far: {}", session.status().pushes);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod protocol;
pub mod remote;
pub mod session;
pub mod status;
pub mod transport;
pub mod ws;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{CacheSettings, FlashdeckConfig, SyncMode, SyncSettings};
pub use engine::{merge_remote, SyncContext, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use memory::MemoryRemote;
pub use protocol::RemoteMessage;
pub use remote::{RemoteStore, SnapshotStream};
pub use session::{Session, SessionDeps};
pub use status::{NoOpEmitter, SyncEventEmitter, SyncStatus};
pub use transport::{ConnectionState, TransportConfig};
pub use ws::WsRemote;
