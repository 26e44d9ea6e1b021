//! # flashdeck-core: Pure Item-Tree Logic for Flashdeck
//!
//! This crate is the **heart** of Flashdeck. It holds the folder/set tree,
//! every local mutation, and the rules for merging a remote snapshot, with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Flashdeck Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Editor / Dashboard UI                        │   │
//! │  │    Folder view ──► Set editor ──► Study mode                    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    flashdeck-sync::Session                      │   │
//! │  │    persist + push on every local change, merge on pull          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ flashdeck-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   store   │  │   merge   │  │ clipboard │  │   │
//! │  │   │   Item    │  │ ItemStore │  │ reconcile │  │ cut/copy  │  │   │
//! │  │   │ Snapshot  │  │  move/del │  │ MergePlan │  │  paste    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • CLOCK IS INJECTED        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Item, SetContent, Snapshot, clipboard entry)
//! - [`time`] - Epoch-millisecond timestamps and the `Clock` trait
//! - [`store`] - The Item Store
//! - [`merge`] - Remote snapshot reconciliation
//! - [`clipboard`] - Cut/copy/paste
//! - [`mass_create`] - Splitting oversized sets
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use flashdeck_core::{ItemKind, ItemStore, SetContent, SystemClock, ROOT_ID};
//!
//! let mut store = ItemStore::new(Arc::new(SystemClock));
//! let folder = store.create(ItemKind::Folder, "Spanish", ROOT_ID, None).unwrap();
//! let set = store
//!     .create(ItemKind::Set, "Animals", &folder, Some(SetContent::from_text("cat, gato")))
//!     .unwrap();
//!
//! assert_eq!(store.children_of(&folder).len(), 1);
//! store.delete(&[folder]);
//! assert!(!store.contains(&set));
//! ```

use std::time::Duration;

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clipboard;
pub mod error;
pub mod mass_create;
pub mod merge;
pub mod store;
pub mod time;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use clipboard::{Clipboard, PasteOutcome};
pub use error::{CoreError, CoreResult, ValidationError};
pub use merge::{reconcile, MergePlan};
pub use store::ItemStore;
pub use time::{Clock, ManualClock, SystemClock, Timestamp};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Prefix of every local cache key (`"<namespace>_<owner>"`).
///
/// Matches the key earlier clients used, so existing caches keep loading.
pub const DEFAULT_CACHE_NAMESPACE: &str = "flashcards_data";

/// Owner segment of the cache key when nobody is signed in.
pub const ANONYMOUS_OWNER: &str = "local";

/// How long an item missing from a remote snapshot is assumed to be an
/// unsynced local write rather than a remote deletion.
pub const DEFAULT_RECENCY_WINDOW: Duration = Duration::from_secs(10);

/// Default cards per set when splitting a large import.
pub const DEFAULT_MASS_CREATE_MAX: usize = 30;

/// Maximum length of an item name, in characters.
pub const MAX_NAME_LEN: usize = 200;

/// Maximum length of an owner id, in bytes.
pub const MAX_OWNER_ID_LEN: usize = 128;
