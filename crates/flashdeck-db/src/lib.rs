//! # flashdeck-db: Local Cache for Flashdeck
//!
//! This crate keeps a durable copy of each owner's item tree in SQLite so
//! the store opens instantly, offline, with the last known state.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Flashdeck Data Flow                              │
//! │                                                                         │
//! │  Session (flashdeck-sync)                                              │
//! │       │ load on open, save on every change                             │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  flashdeck-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  LocalCache   │    │  Repository   │    │  Migrations  │  │   │
//! │  │   │  (cache.rs)   │───►│  (cache.rs)   │    │  (embedded)  │  │   │
//! │  │   │ load / save   │    │ get/put/keys  │    │ 001_item_    │  │   │
//! │  │   │ writer task   │    │               │    │   cache.sql  │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                │ Database (pool.rs)            │   │
//! │  └────────────────────────────────┼────────────────────────────────┘   │
//! │                                   ▼                                     │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │   SQLite: item_cache(cache_key, payload, updated_at)            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Raw cache rows
//! - [`cache`] - The non-blocking snapshot cache used by sessions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use flashdeck_db::{cache_key, Database, DbConfig, LocalCache};
//!
//! let db = Database::new(DbConfig::new("flashdeck.db")).await?;
//! let cache = LocalCache::new(&db);
//!
//! let key = cache_key("flashcards_data", Some("user-42"));
//! let tree = cache.load(&key).await;
//! cache.save(&key, &tree);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cache;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use cache::{cache_key, LocalCache};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::cache::{CacheRecord, CacheRepository};
