//! # Repository Module
//!
//! Database repository implementations for Flashdeck.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  LocalCache (load / save)                                              │
//! │       │                                                                 │
//! │       │  db.cache().get("flashcards_data_user-42")                     │
//! │       ▼                                                                 │
//! │  CacheRepository                                                       │
//! │  ├── get(&self, key)                                                   │
//! │  ├── put(&self, key, payload)                                          │
//! │  ├── remove(&self, key)                                                │
//! │  └── keys(&self)                                                       │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database (item_cache)                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`cache::CacheRepository`] - Raw snapshot payloads keyed per owner

pub mod cache;
