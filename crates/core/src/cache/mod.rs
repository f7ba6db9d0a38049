//! SQLite-backed store for named response caches.
//!
//! This module provides a persistent cache using SQLite with async access
//! via tokio-rusqlite. It supports:
//!
//! - Any number of named caches holding request-keyed responses
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Multiple purge strategies (age, domain, LRU, manifest cleanup)

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{CacheStats, CachedEntry};
