//! Core types and shared functionality for sw-cache.
//!
//! This crate provides:
//! - Named response caches with a SQLite backend
//! - Precache manifest entries
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod manifest;

pub use cache::{CacheDb, CacheStats, CachedEntry};
pub use config::{AppConfig, ConfigError, RouteConfig, StrategyKind, StrategyOptions};
pub use error::Error;
pub use manifest::ManifestEntry;
