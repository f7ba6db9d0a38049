//! Age and size limits for a named cache.

use chrono::{TimeDelta, Utc};
use swcache_core::{CacheDb, CachedEntry, Error, StrategyOptions};

/// Expiration policy applied on every read and write of a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Expiration {
    pub max_entries: Option<usize>,
    pub max_age: Option<TimeDelta>,
}

impl Expiration {
    pub fn is_unbounded(&self) -> bool {
        self.max_entries.is_none() && self.max_age.is_none()
    }

    /// Whether `entry` is too old to be served.
    pub fn is_expired(&self, entry: &CachedEntry) -> bool {
        self.max_age.is_some_and(|max_age| entry.age() > max_age)
    }

    /// Purge entries past the age limit, then evict the oldest beyond the size limit.
    ///
    /// Returns the number of deleted entries.
    pub async fn enforce(&self, db: &CacheDb, cache_name: &str) -> Result<u64, Error> {
        let mut deleted = 0;

        if let Some(cutoff) = self.max_age.and_then(|max_age| Utc::now().checked_sub_signed(max_age)) {
            deleted += db.purge_entries_older_than(Some(cache_name), cutoff).await?;
        }

        if let Some(max_entries) = self.max_entries {
            deleted += db.purge_lru_entries(Some(cache_name), max_entries).await?;
        }

        if deleted > 0 {
            tracing::debug!("expired {} entries from {}", deleted, cache_name);
        }

        Ok(deleted)
    }
}

impl From<&StrategyOptions> for Expiration {
    /// A max age too large to represent never expires anything.
    fn from(options: &StrategyOptions) -> Self {
        Self {
            max_entries: options.max_entries,
            max_age: options
                .max_age_seconds
                .and_then(|secs| i64::try_from(secs).ok())
                .and_then(TimeDelta::try_seconds),
        }
    }
}
