//! Cache entry CRUD operations.
//!
//! Provides functions for storing, reading, listing, and evicting cached
//! responses. Entries are grouped into named caches; within a cache an
//! entry is addressed by its key (the request URL, plus a revision marker
//! for precached assets).

use std::collections::HashSet;

use super::connection::CacheDb;
use super::hash::compute_entry_id;
use crate::Error;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEntry {
    /// Digest of `cache_name` and `key`; see [`compute_entry_id`].
    pub id: String,
    pub cache_name: String,
    pub key: String,
    /// URL the response was fetched from.
    pub url: String,
    pub revision: Option<String>,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

impl CachedEntry {
    /// Build an entry stamped with the current time.
    pub fn new(
        cache_name: impl Into<String>, key: impl Into<String>, url: impl Into<String>, status: u16,
        headers: Vec<(String, String)>, body: Vec<u8>,
    ) -> Self {
        let cache_name = cache_name.into();
        let key = key.into();
        Self {
            id: compute_entry_id(&cache_name, &key),
            cache_name,
            key,
            url: url.into(),
            revision: None,
            status,
            headers,
            body,
            stored_at: Utc::now(),
        }
    }

    pub fn with_revision(mut self, revision: Option<String>) -> Self {
        self.revision = revision;
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Time since the entry was written.
    pub fn age(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.stored_at)
    }
}

/// Per-cache totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheStats {
    pub cache_name: String,
    pub entries: u64,
    pub total_bytes: u64,
}

/// Format used for `stored_at`. Fixed-width so that string order matches time order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Row as read from SQLite, before JSON and timestamp decoding.
struct RawEntry {
    id: String,
    cache_name: String,
    key: String,
    url: String,
    revision: Option<String>,
    status: u16,
    headers_json: String,
    body: Vec<u8>,
    stored_at: String,
}

impl RawEntry {
    const COLUMNS: &'static str = "id, cache_name, cache_key, url, revision, status, headers_json, body, stored_at";

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            cache_name: row.get(1)?,
            key: row.get(2)?,
            url: row.get(3)?,
            revision: row.get(4)?,
            status: row.get(5)?,
            headers_json: row.get(6)?,
            body: row.get(7)?,
            stored_at: row.get(8)?,
        })
    }

    fn decode(self) -> Result<CachedEntry, Error> {
        let headers = serde_json::from_str(&self.headers_json)?;
        let stored_at = DateTime::parse_from_rfc3339(&self.stored_at)
            .map_err(|e| Error::CorruptEntry(format!("{}: bad stored_at: {e}", self.id)))?
            .with_timezone(&Utc);

        Ok(CachedEntry {
            id: self.id,
            cache_name: self.cache_name,
            key: self.key,
            url: self.url,
            revision: self.revision,
            status: self.status,
            headers,
            body: self.body,
            stored_at,
        })
    }
}

impl CacheDb {
    /// Insert or replace a cached entry.
    ///
    /// Uses UPSERT semantics keyed on the entry id, so concurrent writers
    /// to the same key resolve to whichever write lands last.
    pub async fn put_entry(&self, entry: &CachedEntry) -> Result<(), Error> {
        let headers_json = serde_json::to_string(&entry.headers)?;
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_entries (
                    id, cache_name, cache_key, url, revision, status,
                    headers_json, body, stored_at, body_size
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(id) DO UPDATE SET
                    url = excluded.url,
                    revision = excluded.revision,
                    status = excluded.status,
                    headers_json = excluded.headers_json,
                    body = excluded.body,
                    stored_at = excluded.stored_at,
                    body_size = excluded.body_size",
                    params![
                        &entry.id,
                        &entry.cache_name,
                        &entry.key,
                        &entry.url,
                        &entry.revision,
                        entry.status,
                        &headers_json,
                        &entry.body,
                        format_timestamp(&entry.stored_at),
                        entry.body.len() as i64,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get an entry by cache name and key.
    ///
    /// Returns None if the cache holds no entry for the key.
    pub async fn get_entry(&self, cache_name: &str, key: &str) -> Result<Option<CachedEntry>, Error> {
        self.get_entry_by_id(&compute_entry_id(cache_name, key)).await
    }

    /// Get an entry by its id.
    pub async fn get_entry_by_id(&self, id: &str) -> Result<Option<CachedEntry>, Error> {
        let id = id.to_string();
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<RawEntry>, Error> {
                let sql = format!("SELECT {} FROM cache_entries WHERE id = ?1", RawEntry::COLUMNS);
                let mut stmt = conn.prepare(&sql)?;

                match stmt.query_row(params![id], RawEntry::from_row) {
                    Ok(raw) => Ok(Some(raw)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        raw.map(RawEntry::decode).transpose()
    }

    /// Check whether an entry exists without loading its body.
    pub async fn has_entry(&self, cache_name: &str, key: &str) -> Result<bool, Error> {
        let id = compute_entry_id(cache_name, key);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn
                    .query_row("SELECT EXISTS(SELECT 1 FROM cache_entries WHERE id = ?1)", params![id], |row| {
                        row.get(0)
                    })
                    .map_err(Error::from)?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete one entry. Returns whether it existed.
    pub async fn delete_entry(&self, cache_name: &str, key: &str) -> Result<bool, Error> {
        let id = compute_entry_id(cache_name, key);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM cache_entries WHERE id = ?1", params![id])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// List the keys stored in a cache, oldest first.
    pub async fn list_keys(&self, cache_name: &str) -> Result<Vec<String>, Error> {
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT cache_key FROM cache_entries WHERE cache_name = ?1 ORDER BY stored_at ASC, rowid ASC",
                )?;
                let keys = stmt
                    .query_map(params![cache_name], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every entry in `cache_name` whose key is not in `keep`.
    ///
    /// Returns the number of deleted entries.
    pub async fn delete_entries_except(&self, cache_name: &str, keep: &[String]) -> Result<u64, Error> {
        let cache_name = cache_name.to_string();
        let keep: HashSet<String> = keep.iter().cloned().collect();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                let stored: Vec<String> = {
                    let mut stmt = tx.prepare("SELECT cache_key FROM cache_entries WHERE cache_name = ?1")?;
                    let keys = stmt
                        .query_map(params![&cache_name], |row| row.get::<_, String>(0))?
                        .collect::<Result<Vec<_>, _>>()?;
                    keys
                };
                let stale: Vec<&String> = stored.iter().filter(|key| !keep.contains(*key)).collect();

                let mut deleted = 0u64;
                for key in stale {
                    deleted += tx.execute(
                        "DELETE FROM cache_entries WHERE cache_name = ?1 AND cache_key = ?2",
                        params![&cache_name, key],
                    )? as u64;
                }
                tx.commit()?;
                Ok(deleted)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete entries stored before `cutoff`, in one cache or in all of them.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_entries_older_than(
        &self, cache_name: Option<&str>, cutoff: DateTime<Utc>,
    ) -> Result<u64, Error> {
        let cache_name = cache_name.map(str::to_string);
        let cutoff = format_timestamp(&cutoff);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM cache_entries WHERE (?1 IS NULL OR cache_name = ?1) AND stored_at < ?2",
                    params![cache_name, cutoff],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete entries whose URL host is `domain` or one of its subdomains.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_entries_by_domain(&self, domain: &str) -> Result<u64, Error> {
        let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
        if domain.is_empty() {
            return Err(Error::InvalidInput("domain must not be empty".into()));
        }
        let suffix = format!(".{domain}");
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                let matching: Vec<String> = {
                    let mut stmt = tx.prepare("SELECT id, url FROM cache_entries")?;
                    let rows = stmt
                        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows.into_iter()
                        .filter(|(_, url)| {
                            url::Url::parse(url)
                                .ok()
                                .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
                                .is_some_and(|host| host == domain || host.ends_with(&suffix))
                        })
                        .map(|(id, _)| id)
                        .collect()
                };

                let mut deleted = 0u64;
                for id in &matching {
                    deleted += tx.execute("DELETE FROM cache_entries WHERE id = ?1", params![id])? as u64;
                }
                tx.commit()?;
                Ok(deleted)
            })
            .await
            .map_err(Error::from)
    }

    /// Purge oldest entries until the count is at most `max_entries`.
    ///
    /// With a cache name only that cache is trimmed; without one the limit
    /// applies across every cache. Returns the number of deleted entries.
    pub async fn purge_lru_entries(&self, cache_name: Option<&str>, max_entries: usize) -> Result<u64, Error> {
        let cache_name = cache_name.map(str::to_string);
        let max = max_entries as i64;
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM cache_entries WHERE (?1 IS NULL OR cache_name = ?1)",
                    params![&cache_name],
                    |row| row.get(0),
                )?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = conn.execute(
                    "DELETE FROM cache_entries WHERE id IN (
                    SELECT id FROM cache_entries
                    WHERE (?1 IS NULL OR cache_name = ?1)
                    ORDER BY stored_at ASC, rowid ASC LIMIT ?2
                )",
                    params![&cache_name, to_delete],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Drop a whole cache. Returns the number of deleted entries.
    pub async fn delete_cache(&self, cache_name: &str) -> Result<u64, Error> {
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM cache_entries WHERE cache_name = ?1", params![cache_name])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Entry counts and body sizes for every non-empty cache, by name.
    pub async fn cache_stats(&self) -> Result<Vec<CacheStats>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<CacheStats>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT cache_name, COUNT(*), COALESCE(SUM(body_size), 0)
                    FROM cache_entries GROUP BY cache_name ORDER BY cache_name",
                )?;
                let stats = stmt
                    .query_map([], |row| {
                        Ok(CacheStats {
                            cache_name: row.get(0)?,
                            entries: row.get::<_, i64>(1)? as u64,
                            total_bytes: row.get::<_, i64>(2)? as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(stats)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUNTIME: &str = "sw-cache-runtime";

    fn make_test_entry(cache_name: &str, url: &str) -> CachedEntry {
        CachedEntry::new(
            cache_name,
            url,
            url,
            200,
            vec![("content-type".to_string(), "text/html".to_string())],
            b"<html></html>".to_vec(),
        )
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entry = make_test_entry(RUNTIME, "https://example.com/");

        db.put_entry(&entry).await.unwrap();

        let retrieved = db.get_entry(RUNTIME, "https://example.com/").await.unwrap().unwrap();
        assert_eq!(retrieved.url, entry.url);
        assert_eq!(retrieved.body, entry.body);
        assert_eq!(retrieved.header("Content-Type"), Some("text/html"));
        assert_eq!(format_timestamp(&retrieved.stored_at), format_timestamp(&entry.stored_at));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.get_entry(RUNTIME, "https://example.com/").await.unwrap().is_none());
        assert!(db.get_entry_by_id("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites_same_key() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry(&make_test_entry(RUNTIME, "https://example.com/a.js"))
            .await
            .unwrap();

        let mut newer = make_test_entry(RUNTIME, "https://example.com/a.js");
        newer.body = b"second".to_vec();
        db.put_entry(&newer).await.unwrap();

        let stored = db.get_entry(RUNTIME, "https://example.com/a.js").await.unwrap().unwrap();
        assert_eq!(stored.body, b"second".to_vec());
        assert_eq!(db.list_keys(RUNTIME).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_key_in_two_caches() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry(&make_test_entry("a", "https://example.com/")).await.unwrap();
        db.put_entry(&make_test_entry("b", "https://example.com/")).await.unwrap();

        assert!(db.delete_entry("a", "https://example.com/").await.unwrap());
        assert!(!db.has_entry("a", "https://example.com/").await.unwrap());
        assert!(db.has_entry("b", "https://example.com/").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_entries_except() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for url in ["https://example.com/index.html", "https://example.com/old.js", "https://example.com/new.js"] {
            db.put_entry(&make_test_entry("precache", url)).await.unwrap();
        }
        db.put_entry(&make_test_entry(RUNTIME, "https://example.com/old.js"))
            .await
            .unwrap();

        let keep = vec!["https://example.com/index.html".to_string(), "https://example.com/new.js".to_string()];
        let deleted = db.delete_entries_except("precache", &keep).await.unwrap();
        assert_eq!(deleted, 1);

        let keys = db.list_keys("precache").await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(!keys.contains(&"https://example.com/old.js".to_string()));
        assert!(db.has_entry(RUNTIME, "https://example.com/old.js").await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_older_than() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let mut old = make_test_entry(RUNTIME, "https://example.com/old");
        old.stored_at = Utc::now() - chrono::Duration::hours(2);
        db.put_entry(&old).await.unwrap();
        db.put_entry(&make_test_entry(RUNTIME, "https://example.com/fresh"))
            .await
            .unwrap();

        let cutoff = Utc::now() - chrono::Duration::hours(1);
        let deleted = db.purge_entries_older_than(Some(RUNTIME), cutoff).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(db.list_keys(RUNTIME).await.unwrap(), vec!["https://example.com/fresh".to_string()]);
    }

    #[tokio::test]
    async fn test_purge_by_domain() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry(&make_test_entry(RUNTIME, "https://example.com/page1"))
            .await
            .unwrap();
        db.put_entry(&make_test_entry(RUNTIME, "https://cdn.example.com/lib.js"))
            .await
            .unwrap();
        db.put_entry(&make_test_entry(RUNTIME, "https://other.com/page2"))
            .await
            .unwrap();

        let deleted = db.purge_entries_by_domain("example.com").await.unwrap();
        assert_eq!(deleted, 2);
        assert!(db.has_entry(RUNTIME, "https://other.com/page2").await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_by_domain_matches_host_only() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for url in [
            "https://Example.com:8443/app.js",
            "https://static.cdn.example.com/lib.js",
            "https://other.com/mirror.example.com/lib.js",
            "https://other.com/?ref=https://example.com/",
            "https://badexample.com/page",
            "https://exampleXcom/page",
        ] {
            db.put_entry(&make_test_entry(RUNTIME, url)).await.unwrap();
        }

        assert_eq!(db.purge_entries_by_domain("example.com").await.unwrap(), 2);
        assert_eq!(db.list_keys(RUNTIME).await.unwrap().len(), 4);
        assert!(db.has_entry(RUNTIME, "https://other.com/mirror.example.com/lib.js").await.unwrap());

        // LIKE metacharacters are plain text in a domain.
        assert_eq!(db.purge_entries_by_domain("example_com").await.unwrap(), 0);
        assert_eq!(db.purge_entries_by_domain("%").await.unwrap(), 0);
        assert_eq!(db.list_keys(RUNTIME).await.unwrap().len(), 4);

        assert!(db.purge_entries_by_domain("  ").await.is_err());
    }

    #[tokio::test]
    async fn test_purge_lru_per_cache() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for (i, url) in ["https://example.com/1", "https://example.com/2", "https://example.com/3"]
            .iter()
            .enumerate()
        {
            let mut entry = make_test_entry(RUNTIME, url);
            entry.stored_at = Utc::now() - chrono::Duration::seconds(10 - i as i64);
            db.put_entry(&entry).await.unwrap();
        }
        db.put_entry(&make_test_entry("other", "https://example.com/x"))
            .await
            .unwrap();

        let deleted = db.purge_lru_entries(Some(RUNTIME), 2).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(
            db.list_keys(RUNTIME).await.unwrap(),
            vec!["https://example.com/2".to_string(), "https://example.com/3".to_string()]
        );
        assert!(db.has_entry("other", "https://example.com/x").await.unwrap());
    }

    #[tokio::test]
    async fn test_cache_stats() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry(&make_test_entry("a", "https://example.com/1")).await.unwrap();
        db.put_entry(&make_test_entry("a", "https://example.com/2")).await.unwrap();
        db.put_entry(&make_test_entry("b", "https://example.com/1")).await.unwrap();

        let stats = db.cache_stats().await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].cache_name, "a");
        assert_eq!(stats[0].entries, 2);
        assert_eq!(stats[0].total_bytes, 2 * b"<html></html>".len() as u64);

        assert_eq!(db.delete_cache("a").await.unwrap(), 2);
        assert_eq!(db.cache_stats().await.unwrap().len(), 1);
    }
}
