//! Stable row identifiers for cache entries.

use sha2::{Digest, Sha256};

/// Compute the identifier of the entry stored under `key` in `cache_name`.
///
/// Two caches may hold the same key, so the cache name is part of the digest.
pub fn compute_entry_id(cache_name: &str, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(cache_name.as_bytes());
    hasher.update(b"\n");
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check that a string looks like an identifier produced by [`compute_entry_id`].
pub fn is_entry_id(candidate: &str) -> bool {
    candidate.len() == 64 && candidate.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_stability() {
        let id1 = compute_entry_id("sw-cache-precache", "https://example.com/index.html");
        let id2 = compute_entry_id("sw-cache-precache", "https://example.com/index.html");
        assert_eq!(id1, id2);
    }

    #[test]
    fn test_id_different_cache() {
        let precache = compute_entry_id("sw-cache-precache", "https://example.com/app.js");
        let runtime = compute_entry_id("sw-cache-runtime", "https://example.com/app.js");
        assert_ne!(precache, runtime);
    }

    #[test]
    fn test_id_format() {
        let id = compute_entry_id("sw-cache-runtime", "https://example.com/");
        assert!(is_entry_id(&id));
        assert!(!is_entry_id("nonexistent"));
    }
}
