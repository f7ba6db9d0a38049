//! Precache manifest entries.
//!
//! A manifest is an ordered list where each entry is either a bare URL
//! (`"index.html"`) or an object carrying a revision marker
//! (`{"url": "app.js", "revision": "a1b2"}`).

use serde::{Deserialize, Serialize};

/// A single precache manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(untagged)]
pub enum ManifestEntry {
    /// A URL with no revision tracking.
    Url(String),
    /// A URL whose stored copy is invalidated whenever `revision` changes.
    Versioned {
        url: String,
        #[serde(default)]
        revision: Option<String>,
    },
}

impl ManifestEntry {
    /// Entry with a revision marker.
    pub fn versioned(url: impl Into<String>, revision: impl Into<String>) -> Self {
        ManifestEntry::Versioned { url: url.into(), revision: Some(revision.into()) }
    }

    pub fn url(&self) -> &str {
        match self {
            ManifestEntry::Url(url) => url,
            ManifestEntry::Versioned { url, .. } => url,
        }
    }

    pub fn revision(&self) -> Option<&str> {
        match self {
            ManifestEntry::Url(_) => None,
            ManifestEntry::Versioned { revision, .. } => revision.as_deref(),
        }
    }

    /// Whether the URL still contains glob syntax that a build step should have expanded.
    pub fn is_glob(&self) -> bool {
        self.url().contains('*')
    }
}

impl From<&str> for ManifestEntry {
    fn from(url: &str) -> Self {
        ManifestEntry::Url(url.to_string())
    }
}
