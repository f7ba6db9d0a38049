//! Coalescing of background cache refreshes.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;

/// Tracks which keys have a background refresh in flight.
///
/// At most one refresh per key runs at a time; a second request for a key
/// that is already being refreshed is dropped. Refresh tasks are detached:
/// dropping the handle, or the request that triggered the refresh, does not
/// cancel them.
#[derive(Debug, Clone, Default)]
pub struct Revalidator {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Clears the key when the refresh finishes, panics included.
struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

impl Revalidator {
    pub fn new() -> Self {
        Self::default()
    }

    fn keys(&self) -> MutexGuard<'_, HashSet<String>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn `task` unless a refresh for `key` is already running.
    ///
    /// Returns the task handle, or None when the refresh was coalesced.
    pub fn spawn<F>(&self, key: String, task: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.keys().insert(key.clone()) {
            tracing::debug!("revalidation already in flight for {}", key);
            return None;
        }

        let guard = InFlightGuard { in_flight: self.in_flight.clone(), key };
        Some(tokio::spawn(async move {
            let _guard = guard;
            task.await;
        }))
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.keys().contains(key)
    }

    pub fn in_flight(&self) -> usize {
        self.keys().len()
    }
}
