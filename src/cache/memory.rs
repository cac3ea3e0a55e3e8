//! In-memory reference cache.
//!
//! Enough of a query-cache to host optimistic mutations on its own: a hash
//! map of entries plus a registry of in-flight fetch handles so
//! `cancel_fetches` has something real to cancel. Production integrations
//! will usually implement [`QueryCache`] over their actual store instead.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tokio::task::AbortHandle;

use super::traits::{QueryCache, QueryKey};
use crate::entry::CacheEntry;

/// Thread-safe in-memory [`QueryCache`] implementation.
#[derive(Default)]
pub struct MemoryCache {
  entries: Mutex<HashMap<String, CacheEntry>>,
  fetches: Mutex<HashMap<String, Vec<AbortHandle>>>,
}

impl MemoryCache {
  /// Create an empty cache.
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a spawned fetch task for `key`.
  ///
  /// The next `cancel_fetches(key)` aborts every handle registered since the
  /// previous cancellation.
  pub fn register_fetch(&self, key: &QueryKey, handle: AbortHandle) {
    self
      .fetches
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .entry(key.cache_hash())
      .or_default()
      .push(handle);
  }
}

impl QueryCache for MemoryCache {
  fn cancel_fetches(&self, key: &QueryKey) {
    let handles = self
      .fetches
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(&key.cache_hash());

    if let Some(handles) = handles {
      for handle in handles {
        handle.abort();
      }
    }
  }

  fn get_entry(&self, key: &QueryKey) -> Option<CacheEntry> {
    self
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(&key.cache_hash())
      .cloned()
  }

  fn set_entry(&self, key: &QueryKey, entry: Option<CacheEntry>) {
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    match entry {
      Some(entry) => {
        entries.insert(key.cache_hash(), entry);
      }
      None => {
        entries.remove(&key.cache_hash());
      }
    }
  }
}
