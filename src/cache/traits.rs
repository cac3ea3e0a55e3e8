//! The cache collaborator boundary.
//!
//! This library owns no cache of its own. Everything it needs from the
//! surrounding query-cache is the small capability set in [`QueryCache`]:
//! cancel in-flight fetches, read a snapshot, write a snapshot. Any store
//! that can do those three things can host optimistic mutations.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::entry::CacheEntry;

/// A cache key: an ordered sequence of opaque JSON tokens.
///
/// Keys compare by token sequence; [`QueryKey::cache_hash`] gives a stable,
/// fixed-length form for storage indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryKey {
  tokens: Vec<Value>,
}

impl QueryKey {
  /// Build a key from its tokens, e.g. `QueryKey::new(["todos", "list"])`.
  pub fn new<I, T>(tokens: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<Value>,
  {
    Self {
      tokens: tokens.into_iter().map(Into::into).collect(),
    }
  }

  /// The key's tokens in order.
  pub fn tokens(&self) -> &[Value] {
    &self.tokens
  }

  /// SHA256 hash of the serialized token sequence, for stable fixed-length
  /// storage keys.
  pub fn cache_hash(&self) -> String {
    let input = serde_json::to_string(&self.tokens)
      .unwrap_or_else(|_| format!("{:?}", self.tokens));

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  /// Human-readable form for logs and debugging.
  pub fn description(&self) -> String {
    self
      .tokens
      .iter()
      .map(|token| match token {
        Value::String(s) => s.clone(),
        other => other.to_string(),
      })
      .collect::<Vec<_>>()
      .join(":")
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.description())
  }
}

/// Capability set required from the surrounding query-cache.
///
/// All three operations are synchronous; an implementation over an async
/// store should keep its own bridge. A `None` entry means "no value cached
/// under this key".
pub trait QueryCache: Send + Sync {
  /// Cancel any in-flight background fetch for `key`, so a refetch that
  /// started before an optimistic write cannot clobber it when it lands.
  fn cancel_fetches(&self, key: &QueryKey);

  /// Read the current entry snapshot.
  fn get_entry(&self, key: &QueryKey) -> Option<CacheEntry>;

  /// Write an entry snapshot; `None` removes the entry.
  fn set_entry(&self, key: &QueryKey, entry: Option<CacheEntry>);

  /// Read-modify-write convenience built on the two snapshot operations.
  fn update_entry(&self, key: &QueryKey, update: &dyn Fn(Option<CacheEntry>) -> Option<CacheEntry>) {
    let next = update(self.get_entry(key));
    self.set_entry(key, next);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_cache_hash_is_stable_and_distinct() {
    let a = QueryKey::new(["todos", "list"]);
    let b = QueryKey::new(["todos", "list"]);
    let c = QueryKey::new(["todos", "detail"]);

    assert_eq!(a.cache_hash(), b.cache_hash());
    assert_ne!(a.cache_hash(), c.cache_hash());
    assert_eq!(a.cache_hash().len(), 64);
  }

  #[test]
  fn test_mixed_tokens() {
    let key = QueryKey::new(vec![json!("todos"), json!({"page": 1})]);
    assert_eq!(key.description(), "todos:{\"page\":1}");
    assert_eq!(key.tokens().len(), 2);
  }
}
