//! Optimistic update.
//!
//! The target item is rewritten in the cache through a caller-supplied pure
//! updater before the write goes out; the server's returned item replaces it
//! on success, and the snapshot comes back on failure. A target missing from
//! the cache skips the optimistic step but lets the mutation proceed.

use serde_json::Value;
use std::sync::Arc;

use crate::cache::{ambient, QueryCache, QueryKey};
use crate::entry::CacheEntry;
use crate::error::Error;
use crate::identity::{resolve_id, IdExtractor};
use crate::mutation::MutationLifecycle;

/// Pure function producing the optimistic next version of an item, given the
/// current cached item and the mutation payload.
pub type Updater = Arc<dyn Fn(&Value, &Value) -> Value + Send + Sync>;

/// Lifecycle handlers for updating an item optimistically.
pub struct OptimisticUpdate<C: ?Sized> {
  cache: Arc<C>,
  key: QueryKey,
  updater: Updater,
  id_extractor: Option<IdExtractor>,
  default_id: Option<Value>,
}

/// Per-invocation state for one update.
pub struct UpdateContext {
  snapshot: Option<CacheEntry>,
}

impl UpdateContext {
  /// The cache entry as it was before the optimistic replace.
  pub fn snapshot(&self) -> Option<&CacheEntry> {
    self.snapshot.as_ref()
  }
}

impl<C: QueryCache + ?Sized> OptimisticUpdate<C> {
  /// Create a lifecycle bound to `cache` and `key`, with the pure updater
  /// applied to the cached item at `begin` time.
  pub fn new<F>(cache: Arc<C>, key: QueryKey, updater: F) -> Self
  where
    F: Fn(&Value, &Value) -> Value + Send + Sync + 'static,
  {
    Self {
      cache,
      key,
      updater: Arc::new(updater),
      id_extractor: None,
      default_id: None,
    }
  }

  /// Use a custom identity extractor instead of the `id` field convention.
  pub fn with_id_extractor<F>(mut self, extractor: F) -> Self
  where
    F: Fn(&Value) -> Value + Send + Sync + 'static,
  {
    self.id_extractor = Some(Arc::new(extractor));
    self
  }

  /// Target identity to use when a mutation is dispatched without a payload.
  pub fn with_default_id(mut self, id: impl Into<Value>) -> Self {
    self.default_id = Some(id.into());
    self
  }
}

impl OptimisticUpdate<dyn QueryCache> {
  /// Build against the current task's ambient cache.
  pub fn ambient<F>(key: QueryKey, updater: F) -> Result<Self, Error>
  where
    F: Fn(&Value, &Value) -> Value + Send + Sync + 'static,
  {
    Ok(Self::new(ambient::current()?, key, updater))
  }
}

impl<C: QueryCache + ?Sized> MutationLifecycle for OptimisticUpdate<C> {
  type Payload = Option<Value>;
  type Output = Value;
  type Context = UpdateContext;

  fn begin(&self, payload: &Option<Value>) -> Result<UpdateContext, Error> {
    let extractor = self.id_extractor.as_ref();

    let target_id = match payload {
      Some(item) => resolve_id(item, extractor)?,
      None => match &self.default_id {
        Some(id) => id.clone(),
        None => {
          return Err(Error::InvalidItem(
            "update dispatched without an item and no default id is configured".to_string(),
          ))
        }
      },
    };

    self.cache.cancel_fetches(&self.key);
    let snapshot = self.cache.get_entry(&self.key);

    if let Some(entry) = &snapshot {
      match entry.find_by_id(&target_id, extractor)? {
        Some((_, current)) => {
          let variables = payload.clone().unwrap_or(Value::Null);
          let updated = (self.updater)(current, &variables);
          let next = entry.replace_by_id(&target_id, &updated, extractor)?;
          self.cache.set_entry(&self.key, Some(next));
          tracing::debug!(key = %self.key, "optimistic update applied");
        }
        None => {
          // Target not cached: nothing to update optimistically, but the
          // write still goes out.
          tracing::debug!(key = %self.key, "update target not in cache; skipping optimistic step");
        }
      }
    }

    Ok(UpdateContext { snapshot })
  }

  fn on_success(&self, _context: &mut UpdateContext, output: &Value) -> Result<(), Error> {
    let entry = match self.cache.get_entry(&self.key) {
      Some(entry) => entry,
      None => return Ok(()),
    };
    let extractor = self.id_extractor.as_ref();

    // Reconcile with the server's item, keyed by the identity the server
    // reports - not the identity the request was made with.
    let id = resolve_id(output, extractor)?;
    let next = entry.replace_by_id(&id, output, extractor)?;
    self.cache.set_entry(&self.key, Some(next));
    Ok(())
  }

  fn on_error(&self, context: &mut UpdateContext) {
    tracing::debug!(key = %self.key, "update write failed; restoring snapshot");
    self.cache.set_entry(&self.key, context.snapshot.clone());
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::MemoryCache;
  use crate::mutation::Mutation;
  use serde_json::json;

  fn seeded_cache() -> (Arc<MemoryCache>, QueryKey) {
    let cache = Arc::new(MemoryCache::new());
    let key = QueryKey::new(["todos"]);
    cache.set_entry(
      &key,
      Some(CacheEntry::Flat(vec![
        json!({"id": 1, "title": "A", "done": false}),
        json!({"id": 2, "title": "B", "done": false}),
      ])),
    );
    (cache, key)
  }

  fn flat_items(cache: &MemoryCache, key: &QueryKey) -> Vec<Value> {
    match cache.get_entry(key) {
      Some(CacheEntry::Flat(items)) => items,
      other => panic!("expected flat entry, got {:?}", other),
    }
  }

  fn merge_updater(current: &Value, payload: &Value) -> Value {
    let mut next = current.clone();
    if let (Value::Object(target), Value::Object(patch)) = (&mut next, payload) {
      for (k, v) in patch {
        target.insert(k.clone(), v.clone());
      }
    }
    next
  }

  #[test]
  fn test_begin_applies_updater_to_cached_item() {
    let (cache, key) = seeded_cache();
    let lifecycle = OptimisticUpdate::new(cache.clone(), key.clone(), merge_updater);

    lifecycle
      .begin(&Some(json!({"id": 2, "done": true})))
      .unwrap();

    let items = flat_items(&cache, &key);
    assert_eq!(items[1], json!({"id": 2, "title": "B", "done": true}));
    assert_eq!(items[0]["done"], json!(false));
  }

  #[test]
  fn test_begin_skips_missing_target_but_proceeds() {
    let (cache, key) = seeded_cache();
    let before = flat_items(&cache, &key);
    let lifecycle = OptimisticUpdate::new(cache.clone(), key.clone(), merge_updater);

    let context = lifecycle.begin(&Some(json!({"id": 42, "done": true}))).unwrap();

    assert_eq!(flat_items(&cache, &key), before);
    assert!(context.snapshot().is_some());
  }

  #[test]
  fn test_begin_without_payload_uses_default_id() {
    let (cache, key) = seeded_cache();
    let lifecycle = OptimisticUpdate::new(cache.clone(), key.clone(), |current, _| {
      merge_updater(current, &json!({"done": true}))
    })
    .with_default_id(1);

    lifecycle.begin(&None).unwrap();

    assert_eq!(flat_items(&cache, &key)[0]["done"], json!(true));
  }

  #[test]
  fn test_begin_without_payload_or_default_id_fails() {
    let (cache, key) = seeded_cache();
    let lifecycle = OptimisticUpdate::new(cache, key, merge_updater);

    assert!(matches!(lifecycle.begin(&None), Err(Error::InvalidItem(_))));
  }

  #[tokio::test]
  async fn test_success_takes_server_item_verbatim() {
    let (cache, key) = seeded_cache();
    let lifecycle = OptimisticUpdate::new(cache.clone(), key.clone(), merge_updater);
    let mut mutation: Mutation<_, Error> = Mutation::new(lifecycle);

    mutation
      .execute(Some(json!({"id": 2, "done": true})), |_| async {
        // Server normalized the title while confirming the update.
        Ok(json!({"id": 2, "title": "B (normalized)", "done": true}))
      })
      .await;

    assert!(mutation.state().is_success());
    let items = flat_items(&cache, &key);
    assert_eq!(items[1], json!({"id": 2, "title": "B (normalized)", "done": true}));
  }

  #[tokio::test]
  async fn test_error_restores_snapshot_exactly() {
    let (cache, key) = seeded_cache();
    let before = flat_items(&cache, &key);
    let lifecycle = OptimisticUpdate::new(cache.clone(), key.clone(), merge_updater);
    let mut mutation: Mutation<_, Error> = Mutation::new(lifecycle);

    mutation
      .execute(Some(json!({"id": 2, "done": true})), |_| async {
        Err(Error::Misconfigured("server rejected the write"))
      })
      .await;

    assert!(mutation.state().is_error());
    assert_eq!(flat_items(&cache, &key), before);
  }
}
