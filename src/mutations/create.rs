//! Optimistic create.
//!
//! The new item goes into the cache immediately under a placeholder id; the
//! placeholder is swapped for the server-assigned id once the write resolves,
//! or the whole entry is rolled back if it rejects.

use serde_json::Value;
use std::sync::Arc;

use crate::cache::{ambient, QueryCache, QueryKey};
use crate::entry::CacheEntry;
use crate::error::Error;
use crate::identity::{generate_temp_id, is_temp_id, resolve_id, with_forced_id, IdExtractor};
use crate::mutation::MutationLifecycle;

/// Lifecycle handlers for creating an item optimistically.
pub struct OptimisticCreate<C: ?Sized> {
  cache: Arc<C>,
  key: QueryKey,
  id_extractor: Option<IdExtractor>,
}

/// Per-invocation state for one create.
pub struct CreateContext {
  snapshot: Option<CacheEntry>,
  temp_id: Option<String>,
}

impl CreateContext {
  /// The placeholder id issued at `begin`.
  pub fn temp_id(&self) -> Option<&str> {
    self.temp_id.as_deref()
  }

  /// The cache entry as it was before the optimistic insert.
  pub fn snapshot(&self) -> Option<&CacheEntry> {
    self.snapshot.as_ref()
  }
}

impl<C: QueryCache + ?Sized> OptimisticCreate<C> {
  /// Create a lifecycle bound to `cache` and `key`.
  pub fn new(cache: Arc<C>, key: QueryKey) -> Self {
    Self {
      cache,
      key,
      id_extractor: None,
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
}

impl OptimisticCreate<dyn QueryCache> {
  /// Build against the current task's ambient cache.
  pub fn ambient(key: QueryKey) -> Result<Self, Error> {
    Ok(Self::new(ambient::current()?, key))
  }
}

impl<C: QueryCache + ?Sized> MutationLifecycle for OptimisticCreate<C> {
  type Payload = Value;
  type Output = Value;
  type Context = CreateContext;

  fn begin(&self, item: &Value) -> Result<CreateContext, Error> {
    self.cache.cancel_fetches(&self.key);
    let snapshot = self.cache.get_entry(&self.key);

    let temp_id = generate_temp_id();
    let optimistic = with_forced_id(item, &Value::String(temp_id.clone()));

    let next = match &snapshot {
      Some(entry) => entry.prepend(optimistic),
      None => CacheEntry::Flat(vec![optimistic]),
    };
    self.cache.set_entry(&self.key, Some(next));
    tracing::debug!(key = %self.key, %temp_id, "optimistic create applied");

    Ok(CreateContext {
      snapshot,
      temp_id: Some(temp_id),
    })
  }

  fn on_success(&self, context: &mut CreateContext, output: &Value) -> Result<(), Error> {
    let entry = match self.cache.get_entry(&self.key) {
      Some(entry) => entry,
      None => return Ok(()),
    };
    let extractor = self.id_extractor.as_ref();

    let temp = context
      .temp_id
      .clone()
      .map(Value::String)
      .filter(is_temp_id);

    let next = match temp {
      Some(temp) => {
        let server_id = resolve_id(output, extractor)?;
        entry.replace_temp_id(&temp, &server_id, extractor)?
      }
      None => {
        // No usable placeholder: update in place by the server result's
        // own identity instead.
        let id = resolve_id(output, extractor)?;
        entry.replace_by_id(&id, output, extractor)?
      }
    };

    self.cache.set_entry(&self.key, Some(next));
    Ok(())
  }

  fn on_error(&self, context: &mut CreateContext) {
    tracing::debug!(key = %self.key, "create write failed; restoring snapshot");
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
        json!({"id": 1, "title": "A"}),
        json!({"id": 2, "title": "B"}),
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

  #[tokio::test]
  async fn test_create_rollback_restores_snapshot_exactly() {
    let (cache, key) = seeded_cache();
    let before = flat_items(&cache, &key);

    let lifecycle = OptimisticCreate::new(cache.clone(), key.clone());
    let mut mutation: Mutation<_, Error> = Mutation::new(lifecycle);

    mutation
      .execute(json!({"title": "C"}), |_| async {
        Err(Error::Misconfigured("server rejected the write"))
      })
      .await;

    assert!(mutation.state().is_error());
    assert_eq!(flat_items(&cache, &key), before);
  }

  #[tokio::test]
  async fn test_create_reconciles_temp_id_with_server_id() {
    let (cache, key) = seeded_cache();

    let lifecycle = OptimisticCreate::new(cache.clone(), key.clone());
    let mut mutation: Mutation<_, Error> = Mutation::new(lifecycle);

    mutation
      .execute(json!({"title": "C"}), |_| async {
        Ok(json!({"id": 99, "title": "C"}))
      })
      .await;

    assert!(mutation.state().is_success());
    let items = flat_items(&cache, &key);
    assert_eq!(items.len(), 3);
    assert_eq!(items[0], json!({"id": 99, "title": "C"}));
    // No temp id remains anywhere.
    for item in &items {
      assert!(!is_temp_id(&item["id"]));
    }
  }

  #[test]
  fn test_begin_is_optimistic_and_snapshots() {
    let (cache, key) = seeded_cache();
    let lifecycle = OptimisticCreate::new(cache.clone(), key.clone());

    let context = lifecycle.begin(&json!({"title": "C"})).unwrap();

    let items = flat_items(&cache, &key);
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["title"], json!("C"));
    assert!(is_temp_id(&items[0]["id"]));
    assert_eq!(context.temp_id().map(|t| t.starts_with("temp_")), Some(true));
    assert!(matches!(context.snapshot(), Some(CacheEntry::Flat(prior)) if prior.len() == 2));
  }

  #[test]
  fn test_create_into_absent_entry() {
    let cache = Arc::new(MemoryCache::new());
    let key = QueryKey::new(["todos"]);
    let lifecycle = OptimisticCreate::new(cache.clone(), key.clone());

    lifecycle.begin(&json!({"title": "first"})).unwrap();

    assert_eq!(flat_items(&cache, &key).len(), 1);
  }

  #[test]
  fn test_create_adds_to_first_page_of_paginated_entry() {
    let cache = Arc::new(MemoryCache::new());
    let key = QueryKey::new(["todos", "infinite"]);
    cache.set_entry(
      &key,
      Some(CacheEntry::Paginated(crate::entry::Paginated {
        pages: vec![json!({"items": [{"id": 1}]}), json!({"items": [{"id": 2}]})],
        page_params: vec![json!(null), json!("c2")],
      })),
    );

    let lifecycle = OptimisticCreate::new(cache.clone(), key.clone());
    lifecycle.begin(&json!({"title": "new"})).unwrap();

    match cache.get_entry(&key) {
      Some(CacheEntry::Paginated(p)) => {
        assert_eq!(p.pages.len(), 2);
        assert_eq!(p.pages[0]["items"].as_array().unwrap().len(), 2);
        assert_eq!(p.pages[1], json!({"items": [{"id": 2}]}));
      }
      other => panic!("expected paginated entry, got {:?}", other),
    }
  }

  #[test]
  fn test_success_without_temp_id_updates_in_place() {
    let (cache, key) = seeded_cache();
    let lifecycle = OptimisticCreate::new(cache.clone(), key.clone());

    // A context that never got a placeholder falls back to replace-by-id
    // using the server result's identity.
    let mut context = CreateContext {
      snapshot: None,
      temp_id: None,
    };
    lifecycle
      .on_success(&mut context, &json!({"id": 2, "title": "B2"}))
      .unwrap();

    let items = flat_items(&cache, &key);
    assert_eq!(items[1], json!({"id": 2, "title": "B2"}));
  }
}
