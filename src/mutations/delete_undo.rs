//! Optimistic delete with an undo window.
//!
//! Works like plain delete, but `begin` captures the deleted item itself and
//! arms a one-shot timer. Until the timer fires (or the write settles
//! successfully), the caller may put the item back with
//! [`restore_deleted_item`]. The timer only flips a committed flag - the
//! cache removal already happened optimistically, so "commit" is purely the
//! point after which undo is no longer honored.
//!
//! Undo does not cancel the underlying write: a success arriving after an
//! undo clears the timer and flips the flag but performs no further cache
//! mutation, so the restored item stays put.

use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::cache::{ambient, QueryCache, QueryKey};
use crate::entry::CacheEntry;
use crate::error::Error;
use crate::identity::IdExtractor;
use crate::mutation::MutationLifecycle;

/// How long undo stays available unless the write settles first.
pub const DEFAULT_UNDO_TIMEOUT: Duration = Duration::from_millis(5000);

/// Lifecycle handlers for deleting an item with a window to undo.
pub struct OptimisticDeleteWithUndo<C: ?Sized> {
  cache: Arc<C>,
  key: QueryKey,
  id_extractor: Option<IdExtractor>,
  default_id: Option<Value>,
  undo_timeout: Duration,
}

/// Per-invocation state for one delete-with-undo.
///
/// Must outlive the undo window: dropping it aborts a still-armed timer.
pub struct DeleteUndoContext {
  snapshot: Option<CacheEntry>,
  deleted_item: Option<Value>,
  committed: Arc<AtomicBool>,
  timer: Option<JoinHandle<()>>,
}

impl DeleteUndoContext {
  /// The item captured before removal, if it was in the cache. This is what
  /// an undo puts back.
  pub fn deleted_item(&self) -> Option<&Value> {
    self.deleted_item.as_ref()
  }

  /// The cache entry as it was before the optimistic removal.
  pub fn snapshot(&self) -> Option<&CacheEntry> {
    self.snapshot.as_ref()
  }

  /// Whether the deletion is final. Callers check this before honoring an
  /// undo request; once true, restoring is no longer meaningful.
  pub fn is_committed(&self) -> bool {
    self.committed.load(Ordering::SeqCst)
  }

  fn clear_timer(&mut self) {
    if let Some(timer) = self.timer.take() {
      timer.abort();
    }
  }
}

impl Drop for DeleteUndoContext {
  fn drop(&mut self) {
    self.clear_timer();
  }
}

impl<C: QueryCache + ?Sized> OptimisticDeleteWithUndo<C> {
  /// Create a lifecycle bound to `cache` and `key`, with the default undo
  /// window.
  pub fn new(cache: Arc<C>, key: QueryKey) -> Self {
    Self {
      cache,
      key,
      id_extractor: None,
      default_id: None,
      undo_timeout: DEFAULT_UNDO_TIMEOUT,
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

  /// Identity to delete when a mutation is dispatched without one.
  pub fn with_default_id(mut self, id: impl Into<Value>) -> Self {
    self.default_id = Some(id.into());
    self
  }

  /// Override the undo window duration.
  pub fn with_undo_timeout(mut self, timeout: Duration) -> Self {
    self.undo_timeout = timeout;
    self
  }

  fn target_id(&self, payload: &Option<Value>) -> Result<Value, Error> {
    match payload {
      Some(id) => Ok(id.clone()),
      None => match &self.default_id {
        Some(id) => Ok(id.clone()),
        None => Err(Error::InvalidItem(
          "delete dispatched without an identifier and no default id is configured".to_string(),
        )),
      },
    }
  }
}

impl OptimisticDeleteWithUndo<dyn QueryCache> {
  /// Build against the current task's ambient cache.
  pub fn ambient(key: QueryKey) -> Result<Self, Error> {
    Ok(Self::new(ambient::current()?, key))
  }
}

impl<C: QueryCache + ?Sized> MutationLifecycle for OptimisticDeleteWithUndo<C> {
  type Payload = Option<Value>;
  type Output = ();
  type Context = DeleteUndoContext;

  fn begin(&self, payload: &Option<Value>) -> Result<DeleteUndoContext, Error> {
    let id = self.target_id(payload)?;
    let extractor = self.id_extractor.as_ref();

    self.cache.cancel_fetches(&self.key);
    let snapshot = self.cache.get_entry(&self.key);

    // Capture the item itself before removing it - this is what undo
    // restores.
    let deleted_item = match &snapshot {
      Some(entry) => entry
        .find_by_id(&id, extractor)?
        .map(|(_, item)| item.clone()),
      None => None,
    };

    if let Some(entry) = &snapshot {
      let next = entry.remove_by_id(&id, extractor)?;
      self.cache.set_entry(&self.key, Some(next));
      tracing::debug!(key = %self.key, "optimistic delete applied; undo window open");
    }

    let committed = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&committed);
    let timeout = self.undo_timeout;
    let key = self.key.clone();
    let timer = tokio::spawn(async move {
      tokio::time::sleep(timeout).await;
      flag.store(true, Ordering::SeqCst);
      tracing::debug!(key = %key, "undo window elapsed; delete committed");
    });

    Ok(DeleteUndoContext {
      snapshot,
      deleted_item,
      committed,
      timer: Some(timer),
    })
  }

  fn on_success(&self, context: &mut DeleteUndoContext, _output: &()) -> Result<(), Error> {
    // Server confirmed: no more undo. Safe to call twice.
    context.clear_timer();
    context.committed.store(true, Ordering::SeqCst);
    Ok(())
  }

  fn on_error(&self, context: &mut DeleteUndoContext) {
    context.clear_timer();
    tracing::debug!(key = %self.key, "delete write failed; restoring snapshot");
    self.cache.set_entry(&self.key, context.snapshot.clone());
  }
}

/// Put a previously deleted item back at the head of the cache entry (first
/// page for paginated; a fresh one-item entry if none exists).
///
/// Callers are responsible for invoking this only before the deletion
/// commits, and for ignoring the write's own settlement afterwards - the
/// write itself is not cancelled here.
pub fn restore_deleted_item<C>(cache: &C, key: &QueryKey, item: Value)
where
  C: QueryCache + ?Sized,
{
  let next = match cache.get_entry(key) {
    Some(entry) => entry.prepend(item),
    None => CacheEntry::Flat(vec![item]),
  };
  cache.set_entry(key, Some(next));
  tracing::debug!(key = %key, "deleted item restored");
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::MemoryCache;
  use serde_json::json;

  fn seeded_cache() -> (Arc<MemoryCache>, QueryKey) {
    let cache = Arc::new(MemoryCache::new());
    let key = QueryKey::new(["todos"]);
    cache.set_entry(
      &key,
      Some(CacheEntry::Flat(vec![
        json!({"id": 5, "title": "E"}),
        json!({"id": 6, "title": "F"}),
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
  async fn test_undo_before_timer_restores_item_at_head() {
    let (cache, key) = seeded_cache();
    let lifecycle = OptimisticDeleteWithUndo::new(cache.clone(), key.clone())
      .with_undo_timeout(Duration::from_millis(30));

    let context = lifecycle.begin(&Some(json!(5))).unwrap();
    assert_eq!(flat_items(&cache, &key).len(), 1);
    let deleted = context.deleted_item().unwrap().clone();
    assert_eq!(deleted["id"], json!(5));

    assert!(!context.is_committed());
    restore_deleted_item(cache.as_ref(), &key, deleted);

    let items = flat_items(&cache, &key);
    assert_eq!(items[0]["id"], json!(5));
    assert_eq!(items.len(), 2);

    // The timer firing afterwards only flips the flag; it must not
    // re-remove the restored item.
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(context.is_committed());
    assert_eq!(flat_items(&cache, &key).len(), 2);
  }

  #[tokio::test]
  async fn test_commit_is_idempotent() {
    let (cache, key) = seeded_cache();
    let lifecycle = OptimisticDeleteWithUndo::new(cache, key);

    let mut context = lifecycle.begin(&Some(json!(5))).unwrap();
    lifecycle.on_success(&mut context, &()).unwrap();
    lifecycle.on_success(&mut context, &()).unwrap();

    assert!(context.is_committed());
    assert!(context.timer.is_none());
  }

  #[tokio::test]
  async fn test_error_clears_timer_and_restores() {
    let (cache, key) = seeded_cache();
    let before = flat_items(&cache, &key);
    let lifecycle = OptimisticDeleteWithUndo::new(cache.clone(), key.clone());

    let mut context = lifecycle.begin(&Some(json!(5))).unwrap();
    lifecycle.on_error(&mut context);

    assert_eq!(flat_items(&cache, &key), before);
    assert!(context.timer.is_none());
    assert!(!context.is_committed());
  }

  #[tokio::test]
  async fn test_timer_flips_committed_flag() {
    let (cache, key) = seeded_cache();
    let lifecycle = OptimisticDeleteWithUndo::new(cache, key)
      .with_undo_timeout(Duration::from_millis(10));

    let context = lifecycle.begin(&Some(json!(5))).unwrap();
    assert!(!context.is_committed());

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(context.is_committed());
  }

  #[tokio::test]
  async fn test_missing_target_still_returns_context() {
    let (cache, key) = seeded_cache();
    let before = flat_items(&cache, &key);
    let lifecycle = OptimisticDeleteWithUndo::new(cache.clone(), key.clone());

    let context = lifecycle.begin(&Some(json!(42))).unwrap();

    assert!(context.deleted_item().is_none());
    assert_eq!(flat_items(&cache, &key), before);
  }

  #[tokio::test]
  async fn test_restore_into_absent_entry() {
    let cache = MemoryCache::new();
    let key = QueryKey::new(["todos"]);

    restore_deleted_item(&cache, &key, json!({"id": 1}));

    assert_eq!(
      cache.get_entry(&key),
      Some(CacheEntry::Flat(vec![json!({"id": 1})]))
    );
  }
}
