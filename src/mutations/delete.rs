//! Optimistic delete.
//!
//! The item disappears from the cache immediately. Success needs no further
//! cache work; failure puts the snapshot back.

use serde_json::Value;
use std::sync::Arc;

use crate::cache::{ambient, QueryCache, QueryKey};
use crate::entry::CacheEntry;
use crate::error::Error;
use crate::identity::IdExtractor;
use crate::mutation::MutationLifecycle;

/// Lifecycle handlers for deleting an item optimistically.
pub struct OptimisticDelete<C: ?Sized> {
  cache: Arc<C>,
  key: QueryKey,
  id_extractor: Option<IdExtractor>,
  default_id: Option<Value>,
}

/// Per-invocation state for one delete.
pub struct DeleteContext {
  snapshot: Option<CacheEntry>,
}

impl DeleteContext {
  /// The cache entry as it was before the optimistic removal.
  pub fn snapshot(&self) -> Option<&CacheEntry> {
    self.snapshot.as_ref()
  }
}

impl<C: QueryCache + ?Sized> OptimisticDelete<C> {
  /// Create a lifecycle bound to `cache` and `key`.
  pub fn new(cache: Arc<C>, key: QueryKey) -> Self {
    Self {
      cache,
      key,
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

  /// Identity to delete when a mutation is dispatched without one.
  pub fn with_default_id(mut self, id: impl Into<Value>) -> Self {
    self.default_id = Some(id.into());
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

impl OptimisticDelete<dyn QueryCache> {
  /// Build against the current task's ambient cache.
  pub fn ambient(key: QueryKey) -> Result<Self, Error> {
    Ok(Self::new(ambient::current()?, key))
  }
}

impl<C: QueryCache + ?Sized> MutationLifecycle for OptimisticDelete<C> {
  type Payload = Option<Value>;
  type Output = ();
  type Context = DeleteContext;

  fn begin(&self, payload: &Option<Value>) -> Result<DeleteContext, Error> {
    let id = self.target_id(payload)?;
    let extractor = self.id_extractor.as_ref();

    self.cache.cancel_fetches(&self.key);
    let snapshot = self.cache.get_entry(&self.key);

    if let Some(entry) = &snapshot {
      let next = entry.remove_by_id(&id, extractor)?;
      self.cache.set_entry(&self.key, Some(next));
      tracing::debug!(key = %self.key, "optimistic delete applied");
    }

    Ok(DeleteContext { snapshot })
  }

  fn on_success(&self, _context: &mut DeleteContext, _output: &()) -> Result<(), Error> {
    // The item is already gone from the cache.
    Ok(())
  }

  fn on_error(&self, context: &mut DeleteContext) {
    tracing::debug!(key = %self.key, "delete write failed; restoring snapshot");
    self.cache.set_entry(&self.key, context.snapshot.clone());
  }
}
