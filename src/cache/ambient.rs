//! Task-scoped ambient cache accessor.
//!
//! The lifecycle constructors all take their cache explicitly; this module is
//! the thin convenience for environments that thread one accessor through a
//! whole task tree instead of passing it around. Anything built inside
//! [`with_cache`] can pick the accessor up via [`current`].

use std::future::Future;
use std::sync::Arc;

use super::traits::QueryCache;
use crate::error::Error;

tokio::task_local! {
  static AMBIENT_CACHE: Arc<dyn QueryCache>;
}

/// Run `future` with `cache` as the ambient accessor for the current task.
pub async fn with_cache<F>(cache: Arc<dyn QueryCache>, future: F) -> F::Output
where
  F: Future,
{
  AMBIENT_CACHE.scope(cache, future).await
}

/// The ambient accessor of the current task.
///
/// Fails fast with [`Error::Misconfigured`] outside a [`with_cache`] scope
/// rather than silently no-opping.
pub fn current() -> Result<Arc<dyn QueryCache>, Error> {
  AMBIENT_CACHE.try_with(Arc::clone).map_err(|_| {
    Error::Misconfigured(
      "no ambient query cache in scope; wrap the task in ambient::with_cache or pass the cache explicitly",
    )
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::MemoryCache;

  #[tokio::test]
  async fn test_current_inside_scope() {
    let cache: Arc<dyn QueryCache> = Arc::new(MemoryCache::new());
    with_cache(cache, async {
      assert!(current().is_ok());
    })
    .await;
  }

  #[tokio::test]
  async fn test_current_outside_scope_fails_fast() {
    assert!(matches!(current(), Err(Error::Misconfigured(_))));
  }
}
