//! Optimistic mutation helpers for client-side query caches.
//!
//! Inspired by TanStack Query's optimistic-update recipes, this crate updates
//! cached collections *before* a remote write settles, then reconciles or
//! rolls back once it does:
//! - Pure cache transforms (find / replace / remove / prepend / temp-id swap)
//!   over flat and paginated ("infinite") collections
//! - Four mutation lifecycles: create, update, delete, delete-with-undo
//! - Placeholder ids for not-yet-persisted items, swapped for server ids on
//!   success
//! - Snapshot-based rollback: a failed write always leaves the cache exactly
//!   as it was
//!
//! The cache itself is a collaborator, not part of this crate: anything that
//! can cancel an in-flight fetch, read a snapshot, and write a snapshot
//! implements [`QueryCache`]. An in-memory [`MemoryCache`] is included for
//! tests and small apps.
//!
//! # Example
//!
//! ```ignore
//! let cache = Arc::new(MemoryCache::new());
//! let key = QueryKey::new(["todos"]);
//!
//! let lifecycle = OptimisticCreate::new(cache.clone(), key);
//! let mut mutation = Mutation::new(lifecycle);
//!
//! // The todo shows up in the cache immediately, under a temp_* id.
//! mutation.dispatch(json!({"title": "water the plants"}), move |item| {
//!     let api = api.clone();
//!     let item = item.clone();
//!     async move { api.create_todo(item).await }
//! })?;
//!
//! // In the event loop tick: once the write settles, the temp id is
//! // replaced by the server's (success) or the insert is rolled back
//! // (error).
//! if mutation.poll() {
//!     render(cache.get_entry(&QueryKey::new(["todos"])));
//! }
//! ```

pub mod cache;
pub mod entry;
pub mod error;
pub mod identity;
pub mod mutation;
pub mod mutations;
pub mod transforms;

pub use cache::{MemoryCache, QueryCache, QueryKey};
pub use entry::{CacheEntry, EntryPos, Paginated};
pub use error::Error;
pub use identity::{generate_temp_id, is_temp_id, resolve_id, IdExtractor, TEMP_ID_PREFIX};
pub use mutation::{Mutation, MutationLifecycle, MutationState};
pub use mutations::{
  restore_deleted_item, OptimisticCreate, OptimisticDelete, OptimisticDeleteWithUndo,
  OptimisticUpdate,
};
