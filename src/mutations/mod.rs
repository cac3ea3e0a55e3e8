//! The four optimistic mutation lifecycles.
//!
//! Each lifecycle bundles the `begin` / `on_success` / `on_error` /
//! `on_settled` handlers for one operation shape, implementing
//! [`MutationLifecycle`](crate::mutation::MutationLifecycle) so a
//! [`Mutation`](crate::mutation::Mutation) can drive it:
//! - [`OptimisticCreate`]: prepend under a placeholder id, reconcile with the
//!   server id
//! - [`OptimisticUpdate`]: rewrite through a pure updater, accept the
//!   server's item
//! - [`OptimisticDelete`]: remove immediately, nothing more on success
//! - [`OptimisticDeleteWithUndo`]: remove, but keep the item restorable via
//!   [`restore_deleted_item`] until the undo window closes
//!
//! All of them snapshot before touching the cache and restore that snapshot
//! when the write fails.

mod create;
mod delete;
mod delete_undo;
mod update;

pub use create::{CreateContext, OptimisticCreate};
pub use delete::{DeleteContext, OptimisticDelete};
pub use delete_undo::{
  restore_deleted_item, DeleteUndoContext, OptimisticDeleteWithUndo, DEFAULT_UNDO_TIMEOUT,
};
pub use update::{OptimisticUpdate, UpdateContext, Updater};
