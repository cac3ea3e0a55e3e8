//! Error types surfaced by the library itself.
//!
//! Failures of the caller-supplied write operation are *not* wrapped here;
//! they travel through the mutation driver unchanged, in whatever error type
//! the caller picked.

use thiserror::Error;

/// Errors raised by identity resolution, configuration lookup, and the
/// mutation driver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
  /// An item's identity could not be resolved. This is a configuration bug:
  /// either the items carry an `id` field, or an id extractor must be given.
  #[error("cannot resolve item identity: {0}; supply an id extractor for items without an `id` field")]
  InvalidItem(String),

  /// A required collaborator was not available, e.g. a lifecycle was built
  /// from the ambient cache outside an ambient scope.
  #[error("query cache not available: {0}")]
  Misconfigured(&'static str),

  /// The spawned write task went away without ever settling.
  #[error("write task dropped without settling")]
  WriteAbandoned,
}
