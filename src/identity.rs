//! Item identity resolution and temporary-id handling.
//!
//! Every cache transform needs to know which item is which. By convention an
//! item is a JSON object carrying an `id` field; callers whose items identify
//! themselves differently pass an [`IdExtractor`] instead.
//!
//! Items created optimistically don't have a server-assigned id yet, so they
//! get a locally generated placeholder recognizable by the `temp_` prefix.
//! The placeholder is swapped for the real id once the write settles.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

use crate::error::Error;

/// Prefix marking locally generated placeholder ids.
pub const TEMP_ID_PREFIX: &str = "temp_";

/// Extracts an identifier from an item.
///
/// Whatever the extractor returns is used verbatim; no validation is applied.
pub type IdExtractor = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Resolve an item's identifier.
///
/// With an extractor, returns `extractor(item)` verbatim. Without one, falls
/// back to the `id` field; a missing or null `id` is a configuration bug and
/// fails with [`Error::InvalidItem`].
pub fn resolve_id(item: &Value, extractor: Option<&IdExtractor>) -> Result<Value, Error> {
  if let Some(extractor) = extractor {
    return Ok(extractor(item));
  }

  match item.get("id") {
    Some(id) if !id.is_null() => Ok(id.clone()),
    _ => Err(Error::InvalidItem(
      "item has no `id` field (or it is null)".to_string(),
    )),
  }
}

/// Generate a collision-resistant placeholder id for a not-yet-persisted item.
///
/// Combines the millisecond timestamp with a 32-bit random suffix, so two
/// calls in the same process are extremely unlikely to collide.
pub fn generate_temp_id() -> String {
  format!(
    "{}{}_{:08x}",
    TEMP_ID_PREFIX,
    Utc::now().timestamp_millis(),
    rand::random::<u32>()
  )
}

/// Check whether an identifier is a temporary placeholder.
///
/// Only strings can be temporary - numeric ids always came from a server.
pub fn is_temp_id(id: &Value) -> bool {
  matches!(id, Value::String(s) if s.starts_with(TEMP_ID_PREFIX))
}

/// Shallow copy of `item` with its literal `id` field forced to `id`.
///
/// Note this always writes the field named `id`, even when a custom extractor
/// is configured - extractors only control *reading* identity. Non-object
/// items are returned unchanged; there is nothing to annotate.
pub(crate) fn with_forced_id(item: &Value, id: &Value) -> Value {
  match item {
    Value::Object(map) => {
      let mut copy = map.clone();
      copy.insert("id".to_string(), id.clone());
      Value::Object(copy)
    }
    other => other.clone(),
  }
}
