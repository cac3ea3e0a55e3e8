//! Cache entry shapes and the page shape adapter.
//!
//! A cache entry is either a flat list of items or a paginated ("infinite")
//! structure of pages plus page parameters. Rather than shape-sniffing an
//! unconstrained value at every call site, the two layouts are modeled as a
//! closed tagged union; the serde representation is untagged so real
//! query-cache payloads round-trip unchanged.
//!
//! Pages themselves come in two flavors: a page can be the item array
//! directly, or an object wrapping the array under one of a few conventional
//! property names. [`page_items`] and [`rewrap_page`] normalize access to
//! both, sharing a single ordered key table.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::identity::IdExtractor;
use crate::transforms;

/// Conventional property names under which an object page may hold its item
/// array. Scanned in order; first match wins.
pub const PAGE_ITEM_KEYS: [&str; 5] = ["items", "todos", "data", "results", "list"];

/// A paginated cache entry: ordered pages plus their matching page
/// parameters (opaque cursors), paired by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated {
  pub pages: Vec<Value>,
  #[serde(rename = "pageParams")]
  pub page_params: Vec<Value>,
}

/// The value stored under one cache key.
///
/// "No entry yet" is represented as `Option<CacheEntry>` at the cache
/// boundary, not as a variant here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheEntry {
  /// An ordered sequence of pages plus page parameters.
  Paginated(Paginated),
  /// An ordered sequence of items.
  Flat(Vec<Value>),
}

/// Position of a found item within a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPos {
  /// Index into a flat entry.
  Flat { index: usize },
  /// Page index and in-page index into a paginated entry.
  Page { page: usize, index: usize },
}

/// Check whether a raw value has the paginated layout: a non-null object
/// exposing an array `pages` plus `pageParams`.
pub fn is_paginated(value: &Value) -> bool {
  match value {
    Value::Object(map) => {
      matches!(map.get("pages"), Some(Value::Array(_))) && map.contains_key("pageParams")
    }
    _ => false,
  }
}

/// Locate a page's item sequence.
///
/// An array page is its own sequence. An object page is scanned against
/// [`PAGE_ITEM_KEYS`] for the first array-valued property. `None` means "no
/// sequence here - leave this page untouched".
pub fn page_items(page: &Value) -> Option<&Vec<Value>> {
  match page {
    Value::Array(items) => Some(items),
    Value::Object(map) => {
      for key in PAGE_ITEM_KEYS {
        if let Some(Value::Array(items)) = map.get(key) {
          return Some(items);
        }
      }
      None
    }
    _ => None,
  }
}

/// Rebuild a page around a transformed item sequence.
///
/// Mirrors [`page_items`]: an array page becomes the new sequence verbatim; an
/// object page gets a shallow copy with only the matched key replaced; a page
/// with no recognizable sequence is returned unchanged.
pub fn rewrap_page(page: &Value, items: Vec<Value>) -> Value {
  match page {
    Value::Array(_) => Value::Array(items),
    Value::Object(map) => {
      for key in PAGE_ITEM_KEYS {
        if matches!(map.get(key), Some(Value::Array(_))) {
          let mut copy = map.clone();
          copy.insert(key.to_string(), Value::Array(items));
          return Value::Object(copy);
        }
      }
      page.clone()
    }
    other => other.clone(),
  }
}

impl CacheEntry {
  /// Interpret a raw cached value as an entry, if it has one of the two
  /// recognized layouts.
  pub fn from_value(value: &Value) -> Option<CacheEntry> {
    serde_json::from_value(value.clone()).ok()
  }

  /// First item whose resolved identity equals `id`, with its position.
  pub fn find_by_id<'a>(
    &'a self,
    id: &Value,
    extractor: Option<&IdExtractor>,
  ) -> Result<Option<(EntryPos, &'a Value)>, Error> {
    match self {
      CacheEntry::Flat(items) => Ok(
        transforms::find_by_id(items, id, extractor)?
          .map(|(index, item)| (EntryPos::Flat { index }, item)),
      ),
      CacheEntry::Paginated(paginated) => Ok(
        transforms::find_by_id_paginated(paginated, id, extractor)?
          .map(|(page, index, item)| (EntryPos::Page { page, index }, item)),
      ),
    }
  }

  /// Substitute `new_item` for the item whose identity equals `id`.
  pub fn replace_by_id(
    &self,
    id: &Value,
    new_item: &Value,
    extractor: Option<&IdExtractor>,
  ) -> Result<CacheEntry, Error> {
    match self {
      CacheEntry::Flat(items) => Ok(CacheEntry::Flat(transforms::replace_by_id(
        items, id, new_item, extractor,
      )?)),
      CacheEntry::Paginated(paginated) => Ok(CacheEntry::Paginated(
        transforms::replace_by_id_paginated(paginated, id, new_item, extractor)?,
      )),
    }
  }

  /// Drop every item whose identity equals `id`.
  pub fn remove_by_id(
    &self,
    id: &Value,
    extractor: Option<&IdExtractor>,
  ) -> Result<CacheEntry, Error> {
    match self {
      CacheEntry::Flat(items) => Ok(CacheEntry::Flat(transforms::remove_by_id(
        items, id, extractor,
      )?)),
      CacheEntry::Paginated(paginated) => Ok(CacheEntry::Paginated(
        transforms::remove_by_id_paginated(paginated, id, extractor)?,
      )),
    }
  }

  /// Insert `item` at the head of the entry (first page for paginated).
  pub fn prepend(&self, item: Value) -> CacheEntry {
    match self {
      CacheEntry::Flat(items) => CacheEntry::Flat(transforms::prepend(items, item)),
      CacheEntry::Paginated(paginated) => {
        CacheEntry::Paginated(transforms::prepend_paginated(paginated, item))
      }
    }
  }

  /// Swap a placeholder id for the server-assigned one.
  pub fn replace_temp_id(
    &self,
    temp_id: &Value,
    server_id: &Value,
    extractor: Option<&IdExtractor>,
  ) -> Result<CacheEntry, Error> {
    match self {
      CacheEntry::Flat(items) => Ok(CacheEntry::Flat(transforms::replace_temp_id(
        items, temp_id, server_id, extractor,
      )?)),
      CacheEntry::Paginated(paginated) => Ok(CacheEntry::Paginated(
        transforms::replace_temp_id_paginated(paginated, temp_id, server_id, extractor)?,
      )),
    }
  }
}
