//! Pure cache transforms.
//!
//! Every function here takes a collection and produces a new one - nothing is
//! mutated in place, and no cache access happens. The flat primitives operate
//! on a plain item slice; the paginated variants delegate to them page by
//! page through the shape adapter, skipping pages with no recognizable item
//! sequence.
//!
//! The only failure mode is identity resolution (an item with no usable id
//! and no extractor); everything else is total.

use serde_json::Value;

use crate::entry::{page_items, rewrap_page, Paginated};
use crate::error::Error;
use crate::identity::{resolve_id, with_forced_id, IdExtractor};

// ============================================================================
// Flat-sequence primitives
// ============================================================================

/// First item whose resolved identity equals `id`, with its index.
pub fn find_by_id<'a>(
  items: &'a [Value],
  id: &Value,
  extractor: Option<&IdExtractor>,
) -> Result<Option<(usize, &'a Value)>, Error> {
  for (index, item) in items.iter().enumerate() {
    if resolve_id(item, extractor)? == *id {
      return Ok(Some((index, item)));
    }
  }
  Ok(None)
}

/// Map the sequence, substituting `new_item` where the identity matches.
///
/// No match means the result equals the input.
pub fn replace_by_id(
  items: &[Value],
  id: &Value,
  new_item: &Value,
  extractor: Option<&IdExtractor>,
) -> Result<Vec<Value>, Error> {
  items
    .iter()
    .map(|item| {
      Ok(if resolve_id(item, extractor)? == *id {
        new_item.clone()
      } else {
        item.clone()
      })
    })
    .collect()
}

/// Filter out every item whose identity matches.
///
/// With a non-injective extractor this removes all matches - intentional
/// permissiveness, not something to guard against.
pub fn remove_by_id(
  items: &[Value],
  id: &Value,
  extractor: Option<&IdExtractor>,
) -> Result<Vec<Value>, Error> {
  let mut kept = Vec::with_capacity(items.len());
  for item in items {
    if resolve_id(item, extractor)? != *id {
      kept.push(item.clone());
    }
  }
  Ok(kept)
}

/// New sequence with `item` first, prior elements following in order.
pub fn prepend(items: &[Value], item: Value) -> Vec<Value> {
  let mut next = Vec::with_capacity(items.len() + 1);
  next.push(item);
  next.extend_from_slice(items);
  next
}

/// Swap a placeholder id for the server-assigned one.
///
/// The matching item gets a shallow copy with its literal `id` field set to
/// `server_id` - a custom extractor's field is deliberately not written, only
/// read. A non-object match passes through unchanged; it cannot be annotated.
pub fn replace_temp_id(
  items: &[Value],
  temp_id: &Value,
  server_id: &Value,
  extractor: Option<&IdExtractor>,
) -> Result<Vec<Value>, Error> {
  items
    .iter()
    .map(|item| {
      Ok(if resolve_id(item, extractor)? == *temp_id {
        with_forced_id(item, server_id)
      } else {
        item.clone()
      })
    })
    .collect()
}

// ============================================================================
// Paginated wrappers
// ============================================================================

/// Scan pages in order for the first identity match.
///
/// Pages without a recognizable item sequence are skipped. Returns
/// `(page index, in-page index, item)`.
pub fn find_by_id_paginated<'a>(
  paginated: &'a Paginated,
  id: &Value,
  extractor: Option<&IdExtractor>,
) -> Result<Option<(usize, usize, &'a Value)>, Error> {
  for (page_index, page) in paginated.pages.iter().enumerate() {
    let items = match page_items(page) {
      Some(items) => items,
      None => continue,
    };
    if let Some((index, item)) = find_by_id(items, id, extractor)? {
      return Ok(Some((page_index, index, item)));
    }
  }
  Ok(None)
}

/// Apply a flat transform to every extractable page, leaving the rest (and
/// all page params) untouched.
fn map_pages<F>(paginated: &Paginated, transform: F) -> Result<Paginated, Error>
where
  F: Fn(&[Value]) -> Result<Vec<Value>, Error>,
{
  let pages = paginated
    .pages
    .iter()
    .map(|page| {
      Ok(match page_items(page) {
        Some(items) => rewrap_page(page, transform(items)?),
        None => page.clone(),
      })
    })
    .collect::<Result<Vec<_>, Error>>()?;

  Ok(Paginated {
    pages,
    page_params: paginated.page_params.clone(),
  })
}

/// Per-page [`replace_by_id`].
pub fn replace_by_id_paginated(
  paginated: &Paginated,
  id: &Value,
  new_item: &Value,
  extractor: Option<&IdExtractor>,
) -> Result<Paginated, Error> {
  map_pages(paginated, |items| {
    replace_by_id(items, id, new_item, extractor)
  })
}

/// Per-page [`remove_by_id`]. Page count and page params never change.
pub fn remove_by_id_paginated(
  paginated: &Paginated,
  id: &Value,
  extractor: Option<&IdExtractor>,
) -> Result<Paginated, Error> {
  map_pages(paginated, |items| remove_by_id(items, id, extractor))
}

/// Per-page [`replace_temp_id`].
pub fn replace_temp_id_paginated(
  paginated: &Paginated,
  temp_id: &Value,
  server_id: &Value,
  extractor: Option<&IdExtractor>,
) -> Result<Paginated, Error> {
  map_pages(paginated, |items| {
    replace_temp_id(items, temp_id, server_id, extractor)
  })
}

/// Insert `item` at the head of the first page.
///
/// Zero pages: synthesize a single page holding just the item, paired with a
/// single null page param. A first page with no recognizable sequence gets a
/// fresh single-item page prepended ahead of it instead, params untouched.
pub fn prepend_paginated(paginated: &Paginated, item: Value) -> Paginated {
  if paginated.pages.is_empty() {
    return Paginated {
      pages: vec![Value::Array(vec![item])],
      page_params: vec![Value::Null],
    };
  }

  let first = &paginated.pages[0];
  match page_items(first) {
    Some(items) => {
      let mut pages = paginated.pages.clone();
      pages[0] = rewrap_page(first, prepend(items, item));
      Paginated {
        pages,
        page_params: paginated.page_params.clone(),
      }
    }
    None => {
      // No sequence in page 0: a whole new page goes in front.
      let mut pages = Vec::with_capacity(paginated.pages.len() + 1);
      pages.push(Value::Array(vec![item]));
      pages.extend(paginated.pages.iter().cloned());
      Paginated {
        pages,
        page_params: paginated.page_params.clone(),
      }
    }
  }
}
