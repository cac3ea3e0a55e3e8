//! Cache collaborator boundary and reference implementations.
//!
//! This module defines what the library *consumes* from the surrounding
//! query-cache:
//! - The [`QueryCache`] capability trait (cancel in-flight fetches, read
//!   snapshot, write snapshot)
//! - [`QueryKey`], an ordered sequence of opaque tokens with a stable hash
//! - [`MemoryCache`], an in-memory reference implementation
//! - [`ambient`], a task-scoped accessor for context-threading environments

pub mod ambient;
mod memory;
mod traits;

pub use memory::MemoryCache;
pub use traits::{QueryCache, QueryKey};
