//! Caching primitives the entity graph is built from.
//!
//! - [`Lazy`]: a single value fetched on first access and kept afterwards.
//! - [`Paged`]: a growable, filterable prefix of a remote list.
//!
//! Both answer "is this materialized?" synchronously, which is what event routing
//! uses to decide whether to descend into a branch.

mod lazy;
mod paged;

pub use lazy::Lazy;
pub use paged::{Identified, PageQuery, Paged, DEFAULT_PAGE_SIZE};
