//! Growable cell arena backing variable-length reference lists.
//!
//! One [`HeapArena`] is owned per buffer table (or other context). It
//! hands out `(position, length)` regions of `u32` cells and recycles
//! freed regions through an address-ordered, coalescing free list.
//!
//! # Architecture
//!
//! ```text
//! HeapArena
//! ├── cells: Vec<u32>          (grows by doubling, never shrinks)
//! ├── highwater                (next bump position)
//! └── FreeList → FreeBlock[]   (ascending by position, never touching)
//!
//! RefList { count, capacity, pos }   (cursor into one arena block)
//! ```
//!
//! # Allocation policy
//!
//! 1. Bump from the high-water mark while there is room.
//! 2. Otherwise grant the first free block large enough, whole (no split).
//! 3. Otherwise double the arena (up to `max_capacity`) and bump.
//!
//! Freed cells are overwritten with [`FREED_MARKER`] so stale reads are
//! recognisable. Free-list records live beside the cells rather than
//! inside them, so a stray write into a freed region cannot corrupt the
//! list itself.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod arena;
pub mod config;
pub mod error;
pub mod free_list;
pub mod reflist;

pub use arena::{Grant, HeapArena, FREED_MARKER};
pub use config::HeapConfig;
pub use error::HeapError;
pub use free_list::{Coalesce, FreeBlock, FreeList};
pub use reflist::RefList;
