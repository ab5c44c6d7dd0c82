//! Strata: a buffer registry with device mirroring and a growable
//! reference-list heap.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the Strata sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use strata::prelude::*;
//!
//! let mut table = BufferTable::new(TableConfig::default()).unwrap();
//! let pos = BufferId(0);
//! table.register(pos, "pos", 4, 0, UsageFlags::CPU).unwrap();
//! table.set_kind(pos, ElementKind::UInt).unwrap();
//!
//! for v in [10u32, 20, 30] {
//!     let i = table.append(pos).unwrap();
//!     table.element_mut(pos, i).unwrap().copy_from_slice(&v.to_ne_bytes());
//! }
//! table.delete_element(pos, 1).unwrap();
//! assert_eq!(table.format_element(pos, 1).unwrap(), "30");
//!
//! // Neighbour lists live in the table's heap.
//! let mut nbrs = RefList::new();
//! table.heap_mut().append_ref(&mut nbrs, 7, 0).unwrap();
//! table.heap_mut().append_ref(&mut nbrs, 9, 0).unwrap();
//! assert_eq!(table.heap().refs(&nbrs), &[7, 9]);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `strata-core` | Ids, element kinds, usage flags, device boundary |
//! | [`heap`] | `strata-heap` | Cell arena, free list, ref lists |
//! | [`buffer`] | `strata-buffer` | Buffer table, descriptors, schema copies |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core ids, element kinds, and the device boundary (`strata-core`).
///
/// Implement [`types::DeviceMirror`] to connect a table to an accelerator
/// runtime; [`types::NoDevice`] is the CPU-only default.
pub use strata_core as types;

/// Growable cell arena and ref lists (`strata-heap`).
pub use strata_heap as heap;

/// Buffer table and descriptors (`strata-buffer`).
pub use strata_buffer as buffer;

/// Common imports for typical Strata usage.
///
/// ```rust
/// use strata::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use strata_core::{
        BufferId, DeviceMirror, DevicePtr, ElementKind, HeapPos, NoDevice, SlotIndex, UsageFlags,
    };

    // Errors
    pub use strata_buffer::BufferError;
    pub use strata_core::DeviceError;
    pub use strata_heap::HeapError;

    // Heap
    pub use strata_heap::{HeapArena, HeapConfig, RefList};

    // Buffers
    pub use strata_buffer::{BufferDescriptor, BufferTable, TableConfig};
}
