//! Id-indirected table of typed, resizable buffers.
//!
//! A [`BufferTable`] owns an ordered list of [`BufferDescriptor`]s and a
//! fixed-size array mapping caller-chosen [`BufferId`]s to internal slots.
//! Slots are never renumbered: unregistering a buffer leaves a tombstone,
//! so any raw [`SlotIndex`] stays valid for the table's lifetime.
//!
//! # Architecture
//!
//! ```text
//! BufferTable
//! ├── indirection: [Option<SlotIndex>; max_buffers]   (BufferId → slot)
//! ├── slots: Vec<Slot>                                  (append-only)
//! │   └── name + BufferDescriptor (stride, count, capacity, Vec<u8>, DevicePtr)
//! ├── HeapArena                                         (ref-list storage)
//! └── Box<dyn DeviceMirror>                             (device boundary)
//! ```
//!
//! # Single writer
//!
//! Nothing here locks. Every mutating call takes `&mut self`; sharing a
//! table across threads must be serialised by the caller. Device copies
//! are blocking and only happen when the caller asks for them
//! ([`BufferTable::push_to_device`], [`BufferTable::commit`],
//! [`BufferTable::retrieve`]).
//!
//! [`BufferId`]: strata_core::BufferId
//! [`SlotIndex`]: strata_core::SlotIndex

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
mod copy;
pub mod descriptor;
mod device;
pub mod error;
mod format;
pub mod table;

pub use config::TableConfig;
pub use descriptor::BufferDescriptor;
pub use error::BufferError;
pub use table::BufferTable;
