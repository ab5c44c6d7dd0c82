//! Core types and traits for the Strata buffer registry.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the identifiers, element descriptions, and the device boundary that
//! the heap and buffer crates build on.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod device;
pub mod element;
pub mod id;

pub use device::{DeviceError, DeviceMirror, DeviceSymbol, NoDevice};
pub use element::{ElementKind, ElementValue, UsageFlags};
pub use id::{BufferId, DevicePtr, HeapPos, SlotIndex};
