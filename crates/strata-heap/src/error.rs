//! Heap-specific error types.

use std::error::Error;
use std::fmt;

use strata_core::HeapPos;

/// Errors that can occur during heap arena operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeapError {
    /// Growing the arena would pass its hard capacity ceiling.
    CapacityExceeded {
        /// Number of cells requested.
        requested: u32,
        /// Cells already in use (the high-water mark).
        used: usize,
        /// The configured ceiling in cells.
        max_capacity: u32,
    },
    /// A zero-length allocation or free was requested.
    ZeroSized,
    /// A free named a region outside the arena or overlapping a block
    /// that is already free.
    InvalidFree {
        /// Start of the rejected region.
        pos: HeapPos,
        /// Length of the rejected region in cells.
        len: u32,
        /// Why the region was rejected.
        reason: String,
    },
    /// The free list is out of order, has touching blocks, or points past
    /// the high-water mark.
    FreeListCorrupted {
        /// Description of the violated invariant.
        reason: String,
    },
    /// A [`HeapConfig`](crate::HeapConfig) invariant is violated.
    InvalidConfig {
        /// Description of the violated invariant.
        reason: String,
    },
}

impl HeapError {
    /// Whether the arena must be considered unusable after this error.
    ///
    /// Capacity exhaustion and free-list corruption are fatal; the rest
    /// reject a single bad request and leave the arena untouched.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CapacityExceeded { .. } | Self::FreeListCorrupted { .. }
        )
    }
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded {
                requested,
                used,
                max_capacity,
            } => write!(
                f,
                "heap capacity exceeded: requested {requested} cells with {used} in use, ceiling {max_capacity} cells"
            ),
            Self::ZeroSized => write!(f, "zero-sized heap request"),
            Self::InvalidFree { pos, len, reason } => {
                write!(f, "invalid free of {len} cells at {pos}: {reason}")
            }
            Self::FreeListCorrupted { reason } => {
                write!(f, "heap free list corrupted: {reason}")
            }
            Self::InvalidConfig { reason } => write!(f, "invalid heap config: {reason}"),
        }
    }
}

impl Error for HeapError {}
