//! Buffer table error types.

use std::error::Error;
use std::fmt;

use strata_core::{BufferId, DeviceError, SlotIndex};
use strata_heap::HeapError;

/// Errors that can occur during buffer table operations.
///
/// Lookup misses and bad indices are ordinary control flow: the call is
/// rejected and nothing changes. [`is_fatal`](BufferError::is_fatal)
/// errors mean cross-table bookkeeping or host/device layout can no longer
/// be trusted; callers should stop using the table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BufferError {
    /// No buffer is registered under this user id.
    UnknownBuffer {
        /// The unmapped id.
        id: BufferId,
    },
    /// A raw slot index past the end of the slot list.
    UnknownSlot {
        /// The out-of-range slot.
        slot: SlotIndex,
    },
    /// A user id at or above the table's `max_buffers`.
    IdOutOfRange {
        /// The rejected id.
        id: BufferId,
        /// The table's id limit.
        max_buffers: usize,
    },
    /// An element index outside `0..count`.
    IndexOutOfRange {
        /// The buffer addressed.
        id: BufferId,
        /// The rejected index.
        index: usize,
        /// The buffer's element count.
        len: usize,
    },
    /// A buffer was registered with a zero-byte stride.
    ZeroStride {
        /// The id being registered.
        id: BufferId,
    },
    /// `elements * stride` does not fit in addressable memory.
    SizeOverflow {
        /// The buffer addressed.
        id: BufferId,
        /// Requested element count.
        elements: usize,
        /// The buffer's stride.
        stride: usize,
    },
    /// A raw slot holds a tombstone where a live buffer is required.
    DeadSlot {
        /// The tombstoned slot.
        slot: SlotIndex,
    },
    /// Raw input bytes do not match `stride * count`.
    LengthMismatch {
        /// The buffer addressed.
        id: BufferId,
        /// `stride * count` in bytes.
        expected: usize,
        /// Bytes supplied.
        actual: usize,
    },
    /// Two tables that must mirror each other do not (user id or stride
    /// mismatch between corresponding slots).
    ConsistencyViolation {
        /// Description of the mismatch.
        reason: String,
    },
    /// The table's heap arena failed.
    Heap(HeapError),
    /// The device collaborator failed.
    Device(DeviceError),
    /// A [`TableConfig`](crate::TableConfig) invariant is violated.
    InvalidConfig {
        /// Description of the violated invariant.
        reason: String,
    },
}

impl BufferError {
    /// Whether the table must be considered unusable after this error.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::ConsistencyViolation { .. } => true,
            Self::Heap(e) => e.is_fatal(),
            Self::Device(e) => e.is_fatal(),
            _ => false,
        }
    }
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownBuffer { id } => write!(f, "no buffer registered for id {id}"),
            Self::UnknownSlot { slot } => write!(f, "no buffer slot {slot}"),
            Self::IdOutOfRange { id, max_buffers } => {
                write!(f, "buffer id {id} out of range (max_buffers {max_buffers})")
            }
            Self::IndexOutOfRange { id, index, len } => {
                write!(f, "index {index} out of range for buffer {id} with {len} elements")
            }
            Self::ZeroStride { id } => write!(f, "buffer {id} registered with zero stride"),
            Self::SizeOverflow {
                id,
                elements,
                stride,
            } => write!(
                f,
                "buffer {id}: {elements} elements of {stride} bytes overflow addressable memory"
            ),
            Self::DeadSlot { slot } => write!(f, "slot {slot} holds an unregistered buffer"),
            Self::LengthMismatch {
                id,
                expected,
                actual,
            } => write!(
                f,
                "buffer {id} expects {expected} bytes of input, got {actual}"
            ),
            Self::ConsistencyViolation { reason } => {
                write!(f, "buffer table consistency violation: {reason}")
            }
            Self::Heap(e) => write!(f, "heap error: {e}"),
            Self::Device(e) => write!(f, "device error: {e}"),
            Self::InvalidConfig { reason } => write!(f, "invalid table config: {reason}"),
        }
    }
}

impl Error for BufferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Heap(e) => Some(e),
            Self::Device(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HeapError> for BufferError {
    fn from(e: HeapError) -> Self {
        Self::Heap(e)
    }
}

impl From<DeviceError> for BufferError {
    fn from(e: DeviceError) -> Self {
        Self::Device(e)
    }
}
