//! Strongly-typed identifiers for buffers, slots, heap cells, and device memory.

use std::fmt;

/// Caller-chosen stable identifier for a buffer.
///
/// User ids are indirected to an internal [`SlotIndex`] by the buffer
/// table. They are bounded by the table's `max_buffers`; the device
/// pointer table has exactly one entry per possible user id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u16);

impl BufferId {
    /// The id as a `usize`, for indexing the indirection array.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for BufferId {
    fn from(v: u16) -> Self {
        Self(v)
    }
}

/// Internal position of a buffer in the table's slot list.
///
/// Slot indices are permanent for the table's lifetime: unregistering a
/// buffer leaves a tombstone behind rather than renumbering later slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(pub usize);

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for SlotIndex {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

/// Cell offset into a heap arena.
///
/// Only meaningful for the arena that produced it, and only until the
/// allocation it names is freed or relocated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct HeapPos(pub u32);

impl HeapPos {
    /// The position as a `usize` cell index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for HeapPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for HeapPos {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Opaque device-memory address.
///
/// Owned by the device collaborator; the buffer table only stores and
/// forwards the value. `DevicePtr::NULL` marks "no device storage".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct DevicePtr(pub u64);

impl DevicePtr {
    /// The null device address.
    pub const NULL: DevicePtr = DevicePtr(0);

    /// Whether this is the null address.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for DevicePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#014x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_device_ptr() {
        assert!(DevicePtr::NULL.is_null());
        assert!(!DevicePtr(0x1000).is_null());
        assert_eq!(DevicePtr::default(), DevicePtr::NULL);
    }

    #[test]
    fn display_is_plain_number() {
        assert_eq!(BufferId(7).to_string(), "7");
        assert_eq!(HeapPos(42).to_string(), "42");
        assert_eq!(SlotIndex(3).to_string(), "3");
    }

    #[test]
    fn device_ptr_display_is_hex() {
        assert_eq!(DevicePtr(0xabc).to_string(), "0x000000000abc");
    }
}
