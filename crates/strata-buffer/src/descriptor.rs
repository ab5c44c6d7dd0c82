//! Per-buffer metadata and host storage.

use std::ops::Range;

use strata_core::{BufferId, DevicePtr, ElementKind, UsageFlags};

/// One buffer: a run of fixed-stride elements in host memory plus an
/// optional device mirror.
///
/// Invariants:
/// - `count <= capacity`
/// - `bytes().len() == capacity * stride` (the full allocation)
/// - capacity only grows; it shrinks only on [`release`](Self::release)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferDescriptor {
    user_id: BufferId,
    stride: usize,
    count: usize,
    capacity: usize,
    kind: ElementKind,
    flags: UsageFlags,
    cpu: Vec<u8>,
    device: DevicePtr,
}

impl BufferDescriptor {
    /// Create a descriptor with `capacity` zeroed elements and no live ones.
    ///
    /// `capacity * stride` must already be checked by the caller.
    pub(crate) fn new(user_id: BufferId, stride: usize, capacity: usize, flags: UsageFlags) -> Self {
        Self {
            user_id,
            stride,
            count: 0,
            capacity,
            kind: ElementKind::Misc,
            flags,
            cpu: vec![0; capacity * stride],
            device: DevicePtr::NULL,
        }
    }

    /// User id this buffer was registered under.
    pub fn user_id(&self) -> BufferId {
        self.user_id
    }

    /// Bytes per element.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the buffer holds no live elements.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of allocated elements.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Allocated size in bytes (`capacity * stride`).
    pub fn size(&self) -> usize {
        self.cpu.len()
    }

    /// Semantic element kind.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Usage flags.
    pub fn flags(&self) -> UsageFlags {
        self.flags
    }

    /// Device mirror address, or [`DevicePtr::NULL`] if none.
    pub fn device_ptr(&self) -> DevicePtr {
        self.device
    }

    /// Bytes of the live elements (`count * stride`).
    pub fn bytes(&self) -> &[u8] {
        &self.cpu[..self.count * self.stride]
    }

    /// Mutable bytes of the live elements.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        let end = self.count * self.stride;
        &mut self.cpu[..end]
    }

    /// The whole host allocation, including slack past `count`.
    pub fn storage(&self) -> &[u8] {
        &self.cpu
    }

    /// Bytes of element `index`, if it is live.
    pub fn element(&self, index: usize) -> Option<&[u8]> {
        let range = self.element_range(index)?;
        Some(&self.cpu[range])
    }

    /// Mutable bytes of element `index`, if it is live.
    pub fn element_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        let range = self.element_range(index)?;
        Some(&mut self.cpu[range])
    }

    fn element_range(&self, index: usize) -> Option<Range<usize>> {
        if index >= self.count {
            return None;
        }
        let start = index * self.stride;
        Some(start..start + self.stride)
    }

    pub(crate) fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.cpu
    }

    pub(crate) fn set_kind(&mut self, kind: ElementKind) {
        self.kind = kind;
    }

    pub(crate) fn set_flags(&mut self, flags: UsageFlags) {
        self.flags = flags;
    }

    pub(crate) fn set_device_ptr(&mut self, ptr: DevicePtr) {
        self.device = ptr;
    }

    /// Set the live count, clamped to capacity.
    pub(crate) fn set_len(&mut self, count: usize) {
        self.count = count.min(self.capacity);
    }

    /// Grow the allocation to `new_capacity` elements.
    ///
    /// Returns `false` (and changes nothing) if the buffer is already that
    /// large. With `preserve`, live elements are copied across; otherwise
    /// the new storage is zeroed and `count` keeps its value. The byte size
    /// must already be checked by the caller.
    pub(crate) fn grow(&mut self, new_capacity: usize, preserve: bool) -> bool {
        if new_capacity <= self.capacity {
            return false;
        }
        let mut cpu = vec![0u8; new_capacity * self.stride];
        if preserve {
            let live = self.count * self.stride;
            cpu[..live].copy_from_slice(&self.cpu[..live]);
        }
        self.cpu = cpu;
        self.capacity = new_capacity;
        true
    }

    /// Extend the live range by `n` zeroed elements.
    ///
    /// The caller guarantees `count + n <= capacity`. Returns the byte
    /// range of the new elements.
    pub(crate) fn push(&mut self, n: usize) -> Range<usize> {
        debug_assert!(self.count + n <= self.capacity);
        let start = self.count * self.stride;
        let end = start + n * self.stride;
        self.cpu[start..end].fill(0);
        self.count += n;
        start..end
    }

    /// Remove element `index`, shifting later elements down by one.
    ///
    /// Returns `false` if `index` is not live.
    pub(crate) fn remove(&mut self, index: usize) -> bool {
        if index >= self.count {
            return false;
        }
        let start = (index + 1) * self.stride;
        let end = self.count * self.stride;
        self.cpu.copy_within(start..end, index * self.stride);
        self.count -= 1;
        true
    }

    /// Free host storage. The caller releases the device mirror first.
    pub(crate) fn release(&mut self) {
        self.cpu = Vec::new();
        self.count = 0;
        self.capacity = 0;
        self.device = DevicePtr::NULL;
    }
}
