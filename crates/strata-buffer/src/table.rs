//! The buffer table: registration, lookup, and per-buffer operations.

use std::fmt;

use strata_core::{BufferId, DeviceMirror, ElementKind, NoDevice, SlotIndex, UsageFlags};
use rand::Rng;
use strata_heap::HeapArena;
use tracing::{debug, warn};

use crate::config::TableConfig;
use crate::descriptor::BufferDescriptor;
use crate::error::BufferError;

/// Name given to a slot once its buffer is unregistered.
pub const TOMBSTONE_NAME: &str = "DELETED";

#[derive(Clone, Debug)]
pub(crate) struct Slot {
    pub(crate) name: String,
    pub(crate) buffer: BufferDescriptor,
    pub(crate) live: bool,
}

/// Registry of buffers addressed by caller-chosen [`BufferId`]s.
///
/// Each registration appends a slot. The indirection array maps a user id
/// to the slot it was last registered into; slots are never reused or
/// renumbered, so unregistering leaves a tombstone in place.
///
/// The table also owns one [`HeapArena`] for ref-list storage and the
/// [`DeviceMirror`] used for device allocations and copies. Device
/// storage held by live buffers is released when the table is dropped.
pub struct BufferTable {
    pub(crate) slots: Vec<Slot>,
    pub(crate) indirection: Vec<Option<SlotIndex>>,
    pub(crate) heap: HeapArena,
    pub(crate) device: Box<dyn DeviceMirror>,
    pub(crate) config: TableConfig,
}

impl BufferTable {
    /// Create a CPU-only table.
    pub fn new(config: TableConfig) -> Result<Self, BufferError> {
        Self::with_device(config, Box::new(NoDevice))
    }

    /// Create a table that mirrors `DEVICE`-flagged buffers through `device`.
    pub fn with_device(
        config: TableConfig,
        device: Box<dyn DeviceMirror>,
    ) -> Result<Self, BufferError> {
        config.validate()?;
        let heap = HeapArena::new(config.heap.clone())?;
        Ok(Self {
            slots: Vec::new(),
            indirection: vec![None; config.max_buffers],
            heap,
            device,
            config,
        })
    }

    /// The table's configuration.
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Whether the device collaborator reports a device present.
    pub fn device_enabled(&self) -> bool {
        self.device.is_enabled()
    }

    // ── registration ──────────────────────────────────────────

    /// Register a new buffer under `id` and return its slot.
    ///
    /// The buffer starts with `capacity` zeroed elements and no live
    /// ones. Registering an id that is already mapped logs a warning and
    /// remaps the id to the new slot; the previous slot stays allocated
    /// but is no longer reachable by id.
    pub fn register(
        &mut self,
        id: BufferId,
        name: &str,
        stride: usize,
        capacity: usize,
        flags: UsageFlags,
    ) -> Result<SlotIndex, BufferError> {
        self.check_id(id)?;
        if stride == 0 {
            return Err(BufferError::ZeroStride { id });
        }
        checked_bytes(id, capacity, stride)?;
        if let Some(previous) = self.indirection[id.index()] {
            warn!(id = id.0, previous = previous.0, name, "buffer id re-registered");
        }

        let slot = SlotIndex(self.slots.len());
        self.slots.push(Slot {
            name: name.to_string(),
            buffer: BufferDescriptor::new(id, stride, capacity, flags),
            live: true,
        });
        if let Err(e) = self.attach_mirror(slot.0) {
            self.slots.pop();
            return Err(e);
        }
        self.indirection[id.index()] = Some(slot);
        debug!(id = id.0, slot = slot.0, name, stride, capacity, "registered buffer");
        Ok(slot)
    }

    /// Release a buffer's storage and tombstone its slot.
    ///
    /// The slot keeps its position (renamed to [`TOMBSTONE_NAME`]) and the
    /// id is unmapped.
    pub fn unregister(&mut self, id: BufferId) -> Result<(), BufferError> {
        let slot = self.resolve(id)?;
        self.release_mirror(slot);
        let entry = &mut self.slots[slot];
        entry.buffer.release();
        entry.name = TOMBSTONE_NAME.to_string();
        entry.live = false;
        self.indirection[id.index()] = None;
        debug!(id = id.0, slot, "unregistered buffer");
        Ok(())
    }

    /// Slot currently mapped to `id`, if any.
    pub fn lookup(&self, id: BufferId) -> Option<SlotIndex> {
        self.indirection.get(id.index()).copied().flatten()
    }

    /// User id of the first live buffer registered under `name`.
    pub fn find(&self, name: &str) -> Option<BufferId> {
        self.slots
            .iter()
            .find(|s| s.live && s.name == name)
            .map(|s| s.buffer.user_id())
    }

    /// Number of slots, tombstones included.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots holding a live buffer.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.live).count()
    }

    /// Name of the buffer in `slot` ([`TOMBSTONE_NAME`] once unregistered).
    pub fn name(&self, slot: SlotIndex) -> Option<&str> {
        self.slots.get(slot.0).map(|s| s.name.as_str())
    }

    /// Whether `slot` holds a live buffer.
    pub fn is_live(&self, slot: SlotIndex) -> bool {
        self.slots.get(slot.0).is_some_and(|s| s.live)
    }

    /// Descriptor of the buffer mapped to `id`.
    pub fn buffer(&self, id: BufferId) -> Option<&BufferDescriptor> {
        self.lookup(id).map(|slot| &self.slots[slot.0].buffer)
    }

    /// Descriptor stored in a raw slot, tombstones included.
    pub fn slot(&self, slot: SlotIndex) -> Option<&BufferDescriptor> {
        self.slots.get(slot.0).map(|s| &s.buffer)
    }

    /// Iterate live buffers in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotIndex, &str, &BufferDescriptor)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.live)
            .map(|(i, s)| (SlotIndex(i), s.name.as_str(), &s.buffer))
    }

    // ── metadata ──────────────────────────────────────────────

    /// Set the element kind of a buffer.
    pub fn set_kind(&mut self, id: BufferId, kind: ElementKind) -> Result<(), BufferError> {
        let slot = self.resolve(id)?;
        self.slots[slot].buffer.set_kind(kind);
        Ok(())
    }

    /// Set element kind and usage flags together.
    ///
    /// Adding `DEVICE` allocates a device mirror; removing it releases one.
    pub fn set_usage(
        &mut self,
        id: BufferId,
        kind: ElementKind,
        flags: UsageFlags,
    ) -> Result<(), BufferError> {
        let slot = self.resolve(id)?;
        let buffer = &mut self.slots[slot].buffer;
        let had_device = buffer.flags().contains(UsageFlags::DEVICE);
        buffer.set_kind(kind);
        buffer.set_flags(flags);
        match (had_device, flags.contains(UsageFlags::DEVICE)) {
            (false, true) => self.attach_mirror(slot)?,
            (true, false) => self.release_mirror(slot),
            _ => {}
        }
        Ok(())
    }

    /// Live element count of a buffer.
    pub fn len(&self, id: BufferId) -> Option<usize> {
        self.buffer(id).map(BufferDescriptor::len)
    }

    /// Allocated element capacity of a buffer.
    pub fn capacity(&self, id: BufferId) -> Option<usize> {
        self.buffer(id).map(BufferDescriptor::capacity)
    }

    /// Live bytes of a buffer (`len * stride`).
    pub fn bytes(&self, id: BufferId) -> Option<&[u8]> {
        self.buffer(id).map(BufferDescriptor::bytes)
    }

    /// Bytes of one live element.
    pub fn element(&self, id: BufferId, index: usize) -> Result<&[u8], BufferError> {
        let slot = self.resolve(id)?;
        let buffer = &self.slots[slot].buffer;
        let len = buffer.len();
        buffer
            .element(index)
            .ok_or(BufferError::IndexOutOfRange { id, index, len })
    }

    /// A uniformly chosen live element and its index, or `None` if the
    /// buffer is empty.
    pub fn pick_element<R: Rng + ?Sized>(
        &self,
        id: BufferId,
        rng: &mut R,
    ) -> Result<Option<(usize, &[u8])>, BufferError> {
        let slot = self.resolve(id)?;
        let buffer = &self.slots[slot].buffer;
        if buffer.is_empty() {
            return Ok(None);
        }
        let index = rng.random_range(0..buffer.len());
        Ok(buffer.element(index).map(|bytes| (index, bytes)))
    }

    /// Mutable bytes of one live element.
    pub fn element_mut(&mut self, id: BufferId, index: usize) -> Result<&mut [u8], BufferError> {
        let slot = self.resolve(id)?;
        let buffer = &mut self.slots[slot].buffer;
        let len = buffer.len();
        buffer
            .element_mut(index)
            .ok_or(BufferError::IndexOutOfRange { id, index, len })
    }

    // ── sizing ────────────────────────────────────────────────

    /// Grow a buffer to `capacity` elements.
    ///
    /// A request at or below the current capacity is a no-op. With
    /// `preserve`, live elements survive; without it the storage is
    /// zeroed. A device mirror is reallocated at the new size and holds
    /// no data until the next [`commit`](Self::commit).
    pub fn resize(
        &mut self,
        id: BufferId,
        capacity: usize,
        preserve: bool,
    ) -> Result<(), BufferError> {
        let slot = self.resolve(id)?;
        self.grow_slot(slot, capacity, preserve)
    }

    /// Grow a buffer to `capacity` elements, keeping its contents.
    pub fn expand(&mut self, id: BufferId, capacity: usize) -> Result<(), BufferError> {
        self.resize(id, capacity, true)
    }

    /// Append one zeroed element and return its index.
    ///
    /// A full buffer first grows by `growth_increment` elements.
    pub fn append(&mut self, id: BufferId) -> Result<usize, BufferError> {
        let slot = self.resolve(id)?;
        self.append_slot(slot)
    }

    /// Append `n` zeroed elements and return their bytes for filling.
    ///
    /// If the buffer lacks room its capacity grows by `n`, keeping
    /// existing elements.
    pub fn append_n(&mut self, id: BufferId, n: usize) -> Result<&mut [u8], BufferError> {
        let slot = self.resolve(id)?;
        let (count, capacity) = {
            let b = &self.slots[slot].buffer;
            (b.len(), b.capacity())
        };
        let overflow = BufferError::SizeOverflow {
            id,
            elements: usize::MAX,
            stride: self.slots[slot].buffer.stride(),
        };
        let needed = count.checked_add(n).ok_or_else(|| overflow.clone())?;
        if needed > capacity {
            let grown = capacity.checked_add(n).ok_or(overflow)?;
            self.grow_slot(slot, grown, true)?;
        }
        let buffer = &mut self.slots[slot].buffer;
        let range = buffer.push(n);
        Ok(&mut buffer.storage_mut()[range])
    }

    /// Append one element to every live buffer.
    ///
    /// Buffers used as parallel columns share an element count, so the
    /// returned index is the one assigned in the first live buffer; any
    /// buffer that disagrees is logged. Returns `None` for an empty table.
    pub fn append_all(&mut self) -> Result<Option<usize>, BufferError> {
        let mut shared = None;
        for slot in 0..self.slots.len() {
            if !self.slots[slot].live {
                continue;
            }
            let index = self.append_slot(slot)?;
            match shared {
                None => shared = Some(index),
                Some(first) if first != index => warn!(
                    slot,
                    index,
                    expected = first,
                    "buffer element counts diverged on append_all"
                ),
                Some(_) => {}
            }
        }
        Ok(shared)
    }

    /// Remove the element at `index`, shifting later elements down.
    pub fn delete_element(&mut self, id: BufferId, index: usize) -> Result<(), BufferError> {
        let slot = self.resolve(id)?;
        let buffer = &mut self.slots[slot].buffer;
        let len = buffer.len();
        if !buffer.remove(index) {
            return Err(BufferError::IndexOutOfRange { id, index, len });
        }
        Ok(())
    }

    /// Set every live buffer's element count to zero. Storage is kept.
    pub fn empty_all(&mut self) {
        self.set_len_all(0);
    }

    /// Set every live buffer's element count to `count`, clamped to its
    /// capacity.
    pub fn set_len_all(&mut self, count: usize) {
        for s in self.slots.iter_mut().filter(|s| s.live) {
            s.buffer.set_len(count);
        }
    }

    /// Drop a buffer's storage and restart it at capacity one, empty.
    pub fn clear(&mut self, id: BufferId) -> Result<(), BufferError> {
        let slot = self.resolve(id)?;
        self.clear_slot(slot)
    }

    /// Drop every buffer, tombstones included, and unmap every id.
    ///
    /// The table is left as freshly constructed apart from its heap.
    pub fn clear_all(&mut self) {
        for slot in 0..self.slots.len() {
            self.release_mirror(slot);
        }
        self.slots.clear();
        self.indirection.fill(None);
        debug!("cleared all buffers");
    }

    // ── contents ──────────────────────────────────────────────

    /// Set every byte of a buffer's allocation to `byte`.
    pub fn fill(&mut self, id: BufferId, byte: u8) -> Result<(), BufferError> {
        let slot = self.resolve(id)?;
        self.slots[slot].buffer.storage_mut().fill(byte);
        Ok(())
    }

    /// Replace a buffer's contents with `count` elements taken from `bytes`.
    ///
    /// `bytes` must be exactly `count * stride` long. The buffer grows if
    /// needed and ends with exactly `count` live elements.
    pub fn raw_copy_in(
        &mut self,
        id: BufferId,
        bytes: &[u8],
        count: usize,
    ) -> Result<(), BufferError> {
        let slot = self.resolve(id)?;
        let expected = checked_bytes(id, count, self.slots[slot].buffer.stride())?;
        if bytes.len() != expected {
            return Err(BufferError::LengthMismatch {
                id,
                expected,
                actual: bytes.len(),
            });
        }
        self.grow_slot(slot, count, false)?;
        let buffer = &mut self.slots[slot].buffer;
        buffer.storage_mut()[..expected].copy_from_slice(bytes);
        buffer.set_len(count);
        Ok(())
    }

    // ── heap ──────────────────────────────────────────────────

    /// The table's ref-list heap.
    pub fn heap(&self) -> &HeapArena {
        &self.heap
    }

    /// Mutable access to the table's ref-list heap.
    pub fn heap_mut(&mut self) -> &mut HeapArena {
        &mut self.heap
    }

    /// Replace this table's heap with a copy of `other`'s.
    pub fn copy_heap_from(&mut self, other: &BufferTable) {
        self.heap.copy_from(&other.heap);
    }

    // ── internals ─────────────────────────────────────────────

    pub(crate) fn check_id(&self, id: BufferId) -> Result<(), BufferError> {
        if id.index() >= self.config.max_buffers {
            return Err(BufferError::IdOutOfRange {
                id,
                max_buffers: self.config.max_buffers,
            });
        }
        Ok(())
    }

    pub(crate) fn resolve(&self, id: BufferId) -> Result<usize, BufferError> {
        self.lookup(id)
            .map(|slot| slot.0)
            .ok_or(BufferError::UnknownBuffer { id })
    }

    pub(crate) fn grow_slot(
        &mut self,
        slot: usize,
        capacity: usize,
        preserve: bool,
    ) -> Result<(), BufferError> {
        let buffer = &mut self.slots[slot].buffer;
        let old = buffer.capacity();
        if capacity > old {
            checked_bytes(buffer.user_id(), capacity, buffer.stride())?;
        }
        if !buffer.grow(capacity, preserve) {
            return Ok(());
        }
        debug!(
            id = buffer.user_id().0,
            old_capacity = old,
            new_capacity = capacity,
            preserve,
            "resized buffer"
        );
        self.attach_mirror(slot)
    }

    fn append_slot(&mut self, slot: usize) -> Result<usize, BufferError> {
        let (count, capacity) = {
            let b = &self.slots[slot].buffer;
            (b.len(), b.capacity())
        };
        if count == capacity {
            let buffer = &self.slots[slot].buffer;
            let grown = capacity
                .checked_add(self.config.growth_increment)
                .ok_or(BufferError::SizeOverflow {
                    id: buffer.user_id(),
                    elements: usize::MAX,
                    stride: buffer.stride(),
                })?;
            self.grow_slot(slot, grown, true)?;
        }
        let range = self.slots[slot].buffer.push(1);
        Ok(range.start / self.slots[slot].buffer.stride())
    }

    fn clear_slot(&mut self, slot: usize) -> Result<(), BufferError> {
        self.release_mirror(slot);
        let buffer = &mut self.slots[slot].buffer;
        buffer.release();
        buffer.grow(1, false);
        self.attach_mirror(slot)
    }
}

/// Byte size of `elements * stride`, rejecting anything a `Vec<u8>`
/// cannot hold.
fn checked_bytes(id: BufferId, elements: usize, stride: usize) -> Result<usize, BufferError> {
    elements
        .checked_mul(stride)
        .filter(|&bytes| bytes <= isize::MAX as usize)
        .ok_or(BufferError::SizeOverflow {
            id,
            elements,
            stride,
        })
}

impl Drop for BufferTable {
    fn drop(&mut self) {
        for slot in 0..self.slots.len() {
            self.release_mirror(slot);
        }
    }
}

impl fmt::Debug for BufferTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferTable")
            .field("slots", &self.slots.len())
            .field("live", &self.live_count())
            .field("heap_cells", &self.heap.capacity())
            .field("device_enabled", &self.device.is_enabled())
            .finish_non_exhaustive()
    }
}
