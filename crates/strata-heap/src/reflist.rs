//! Growable reference lists stored in a [`HeapArena`].
//!
//! A [`RefList`] is only a cursor: the values live in one arena block.
//! When the block fills up, the next append moves the list to a larger
//! block and frees the old one, so the position stored in the cursor
//! changes. Always keep the cursor (or the position returned by
//! [`HeapArena::append_ref`]) from the most recent append.

use strata_core::HeapPos;

use crate::arena::HeapArena;
use crate::error::HeapError;

/// Cursor for one growable list of `u32` references in a heap arena.
///
/// `capacity == 0` means no block has been allocated yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefList {
    /// Number of values stored.
    pub count: u32,
    /// Cells in the list's current block.
    pub capacity: u32,
    /// Position of the list's current block.
    pub pos: HeapPos,
}

impl RefList {
    /// An unallocated, empty list.
    pub const fn new() -> Self {
        Self {
            count: 0,
            capacity: 0,
            pos: HeapPos(0),
        }
    }

    /// Whether a block has been allocated for this list.
    pub fn is_allocated(&self) -> bool {
        self.capacity != 0
    }

    /// Number of values stored.
    pub fn len(&self) -> usize {
        self.count as usize
    }

    /// Whether the list holds no values.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Forget the list without returning its block to the arena.
    ///
    /// Used when the whole arena is being reset or rebuilt; otherwise
    /// prefer [`HeapArena::free_refs`].
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

impl HeapArena {
    /// Append `value + delta` to `list`, growing it if it is full.
    ///
    /// Returns the list's position after the append. A full list is moved
    /// to a block of `capacity + starter_size` cells; the old block is
    /// freed and any previously cached position becomes invalid. On error
    /// the list is left as it was.
    pub fn append_ref(
        &mut self,
        list: &mut RefList,
        value: u32,
        delta: u32,
    ) -> Result<HeapPos, HeapError> {
        let starter = self.config().starter_size;
        let stored = value.wrapping_add(delta);

        if list.capacity == 0 {
            let grant = self.allocate(starter)?;
            self.write_cell(grant.pos, 0, stored);
            *list = RefList {
                count: 1,
                capacity: grant.len,
                pos: grant.pos,
            };
            return Ok(list.pos);
        }

        if list.count >= list.capacity {
            let grant = self.allocate(list.capacity + starter)?;
            let old = list.pos.index();
            self.copy_cells(old, grant.pos.index(), list.count as usize);
            if let Err(e) = self.free(list.pos, list.capacity) {
                self.free(grant.pos, grant.len)?;
                return Err(e);
            }
            list.pos = grant.pos;
            list.capacity = grant.len;
        }

        self.write_cell(list.pos, list.count, stored);
        list.count += 1;
        Ok(list.pos)
    }

    /// The values currently stored in `list`.
    ///
    /// Returns an empty slice for an unallocated list.
    pub fn refs(&self, list: &RefList) -> &[u32] {
        if !list.is_allocated() {
            return &[];
        }
        self.cells(list.pos, list.count).unwrap_or(&[])
    }

    /// Return the list's block to the arena and reset the cursor.
    pub fn free_refs(&mut self, list: &mut RefList) -> Result<(), HeapError> {
        if list.is_allocated() {
            self.free(list.pos, list.capacity)?;
        }
        list.clear();
        Ok(())
    }

    fn write_cell(&mut self, pos: HeapPos, offset: u32, value: u32) {
        if let Some(cell) = self.cells_mut(HeapPos(pos.0 + offset), 1) {
            cell[0] = value;
        }
    }
}
