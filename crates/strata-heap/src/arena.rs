//! The growable cell arena and its allocator.

use strata_core::HeapPos;
use tracing::{debug, error};

use crate::config::HeapConfig;
use crate::error::HeapError;
use crate::free_list::{Coalesce, FreeBlock, FreeList};

/// Pattern written over freed cells.
pub const FREED_MARKER: u32 = 0xFFFF_FFFF;

/// A region granted by [`HeapArena::allocate`].
///
/// `len` is at least the requested size. A block reused from the free list
/// is granted whole, so `len` may be larger; callers must free exactly
/// `len` cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub struct Grant {
    /// First cell of the region.
    pub pos: HeapPos,
    /// Number of cells granted.
    pub len: u32,
}

/// Growable arena of `u32` cells with bump allocation and a coalescing
/// free list.
///
/// The arena is exclusively owned by its context; cloning it (or
/// [`copy_from`](HeapArena::copy_from)) copies every cell, so two owners
/// never alias one arena.
#[derive(Clone, Debug)]
pub struct HeapArena {
    /// Backing cells. `cells.len()` is the arena capacity.
    cells: Vec<u32>,
    /// Next unused bump position.
    highwater: usize,
    free: FreeList,
    config: HeapConfig,
}

impl HeapArena {
    /// Create an arena with `config.initial_capacity` zeroed cells.
    pub fn new(config: HeapConfig) -> Result<Self, HeapError> {
        config.validate()?;
        Ok(Self {
            cells: vec![0; config.initial_capacity as usize],
            highwater: 0,
            free: FreeList::new(),
            config,
        })
    }

    /// Allocate `len` cells, zero-filled.
    ///
    /// Bumps from the high-water mark while there is room, then reuses the
    /// first free block that fits (granted whole), and only then doubles
    /// the arena.
    pub fn allocate(&mut self, len: u32) -> Result<Grant, HeapError> {
        if len == 0 {
            return Err(HeapError::ZeroSized);
        }
        let grant = if self.highwater + (len as usize) < self.cells.len() {
            self.bump(len)
        } else if let Some(block) = self.free.take_first_fit(len) {
            Grant {
                pos: block.pos,
                len: block.len,
            }
        } else {
            self.grow(len)?;
            self.bump(len)
        };
        let start = grant.pos.index();
        self.cells[start..start + grant.len as usize].fill(0);
        Ok(grant)
    }

    /// Return `len` cells at `pos` to the free list.
    ///
    /// The cells are overwritten with [`FREED_MARKER`]. The region must lie
    /// below the high-water mark and must not overlap a block that is
    /// already free; otherwise nothing is modified.
    pub fn free(&mut self, pos: HeapPos, len: u32) -> Result<(), HeapError> {
        if len == 0 {
            return Err(HeapError::ZeroSized);
        }
        let start = pos.index();
        let end = start + len as usize;
        if end > self.highwater {
            return Err(HeapError::InvalidFree {
                pos,
                len,
                reason: format!("region ends past high-water mark {}", self.highwater),
            });
        }

        let outcome = self.free.insert(FreeBlock { pos, len })?;
        self.cells[start..end].fill(FREED_MARKER);
        if outcome != Coalesce::Inserted {
            debug!(pos = pos.0, len, ?outcome, "coalesced freed heap block");
        }

        if self.config.verify_free_list {
            self.check_free_list()?;
        }
        Ok(())
    }

    /// Walk the free list and check ordering, adjacency, and bounds.
    pub fn check_free_list(&self) -> Result<(), HeapError> {
        self.free.verify(self.highwater).inspect_err(|e| {
            error!(error = %e, "heap free list failed consistency check");
        })
    }

    /// Forget every allocation. Storage is kept; contents are not cleared.
    pub fn reset(&mut self) {
        self.highwater = 0;
        self.free.clear();
    }

    /// Release the backing storage entirely.
    pub fn clear(&mut self) {
        self.cells = Vec::new();
        self.highwater = 0;
        self.free.clear();
    }

    /// Replace this arena's contents with a full copy of `src`.
    ///
    /// This arena keeps its own configuration.
    pub fn copy_from(&mut self, src: &HeapArena) {
        self.cells.clone_from(&src.cells);
        self.highwater = src.highwater;
        self.free.clone_from(&src.free);
    }

    /// Read `len` cells starting at `pos`.
    pub fn cells(&self, pos: HeapPos, len: u32) -> Option<&[u32]> {
        let start = pos.index();
        self.cells.get(start..start.checked_add(len as usize)?)
    }

    /// Mutable access to `len` cells starting at `pos`.
    pub fn cells_mut(&mut self, pos: HeapPos, len: u32) -> Option<&mut [u32]> {
        let start = pos.index();
        self.cells.get_mut(start..start.checked_add(len as usize)?)
    }

    /// Arena capacity in cells.
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// High-water mark: cells ever handed out by bump allocation.
    pub fn highwater(&self) -> usize {
        self.highwater
    }

    /// Bytes below the high-water mark.
    pub fn used_bytes(&self) -> usize {
        self.highwater * std::mem::size_of::<u32>()
    }

    /// Number of blocks on the free list.
    pub fn free_block_count(&self) -> usize {
        self.free.len()
    }

    /// The free list, for inspection.
    pub fn free_list(&self) -> &FreeList {
        &self.free
    }

    /// The arena's configuration.
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Copy `len` cells from `from` to `to` within the arena.
    pub(crate) fn copy_cells(&mut self, from: usize, to: usize, len: usize) {
        self.cells.copy_within(from..from + len, to);
    }

    fn bump(&mut self, len: u32) -> Grant {
        let pos = HeapPos(self.highwater as u32);
        self.highwater += len as usize;
        Grant { pos, len }
    }

    /// Double the arena until a bump of `len` fits, clamped to the ceiling.
    fn grow(&mut self, len: u32) -> Result<(), HeapError> {
        let max = self.config.max_capacity as usize;
        let needed = self.highwater + len as usize;
        if needed >= max {
            error!(
                requested = len,
                used = self.highwater,
                max_capacity = max,
                "heap arena would exceed its capacity ceiling"
            );
            return Err(HeapError::CapacityExceeded {
                requested: len,
                used: self.highwater,
                max_capacity: self.config.max_capacity,
            });
        }

        let old = self.cells.len();
        let mut new_cap = old.max(self.config.starter_size as usize);
        while new_cap <= needed {
            new_cap = new_cap.saturating_mul(2);
        }
        let new_cap = new_cap.min(max);
        self.cells.resize(new_cap, 0);
        debug!(old_cells = old, new_cells = new_cap, "grew heap arena");
        Ok(())
    }
}
