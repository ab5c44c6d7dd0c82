//! Address-ordered free list with coalescing.
//!
//! [`FreeList`] holds one [`FreeBlock`] record per contiguous free region
//! of the arena. Records are kept strictly ascending by position and no
//! two records ever touch: inserting a block adjacent to an existing one
//! merges them instead of adding a node.

use strata_core::HeapPos;

use crate::error::HeapError;

/// A contiguous free region of the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreeBlock {
    /// First cell of the region.
    pub pos: HeapPos,
    /// Length of the region in cells.
    pub len: u32,
}

impl FreeBlock {
    /// One past the last cell of the region.
    pub fn end(&self) -> u64 {
        self.pos.0 as u64 + self.len as u64
    }
}

/// How an inserted block was absorbed into the list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Coalesce {
    /// Appended to the preceding block.
    Backward,
    /// Prepended to the following block.
    Forward,
    /// Bridged the gap between two blocks, joining all three.
    Both,
    /// Touched nothing; stored as a new record.
    Inserted,
}

/// Ascending, non-touching list of free blocks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FreeList {
    blocks: Vec<FreeBlock>,
}

impl FreeList {
    /// Create an empty free list.
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Position of the lowest free block, if any.
    pub fn head(&self) -> Option<HeapPos> {
        self.blocks.first().map(|b| b.pos)
    }

    /// Number of free blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Total free cells across all blocks.
    pub fn total_cells(&self) -> u64 {
        self.blocks.iter().map(|b| b.len as u64).sum()
    }

    /// Iterate over the blocks in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = &FreeBlock> {
        self.blocks.iter()
    }

    /// Drop every block.
    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    /// Unlink and return the lowest-addressed block with at least `len`
    /// cells (first fit). The whole block is returned, never split.
    pub fn take_first_fit(&mut self, len: u32) -> Option<FreeBlock> {
        let idx = self.blocks.iter().position(|b| b.len >= len)?;
        Some(self.blocks.remove(idx))
    }

    /// Insert a freed block at its ordered position, merging with any
    /// neighbour it touches.
    ///
    /// Fails without modifying the list if the block overlaps a block
    /// that is already free.
    pub fn insert(&mut self, block: FreeBlock) -> Result<Coalesce, HeapError> {
        let idx = self.blocks.partition_point(|b| b.pos < block.pos);

        let touches_prev = match idx.checked_sub(1).map(|i| self.blocks[i]) {
            Some(prev) if prev.end() > block.pos.0 as u64 => {
                return Err(overlap(block, prev));
            }
            Some(prev) => prev.end() == block.pos.0 as u64,
            None => false,
        };
        let touches_next = match self.blocks.get(idx) {
            Some(next) if block.end() > next.pos.0 as u64 => {
                return Err(overlap(block, *next));
            }
            Some(next) => block.end() == next.pos.0 as u64,
            None => false,
        };

        let outcome = match (touches_prev, touches_next) {
            (true, true) => {
                let next = self.blocks.remove(idx);
                self.blocks[idx - 1].len += block.len + next.len;
                Coalesce::Both
            }
            (true, false) => {
                self.blocks[idx - 1].len += block.len;
                Coalesce::Backward
            }
            (false, true) => {
                let next = &mut self.blocks[idx];
                next.pos = block.pos;
                next.len += block.len;
                Coalesce::Forward
            }
            (false, false) => {
                self.blocks.insert(idx, block);
                Coalesce::Inserted
            }
        };
        Ok(outcome)
    }

    /// Full traversal checking every list invariant against the arena's
    /// high-water mark.
    pub fn verify(&self, highwater: usize) -> Result<(), HeapError> {
        let mut prev: Option<FreeBlock> = None;
        for (i, block) in self.blocks.iter().enumerate() {
            if block.len == 0 {
                return Err(HeapError::FreeListCorrupted {
                    reason: format!("block {i} at {} has zero length", block.pos),
                });
            }
            if block.end() > highwater as u64 {
                return Err(HeapError::FreeListCorrupted {
                    reason: format!(
                        "block {i} at {} ends at {}, past high-water mark {highwater}",
                        block.pos,
                        block.end()
                    ),
                });
            }
            if let Some(p) = prev {
                if block.pos <= p.pos {
                    return Err(HeapError::FreeListCorrupted {
                        reason: format!("block {i} at {} is out of order after {}", block.pos, p.pos),
                    });
                }
                if p.end() >= block.pos.0 as u64 {
                    return Err(HeapError::FreeListCorrupted {
                        reason: format!(
                            "blocks at {} and {} touch or overlap but were not merged",
                            p.pos, block.pos
                        ),
                    });
                }
            }
            prev = Some(*block);
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn push_unchecked(&mut self, block: FreeBlock) {
        self.blocks.push(block);
    }
}

fn overlap(block: FreeBlock, existing: FreeBlock) -> HeapError {
    HeapError::InvalidFree {
        pos: block.pos,
        len: block.len,
        reason: format!(
            "overlaps free block of {} cells at {}",
            existing.len, existing.pos
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(pos: u32, len: u32) -> FreeBlock {
        FreeBlock {
            pos: HeapPos(pos),
            len,
        }
    }

    #[test]
    fn insert_keeps_ascending_order() {
        let mut list = FreeList::new();
        assert_eq!(list.insert(block(40, 4)), Ok(Coalesce::Inserted));
        assert_eq!(list.insert(block(0, 4)), Ok(Coalesce::Inserted));
        assert_eq!(list.insert(block(20, 4)), Ok(Coalesce::Inserted));
        let positions: Vec<_> = list.iter().map(|b| b.pos.0).collect();
        assert_eq!(positions, vec![0, 20, 40]);
        assert_eq!(list.head(), Some(HeapPos(0)));
    }

    #[test]
    fn merges_into_predecessor() {
        let mut list = FreeList::new();
        list.insert(block(0, 8)).unwrap();
        assert_eq!(list.insert(block(8, 4)), Ok(Coalesce::Backward));
        assert_eq!(list.len(), 1);
        assert_eq!(list.iter().next(), Some(&block(0, 12)));
    }

    #[test]
    fn merges_forward_into_successor() {
        let mut list = FreeList::new();
        list.insert(block(8, 4)).unwrap();
        assert_eq!(list.insert(block(0, 8)), Ok(Coalesce::Forward));
        assert_eq!(list.len(), 1);
        assert_eq!(list.iter().next(), Some(&block(0, 12)));
    }

    #[test]
    fn bridging_block_joins_three() {
        let mut list = FreeList::new();
        list.insert(block(0, 4)).unwrap();
        list.insert(block(8, 4)).unwrap();
        assert_eq!(list.insert(block(4, 4)), Ok(Coalesce::Both));
        assert_eq!(list.len(), 1);
        assert_eq!(list.iter().next(), Some(&block(0, 12)));
        assert!(list.verify(12).is_ok());
    }

    #[test]
    fn overlapping_insert_rejected_without_mutation() {
        let mut list = FreeList::new();
        list.insert(block(0, 8)).unwrap();
        let before = list.clone();
        assert!(matches!(
            list.insert(block(4, 8)),
            Err(HeapError::InvalidFree { .. })
        ));
        assert!(matches!(
            list.insert(block(0, 8)),
            Err(HeapError::InvalidFree { .. })
        ));
        assert_eq!(list, before);
    }

    #[test]
    fn first_fit_takes_lowest_large_enough_block() {
        let mut list = FreeList::new();
        list.insert(block(0, 2)).unwrap();
        list.insert(block(10, 8)).unwrap();
        list.insert(block(30, 16)).unwrap();
        assert_eq!(list.take_first_fit(5), Some(block(10, 8)));
        assert_eq!(list.take_first_fit(32), None);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn verify_detects_descending_order() {
        let mut list = FreeList::new();
        list.push_unchecked(block(20, 4));
        list.push_unchecked(block(0, 4));
        assert!(matches!(
            list.verify(64),
            Err(HeapError::FreeListCorrupted { .. })
        ));
    }

    #[test]
    fn verify_detects_unmerged_neighbours() {
        let mut list = FreeList::new();
        list.push_unchecked(block(0, 4));
        list.push_unchecked(block(4, 4));
        assert!(list.verify(64).is_err());
    }

    #[test]
    fn verify_detects_block_past_highwater() {
        let mut list = FreeList::new();
        list.push_unchecked(block(60, 8));
        assert!(list.verify(64).is_err());
    }
}
