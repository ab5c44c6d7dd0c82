//! Copying buffers and schemas between tables.
//!
//! Two tables that share a schema (see [`BufferTable::match_schema`]) have
//! the same slot layout, so buffers can be copied slot-for-slot.

use strata_core::{SlotIndex, UsageFlags};
use tracing::{debug, error};

use crate::error::BufferError;
use crate::table::{BufferTable, Slot};

impl BufferTable {
    /// Rebuild this table's slot layout to mirror `src`.
    ///
    /// Every existing buffer is dropped, then each source slot is
    /// reproduced in order with the same user id, name, stride, capacity,
    /// and kind. Tombstoned source slots become tombstones here too, so
    /// slot indices line up for [`copy_all`](Self::copy_all). Usage flags
    /// come from the source unless `flags` overrides them. No element
    /// data is copied.
    pub fn match_schema(
        &mut self,
        src: &BufferTable,
        flags: Option<UsageFlags>,
    ) -> Result<(), BufferError> {
        for s in &src.slots {
            self.check_id(s.buffer.user_id())?;
        }

        self.clear_all();
        for (i, s) in src.slots.iter().enumerate() {
            let id = s.buffer.user_id();
            let slot = SlotIndex(i);
            if !s.live {
                self.slots.push(Slot {
                    name: s.name.clone(),
                    buffer: s.buffer.clone(),
                    live: false,
                });
                continue;
            }
            let usage = flags.unwrap_or(s.buffer.flags());
            let registered = self.register(
                id,
                &s.name,
                s.buffer.stride(),
                s.buffer.capacity(),
                usage,
            )?;
            debug_assert_eq!(registered, slot);
            self.slots[i].buffer.set_kind(s.buffer.kind());
        }
        let mapped = src.indirection.len().min(self.indirection.len());
        self.indirection[..mapped].copy_from_slice(&src.indirection[..mapped]);
        debug!(slots = self.slots.len(), "matched buffer schema");
        Ok(())
    }

    /// Copy the buffer in `src_slot` of this table into `dst_slot` of `dst`.
    ///
    /// `CPU` in `flags` copies the live elements into the destination
    /// host allocation, first growing it to the source's capacity if it
    /// is smaller. `DEVICE` additionally
    /// commits the destination's host bytes to its device mirror.
    /// Strides must agree and the destination slot must be live.
    pub fn copy_one(
        &self,
        src_slot: SlotIndex,
        dst: &mut BufferTable,
        dst_slot: SlotIndex,
        flags: UsageFlags,
    ) -> Result<(), BufferError> {
        let src = &self
            .slots
            .get(src_slot.0)
            .ok_or(BufferError::UnknownSlot { slot: src_slot })?
            .buffer;
        let dst_entry = dst
            .slots
            .get(dst_slot.0)
            .ok_or(BufferError::UnknownSlot { slot: dst_slot })?;
        if !dst_entry.live {
            return Err(BufferError::DeadSlot { slot: dst_slot });
        }
        let dst_buffer = &dst_entry.buffer;
        if src.stride() != dst_buffer.stride() {
            return Err(BufferError::ConsistencyViolation {
                reason: format!(
                    "stride mismatch copying slot {src_slot} ({} bytes) to slot {dst_slot} ({} bytes)",
                    src.stride(),
                    dst_buffer.stride()
                ),
            });
        }

        if flags.contains(UsageFlags::CPU) {
            dst.grow_slot(dst_slot.0, src.capacity(), false)?;
            let target = &mut dst.slots[dst_slot.0].buffer;
            target.storage_mut()[..src.bytes().len()].copy_from_slice(src.bytes());
            target.set_len(src.len());
        }
        if flags.contains(UsageFlags::DEVICE) {
            dst.commit_slot(dst_slot.0)?;
        }
        Ok(())
    }

    /// Copy every buffer into the same slot of `dst`.
    ///
    /// All slot pairs are checked before anything is copied: `dst` must
    /// have at least as many slots, and each pair must carry the same user
    /// id and stride and be live in both tables or tombstoned in both. A
    /// mismatch is a fatal [`BufferError::ConsistencyViolation`] and leaves
    /// `dst` untouched. Tombstoned slots are skipped.
    pub fn copy_all(&self, dst: &mut BufferTable, flags: UsageFlags) -> Result<(), BufferError> {
        for (i, s) in self.slots.iter().enumerate() {
            let src_id = s.buffer.user_id();
            let Some(d) = dst.slots.get(i).filter(|d| d.buffer.user_id() == src_id) else {
                let dst_id = dst.slots.get(i).map(|d| d.buffer.user_id());
                error!(slot = i, src_id = src_id.0, ?dst_id, "buffer tables out of sync");
                return Err(BufferError::ConsistencyViolation {
                    reason: format!(
                        "slot {i} holds id {src_id} in source but {} in destination",
                        dst_id.map_or_else(|| "nothing".to_string(), |id| id.to_string())
                    ),
                });
            };
            if d.buffer.stride() != s.buffer.stride() {
                error!(
                    slot = i,
                    src_stride = s.buffer.stride(),
                    dst_stride = d.buffer.stride(),
                    "buffer strides out of sync"
                );
                return Err(BufferError::ConsistencyViolation {
                    reason: format!(
                        "slot {i} has stride {} in source but {} in destination",
                        s.buffer.stride(),
                        d.buffer.stride()
                    ),
                });
            }
            if d.live != s.live {
                error!(slot = i, src_live = s.live, dst_live = d.live, "buffer liveness out of sync");
                return Err(BufferError::ConsistencyViolation {
                    reason: format!(
                        "slot {i} is {} in source but {} in destination",
                        if s.live { "live" } else { "unregistered" },
                        if d.live { "live" } else { "unregistered" }
                    ),
                });
            }
        }
        for (i, s) in self.slots.iter().enumerate() {
            if s.live {
                self.copy_one(SlotIndex(i), dst, SlotIndex(i), flags)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use strata_core::{BufferId, ElementKind};

    use super::*;
    use crate::config::TableConfig;

    fn table() -> BufferTable {
        BufferTable::new(TableConfig::new(16)).unwrap()
    }

    fn populated() -> BufferTable {
        let mut t = table();
        t.register(BufferId(4), "pos", 4, 2, UsageFlags::CPU).unwrap();
        t.register(BufferId(1), "gone", 8, 2, UsageFlags::CPU).unwrap();
        t.register(BufferId(9), "mass", 2, 1, UsageFlags::CPU).unwrap();
        t.set_kind(BufferId(4), ElementKind::Float).unwrap();
        t.unregister(BufferId(1)).unwrap();
        t.append_n(BufferId(4), 3)
            .unwrap()
            .copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        t.append_n(BufferId(9), 1).unwrap().copy_from_slice(&[7, 7]);
        t
    }

    #[test]
    fn match_schema_mirrors_layout_without_data() {
        let src = populated();
        let mut dst = table();
        dst.register(BufferId(0), "stale", 4, 1, UsageFlags::CPU).unwrap();
        dst.match_schema(&src, None).unwrap();

        assert_eq!(dst.slot_count(), 3);
        assert_eq!(dst.lookup(BufferId(4)), Some(SlotIndex(0)));
        assert_eq!(dst.lookup(BufferId(9)), Some(SlotIndex(2)));
        assert_eq!(dst.lookup(BufferId(0)), None);
        assert_eq!(dst.lookup(BufferId(1)), None);
        assert!(!dst.is_live(SlotIndex(1)));

        let pos = dst.buffer(BufferId(4)).unwrap();
        assert_eq!(pos.stride(), 4);
        assert_eq!(pos.capacity(), 5);
        assert_eq!(pos.kind(), ElementKind::Float);
        assert!(pos.is_empty());
        assert_eq!(dst.find("mass"), Some(BufferId(9)));
    }

    #[test]
    fn match_schema_overrides_flags() {
        let src = populated();
        let mut dst = table();
        dst.match_schema(&src, Some(UsageFlags::DEVICE)).unwrap();
        assert_eq!(dst.buffer(BufferId(9)).unwrap().flags(), UsageFlags::DEVICE);
    }

    #[test]
    fn match_schema_rejects_ids_beyond_destination_limit() {
        let src = populated();
        let mut dst = BufferTable::new(TableConfig::new(8)).unwrap();
        dst.register(BufferId(0), "keep", 4, 1, UsageFlags::CPU).unwrap();
        assert!(matches!(
            dst.match_schema(&src, None),
            Err(BufferError::IdOutOfRange { .. })
        ));
        assert_eq!(dst.find("keep"), Some(BufferId(0)));
    }

    #[test]
    fn copy_all_after_match_schema_copies_contents() {
        let src = populated();
        let mut dst = table();
        dst.match_schema(&src, None).unwrap();
        src.copy_all(&mut dst, UsageFlags::CPU).unwrap();
        assert_eq!(dst.bytes(BufferId(4)), src.bytes(BufferId(4)));
        assert_eq!(dst.bytes(BufferId(9)).unwrap(), &[7, 7]);
    }

    #[test]
    fn copy_all_detects_id_mismatch_before_copying() {
        let src = populated();
        let mut dst = table();
        dst.register(BufferId(4), "pos", 4, 4, UsageFlags::CPU).unwrap();
        dst.register(BufferId(2), "other", 8, 2, UsageFlags::CPU).unwrap();
        dst.register(BufferId(9), "mass", 2, 1, UsageFlags::CPU).unwrap();

        let err = src.copy_all(&mut dst, UsageFlags::CPU).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, BufferError::ConsistencyViolation { .. }));
        assert_eq!(dst.len(BufferId(4)), Some(0));
    }

    #[test]
    fn copy_all_detects_late_stride_mismatch_before_copying() {
        let mut src = table();
        src.register(BufferId(0), "a", 4, 1, UsageFlags::CPU).unwrap();
        src.register(BufferId(1), "b", 4, 1, UsageFlags::CPU).unwrap();
        src.append_n(BufferId(0), 1).unwrap().copy_from_slice(&[1, 2, 3, 4]);

        let mut dst = table();
        dst.register(BufferId(0), "a", 4, 1, UsageFlags::CPU).unwrap();
        dst.register(BufferId(1), "b", 8, 1, UsageFlags::CPU).unwrap();

        let err = src.copy_all(&mut dst, UsageFlags::CPU).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(dst.len(BufferId(0)), Some(0));
        assert_eq!(dst.buffer(BufferId(0)).unwrap().storage(), &[0, 0, 0, 0]);
    }

    #[test]
    fn copy_all_rejects_liveness_mismatch() {
        let src = populated();
        let mut dst = table();
        dst.match_schema(&src, None).unwrap();
        dst.unregister(BufferId(9)).unwrap();

        let err = src.copy_all(&mut dst, UsageFlags::CPU).unwrap_err();
        assert!(matches!(err, BufferError::ConsistencyViolation { .. }));
        assert_eq!(dst.len(BufferId(4)), Some(0));
        let tomb = dst.slot(SlotIndex(2)).unwrap();
        assert_eq!((tomb.len(), tomb.capacity()), (0, 0));
        assert!(tomb.device_ptr().is_null());
    }

    #[test]
    fn copy_one_rejects_tombstoned_destination() {
        let src = populated();
        let mut dst = table();
        let slot = dst.register(BufferId(0), "old", 4, 1, UsageFlags::CPU).unwrap();
        dst.unregister(BufferId(0)).unwrap();
        assert_eq!(
            src.copy_one(SlotIndex(0), &mut dst, slot, UsageFlags::CPU),
            Err(BufferError::DeadSlot { slot })
        );
        assert_eq!(dst.slot(slot).unwrap().capacity(), 0);
    }

    #[test]
    fn copy_all_requires_enough_destination_slots() {
        let src = populated();
        let mut dst = table();
        dst.register(BufferId(4), "pos", 4, 4, UsageFlags::CPU).unwrap();
        assert!(src.copy_all(&mut dst, UsageFlags::CPU).unwrap_err().is_fatal());
    }

    #[test]
    fn copy_one_grows_destination() {
        let src = populated();
        let mut dst = table();
        let slot = dst.register(BufferId(0), "small", 4, 1, UsageFlags::CPU).unwrap();
        src.copy_one(SlotIndex(0), &mut dst, slot, UsageFlags::CPU).unwrap();
        assert_eq!(dst.len(BufferId(0)), Some(3));
        assert_eq!(dst.capacity(BufferId(0)), Some(5));
        assert_eq!(dst.bytes(BufferId(0)), src.bytes(BufferId(4)));
    }

    #[test]
    fn copy_one_rejects_stride_mismatch() {
        let src = populated();
        let mut dst = table();
        let slot = dst.register(BufferId(0), "wide", 16, 4, UsageFlags::CPU).unwrap();
        assert!(matches!(
            src.copy_one(SlotIndex(0), &mut dst, slot, UsageFlags::CPU),
            Err(BufferError::ConsistencyViolation { .. })
        ));
        assert!(matches!(
            src.copy_one(SlotIndex(7), &mut dst, slot, UsageFlags::CPU),
            Err(BufferError::UnknownSlot { .. })
        ));
    }
}
