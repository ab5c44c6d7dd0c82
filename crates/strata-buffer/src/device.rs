//! Host/device mirroring for a [`BufferTable`].
//!
//! `DEVICE`-flagged buffers get device storage of the same byte size as
//! their host allocation. Contents only move when asked: [`commit`]
//! copies host to device, [`retrieve`] copies back. The pointer table
//! that device code indexes by user id is pushed with
//! [`push_to_device`].
//!
//! [`commit`]: BufferTable::commit
//! [`retrieve`]: BufferTable::retrieve
//! [`push_to_device`]: BufferTable::push_to_device

use strata_core::{BufferId, DeviceError, DevicePtr, UsageFlags};
use tracing::{debug, error};

use crate::error::BufferError;
use crate::table::BufferTable;

impl BufferTable {
    /// Write the table of device pointers to the device symbol `symbol`.
    ///
    /// The table has one native-endian `u64` per user id (`max_buffers`
    /// entries); ids without a mapped buffer or without a device mirror
    /// get zero. The symbol must be exactly
    /// [`pointer_table_bytes`](crate::TableConfig::pointer_table_bytes)
    /// long, otherwise the push fails with a fatal
    /// [`DeviceError::SymbolSizeMismatch`] and nothing is copied. Without
    /// a device this is a no-op.
    pub fn push_to_device(&mut self, symbol: &str) -> Result<(), BufferError> {
        if !self.device.is_enabled() {
            debug!(symbol, "no device; skipping pointer table push");
            return Ok(());
        }
        let resolved = self.device.resolve_symbol(symbol)?;
        let expected = self.config.pointer_table_bytes();
        if resolved.size != expected {
            error!(
                symbol,
                expected,
                actual = resolved.size,
                "device symbol size does not match host pointer table"
            );
            return Err(DeviceError::SymbolSizeMismatch {
                name: symbol.to_string(),
                expected,
                actual: resolved.size,
            }
            .into());
        }

        let blob: Vec<u8> = self
            .indirection
            .iter()
            .map(|entry| match entry {
                Some(slot) => self.slots[slot.0].buffer.device_ptr().0,
                None => 0,
            })
            .flat_map(u64::to_ne_bytes)
            .collect();
        self.device.copy_to_device(resolved.addr, &blob)?;
        debug!(symbol, addr = %resolved.addr, bytes = blob.len(), "pushed pointer table");
        Ok(())
    }

    /// Device address of a buffer's mirror ([`DevicePtr::NULL`] if none).
    pub fn device_ptr(&self, id: BufferId) -> Option<DevicePtr> {
        self.buffer(id).map(|b| b.device_ptr())
    }

    /// Copy a buffer's whole host allocation to its device mirror.
    ///
    /// Buffers without a mirror are left alone.
    pub fn commit(&mut self, id: BufferId) -> Result<(), BufferError> {
        let slot = self.resolve(id)?;
        self.commit_slot(slot)
    }

    /// [`commit`](Self::commit) every live buffer.
    pub fn commit_all(&mut self) -> Result<(), BufferError> {
        for slot in 0..self.slots.len() {
            if self.slots[slot].live {
                self.commit_slot(slot)?;
            }
        }
        Ok(())
    }

    /// Copy a buffer's device mirror back over its host allocation.
    ///
    /// Buffers without a mirror are left alone.
    pub fn retrieve(&mut self, id: BufferId) -> Result<(), BufferError> {
        let slot = self.resolve(id)?;
        self.retrieve_slot(slot)
    }

    /// [`retrieve`](Self::retrieve) every live buffer.
    pub fn retrieve_all(&mut self) -> Result<(), BufferError> {
        for slot in 0..self.slots.len() {
            if self.slots[slot].live {
                self.retrieve_slot(slot)?;
            }
        }
        Ok(())
    }

    pub(crate) fn commit_slot(&mut self, slot: usize) -> Result<(), BufferError> {
        let buffer = &self.slots[slot].buffer;
        let ptr = buffer.device_ptr();
        if ptr.is_null() {
            return Ok(());
        }
        self.device.copy_to_device(ptr, buffer.storage())?;
        Ok(())
    }

    fn retrieve_slot(&mut self, slot: usize) -> Result<(), BufferError> {
        let buffer = &mut self.slots[slot].buffer;
        let ptr = buffer.device_ptr();
        if ptr.is_null() {
            return Ok(());
        }
        self.device.copy_from_device(ptr, buffer.storage_mut())?;
        Ok(())
    }

    /// (Re)allocate device storage matching the slot's host allocation.
    ///
    /// Any previous mirror is released first. Does nothing unless the
    /// buffer is `DEVICE`-flagged, a device is present, and the host
    /// allocation is non-empty.
    pub(crate) fn attach_mirror(&mut self, slot: usize) -> Result<(), BufferError> {
        self.release_mirror(slot);
        let buffer = &mut self.slots[slot].buffer;
        if !buffer.flags().contains(UsageFlags::DEVICE)
            || !self.device.is_enabled()
            || buffer.size() == 0
        {
            return Ok(());
        }
        let bytes = buffer.size();
        let ptr = self.device.allocate(bytes).inspect_err(|e| {
            error!(id = buffer.user_id().0, bytes, error = %e, "device allocation failed");
        })?;
        buffer.set_device_ptr(ptr);
        Ok(())
    }

    pub(crate) fn release_mirror(&mut self, slot: usize) {
        let buffer = &mut self.slots[slot].buffer;
        let ptr = buffer.device_ptr();
        if !ptr.is_null() {
            self.device.release(ptr);
            buffer.set_device_ptr(DevicePtr::NULL);
        }
    }
}
