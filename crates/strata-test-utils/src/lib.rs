//! Test utilities and mock types for Strata development.
//!
//! Provides [`MockDevice`], an in-memory [`DeviceMirror`] whose state can
//! be inspected after the code under test has used it, and
//! [`init_tracing`] for seeing log output from failing tests.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use strata_core::{DeviceError, DeviceMirror, DevicePtr, DeviceSymbol};
use tracing_subscriber::EnvFilter;

/// Install a test-friendly `tracing` subscriber.
///
/// Honours `RUST_LOG` and defaults to `debug`. Safe to call from every
/// test; only the first call installs anything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Base address of the first mock allocation. Non-zero so that a real
/// allocation is never mistaken for [`DevicePtr::NULL`].
const BASE_ADDR: u64 = 0x1000;

/// Allocation granularity in bytes.
const ALIGN: u64 = 256;

#[derive(Default)]
struct MockState {
    /// Device memory regions keyed by base address, in allocation order.
    regions: IndexMap<DevicePtr, Vec<u8>>,
    /// Named symbols and the region backing each.
    symbols: IndexMap<String, DeviceSymbol>,
    next_addr: u64,
    copies_to_device: usize,
    copies_from_device: usize,
    allocations: usize,
}

impl MockState {
    fn carve(&mut self, bytes: usize) -> DevicePtr {
        if self.next_addr == 0 {
            self.next_addr = BASE_ADDR;
        }
        let ptr = DevicePtr(self.next_addr);
        let span = (bytes as u64).max(1).div_ceil(ALIGN) * ALIGN;
        self.next_addr += span;
        self.regions.insert(ptr, vec![0; bytes]);
        ptr
    }
}

/// In-memory device for tests.
///
/// Clones share state: hand one clone to the table under test and keep
/// another to inspect allocations, symbol contents, and copy counts.
/// Copies must target the start of a region and fit inside it.
#[derive(Clone, Default)]
pub struct MockDevice {
    state: Rc<RefCell<MockState>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a device symbol backed by `size` zeroed bytes.
    pub fn define_symbol(&self, name: &str, size: usize) -> DevicePtr {
        let mut state = self.state.borrow_mut();
        let addr = state.carve(size);
        state
            .symbols
            .insert(name.to_string(), DeviceSymbol { addr, size });
        addr
    }

    /// Current contents of a symbol.
    pub fn read_symbol(&self, name: &str) -> Option<Vec<u8>> {
        let addr = self.state.borrow().symbols.get(name)?.addr;
        self.read(addr)
    }

    /// Current contents of the region starting at `ptr`.
    pub fn read(&self, ptr: DevicePtr) -> Option<Vec<u8>> {
        self.state.borrow().regions.get(&ptr).cloned()
    }

    /// Overwrite the start of the region at `ptr`, as a kernel would.
    ///
    /// # Panics
    ///
    /// Panics if no region starts at `ptr` or `bytes` does not fit.
    pub fn write(&self, ptr: DevicePtr, bytes: &[u8]) {
        let mut state = self.state.borrow_mut();
        let region = state
            .regions
            .get_mut(&ptr)
            .unwrap_or_else(|| panic!("no mock region at {ptr}"));
        region[..bytes.len()].copy_from_slice(bytes);
    }

    /// Byte size of a live allocation (symbols included).
    pub fn allocation_size(&self, ptr: DevicePtr) -> Option<usize> {
        self.state.borrow().regions.get(&ptr).map(Vec::len)
    }

    /// Regions currently allocated through [`DeviceMirror::allocate`].
    pub fn live_allocations(&self) -> usize {
        let state = self.state.borrow();
        state.regions.len() - state.symbols.len()
    }

    /// Total calls to [`DeviceMirror::allocate`].
    pub fn allocations(&self) -> usize {
        self.state.borrow().allocations
    }

    /// Number of host-to-device copies performed.
    pub fn copies_to_device(&self) -> usize {
        self.state.borrow().copies_to_device
    }

    /// Number of device-to-host copies performed.
    pub fn copies_from_device(&self) -> usize {
        self.state.borrow().copies_from_device
    }
}

impl DeviceMirror for MockDevice {
    fn resolve_symbol(&mut self, name: &str) -> Result<DeviceSymbol, DeviceError> {
        self.state
            .borrow()
            .symbols
            .get(name)
            .copied()
            .ok_or_else(|| DeviceError::UnknownSymbol {
                name: name.to_string(),
            })
    }

    fn copy_to_device(&mut self, dst: DevicePtr, bytes: &[u8]) -> Result<(), DeviceError> {
        let mut state = self.state.borrow_mut();
        let region = state
            .regions
            .get_mut(&dst)
            .ok_or_else(|| DeviceError::CopyFailed {
                reason: format!("no region at {dst}"),
            })?;
        if bytes.len() > region.len() {
            return Err(DeviceError::CopyFailed {
                reason: format!(
                    "{} bytes do not fit region of {} at {dst}",
                    bytes.len(),
                    region.len()
                ),
            });
        }
        region[..bytes.len()].copy_from_slice(bytes);
        state.copies_to_device += 1;
        Ok(())
    }

    fn copy_from_device(&mut self, src: DevicePtr, out: &mut [u8]) -> Result<(), DeviceError> {
        let mut state = self.state.borrow_mut();
        let region = state.regions.get(&src).ok_or_else(|| DeviceError::CopyFailed {
            reason: format!("no region at {src}"),
        })?;
        if out.len() > region.len() {
            return Err(DeviceError::CopyFailed {
                reason: format!(
                    "{} bytes requested from region of {} at {src}",
                    out.len(),
                    region.len()
                ),
            });
        }
        out.copy_from_slice(&region[..out.len()]);
        state.copies_from_device += 1;
        Ok(())
    }

    fn allocate(&mut self, bytes: usize) -> Result<DevicePtr, DeviceError> {
        let mut state = self.state.borrow_mut();
        state.allocations += 1;
        Ok(state.carve(bytes))
    }

    fn release(&mut self, ptr: DevicePtr) {
        self.state.borrow_mut().regions.shift_remove(&ptr);
    }
}
