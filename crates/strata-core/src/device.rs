//! The device boundary: symbol resolution, blob copies, and device storage.
//!
//! Buffer tables never talk to an accelerator runtime directly. Everything
//! device-side goes through an injected [`DeviceMirror`]; a CPU-only build
//! supplies [`NoDevice`] and the table logic is unchanged.

use std::error::Error;
use std::fmt;

use crate::id::DevicePtr;

/// A named device symbol resolved to an address and byte size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceSymbol {
    /// Device address of the symbol.
    pub addr: DevicePtr,
    /// Size of the symbol in bytes, as reported by the runtime.
    pub size: usize,
}

/// Errors reported by (or about) the device collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceError {
    /// The runtime has no symbol with this name.
    UnknownSymbol {
        /// The requested symbol name.
        name: String,
    },
    /// The resolved symbol's size differs from the host-side layout.
    ///
    /// Indicates a build or version skew between host and device code.
    SymbolSizeMismatch {
        /// The requested symbol name.
        name: String,
        /// Size the host expects, in bytes.
        expected: usize,
        /// Size the runtime reported, in bytes.
        actual: usize,
    },
    /// Device memory could not be allocated.
    AllocationFailed {
        /// Number of bytes requested.
        bytes: usize,
    },
    /// A host/device copy failed.
    CopyFailed {
        /// Description of the failure.
        reason: String,
    },
}

impl DeviceError {
    /// Whether this error means host and device state can no longer be
    /// trusted to agree.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SymbolSizeMismatch { .. })
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSymbol { name } => write!(f, "unknown device symbol '{name}'"),
            Self::SymbolSizeMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "device symbol '{name}' is {actual} bytes, host layout expects {expected} bytes"
            ),
            Self::AllocationFailed { bytes } => {
                write!(f, "device allocation of {bytes} bytes failed")
            }
            Self::CopyFailed { reason } => write!(f, "device copy failed: {reason}"),
        }
    }
}

impl Error for DeviceError {}

/// Capabilities the buffer table needs from an accelerator runtime.
///
/// All calls are blocking; there is no cancellation or timeout. The
/// implementation owns every [`DevicePtr`] it hands out.
pub trait DeviceMirror {
    /// Whether a device is present. When `false`, the table skips all
    /// device work and leaves device pointers null.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Resolve a named device symbol.
    fn resolve_symbol(&mut self, name: &str) -> Result<DeviceSymbol, DeviceError>;

    /// Copy `bytes` from the host to device address `dst`.
    fn copy_to_device(&mut self, dst: DevicePtr, bytes: &[u8]) -> Result<(), DeviceError>;

    /// Copy `out.len()` bytes from device address `src` into `out`.
    fn copy_from_device(&mut self, src: DevicePtr, out: &mut [u8]) -> Result<(), DeviceError>;

    /// Allocate `bytes` of device storage.
    fn allocate(&mut self, bytes: usize) -> Result<DevicePtr, DeviceError>;

    /// Release storage previously returned by [`allocate`](Self::allocate).
    fn release(&mut self, ptr: DevicePtr);
}

/// CPU-only [`DeviceMirror`]: reports itself disabled and does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDevice;

impl DeviceMirror for NoDevice {
    fn is_enabled(&self) -> bool {
        false
    }

    fn resolve_symbol(&mut self, name: &str) -> Result<DeviceSymbol, DeviceError> {
        Err(DeviceError::UnknownSymbol {
            name: name.to_string(),
        })
    }

    fn copy_to_device(&mut self, _dst: DevicePtr, _bytes: &[u8]) -> Result<(), DeviceError> {
        Ok(())
    }

    fn copy_from_device(&mut self, _src: DevicePtr, _out: &mut [u8]) -> Result<(), DeviceError> {
        Ok(())
    }

    fn allocate(&mut self, _bytes: usize) -> Result<DevicePtr, DeviceError> {
        Ok(DevicePtr::NULL)
    }

    fn release(&mut self, _ptr: DevicePtr) {}
}
