//! Heap arena configuration parameters.

use crate::error::HeapError;

/// Configuration for a [`HeapArena`](crate::HeapArena).
///
/// Validated at construction; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeapConfig {
    /// Initial arena size in cells.
    ///
    /// Default: 1024. May be zero; the first allocation then grows the
    /// arena to `starter_size`.
    pub initial_capacity: u32,

    /// Hard ceiling on arena size in cells.
    ///
    /// Default: `i32::MAX`. Growth past this is
    /// [`HeapError::CapacityExceeded`], never truncation.
    pub max_capacity: u32,

    /// Cells in a ref list's first block, and the increment added to a
    /// full list's capacity when it relocates.
    ///
    /// Default: 8. Must be non-zero.
    pub starter_size: u32,

    /// Walk the whole free list after every free and fail on any ordering
    /// or adjacency violation.
    ///
    /// Default: on in debug builds, off in release builds.
    pub verify_free_list: bool,
}

impl HeapConfig {
    /// Default initial arena size in cells.
    pub const DEFAULT_INITIAL_CAPACITY: u32 = 1024;

    /// Default hard capacity ceiling in cells.
    pub const DEFAULT_MAX_CAPACITY: u32 = i32::MAX as u32;

    /// Default ref-list starter block size in cells.
    pub const DEFAULT_STARTER_SIZE: u32 = 8;

    /// Create a config with the given initial capacity and defaults elsewhere.
    pub fn new(initial_capacity: u32) -> Self {
        Self {
            initial_capacity,
            max_capacity: Self::DEFAULT_MAX_CAPACITY,
            starter_size: Self::DEFAULT_STARTER_SIZE,
            verify_free_list: cfg!(debug_assertions),
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), HeapError> {
        if self.starter_size == 0 {
            return Err(HeapError::InvalidConfig {
                reason: "starter_size must be non-zero".to_string(),
            });
        }
        if self.initial_capacity > self.max_capacity {
            return Err(HeapError::InvalidConfig {
                reason: format!(
                    "initial_capacity ({}) exceeds max_capacity ({})",
                    self.initial_capacity, self.max_capacity
                ),
            });
        }
        Ok(())
    }

    /// Initial arena size in bytes.
    pub fn initial_bytes(&self) -> usize {
        self.initial_capacity as usize * std::mem::size_of::<u32>()
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INITIAL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = HeapConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.initial_bytes(), 4096);
        assert_eq!(config.starter_size, 8);
    }

    #[test]
    fn zero_starter_size_rejected() {
        let config = HeapConfig {
            starter_size: 0,
            ..HeapConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(HeapError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn initial_above_max_rejected() {
        let config = HeapConfig {
            initial_capacity: 64,
            max_capacity: 32,
            ..HeapConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
