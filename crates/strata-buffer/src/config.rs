//! Buffer table configuration parameters.

use strata_heap::HeapConfig;

use crate::error::BufferError;

/// Configuration for a [`BufferTable`](crate::BufferTable).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableConfig {
    /// Number of distinct user ids the table can map (`0..max_buffers`).
    ///
    /// Also fixes the size of the device pointer table:
    /// `max_buffers * 8` bytes. Default: 128. Must be in `1..=65536`.
    pub max_buffers: usize,

    /// Elements added to a full buffer's capacity by a single append.
    ///
    /// Default: 8. Must be non-zero.
    pub growth_increment: usize,

    /// Configuration of the table's ref-list heap.
    pub heap: HeapConfig,
}

impl TableConfig {
    /// Default number of mappable user ids.
    pub const DEFAULT_MAX_BUFFERS: usize = 128;

    /// Default per-append growth in elements.
    pub const DEFAULT_GROWTH_INCREMENT: usize = 8;

    /// Create a config for `max_buffers` ids with defaults elsewhere.
    pub fn new(max_buffers: usize) -> Self {
        Self {
            max_buffers,
            growth_increment: Self::DEFAULT_GROWTH_INCREMENT,
            heap: HeapConfig::default(),
        }
    }

    /// Size in bytes of the device pointer table pushed by
    /// [`BufferTable::push_to_device`](crate::BufferTable::push_to_device).
    pub fn pointer_table_bytes(&self) -> usize {
        self.max_buffers * std::mem::size_of::<u64>()
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), BufferError> {
        if self.max_buffers == 0 || self.max_buffers > u16::MAX as usize + 1 {
            return Err(BufferError::InvalidConfig {
                reason: format!(
                    "max_buffers ({}) must be in 1..={}",
                    self.max_buffers,
                    u16::MAX as usize + 1
                ),
            });
        }
        if self.growth_increment == 0 {
            return Err(BufferError::InvalidConfig {
                reason: "growth_increment must be non-zero".to_string(),
            });
        }
        self.heap.validate()?;
        Ok(())
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_BUFFERS)
    }
}
