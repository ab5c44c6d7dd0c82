//! Benchmark profiles and workload generators for Strata.
//!
//! - [`reference_table`]: a table with a fixed schema of float3 buffers
//! - [`churn_lengths`]: deterministic allocation sizes for heap churn
//! - [`release_order`]: deterministic permutation for freeing grants

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use strata_buffer::{BufferError, BufferTable, TableConfig};
use strata_core::{BufferId, ElementKind, UsageFlags};

/// Build a CPU-only table with `buffers` float3 buffers of `capacity`
/// elements each, registered under ids `0..buffers`.
pub fn reference_table(buffers: u16, capacity: usize) -> Result<BufferTable, BufferError> {
    let mut table = BufferTable::new(TableConfig::default())?;
    for i in 0..buffers {
        let id = BufferId(i);
        table.register(id, &format!("buf{i}"), 12, capacity, UsageFlags::CPU)?;
        table.set_kind(id, ElementKind::Float3)?;
    }
    Ok(table)
}

/// Generate `n` allocation lengths in `1..=max_len` from `seed`.
pub fn churn_lengths(n: usize, max_len: u32, seed: u64) -> Vec<u32> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) % max_len as u64) as u32 + 1
        })
        .collect()
}

/// A permutation of `0..n` for releasing grants out of allocation order.
///
/// Uses a stride coprime with `n` so every index appears exactly once.
pub fn release_order(n: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let mut stride = n / 2 + 1;
    while gcd(stride, n) != 1 {
        stride += 1;
    }
    (0..n).map(|i| (i * stride) % n).collect()
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_table_registers_schema() {
        let table = reference_table(16, 64).unwrap();
        assert_eq!(table.live_count(), 16);
        assert_eq!(table.buffer(BufferId(15)).unwrap().size(), 64 * 12);
    }

    #[test]
    fn churn_lengths_in_range_and_deterministic() {
        let a = churn_lengths(500, 32, 42);
        assert_eq!(a, churn_lengths(500, 32, 42));
        assert!(a.iter().all(|&l| (1..=32).contains(&l)));
    }

    #[test]
    fn release_order_is_permutation() {
        for n in [0usize, 1, 2, 7, 64, 100] {
            let mut order = release_order(n);
            order.sort_unstable();
            assert_eq!(order, (0..n).collect::<Vec<_>>());
        }
    }
}
