//! System-wide constants for BasaltDB.

// =============================================================================
// Page Geometry
// =============================================================================

/// Page size in bytes (4 KB).
///
/// Every page buffer in the system is exactly this size. It matches the
/// typical OS page size and SSD block size.
pub const PAGE_SIZE: usize = 4 * 1024;

// =============================================================================
// Buffer Pool Defaults
// =============================================================================

/// Default number of frames in a buffer pool instance.
pub const DEFAULT_POOL_FRAMES: usize = 1024;

/// Default number of partitions for the partitioned buffer pool.
///
/// Partitioning spreads pages over independent pool instances to reduce
/// latch contention under parallel workloads.
pub const DEFAULT_PARTITIONS: usize = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert!(PAGE_SIZE >= 4096);
    }

    #[test]
    fn test_pool_defaults() {
        assert!(DEFAULT_POOL_FRAMES > 0);
        assert!(DEFAULT_PARTITIONS > 0);
    }
}
