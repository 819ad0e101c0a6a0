//! # basalt-storage
//!
//! Page storage layer for BasaltDB.
//!
//! This crate implements the buffer pool that mediates all page-level I/O
//! between the access methods above it and the database file below it:
//!
//! - Fixed-size page frames with pin/unpin reference counting
//! - Pluggable replacement (clock second-chance or strict LRU)
//! - Dirty-page tracking with write-back on eviction
//! - Partitioned pools for reduced latch contention
//! - A write-ahead-log hook that forces the log before dirty write-back

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Buffer pool manager
pub mod buffer;

/// Synchronous page I/O
pub mod disk;

/// Write-ahead log interface
pub mod wal;
