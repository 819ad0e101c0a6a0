//! Write-ahead log interface.
//!
//! The buffer pool does not own a log; it only honors the write-ahead
//! rule. Before a dirty page is written back to disk, the log manager is
//! asked to make the log durable up to the page's last-modification LSN.
//! Recovery and log storage live behind this trait.

use basalt_common::types::Lsn;

/// Write-ahead log hook consumed by the buffer pool.
pub trait LogManager: Send + Sync {
    /// Blocks until the log is durable up to and including `lsn`.
    ///
    /// Called before every dirty write-back whose frame carries a valid
    /// LSN. Implementations own their durability and error policy; by the
    /// time this returns, no page write at or below `lsn` can outrun the
    /// log.
    fn flush_until(&self, lsn: Lsn);
}
