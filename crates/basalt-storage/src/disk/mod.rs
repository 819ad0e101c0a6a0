//! Synchronous page I/O.
//!
//! The buffer pool talks to disk through the [`DiskManager`] trait: a
//! positional read/write interface over fixed-size pages plus
//! identifier-level allocation. [`FileDiskManager`] is the default
//! implementation backed by a single database file.

mod error;
mod file;

pub use error::{DiskError, DiskResult};
pub use file::FileDiskManager;

use basalt_common::types::PageId;

/// Page-granular disk access.
///
/// Implementations must be safe for concurrent calls on distinct page ids;
/// the buffer pool never issues two concurrent writes for the same frame.
pub trait DiskManager: Send + Sync {
    /// Fills `buf` with the contents of page `page_id`.
    ///
    /// `buf` must be exactly [`PAGE_SIZE`](basalt_common::PAGE_SIZE) bytes.
    /// Reading a page that was never written yields zeroed bytes.
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()>;

    /// Persists `buf` as the contents of page `page_id`.
    ///
    /// `buf` must be exactly [`PAGE_SIZE`](basalt_common::PAGE_SIZE) bytes.
    /// Durability policy (fsync cadence) is the implementation's concern.
    fn write_page(&self, page_id: PageId, buf: &[u8]) -> DiskResult<()>;

    /// Reserves a fresh page identifier.
    ///
    /// Identifier-level only: no page contents are touched.
    fn allocate_page(&self) -> DiskResult<PageId>;

    /// Releases a page identifier.
    ///
    /// Identifier-level only: the page's on-disk bytes are left behind.
    fn deallocate_page(&self, page_id: PageId) -> DiskResult<()>;
}
