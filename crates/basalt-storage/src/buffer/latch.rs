//! Page guards: pinned, latched views of a page in the pool.
//!
//! A guard is the pool's ownership contract with its callers. While a
//! guard is alive the frame stays pinned and its page binding cannot
//! change; dropping the guard unpins through the pool, so the replacer
//! learns when the frame becomes evictable again.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use basalt_common::types::{Lsn, PageId};
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use super::frame::{BufferFrame, FrameId};
use super::pool::BufferPool;

/// Read guard for a page in the buffer pool.
///
/// Provides read-only access to the page bytes and keeps the frame
/// pinned while held. Unpins (clean) when dropped.
pub struct PageReadGuard<'a> {
    pool: &'a BufferPool,
    frame: Arc<BufferFrame>,
    page_id: PageId,
}

impl<'a> PageReadGuard<'a> {
    /// Creates a new read guard. The frame must already be pinned.
    pub(crate) fn new(pool: &'a BufferPool, frame: Arc<BufferFrame>, page_id: PageId) -> Self {
        Self {
            pool,
            frame,
            page_id,
        }
    }

    /// Returns the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame.frame_id()
    }

    /// Latches the page bytes for reading.
    #[inline]
    pub fn data(&self) -> impl Deref<Target = [u8]> + '_ {
        PageDataRef {
            guard: self.frame.read_data(),
        }
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.pool.unpin_page(self.page_id, false);
    }
}

impl std::fmt::Debug for PageReadGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageReadGuard")
            .field("page_id", &self.page_id)
            .field("frame_id", &self.frame.frame_id())
            .finish()
    }
}

/// Helper struct providing `Deref` for page data.
struct PageDataRef<'a> {
    guard: RwLockReadGuard<'a, Box<[u8]>>,
}

impl Deref for PageDataRef<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

/// Write guard for a page in the buffer pool.
///
/// Provides read-write access to the page bytes and keeps the frame
/// pinned while held. Mutable access marks the page dirty; an LSN set
/// with [`set_lsn`](Self::set_lsn) is recorded at drop so that eviction
/// can force the log first. Unpins when dropped.
pub struct PageWriteGuard<'a> {
    pool: &'a BufferPool,
    frame: Arc<BufferFrame>,
    page_id: PageId,
    modified: bool,
    lsn: Option<Lsn>,
}

impl<'a> PageWriteGuard<'a> {
    /// Creates a new write guard. The frame must already be pinned.
    pub(crate) fn new(pool: &'a BufferPool, frame: Arc<BufferFrame>, page_id: PageId) -> Self {
        Self {
            pool,
            frame,
            page_id,
            modified: false,
            lsn: None,
        }
    }

    /// Returns the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame.frame_id()
    }

    /// Latches the page bytes for reading.
    #[inline]
    pub fn data(&self) -> impl Deref<Target = [u8]> + '_ {
        PageDataRef {
            guard: self.frame.read_data(),
        }
    }

    /// Latches the page bytes for writing and marks the page dirty.
    #[inline]
    pub fn data_mut(&mut self) -> impl DerefMut<Target = [u8]> + '_ {
        self.modified = true;
        PageDataMut {
            guard: self.frame.write_data(),
        }
    }

    /// Marks the page dirty without touching the bytes.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.modified = true;
    }

    /// Records the LSN of the modification covered by this guard.
    ///
    /// The pool will not write the page back until the log is durable up
    /// to the largest LSN recorded for it.
    #[inline]
    pub fn set_lsn(&mut self, lsn: Lsn) {
        self.lsn = Some(lsn);
    }

    /// Returns true if the page was modified through this guard.
    #[inline]
    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        self.pool
            .complete_write(self.page_id, self.modified, self.lsn);
    }
}

impl std::fmt::Debug for PageWriteGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageWriteGuard")
            .field("page_id", &self.page_id)
            .field("frame_id", &self.frame.frame_id())
            .field("modified", &self.modified)
            .finish()
    }
}

/// Helper struct providing `DerefMut` for page data.
struct PageDataMut<'a> {
    guard: RwLockWriteGuard<'a, Box<[u8]>>,
}

impl Deref for PageDataMut<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for PageDataMut<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
