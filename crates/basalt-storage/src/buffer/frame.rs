//! Buffer frame - a slot in the buffer pool that holds a page.

use basalt_common::types::{Lsn, PageId};
use basalt_common::PAGE_SIZE;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Frame identifier - index into the buffer pool's frame array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub usize);

impl FrameId {
    /// Invalid frame ID.
    pub const INVALID: Self = Self(usize::MAX);

    /// Creates a new frame ID.
    #[inline]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Returns the raw index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }

    /// Checks if this is a valid frame ID.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != usize::MAX
    }
}

impl From<usize> for FrameId {
    fn from(id: usize) -> Self {
        Self::new(id)
    }
}

impl From<FrameId> for usize {
    fn from(id: FrameId) -> Self {
        id.0
    }
}

/// A buffer frame holds the bytes of a single page.
///
/// The frame owns only the page buffer and its reader/writer latch; the
/// bookkeeping for the frame (`page_id`, pin count, dirty bit, LSN) lives
/// in [`FrameMeta`] under the pool latch. Readers and writers latch the
/// buffer through the pool's page guards, and the pool itself takes the
/// write latch for the duration of disk I/O.
pub struct BufferFrame {
    /// Frame ID (index in the frame array).
    frame_id: FrameId,
    /// Page data buffer, exactly `PAGE_SIZE` bytes.
    data: RwLock<Box<[u8]>>,
}

impl BufferFrame {
    /// Creates a new zeroed buffer frame.
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            data: RwLock::new(vec![0u8; PAGE_SIZE].into_boxed_slice()),
        }
    }

    /// Returns the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Returns a read latch on the page data.
    #[inline]
    pub fn read_data(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.data.read()
    }

    /// Returns a write latch on the page data.
    #[inline]
    pub fn write_data(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.data.write()
    }
}

impl std::fmt::Debug for BufferFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferFrame")
            .field("frame_id", &self.frame_id)
            .finish()
    }
}

/// Per-frame bookkeeping, guarded by the pool latch.
#[derive(Debug, Clone)]
pub(crate) struct FrameMeta {
    /// Page currently loaded in the frame, or `PageId::INVALID`.
    pub page_id: PageId,
    /// Number of outstanding references. Non-zero means the frame must
    /// not be evicted and its page binding is stable.
    pub pin_count: u32,
    /// Whether the buffer differs from the on-disk image.
    pub dirty: bool,
    /// LSN of the last modification, for the write-ahead rule.
    pub lsn: Lsn,
}

impl FrameMeta {
    /// Creates metadata for an empty frame.
    pub fn empty() -> Self {
        Self {
            page_id: PageId::INVALID,
            pin_count: 0,
            dirty: false,
            lsn: Lsn::INVALID,
        }
    }

    /// Returns true if the frame holds a page.
    #[inline]
    pub fn holds_page(&self) -> bool {
        self.page_id.is_valid()
    }

    /// Returns true if the frame is pinned.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    /// Resets the metadata to the empty state.
    pub fn reset(&mut self) {
        *self = Self::empty();
    }
}
