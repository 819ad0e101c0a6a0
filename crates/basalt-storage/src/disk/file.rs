//! File-backed disk manager.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use basalt_common::types::PageId;
use basalt_common::PAGE_SIZE;
use parking_lot::Mutex;
use tracing::trace;

use super::error::{DiskError, DiskResult};
use super::DiskManager;

/// Disk manager backed by a single database file.
///
/// Page `n` lives at byte offset `n * PAGE_SIZE`. The file grows on demand;
/// reads past the current end of file yield zeroed bytes, so a page that
/// was allocated but never flushed reads back as all zeros.
pub struct FileDiskManager {
    /// The underlying file, wrapped in a mutex for thread-safe access.
    file: Mutex<File>,
    /// The database file path.
    path: PathBuf,
    /// Identifier counter for [`DiskManager::allocate_page`].
    next_page_id: AtomicU64,
}

impl FileDiskManager {
    /// Opens (creating if necessary) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> DiskResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| DiskError::from_io_with_path(e, &path))?;

        Ok(Self {
            file: Mutex::new(file),
            path,
            next_page_id: AtomicU64::new(0),
        })
    }

    /// Returns the database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current size of the database file in bytes.
    pub fn size(&self) -> DiskResult<u64> {
        let file = self.file.lock();
        Ok(file.metadata().map(|m| m.len())?)
    }

    /// Forces all buffered writes to stable storage.
    pub fn sync(&self) -> DiskResult<()> {
        let file = self.file.lock();
        Ok(file.sync_all()?)
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()> {
        assert!(page_id.is_valid(), "read of invalid page id");
        assert_eq!(buf.len(), PAGE_SIZE, "page buffer must be PAGE_SIZE bytes");

        let offset = page_id.byte_offset();
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                // EOF: the page (or its tail) was never written
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        buf[filled..].fill(0);
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> DiskResult<()> {
        assert!(page_id.is_valid(), "write of invalid page id");
        assert_eq!(buf.len(), PAGE_SIZE, "page buffer must be PAGE_SIZE bytes");

        let offset = page_id.byte_offset();
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn allocate_page(&self) -> DiskResult<PageId> {
        let id = self.next_page_id.fetch_add(1, Ordering::Relaxed);
        Ok(PageId::new(id))
    }

    fn deallocate_page(&self, page_id: PageId) -> DiskResult<()> {
        // Identifier-level only; the on-disk bytes are left in place.
        trace!(page_id = page_id.as_u64(), "deallocate page");
        Ok(())
    }
}

impl std::fmt::Debug for FileDiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDiskManager")
            .field("path", &self.path)
            .finish()
    }
}
