//! Buffer pool instance.
//!
//! A [`BufferPool`] owns a fixed array of page frames, the page table
//! mapping resident pages to frames, a free list, and a replacer that
//! picks eviction victims. All metadata transitions happen under one
//! pool latch; page bytes are guarded separately by per-frame
//! reader/writer latches so disk I/O never runs under the pool latch.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use basalt_common::types::{Lsn, PageId};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace, warn};

use super::config::BufferPoolConfig;
use super::error::{BufferError, BufferResult};
use super::eviction::Replacer;
use super::frame::{BufferFrame, FrameId, FrameMeta};
use super::latch::{PageReadGuard, PageWriteGuard};
use super::BufferPoolStats;
use crate::disk::DiskManager;
use crate::wal::LogManager;

/// State guarded by the pool latch.
///
/// A frame id lives in exactly one of: the free list, the page table
/// (resident), or neither while pinned with no mapping change in flight.
struct PoolState {
    /// Maps resident pages to their frames.
    page_table: HashMap<PageId, FrameId>,
    /// Frames holding no page, ready for immediate use.
    free_list: VecDeque<FrameId>,
    /// Evictable frames, in policy order.
    replacer: Box<dyn Replacer>,
    /// Per-frame metadata, indexed by frame id.
    meta: Vec<FrameMeta>,
    /// Next page id this instance will hand out. Stays in the
    /// instance's residue class: seeded at `instance_index`, stepped by
    /// `num_instances`.
    next_page_id: u64,
}

/// A dirty page scheduled for write-back during provisioning.
struct WriteBack {
    page_id: PageId,
    lsn: Lsn,
}

/// A single buffer pool instance.
///
/// Serves `fetch`/`new`/`unpin`/`flush`/`delete` for the pages it is
/// responsible for. Safe for concurrent use from many threads; returned
/// guards keep their frames pinned until dropped.
pub struct BufferPool {
    /// Number of frames in the pool.
    num_frames: usize,
    /// How many sibling instances share the page id space.
    num_instances: u64,
    /// This instance's residue class within `num_instances`.
    instance_index: u64,
    /// Frame array; data buffers with their latches.
    frames: Vec<Arc<BufferFrame>>,
    /// The pool latch.
    state: Mutex<PoolState>,
    /// Backing disk storage.
    disk: Arc<dyn DiskManager>,
    /// Write-ahead log hook, forced before dirty write-back.
    log: Option<Arc<dyn LogManager>>,
    /// Fetch counter for statistics.
    fetches: AtomicU64,
    /// Hit counter for statistics.
    hits: AtomicU64,
    /// Miss counter for statistics.
    misses: AtomicU64,
    /// Eviction counter for statistics.
    evictions: AtomicU64,
    /// Write-back counter for statistics.
    flushes: AtomicU64,
}

impl BufferPool {
    /// Creates a standalone buffer pool instance.
    pub fn new(config: BufferPoolConfig, disk: Arc<dyn DiskManager>) -> BufferResult<Self> {
        Self::new_sharded(config, 1, 0, disk)
    }

    /// Creates one instance of a sharded pool.
    ///
    /// The instance allocates page ids congruent to `instance_index`
    /// modulo `num_instances`, so routing by residue always lands on the
    /// instance that created the page.
    pub fn new_sharded(
        config: BufferPoolConfig,
        num_instances: u64,
        instance_index: u64,
        disk: Arc<dyn DiskManager>,
    ) -> BufferResult<Self> {
        config.validate().map_err(BufferError::config)?;
        if num_instances == 0 {
            return Err(BufferError::config("num_instances must be > 0"));
        }
        if instance_index >= num_instances {
            return Err(BufferError::config("instance_index out of range"));
        }

        let num_frames = config.num_frames;
        let frames = (0..num_frames)
            .map(|i| Arc::new(BufferFrame::new(FrameId::new(i))))
            .collect();

        let state = PoolState {
            page_table: HashMap::with_capacity(num_frames),
            free_list: (0..num_frames).map(FrameId::new).collect(),
            replacer: config.policy.build(num_frames),
            meta: (0..num_frames).map(|_| FrameMeta::empty()).collect(),
            next_page_id: instance_index,
        };

        Ok(Self {
            num_frames,
            num_instances,
            instance_index,
            frames,
            state: Mutex::new(state),
            disk,
            log: None,
            fetches: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
        })
    }

    /// Attaches a write-ahead log manager.
    ///
    /// Once attached, the log is forced up to a page's recorded LSN
    /// before that page is written back.
    pub fn with_log_manager(mut self, log: Arc<dyn LogManager>) -> Self {
        self.log = Some(log);
        self
    }

    /// Fetches a page for reading.
    ///
    /// Returns a pinned read guard; the page is loaded from disk on a
    /// miss. Fails with [`BufferError::NoFreeFrames`] when every frame
    /// is pinned.
    pub fn fetch_page(&self, page_id: PageId) -> BufferResult<PageReadGuard<'_>> {
        let frame = self.fetch_frame(page_id)?;
        Ok(PageReadGuard::new(self, frame, page_id))
    }

    /// Fetches a page for writing.
    ///
    /// Like [`fetch_page`](Self::fetch_page) but returns a write guard
    /// whose mutable access marks the page dirty.
    pub fn fetch_page_for_write(&self, page_id: PageId) -> BufferResult<PageWriteGuard<'_>> {
        let frame = self.fetch_frame(page_id)?;
        Ok(PageWriteGuard::new(self, frame, page_id))
    }

    /// Creates a new page and returns a pinned write guard to it.
    ///
    /// The fresh page is zeroed and born dirty so it reaches disk on the
    /// next flush even if never modified.
    pub fn new_page(&self) -> BufferResult<PageWriteGuard<'_>> {
        let state = self.state.lock();
        let (mut state, frame_id) = self.claim_frame(state)?;

        let page_id = PageId::new(state.next_page_id);
        state.next_page_id += self.num_instances;
        debug_assert_eq!(
            page_id.shard(self.num_instances),
            self.instance_index,
            "allocated page id escaped this instance's residue class"
        );

        state.meta[frame_id.index()] = FrameMeta {
            page_id,
            pin_count: 1,
            dirty: true,
            lsn: Lsn::INVALID,
        };
        state.page_table.insert(page_id, frame_id);

        let frame = Arc::clone(&self.frames[frame_id.index()]);
        // Frame latch is taken under the pool latch so nothing can slip
        // between the mapping becoming visible and the buffer being ready.
        let mut data = frame.write_data();
        drop(state);

        data.fill(0);
        drop(data);

        trace!(page_id = page_id.as_u64(), frame_id = frame_id.index(), "new page");
        Ok(PageWriteGuard::new(self, frame, page_id))
    }

    /// Decrements a page's pin count.
    ///
    /// Returns `false` if the page is not resident or was not pinned.
    /// `is_dirty` is sticky: the dirty bit is only ever cleared by a
    /// successful write-back, never by unpinning.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.finish_unpin(page_id, is_dirty, None)
    }

    /// Writes a page back to disk if it is dirty.
    ///
    /// Returns `Ok(false)` if the page is not resident. Flushing a
    /// pinned page is permitted; flushing a clean page is a no-op.
    pub fn flush_page(&self, page_id: PageId) -> BufferResult<bool> {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(false);
        };
        let idx = frame_id.index();
        if !state.meta[idx].dirty {
            return Ok(true);
        }

        // Pin privately so the binding survives the latch release. Clear
        // the dirty bit now: any modification landing after our copy of
        // the bytes re-sets it and is flushed next time.
        if state.meta[idx].pin_count == 0 {
            state.replacer.pin(frame_id);
        }
        state.meta[idx].pin_count += 1;
        state.meta[idx].dirty = false;
        let wb = WriteBack {
            page_id,
            lsn: state.meta[idx].lsn,
        };
        let frame = Arc::clone(&self.frames[idx]);
        drop(state);

        let data = frame.write_data();
        let result = self.write_back(&wb, &data);
        drop(data);

        let mut state = self.state.lock();
        if result.is_err() {
            state.meta[idx].dirty = true;
        }
        state.meta[idx].pin_count -= 1;
        if state.meta[idx].pin_count == 0 {
            state.replacer.unpin(frame_id);
        }
        result.map(|_| true)
    }

    /// Writes every dirty resident page back to disk.
    ///
    /// Returns the number of pages flushed.
    pub fn flush_all(&self) -> BufferResult<usize> {
        let dirty: Vec<PageId> = {
            let state = self.state.lock();
            state
                .meta
                .iter()
                .filter(|m| m.holds_page() && m.dirty)
                .map(|m| m.page_id)
                .collect()
        };

        let mut flushed = 0;
        for page_id in dirty {
            if self.flush_page(page_id)? {
                flushed += 1;
            }
        }
        Ok(flushed)
    }

    /// Drops a page from the pool and releases its identifier.
    ///
    /// Returns `Ok(true)` if the page is gone afterwards (including the
    /// already-absent case) and `Ok(false)` if it is pinned. A deleted
    /// page's dirty bytes are discarded, not written back.
    pub fn delete_page(&self, page_id: PageId) -> BufferResult<bool> {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(true);
        };
        let idx = frame_id.index();
        if state.meta[idx].is_pinned() {
            return Ok(false);
        }

        self.disk.deallocate_page(page_id)?;
        state.page_table.remove(&page_id);
        // The frame had pin count zero, so the replacer was tracking it.
        state.replacer.pin(frame_id);
        state.meta[idx].reset();
        state.free_list.push_back(frame_id);

        debug!(page_id = page_id.as_u64(), frame_id = idx, "page deleted");
        Ok(true)
    }

    /// Returns true if the page is resident.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    /// Returns the number of frames in the pool.
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Returns a snapshot of the pool's counters.
    pub fn stats(&self) -> BufferPoolStats {
        let (pinned, dirty) = {
            let state = self.state.lock();
            (
                state.meta.iter().filter(|m| m.is_pinned()).count(),
                state.meta.iter().filter(|m| m.dirty).count(),
            )
        };
        BufferPoolStats {
            fetches: self.fetches.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            pinned_frames: pinned,
            dirty_frames: dirty,
        }
    }

    // -------------------------------------------------------------------------
    // Internal
    // -------------------------------------------------------------------------

    /// Resolves a page to a pinned frame, loading it on a miss.
    fn fetch_frame(&self, page_id: PageId) -> BufferResult<Arc<BufferFrame>> {
        if !page_id.is_valid() {
            return Err(BufferError::InvalidPageId { page_id });
        }
        self.fetches.fetch_add(1, Ordering::Relaxed);

        let mut state = self.state.lock();
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            state.meta[frame_id.index()].pin_count += 1;
            state.replacer.pin(frame_id);
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(&self.frames[frame_id.index()]));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let (mut state, frame_id) = self.claim_frame(state)?;

        // The claim may have released the latch for a write-back, and a
        // sibling fetch may have brought the page in meanwhile.
        if let Some(&resident) = state.page_table.get(&page_id) {
            state.meta[resident.index()].pin_count += 1;
            state.replacer.pin(resident);
            state.free_list.push_back(frame_id);
            return Ok(Arc::clone(&self.frames[resident.index()]));
        }

        state.meta[frame_id.index()] = FrameMeta {
            page_id,
            pin_count: 1,
            dirty: false,
            lsn: Lsn::INVALID,
        };
        state.page_table.insert(page_id, frame_id);

        let frame = Arc::clone(&self.frames[frame_id.index()]);
        // Take the frame latch before releasing the pool latch: a
        // concurrent fetch of the same page hits the mapping above and
        // blocks on the buffer until the read below completes.
        let mut data = frame.write_data();
        drop(state);

        if let Err(e) = self.disk.read_page(page_id, &mut data) {
            data.fill(0);
            drop(data);
            self.abort_provision(page_id, frame_id);
            return Err(e.into());
        }
        drop(data);

        Ok(frame)
    }

    /// Claims a frame with no page bound to it: free list first, then
    /// eviction. A dirty victim is written back under a transient pin
    /// with the pool latch released, then re-examined; a victim that
    /// got pinned or re-dirtied during the write stays resident and
    /// another candidate is tried. A failed write-back restores the
    /// dirty bit and leaves the victim resident, so its bytes are never
    /// discarded. On success the returned frame is unmapped and sits in
    /// neither the free list nor the replacer.
    ///
    /// The latch can be released and reacquired along the way; callers
    /// must re-validate any lookup made before the call.
    fn claim_frame<'a>(
        &'a self,
        mut state: MutexGuard<'a, PoolState>,
    ) -> BufferResult<(MutexGuard<'a, PoolState>, FrameId)> {
        loop {
            if let Some(frame_id) = state.free_list.pop_front() {
                return Ok((state, frame_id));
            }

            let frame_id = state.replacer.victim().ok_or(BufferError::NoFreeFrames)?;
            let idx = frame_id.index();
            debug_assert_eq!(state.meta[idx].pin_count, 0, "victim frame is pinned");
            debug_assert!(state.meta[idx].holds_page(), "victim frame holds no page");

            let old_page = state.meta[idx].page_id;
            if !state.meta[idx].dirty {
                state.page_table.remove(&old_page);
                state.meta[idx].reset();
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(page_id = old_page.as_u64(), frame_id = idx, "evicted clean page");
                return Ok((state, frame_id));
            }

            // Dirty victim: flush it before the frame can be reused. The
            // transient pin keeps the binding stable while the latch is
            // released; clearing the dirty bit first keeps a concurrent
            // re-dirty from being lost.
            state.meta[idx].pin_count += 1;
            state.meta[idx].dirty = false;
            let wb = WriteBack {
                page_id: old_page,
                lsn: state.meta[idx].lsn,
            };
            let frame = Arc::clone(&self.frames[idx]);
            drop(state);

            let data = frame.write_data();
            let result = self.write_back(&wb, &data);
            drop(data);

            state = self.state.lock();
            state.meta[idx].pin_count -= 1;
            if let Err(e) = result {
                warn!(
                    page_id = old_page.as_u64(),
                    "eviction write-back failed, page stays resident and dirty"
                );
                state.meta[idx].dirty = true;
                if state.meta[idx].pin_count == 0 {
                    state.replacer.unpin(frame_id);
                }
                return Err(e);
            }
            if state.meta[idx].pin_count == 0 && !state.meta[idx].dirty {
                state.page_table.remove(&old_page);
                state.meta[idx].reset();
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(
                    page_id = old_page.as_u64(),
                    frame_id = idx,
                    "evicted page after write-back"
                );
                return Ok((state, frame_id));
            }
            // Pinned or re-dirtied while the latch was released: the
            // page is hot again, pick another victim.
            if state.meta[idx].pin_count == 0 {
                state.replacer.unpin(frame_id);
            }
        }
    }

    /// Writes a page's bytes to disk, forcing the log first.
    fn write_back(&self, wb: &WriteBack, data: &[u8]) -> BufferResult<()> {
        if let Some(log) = &self.log {
            if wb.lsn.is_valid() {
                log.flush_until(wb.lsn);
            }
        }
        self.disk.write_page(wb.page_id, data)?;
        self.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Unwinds a provisioning whose disk read failed.
    ///
    /// If the placeholder mapping picked up concurrent pins, it stays
    /// resident (clean, zeroed); otherwise the frame returns to the free
    /// list.
    fn abort_provision(&self, page_id: PageId, frame_id: FrameId) {
        let mut state = self.state.lock();
        let idx = frame_id.index();
        if state.meta[idx].pin_count > 1 {
            state.meta[idx].pin_count -= 1;
            return;
        }
        state.page_table.remove(&page_id);
        state.meta[idx].reset();
        state.free_list.push_back(frame_id);
    }

    /// Shared unpin path for the public operation and guard drops.
    pub(crate) fn finish_unpin(&self, page_id: PageId, is_dirty: bool, lsn: Option<Lsn>) -> bool {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let idx = frame_id.index();
        if state.meta[idx].pin_count == 0 {
            return false;
        }

        state.meta[idx].pin_count -= 1;
        if is_dirty {
            state.meta[idx].dirty = true;
        }
        if let Some(lsn) = lsn {
            if lsn > state.meta[idx].lsn {
                state.meta[idx].lsn = lsn;
            }
        }
        if state.meta[idx].pin_count == 0 {
            state.replacer.unpin(frame_id);
        }
        true
    }

    /// Drop path for write guards.
    pub(crate) fn complete_write(&self, page_id: PageId, modified: bool, lsn: Option<Lsn>) {
        self.finish_unpin(page_id, modified, lsn);
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("num_frames", &self.num_frames)
            .field("instance_index", &self.instance_index)
            .field("num_instances", &self.num_instances)
            .field("pages_resident", &self.state.lock().page_table.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::buffer::eviction::ReplacerPolicy;
    use crate::disk::{DiskError, DiskResult, FileDiskManager};
    use parking_lot::Mutex;
    use tempfile::tempdir;

    fn open_pool(
        dir: &tempfile::TempDir,
        frames: usize,
        policy: ReplacerPolicy,
    ) -> BufferPool {
        let disk = Arc::new(FileDiskManager::open(dir.path().join("pool.db")).unwrap());
        let config = BufferPoolConfig::new(frames).with_policy(policy);
        BufferPool::new(config, disk).unwrap()
    }

    #[test]
    fn test_write_survives_restart() {
        let dir = tempdir().unwrap();
        let page_id;
        {
            let pool = open_pool(&dir, 3, ReplacerPolicy::Clock);
            {
                let mut guard = pool.new_page().unwrap();
                page_id = guard.page_id();
                guard.data_mut()[0] = b'A';
            }
            assert_eq!(pool.flush_all().unwrap(), 1);
        }

        // Reopen over the same file: the byte came back from disk.
        let pool = open_pool(&dir, 3, ReplacerPolicy::Clock);
        let guard = pool.fetch_page(page_id).unwrap();
        assert_eq!(guard.data()[0], b'A');
    }

    #[test]
    fn test_eviction_of_clean_page_is_writeless() {
        let dir = tempdir().unwrap();
        let pool = open_pool(&dir, 3, ReplacerPolicy::Clock);

        let g0 = pool.new_page().unwrap();
        let p0 = g0.page_id();
        let _g1 = pool.new_page().unwrap();
        let _g2 = pool.new_page().unwrap();

        drop(g0);
        pool.flush_page(p0).unwrap();
        assert_eq!(pool.stats().flushes, 1);

        // The only evictable frame is p0's; it is clean, so the fourth
        // page provisions without another disk write.
        let g3 = pool.new_page().unwrap();
        let p3 = g3.page_id();
        assert_eq!(pool.stats().evictions, 1);
        assert_eq!(pool.stats().flushes, 1);
        assert!(!pool.contains(p0));

        // Bring p0 back: it reads as the zeros it was flushed with.
        drop(g3);
        let guard = pool.fetch_page(p0).unwrap();
        assert!(guard.data().iter().all(|&b| b == 0));
        assert!(!pool.contains(p3));
    }

    #[test]
    fn test_all_pinned_exhausts_pool() {
        let dir = tempdir().unwrap();
        let pool = open_pool(&dir, 3, ReplacerPolicy::Clock);

        let _g0 = pool.new_page().unwrap();
        let _g1 = pool.new_page().unwrap();
        let _g2 = pool.new_page().unwrap();

        assert!(matches!(
            pool.new_page().unwrap_err(),
            BufferError::NoFreeFrames
        ));
        assert!(matches!(
            pool.fetch_page(PageId::new(99)).unwrap_err(),
            BufferError::NoFreeFrames
        ));
    }

    #[test]
    fn test_delete_page() {
        let dir = tempdir().unwrap();
        let pool = open_pool(&dir, 3, ReplacerPolicy::Clock);

        let g0 = pool.new_page().unwrap();
        let p0 = g0.page_id();

        // Pinned: refused.
        assert!(!pool.delete_page(p0).unwrap());

        drop(g0);
        assert!(pool.delete_page(p0).unwrap());
        assert!(!pool.contains(p0));

        // Idempotent on the second call.
        assert!(pool.delete_page(p0).unwrap());

        // The freed frame is reused without an eviction.
        let _g = pool.new_page().unwrap();
        assert_eq!(pool.stats().evictions, 0);
    }

    #[test]
    fn test_deleted_frame_is_not_victimized() {
        let dir = tempdir().unwrap();
        let pool = open_pool(&dir, 1, ReplacerPolicy::Lru);

        let g0 = pool.new_page().unwrap();
        let p0 = g0.page_id();
        drop(g0);
        assert!(pool.delete_page(p0).unwrap());

        // The single frame came back through the free list, not the
        // replacer, and can host a new page.
        let g1 = pool.new_page().unwrap();
        assert_eq!(pool.stats().evictions, 0);
        drop(g1);
    }

    #[test]
    fn test_dirty_page_written_back_on_eviction() {
        let dir = tempdir().unwrap();
        let pool = open_pool(&dir, 1, ReplacerPolicy::Clock);

        let p0 = {
            let mut guard = pool.new_page().unwrap();
            guard.data_mut()[0] = b'A';
            guard.page_id()
        };

        // Fetching another page evicts p0 and must flush it first.
        let p1 = PageId::new(1);
        {
            let _guard = pool.fetch_page(p1).unwrap();
        }
        assert_eq!(pool.stats().flushes, 1);
        assert!(!pool.contains(p0));

        // p1's frame is clean, so bringing p0 back writes nothing more.
        let guard = pool.fetch_page(p0).unwrap();
        assert_eq!(guard.data()[0], b'A');
        assert_eq!(pool.stats().flushes, 1);
    }

    #[test]
    fn test_lru_policy_evicts_least_recently_unpinned() {
        let dir = tempdir().unwrap();
        let pool = open_pool(&dir, 3, ReplacerPolicy::Lru);

        let mut ids = Vec::new();
        for _ in 0..3 {
            let guard = pool.new_page().unwrap();
            ids.push(guard.page_id());
        }

        // Touch p0 again so p1 becomes the oldest.
        {
            let _guard = pool.fetch_page(ids[0]).unwrap();
        }

        {
            let _guard = pool.fetch_page(PageId::new(7)).unwrap();
        }
        assert!(pool.contains(ids[0]));
        assert!(!pool.contains(ids[1]));
        assert!(pool.contains(ids[2]));
    }

    #[test]
    fn test_unpin_errors() {
        let dir = tempdir().unwrap();
        let pool = open_pool(&dir, 3, ReplacerPolicy::Clock);

        // Unknown page.
        assert!(!pool.unpin_page(PageId::new(12), false));

        let p0 = {
            let guard = pool.new_page().unwrap();
            guard.page_id()
        };
        // The guard already unpinned on drop.
        assert!(!pool.unpin_page(p0, false));
    }

    #[test]
    fn test_unpin_dirty_is_sticky() {
        let dir = tempdir().unwrap();
        let pool = open_pool(&dir, 3, ReplacerPolicy::Clock);

        let p0 = {
            let mut guard = pool.new_page().unwrap();
            guard.data_mut()[0] = 1;
            guard.page_id()
        };
        assert_eq!(pool.stats().dirty_frames, 1);

        // A clean unpin does not wash the dirty bit out.
        {
            let _guard = pool.fetch_page(p0).unwrap();
        }
        assert_eq!(pool.stats().dirty_frames, 1);

        pool.flush_page(p0).unwrap();
        assert_eq!(pool.stats().dirty_frames, 0);
    }

    #[test]
    fn test_flush_page_results() {
        let dir = tempdir().unwrap();
        let pool = open_pool(&dir, 3, ReplacerPolicy::Clock);

        // Non-resident page.
        assert!(!pool.flush_page(PageId::new(5)).unwrap());

        let p0 = {
            let guard = pool.new_page().unwrap();
            guard.page_id()
        };
        assert!(pool.flush_page(p0).unwrap());
        assert_eq!(pool.stats().flushes, 1);

        // Clean flush is an idempotent no-op.
        assert!(pool.flush_page(p0).unwrap());
        assert_eq!(pool.stats().flushes, 1);
    }

    #[test]
    fn test_flush_pinned_page() {
        let dir = tempdir().unwrap();
        let pool = open_pool(&dir, 3, ReplacerPolicy::Clock);

        let mut guard = pool.new_page().unwrap();
        guard.data_mut()[0] = 9;
        let p0 = guard.page_id();

        assert!(pool.flush_page(p0).unwrap());
        assert_eq!(pool.stats().flushes, 1);
        assert_eq!(pool.stats().dirty_frames, 0);
        drop(guard);
    }

    #[test]
    fn test_fetch_hit_statistics() {
        let dir = tempdir().unwrap();
        let pool = open_pool(&dir, 3, ReplacerPolicy::Clock);

        let p0 = {
            let guard = pool.new_page().unwrap();
            guard.page_id()
        };

        for _ in 0..4 {
            let _guard = pool.fetch_page(p0).unwrap();
        }
        let stats = pool.stats();
        assert_eq!(stats.fetches, 4);
        assert_eq!(stats.hits, 4);
        assert_eq!(stats.misses, 0);
        assert!((stats.hit_ratio() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_page_id_rejected() {
        let dir = tempdir().unwrap();
        let pool = open_pool(&dir, 3, ReplacerPolicy::Clock);
        assert!(matches!(
            pool.fetch_page(PageId::INVALID).unwrap_err(),
            BufferError::InvalidPageId { .. }
        ));
    }

    #[test]
    fn test_sharded_allocation_stays_in_residue_class() {
        let dir = tempdir().unwrap();
        let disk = Arc::new(FileDiskManager::open(dir.path().join("pool.db")).unwrap());
        let pool =
            BufferPool::new_sharded(BufferPoolConfig::new(4), 3, 2, Arc::clone(&disk) as Arc<dyn DiskManager>)
                .unwrap();

        let mut ids = Vec::new();
        for _ in 0..3 {
            let guard = pool.new_page().unwrap();
            ids.push(guard.page_id().as_u64());
        }
        assert_eq!(ids, vec![2, 5, 8]);
    }

    struct RecordingLog {
        flushed: Mutex<Vec<Lsn>>,
    }

    impl RecordingLog {
        fn new() -> Self {
            Self {
                flushed: Mutex::new(Vec::new()),
            }
        }
    }

    impl LogManager for RecordingLog {
        fn flush_until(&self, lsn: Lsn) {
            self.flushed.lock().push(lsn);
        }
    }

    #[test]
    fn test_log_forced_before_dirty_write_back() {
        let dir = tempdir().unwrap();
        let disk = Arc::new(FileDiskManager::open(dir.path().join("pool.db")).unwrap());
        let log = Arc::new(RecordingLog::new());
        let pool = BufferPool::new(BufferPoolConfig::new(1), disk)
            .unwrap()
            .with_log_manager(Arc::clone(&log) as Arc<dyn LogManager>);

        let p0 = {
            let mut guard = pool.new_page().unwrap();
            guard.data_mut()[0] = 1;
            guard.set_lsn(Lsn::new(42));
            guard.page_id()
        };

        // Evicting p0 forces the log to its LSN first.
        {
            let _guard = pool.fetch_page(PageId::new(1)).unwrap();
        }
        assert_eq!(*log.flushed.lock(), vec![Lsn::new(42)]);

        // An explicit flush of a re-dirtied page forces the newer LSN.
        {
            let mut guard = pool.fetch_page_for_write(p0).unwrap();
            guard.data_mut()[0] = 2;
            guard.set_lsn(Lsn::new(43));
        }
        pool.flush_page(p0).unwrap();
        assert_eq!(*log.flushed.lock(), vec![Lsn::new(42), Lsn::new(43)]);
    }

    /// File-backed disk manager whose writes can be made to fail.
    struct FailingDisk {
        inner: FileDiskManager,
        fail_writes: AtomicBool,
    }

    impl FailingDisk {
        fn open(path: impl AsRef<std::path::Path>) -> Self {
            Self {
                inner: FileDiskManager::open(path).unwrap(),
                fail_writes: AtomicBool::new(false),
            }
        }
    }

    impl DiskManager for FailingDisk {
        fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()> {
            self.inner.read_page(page_id, buf)
        }

        fn write_page(&self, page_id: PageId, buf: &[u8]) -> DiskResult<()> {
            if self.fail_writes.load(Ordering::Relaxed) {
                return Err(DiskError::Io {
                    source: std::io::Error::new(
                        std::io::ErrorKind::Other,
                        "injected write failure",
                    ),
                });
            }
            self.inner.write_page(page_id, buf)
        }

        fn allocate_page(&self) -> DiskResult<PageId> {
            self.inner.allocate_page()
        }

        fn deallocate_page(&self, page_id: PageId) -> DiskResult<()> {
            self.inner.deallocate_page(page_id)
        }
    }

    #[test]
    fn test_failed_eviction_write_back_keeps_page() {
        let dir = tempdir().unwrap();
        let disk = Arc::new(FailingDisk::open(dir.path().join("pool.db")));
        let pool = BufferPool::new(
            BufferPoolConfig::new(1),
            Arc::clone(&disk) as Arc<dyn DiskManager>,
        )
        .unwrap();

        let p0 = {
            let mut guard = pool.new_page().unwrap();
            guard.data_mut()[0] = b'A';
            guard.page_id()
        };

        // Eviction needs to write p0 back; the write fails, the error
        // surfaces, and p0 keeps its bytes, mapping, and dirty bit.
        disk.fail_writes.store(true, Ordering::Relaxed);
        let err = pool.fetch_page(PageId::new(1)).unwrap_err();
        assert!(matches!(err, BufferError::Disk(_)));
        assert!(pool.contains(p0));
        assert_eq!(pool.stats().dirty_frames, 1);

        // Once writes succeed the page flushes and evicts normally.
        disk.fail_writes.store(false, Ordering::Relaxed);
        {
            let _guard = pool.fetch_page(PageId::new(1)).unwrap();
        }
        assert!(!pool.contains(p0));

        let guard = pool.fetch_page(p0).unwrap();
        assert_eq!(guard.data()[0], b'A');
    }

    #[test]
    fn test_failed_flush_keeps_page_dirty() {
        let dir = tempdir().unwrap();
        let disk = Arc::new(FailingDisk::open(dir.path().join("pool.db")));
        let pool = BufferPool::new(
            BufferPoolConfig::new(2),
            Arc::clone(&disk) as Arc<dyn DiskManager>,
        )
        .unwrap();

        let p0 = {
            let mut guard = pool.new_page().unwrap();
            guard.data_mut()[0] = 7;
            guard.page_id()
        };

        disk.fail_writes.store(true, Ordering::Relaxed);
        let err = pool.flush_page(p0).unwrap_err();
        assert!(matches!(err, BufferError::Disk(_)));
        assert_eq!(pool.stats().dirty_frames, 1);
        assert_eq!(pool.stats().flushes, 0);

        disk.fail_writes.store(false, Ordering::Relaxed);
        assert!(pool.flush_page(p0).unwrap());
        assert_eq!(pool.stats().dirty_frames, 0);
        assert_eq!(pool.stats().flushes, 1);
    }

    #[test]
    fn test_concurrent_fetch_and_write() {
        use std::thread;

        let dir = tempdir().unwrap();
        let disk = Arc::new(FileDiskManager::open(dir.path().join("pool.db")).unwrap());
        let pool = Arc::new(
            BufferPool::new(BufferPoolConfig::new(8), disk).unwrap(),
        );

        // Materialize 16 pages so every thread works over the same ids.
        let ids: Vec<PageId> = (0..16)
            .map(|_| {
                let guard = pool.new_page().unwrap();
                guard.page_id()
            })
            .collect();

        let mut handles = Vec::new();
        for t in 0..4 {
            let pool = Arc::clone(&pool);
            let ids = ids.clone();
            handles.push(thread::spawn(move || {
                for i in 0..200 {
                    let page_id = ids[(t * 7 + i) % ids.len()];
                    let mut guard = pool.fetch_page_for_write(page_id).unwrap();
                    let tag = page_id.as_u64() as u8;
                    guard.data_mut()[0] = tag;
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Every page carries its own tag regardless of interleaving.
        for page_id in ids {
            let guard = pool.fetch_page(page_id).unwrap();
            assert_eq!(guard.data()[0], page_id.as_u64() as u8);
        }
    }

    #[test]
    fn test_flush_all_counts() {
        let dir = tempdir().unwrap();
        let pool = open_pool(&dir, 8, ReplacerPolicy::Clock);

        for _ in 0..5 {
            let _guard = pool.new_page().unwrap();
        }
        assert_eq!(pool.stats().dirty_frames, 5);
        assert_eq!(pool.flush_all().unwrap(), 5);
        assert_eq!(pool.stats().dirty_frames, 0);

        // Nothing left to write.
        assert_eq!(pool.flush_all().unwrap(), 0);
    }
}
