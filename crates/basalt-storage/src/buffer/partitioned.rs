//! Partitioned buffer pool.
//!
//! Spreads pages over independent [`BufferPool`] instances to cut latch
//! contention: each instance has its own latch, page table, free list,
//! and replacer. Routing is `page_id mod N`, which needs no directory -
//! every instance hands out ids in its own residue class, so a page is
//! always served by the instance that created it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use basalt_common::types::PageId;

use super::config::BufferPoolConfig;
use super::error::{BufferError, BufferResult};
use super::latch::{PageReadGuard, PageWriteGuard};
use super::pool::BufferPool;
use super::BufferPoolStats;
use crate::disk::DiskManager;
use crate::wal::LogManager;

/// A buffer pool sharded over `N` independent instances.
///
/// Exposes the same operations as a single [`BufferPool`]. Total
/// capacity is `N * config.num_frames`.
pub struct PartitionedBufferPool {
    /// The instances, indexed by residue class.
    instances: Vec<BufferPool>,
    /// Rotating cursor for `new_page`, bumped on every success so
    /// allocation load spreads over the instances.
    start_index: AtomicUsize,
}

impl PartitionedBufferPool {
    /// Creates a partitioned pool of `num_partitions` instances, each
    /// with `config.num_frames` frames.
    pub fn new(
        config: BufferPoolConfig,
        num_partitions: usize,
        disk: Arc<dyn DiskManager>,
    ) -> BufferResult<Self> {
        if num_partitions == 0 {
            return Err(BufferError::config("num_partitions must be > 0"));
        }

        let instances = (0..num_partitions)
            .map(|i| {
                BufferPool::new_sharded(
                    config.clone(),
                    num_partitions as u64,
                    i as u64,
                    Arc::clone(&disk),
                )
            })
            .collect::<BufferResult<Vec<_>>>()?;

        Ok(Self {
            instances,
            start_index: AtomicUsize::new(0),
        })
    }

    /// Attaches a write-ahead log manager to every instance.
    pub fn with_log_manager(mut self, log: Arc<dyn LogManager>) -> Self {
        self.instances = self
            .instances
            .into_iter()
            .map(|pool| pool.with_log_manager(Arc::clone(&log)))
            .collect();
        self
    }

    /// Returns the number of partitions.
    pub fn num_partitions(&self) -> usize {
        self.instances.len()
    }

    /// Returns the total number of frames across all instances.
    pub fn pool_size(&self) -> usize {
        self.instances.iter().map(BufferPool::num_frames).sum()
    }

    /// Returns the instance at `index`.
    ///
    /// Useful for per-partition statistics; routing should go through
    /// the page-id based operations instead.
    pub fn instance(&self, index: usize) -> &BufferPool {
        &self.instances[index]
    }

    /// Returns the instance responsible for `page_id`.
    fn instance_for(&self, page_id: PageId) -> &BufferPool {
        let index = page_id.shard(self.instances.len() as u64) as usize;
        &self.instances[index]
    }

    /// Fetches a page for reading from the responsible instance.
    pub fn fetch_page(&self, page_id: PageId) -> BufferResult<PageReadGuard<'_>> {
        self.instance_for(page_id).fetch_page(page_id)
    }

    /// Fetches a page for writing from the responsible instance.
    pub fn fetch_page_for_write(&self, page_id: PageId) -> BufferResult<PageWriteGuard<'_>> {
        self.instance_for(page_id).fetch_page_for_write(page_id)
    }

    /// Creates a new page on the next instance with a free frame.
    ///
    /// Instances are tried round-robin from a rotating start index;
    /// fails with [`BufferError::NoFreeFrames`] only if every instance
    /// is exhausted.
    pub fn new_page(&self) -> BufferResult<PageWriteGuard<'_>> {
        let n = self.instances.len();
        let start = self.start_index.load(Ordering::Relaxed);
        for i in 0..n {
            let index = (start + i) % n;
            match self.instances[index].new_page() {
                Ok(guard) => {
                    self.start_index.fetch_add(1, Ordering::Relaxed);
                    return Ok(guard);
                }
                Err(BufferError::NoFreeFrames) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(BufferError::NoFreeFrames)
    }

    /// Unpins a page on the responsible instance.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.instance_for(page_id).unpin_page(page_id, is_dirty)
    }

    /// Flushes a page on the responsible instance.
    pub fn flush_page(&self, page_id: PageId) -> BufferResult<bool> {
        self.instance_for(page_id).flush_page(page_id)
    }

    /// Deletes a page on the responsible instance.
    pub fn delete_page(&self, page_id: PageId) -> BufferResult<bool> {
        self.instance_for(page_id).delete_page(page_id)
    }

    /// Flushes every dirty page on every instance.
    pub fn flush_all(&self) -> BufferResult<usize> {
        let mut flushed = 0;
        for instance in &self.instances {
            flushed += instance.flush_all()?;
        }
        Ok(flushed)
    }

    /// Returns true if any instance has the page resident.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.instance_for(page_id).contains(page_id)
    }

    /// Returns counters aggregated over all instances.
    pub fn stats(&self) -> BufferPoolStats {
        let mut total = BufferPoolStats::default();
        for instance in &self.instances {
            let stats = instance.stats();
            total.fetches += stats.fetches;
            total.hits += stats.hits;
            total.misses += stats.misses;
            total.evictions += stats.evictions;
            total.flushes += stats.flushes;
            total.pinned_frames += stats.pinned_frames;
            total.dirty_frames += stats.dirty_frames;
        }
        total
    }
}

impl std::fmt::Debug for PartitionedBufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionedBufferPool")
            .field("num_partitions", &self.instances.len())
            .field("pool_size", &self.pool_size())
            .finish()
    }
}
