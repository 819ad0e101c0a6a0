//! Buffer pool configuration.

use basalt_common::{DEFAULT_POOL_FRAMES, PAGE_SIZE};

use super::eviction::ReplacerPolicy;

/// Configuration for a buffer pool instance.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of page frames in the pool.
    pub num_frames: usize,
    /// Replacement policy used to pick eviction victims.
    pub policy: ReplacerPolicy,
}

impl BufferPoolConfig {
    /// Creates a new configuration with the specified number of frames.
    pub fn new(num_frames: usize) -> Self {
        Self {
            num_frames,
            policy: ReplacerPolicy::Clock,
        }
    }

    /// Creates a configuration from a memory size in bytes.
    pub fn from_memory_size(memory_bytes: usize) -> Self {
        Self::new((memory_bytes / PAGE_SIZE).max(1))
    }

    /// Sets the replacement policy.
    pub fn with_policy(mut self, policy: ReplacerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the total memory used by the pool's page buffers.
    pub fn memory_usage(&self) -> usize {
        self.num_frames * PAGE_SIZE
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.num_frames == 0 {
            return Err("num_frames must be > 0");
        }
        Ok(())
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_FRAMES)
    }
}
