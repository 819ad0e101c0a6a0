//! Buffer pool errors.

use basalt_common::types::PageId;
use thiserror::Error;

use crate::disk::DiskError;

/// Result type for buffer pool operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur during buffer pool operations.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum BufferError {
    /// No frame can be provisioned: the free list is empty and every
    /// resident page is pinned.
    #[error("no evictable frames available, all pages are pinned")]
    NoFreeFrames,

    /// Invalid page ID.
    #[error("invalid page ID: {page_id}")]
    InvalidPageId { page_id: PageId },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// I/O error during page read or write-back.
    #[error("disk error: {0}")]
    Disk(#[from] DiskError),
}

impl BufferError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if this is a transient error that can be retried.
    ///
    /// `NoFreeFrames` clears as soon as any caller unpins.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoFreeFrames)
    }
}
