//! Identifier types for the storage layer.
//!
//! Raw `u64`s for pages and log positions are easy to transpose; these
//! newtypes keep them apart and carry the small amount of arithmetic the
//! buffer pool actually does with them: locating a page in the database
//! file and routing it to the pool instance that owns its residue class.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::PAGE_SIZE;

/// Identifies a disk page.
///
/// Page ids are dense: page `n` occupies the `n`-th page-sized slot of
/// the database file, so the id doubles as a file position (see
/// [`byte_offset`](Self::byte_offset)). A partitioned pool hands out
/// ids in per-instance residue classes, so the id alone also determines
/// which instance serves the page (see [`shard`](Self::shard)).
///
/// # Example
///
/// ```rust
/// use basalt_common::types::PageId;
///
/// let page = PageId::new(42);
/// assert!(page.is_valid());
/// assert_eq!(page.shard(4), 2);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PageId(u64);

impl PageId {
    /// Sentinel for "no page": an empty frame carries this id.
    pub const INVALID: Self = Self(u64::MAX);

    /// Wraps a raw identifier.
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Unwraps to the raw identifier.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// True unless this is the [`INVALID`](Self::INVALID) sentinel.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u64::MAX
    }

    /// Byte position of this page in the database file.
    #[inline]
    pub const fn byte_offset(self) -> u64 {
        self.0 * PAGE_SIZE as u64
    }

    /// Index of the instance responsible for this page when the id
    /// space is split into `partitions` residue classes.
    #[inline]
    pub const fn shard(self, partitions: u64) -> u64 {
        self.0 % partitions
    }
}

impl fmt::Debug for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "PageId({})", self.0)
        } else {
            f.write_str("PageId(invalid)")
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for PageId {
    #[inline]
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<PageId> for u64 {
    #[inline]
    fn from(id: PageId) -> Self {
        id.as_u64()
    }
}

/// Position in the write-ahead log.
///
/// The pool records the LSN of a page's latest modification and forces
/// the log up to it before the page is written back. Zero is reserved:
/// a frame whose LSN was never set compares below every real position,
/// so tracking the maximum seen needs no special case.
///
/// # Example
///
/// ```rust
/// use basalt_common::types::Lsn;
///
/// assert!(Lsn::INVALID < Lsn::new(1));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Lsn(u64);

impl Lsn {
    /// Sentinel for "never modified"; below every real position.
    pub const INVALID: Self = Self(0);

    /// Wraps a raw log position.
    #[inline]
    pub const fn new(lsn: u64) -> Self {
        Self(lsn)
    }

    /// Unwraps to the raw log position.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// True unless this is the [`INVALID`](Self::INVALID) sentinel.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Debug for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "Lsn({})", self.0)
        } else {
            f.write_str("Lsn(invalid)")
        }
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for Lsn {
    #[inline]
    fn from(lsn: u64) -> Self {
        Self(lsn)
    }
}

impl From<Lsn> for u64 {
    #[inline]
    fn from(lsn: Lsn) -> Self {
        lsn.as_u64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_validity() {
        assert!(PageId::new(0).is_valid());
        assert!(PageId::new(42).is_valid());
        assert!(!PageId::INVALID.is_valid());
    }

    #[test]
    fn test_page_id_byte_offset() {
        assert_eq!(PageId::new(0).byte_offset(), 0);
        assert_eq!(PageId::new(3).byte_offset(), 3 * PAGE_SIZE as u64);
    }

    #[test]
    fn test_page_id_shard() {
        // Ids allocated by instance k of n stay in residue class k.
        for id in [2u64, 5, 8, 11] {
            assert_eq!(PageId::new(id).shard(3), 2);
        }
        assert_eq!(PageId::new(7).shard(1), 0);
    }

    #[test]
    fn test_lsn_ordering() {
        assert!(Lsn::INVALID < Lsn::new(1));
        assert!(Lsn::new(1) < Lsn::new(2));
        assert!(!Lsn::INVALID.is_valid());
        assert!(Lsn::new(1).is_valid());
    }

    #[test]
    fn test_debug_format() {
        assert_eq!(format!("{:?}", PageId::new(7)), "PageId(7)");
        assert_eq!(format!("{:?}", PageId::INVALID), "PageId(invalid)");
        assert_eq!(format!("{:?}", Lsn::new(9)), "Lsn(9)");
        assert_eq!(format!("{:?}", Lsn::INVALID), "Lsn(invalid)");
    }

    #[test]
    fn test_conversions() {
        let page: PageId = 9u64.into();
        assert_eq!(u64::from(page), 9);
        assert_eq!(format!("{page}"), "9");

        let lsn: Lsn = 11u64.into();
        assert_eq!(u64::from(lsn), 11);
        assert_eq!(format!("{lsn}"), "11");
    }
}
