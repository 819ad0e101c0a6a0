//! # basalt-common
//!
//! Common types and constants for BasaltDB.
//!
//! This crate provides the foundational pieces shared by the BasaltDB
//! storage components:
//!
//! - **Types**: typed identifiers (`PageId`, `Lsn`)
//! - **Constants**: page geometry and buffer pool defaults
//!
//! ## Example
//!
//! ```rust
//! use basalt_common::types::{Lsn, PageId};
//!
//! let page_id = PageId::new(42);
//! assert!(page_id.is_valid());
//! assert!(!Lsn::INVALID.is_valid());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod constants;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use types::{Lsn, PageId};
