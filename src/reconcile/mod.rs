//! # Reconciliation and Purge
//!
//! After the crawl, the local and remote inventories are compared and local
//! files that no longer exist remotely are removed. Deletion is guarded by
//! the gap gate: when the crawler's observed file count strays too far from
//! the authoritative scan-list count, the crawl is presumed broken and the
//! purge is skipped rather than data deleted.
//!
//! ## Submodules
//!
//! - **purge**: Set-difference purge, empty-directory sweep, DB rotation.

mod purge;

pub use purge::{diff_databases, purge_removed_files, rotate_databases, sweep_empty_dirs};
