//! # Inventory Databases
//!
//! Both sides of the reconciliation are recorded in single-table SQLite
//! files: `.localfiles.db` is built by walking the selected sub-trees of the
//! media root, `.tempfiles.db` is filled by the crawler as listings arrive.
//! The shared table shape is `files(filename TEXT, timestamp INTEGER NULL,
//! filesize INTEGER NULL)`; `filename` is the comparison key and duplicates
//! are collapsed when the set is read back.
//!
//! ## Submodules
//!
//! - **db**: Open, batch-insert, and read the `files` table.
//! - **local**: The local inventory builder.

pub mod db;
mod local;

pub use local::build;
