//! # Parsing HTTP Autoindex Listings
//!
//! This module turns the HTML body of an autoindex page (Apache/nginx
//! style) into structured file and subdirectory records. Each anchor on the
//! page is one child entry; file anchors carry a textual tail of the form
//! `DD-Mon-YYYY HH:MM <size>` that supplies the remote mtime and size used
//! by the freshness decision.
//!
//! The parser is pure: it performs no I/O and contains every per-row failure
//! (bad timestamp, missing size column, undecodable path) by logging and
//! skipping that row.
//!
//! ## Submodules
//!
//! - **listing**: The anchor-by-anchor parser.
//! - **types**: The `RemoteFile` and `Listing` records it emits.

mod listing;
mod types;

pub use listing::parse_listing;
pub use types::{Listing, RemoteFile};
