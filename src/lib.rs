//! # Media Mirror Synchronizer Library
//!
//! This library provides functionality to incrementally mirror a remote
//! media library served as an HTTP autoindex tree: crawl its directory
//! listings, download missing or stale files, record the remote inventory,
//! and purge local files that disappeared remotely, within safety bounds.
//!
//! ## Components
//!
//! - **config**: Canonical remote paths, the server pool, filter sets, and
//!   `--paths` subset selection.
//! - **fetch**: The shared HTTP client, the semaphore-gated page fetch, the
//!   pool liveness probe, and the scan-list file count.
//! - **parse**: The pure HTML autoindex parser.
//! - **crawl**: The recursive crawler, the per-file freshness decision, and
//!   the downloader.
//! - **inventory**: The two single-table SQLite inventories (local tree
//!   walk, remote crawl).
//! - **reconcile**: The gap-gated purge, the empty-directory sweep, and the
//!   database rotation.
//!
//! ## Freshness
//!
//! A local file is considered up to date iff its size equals the listing's
//! and its mtime is at least the listing's; content is never hashed or
//! diffed. The purge only runs when the crawler's observed file count stays
//! within a small tolerance of the authoritative `.scan.list.gz` count, so
//! a broken crawl degrades to a no-op instead of a mass deletion.

pub mod config;
pub mod crawl;
pub mod fetch;
pub mod inventory;
pub mod parse;
pub mod reconcile;
