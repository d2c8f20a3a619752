//! # Crawling and Mirroring
//!
//! The crawler fans out over the remote directory tree: each visited listing
//! is parsed, its stale files are downloaded, its rows are written to the
//! remote inventory, and its subdirectories are scheduled as child tasks.
//!
//! ## Scheduling
//!
//! Top-level paths are crawled one at a time, so the task queue and the
//! remote-inventory flushes stay proportional to a single subtree. Below the
//! top level every subdirectory is crawled concurrently, bounded only by the
//! global fetch semaphore. Failures inside one URL's pipeline are contained
//! at that URL; siblings are never cancelled.
//!
//! ## Submodules
//!
//! - **crawler**: The recursive fan-out scheduler.
//! - **download**: The freshness decision and the file downloader.
//! - **types**: The shared crawl context.

mod crawler;
mod download;
mod types;

pub use crawler::crawl;
pub use download::need_download;
pub use types::CrawlContext;
