//! # HTTP Fetching
//!
//! This module owns every outbound request of the synchronizer: the shared
//! crawl/download client with its process-wide concurrency semaphore, the
//! pool-member liveness probe, and the retrieval of the authoritative
//! `.scan.list.gz` file count.
//!
//! ## Concurrency
//!
//! One `tokio::sync::Semaphore` of capacity `--count` gates every GET issued
//! through [`fetch_html`] and the downloader; the permit is held until the
//! response body is fully read, which is the sole back-pressure mechanism.
//!
//! ## Submodules
//!
//! - **client**: Client construction and the semaphore-gated page fetch.
//! - **pool**: Server selection from the fallback pool.
//! - **scan_list**: The expected-count fetcher feeding the purge gate.

mod client;
mod pool;
mod scan_list;

pub use client::{build_client, build_probe_client, display_url, fetch_html};
pub use pool::pick_server;
pub use scan_list::expected_count;
