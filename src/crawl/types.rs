use reqwest::Client;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};

/// Shared state threaded through every crawl and download task.
pub struct CrawlContext {
    /// Shared connection pool for listings and downloads alike.
    pub client: Client,
    /// Global GET gate; capacity is the `--count` flag.
    pub semaphore: Arc<Semaphore>,
    /// Local media root receiving the mirror.
    pub media: PathBuf,
    /// Whether `.nfo` files are downloaded.
    pub nfo: bool,
    /// Encoded selected top-level paths; in root mode these derive the
    /// depth-1 children directly.
    pub paths: Vec<String>,
    /// Remote inventory handle, present when this run records or purges.
    /// The mutex serializes the per-listing insert+commit critical section.
    pub remote_db: Option<Mutex<Connection>>,
}
