use super::types::CrawlContext;
use crate::parse::RemoteFile;
use anyhow::{Context, Result};
use futures::future::join_all;
use log::{debug, error, info};
use reqwest::StatusCode;
use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tokio::task::JoinHandle;

/// In-flight download tasks per listing before the crawler waits for the
/// batch; bounds memory for directories with thousands of files.
const DOWNLOAD_BATCH_LIMIT: usize = 100;

/// Decides whether a remote file must be (re)fetched.
///
/// A local copy is fresh when its size equals the listing's and its mtime is
/// no older than the listing's. `.nfo` files are never refreshed while NFO
/// download is disabled, but a missing one is still fetched (the existence
/// check comes first).
///
/// # Arguments
///
/// * `file` - The listing row.
/// * `media` - The media root.
/// * `nfo` - Whether `.nfo` downloads are enabled.
pub fn need_download(file: &RemoteFile, media: &Path, nfo: bool) -> bool {
    let local = media.join(file.path.trim_start_matches('/'));
    if !local.exists() {
        debug!("{} doesn't exist yet", local.display());
        return true;
    }
    if file.path.ends_with(".nfo") && !nfo {
        return false;
    }
    let meta = match local.metadata() {
        Ok(meta) => meta,
        Err(e) => {
            debug!("Cannot stat {}: {}", local.display(), e);
            return true;
        }
    };
    let current_size = meta.len() as i64;
    let current_mtime = mtime_unix(&meta);
    if current_size == file.size_bytes && file.mtime_unix <= current_mtime {
        return false;
    }
    debug!(
        "{} is stale: size {} -> {}, mtime {} -> {}",
        file.path, current_size, file.size_bytes, current_mtime, file.mtime_unix
    );
    true
}

/// Downloads the stale subset of one listing's files.
///
/// Tasks share the global semaphore with listing fetches; at most
/// [`DOWNLOAD_BATCH_LIMIT`] tasks are kept in flight before the current
/// batch is awaited.
pub async fn download_files(ctx: &Arc<CrawlContext>, files: &[RemoteFile]) {
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();
    for file in files {
        if !need_download(file, &ctx.media, ctx.nfo) {
            continue;
        }
        tasks.push(tokio::spawn(download(Arc::clone(ctx), file.clone())));
        if tasks.len() >= DOWNLOAD_BATCH_LIMIT {
            join_downloads(&mut tasks).await;
        }
    }
    join_downloads(&mut tasks).await;
}

/// Awaits and drains the current batch, logging panicked tasks.
async fn join_downloads(tasks: &mut Vec<JoinHandle<()>>) {
    for (i, result) in join_all(tasks.drain(..)).await.into_iter().enumerate() {
        if let Err(e) = result {
            error!("Download task {} panicked: {:?}", i, e);
        }
    }
}

/// Downloads one remote file to its mirror path. Failures are logged and
/// the file is skipped; a miss here is recoverable on the next run.
async fn download(ctx: Arc<CrawlContext>, file: RemoteFile) {
    let Ok(_permit) = Arc::clone(&ctx.semaphore).acquire_owned().await else {
        return;
    };
    if let Err(e) = download_inner(&ctx, &file).await {
        error!("Download exception for {}: {:#}", file.path, e);
    }
}

/// The fallible part of a single download.
async fn download_inner(ctx: &CrawlContext, file: &RemoteFile) -> Result<()> {
    let resp = ctx
        .client
        .get(file.abs_url.clone())
        .send()
        .await
        .context("request failed")?;
    if resp.status() != StatusCode::OK {
        error!(
            "Failed to download: {} [Response code: {}]",
            file.path,
            resp.status()
        );
        return Ok(());
    }
    let body = resp.bytes().await.context("read body")?;
    let target = ctx.media.join(file.path.trim_start_matches('/'));
    if let Some(parent) = target.parent() {
        create_dirs(parent).await?;
    }
    debug!("Starting to write file: {}", file.path);
    tokio::fs::write(&target, &body)
        .await
        .with_context(|| format!("write {}", target.display()))?;
    make_world_writable(&target).await;
    info!("Downloaded: {}", file.path);
    Ok(())
}

/// Creates intermediate directories world-writable; concurrent creation by
/// sibling downloads must succeed-if-exists, which `recursive` provides.
async fn create_dirs(path: &Path) -> Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o777);
    builder
        .create(path)
        .await
        .with_context(|| format!("create {}", path.display()))
}

/// Opens the mirror tree to every consumer of the media root.
#[cfg(unix)]
async fn make_world_writable(path: &Path) {
    use std::fs::Permissions;
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = tokio::fs::set_permissions(path, Permissions::from_mode(0o777)).await {
        debug!("chmod {} failed: {}", path.display(), e);
    }
}

#[cfg(not(unix))]
async fn make_world_writable(_path: &Path) {}

/// Local mtime in whole seconds since the epoch.
fn mtime_unix(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
