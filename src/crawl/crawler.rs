use super::download;
use super::types::CrawlContext;
use crate::fetch::{self, display_url};
use crate::inventory::db::{self, FileRow};
use crate::parse::{self, Listing};
use futures::future::{join_all, BoxFuture, FutureExt};
use log::{debug, error};
use std::sync::Arc;
use tokio::task::JoinHandle;
use url::Url;

/// Crawls one directory URL and everything beneath it.
///
/// At depth 0 with a root-path URL the children come from the selected
/// paths instead of a fetched listing (the landing page is a portal, not an
/// autoindex). Each depth-0 child subtree is awaited in sequence, so one
/// top-level path drains before the next fans out; below that, every
/// subdirectory is scheduled concurrently and the whole set is awaited at
/// the end.
///
/// Errors inside one URL's pipeline are contained at that URL: the listing
/// is treated as empty and siblings continue.
///
/// # Arguments
///
/// * `ctx` - Shared crawl state.
/// * `url` - Directory URL to visit, trailing `/` included.
/// * `depth` - 0 for the entry point.
pub fn crawl(ctx: Arc<CrawlContext>, url: Url, depth: u32) -> BoxFuture<'static, ()> {
    async move {
        let dirs = visit(&ctx, &url, depth).await;
        if depth == 0 {
            for dir in dirs {
                crawl(Arc::clone(&ctx), dir, depth + 1).await;
            }
            return;
        }
        let tasks: Vec<JoinHandle<()>> = dirs
            .into_iter()
            .map(|dir| tokio::spawn(crawl(Arc::clone(&ctx), dir, depth + 1)))
            .collect();
        for (i, result) in join_all(tasks).await.into_iter().enumerate() {
            if let Err(e) = result {
                error!("Crawl task {} panicked: {:?}", i, e);
            }
        }
    }
    .boxed()
}

/// Processes one URL and returns the subdirectories to descend into.
async fn visit(ctx: &Arc<CrawlContext>, url: &Url, depth: u32) -> Vec<Url> {
    if depth == 0 && url.path() == "/" {
        return root_children(url, &ctx.paths);
    }
    let listing = fetch_listing(ctx, url).await;
    if listing.files.is_empty() {
        return listing.dirs;
    }
    download::download_files(ctx, &listing.files).await;
    if let Some(remote_db) = &ctx.remote_db {
        let rows: Vec<FileRow> = listing
            .files
            .iter()
            .map(|f| (f.path.clone(), Some(f.mtime_unix), Some(f.size_bytes)))
            .collect();
        let mut conn = remote_db.lock().await;
        match db::insert_files(&mut conn, &rows) {
            Ok(()) => debug!("Wrote results for source URL: {}", display_url(url)),
            Err(e) => error!("Failed to record listing {}: {:#}", display_url(url), e),
        }
    }
    listing.dirs
}

/// Root mode: the depth-1 children are the selected paths joined onto the
/// server root, nothing else.
fn root_children(url: &Url, paths: &[String]) -> Vec<Url> {
    paths
        .iter()
        .filter_map(|path| match url.join(path) {
            Ok(child) => Some(child),
            Err(e) => {
                error!("Cannot resolve {} under {}: {}", path, url, e);
                None
            }
        })
        .collect()
}

/// Fetches and parses one listing, containing all failures as an empty page.
async fn fetch_listing(ctx: &Arc<CrawlContext>, url: &Url) -> Listing {
    match fetch::fetch_html(&ctx.client, &ctx.semaphore, url).await {
        Ok(Some(body)) => parse::parse_listing(url, &body),
        Ok(None) => Listing::default(),
        Err(e) => {
            error!("Fetch failed for {}: {:#}", display_url(url), e);
            Listing::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::encode_path;

    #[test]
    fn test_root_children_are_exactly_the_selected_paths() {
        let url = Url::parse("https://example.com/").unwrap();
        let paths = vec![encode_path("每日更新/"), encode_path("电影/2023/")];
        let children = root_children(&url, &paths);
        assert_eq!(
            children,
            vec![
                Url::parse("https://example.com/%E6%AF%8F%E6%97%A5%E6%9B%B4%E6%96%B0/").unwrap(),
                Url::parse("https://example.com/%E7%94%B5%E5%BD%B1/2023/").unwrap(),
            ]
        );
    }

    #[test]
    fn test_root_children_empty_selection() {
        let url = Url::parse("https://example.com/").unwrap();
        assert!(root_children(&url, &[]).is_empty());
    }
}
