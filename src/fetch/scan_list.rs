use crate::config;
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use log::{error, info};
use regex::Regex;
use reqwest::Client;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use url::Url;

/// Cache name of the compressed listing under the media root; overwritten
/// each run.
const SCAN_LIST_CACHE: &str = ".scan.list.gz";

/// One listing line: `YYYY-MM-DD HH:MM /<path>`.
const LINE_PATTERN: &str = r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2} /(.*)$";

/// Any path containing a dot-prefixed segment.
const HIDDEN_PATTERN: &str = r"^.*?/\..*$";

/// Fetches the authoritative file count for the selected paths.
///
/// Downloads `<base>.scan.list.gz` into the media root, decompresses it
/// line by line, and counts the non-hidden files beneath the selected
/// paths. The count is what the purge gate compares the crawl against.
///
/// # Arguments
///
/// * `client` - The probe client (browser User-Agent).
/// * `base` - The picked server's root URL.
/// * `media` - The media root, used to cache the listing.
/// * `paths` - The encoded selected paths.
///
/// # Returns
///
/// The number of matching files, or `-1` when the listing cannot be
/// fetched (which later disables the purge gate).
pub async fn expected_count(client: &Client, base: &Url, media: &Path, paths: &[String]) -> i64 {
    let list_file = media.join(SCAN_LIST_CACHE);
    if let Err(e) = download_scan_list(client, base, &list_file).await {
        error!("Failed to fetch scan list: {:#}", e);
        return -1;
    }
    match count_matching(&list_file, paths) {
        Ok(count) => count,
        Err(e) => {
            error!("Failed to read scan list: {:#}", e);
            -1
        }
    }
}

/// Downloads the compressed listing to its cache location.
async fn download_scan_list(client: &Client, base: &Url, dest: &Path) -> Result<()> {
    let url = format!("{}.scan.list.gz", base);
    let resp = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("request failed for {}", url))?
        .error_for_status()
        .with_context(|| format!("bad status for {}", url))?;
    let bytes = resp.bytes().await.context("read scan list body")?;
    tokio::fs::write(dest, &bytes)
        .await
        .with_context(|| format!("write {}", dest.display()))?;
    info!("Cached scan list at {}", dest.display());
    Ok(())
}

/// Counts listing lines that name a non-hidden file under a selected path.
fn count_matching(list_file: &Path, paths: &[String]) -> Result<i64> {
    let line_re = Regex::new(LINE_PATTERN).unwrap();
    let hidden_re = Regex::new(HIDDEN_PATTERN).unwrap();
    let decoded: Vec<String> = paths
        .iter()
        .map(|p| config::decode_path(p))
        .collect::<Result<_>>()?;
    let file = File::open(list_file)
        .with_context(|| format!("open {}", list_file.display()))?;
    let reader = BufReader::new(GzDecoder::new(file));
    let mut matching = 0i64;
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("Error decoding line: {}", e);
                continue;
            }
        };
        let caps = match line_re.captures(line.trim()) {
            Some(caps) => caps,
            None => continue,
        };
        let file_path = &caps[1];
        if decoded.iter().any(|p| file_path.starts_with(p.as_str()))
            && !hidden_re.is_match(file_path)
        {
            matching += 1;
        }
    }
    Ok(matching)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::encode_path;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn write_gz(path: &Path, content: &str) {
        let file = File::create(path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn test_count_filters_prefix_and_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join(".scan.list.gz");
        write_gz(
            &list,
            concat!(
                "2024-01-01 00:00 /每日更新/a.mkv\n",
                "2024-01-01 00:00 /每日更新/show/b.mkv\n",
                "2024-01-01 00:00 /每日更新/.sync/state.mkv\n",
                "2024-01-01 00:00 /电影/x.mkv\n",
                "not a listing line\n",
            ),
        );
        let count = count_matching(&list, &[encode_path("每日更新/")]).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_count_multiple_paths() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join(".scan.list.gz");
        write_gz(
            &list,
            concat!(
                "2024-01-01 00:00 /每日更新/a.mkv\n",
                "2024-01-01 00:00 /电影/2023/x.mkv\n",
                "2024-01-01 00:00 /电影/2022/y.mkv\n",
            ),
        );
        let paths = [encode_path("每日更新/"), encode_path("电影/2023/")];
        assert_eq!(count_matching(&list, &paths).unwrap(), 2);
    }

    #[test]
    fn test_count_empty_listing() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join(".scan.list.gz");
        write_gz(&list, "");
        assert_eq!(count_matching(&list, &[encode_path("音乐/")]).unwrap(), 0);
    }
}
