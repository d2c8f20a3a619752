//! # Run Configuration
//!
//! This module holds the static knowledge about the remote library the
//! synchronizer consumes: the canonical top-level paths, the fallback server
//! pool, the filter sets applied while indexing the local tree, and the
//! User-Agent the gateway expects from browsers. It also implements the
//! `--paths` subset selection (integer bitmap or prefix file).
//!
//! Paths are stored here in their human-readable form and percent-encoded
//! once at selection time; the encoded form is what gets joined onto listing
//! URLs, while the decoded form is what gets joined onto the media root.

use anyhow::{bail, Context, Result};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fs;
use std::path::Path;

/// Characters escaped when a configured path is turned into its URL form:
/// everything except unreserved characters and the path separator.
const PATH_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Every top-level path of the remote tree, in canonical order. The
/// `--paths` bitmap indexes this list high-bit-first.
pub const ALL_PATHS: [&str; 10] = [
    "PikPak/",
    "动漫/",
    "每日更新/",
    "电影/",
    "电视剧/",
    "纪录片/",
    "纪录片（已刮削）/",
    "综艺/",
    "音乐/",
    "📺画质演示测试（4K，8K，HDR，Dolby）/",
];

/// Subset mirrored by default when neither `--all` nor `--paths` is given.
pub const DEFAULT_PATHS: [&str; 4] = ["每日更新/", "电影/2023/", "纪录片（已刮削）/", "音乐/"];

/// Fallback pool of base URLs, probed in shuffled order.
pub const SERVER_POOL: [&str; 3] = [
    "https://emby.xiaoya.pro/",
    "https://icyou.eu.org/",
    "https://lanyuewan.cn/",
];

/// Substring an index page must contain before a pool member counts as
/// live; placeholder pages answer 200 without it.
pub const POOL_SENTINEL: &str = "每日更新";

/// Directory basenames never indexed, crawled into, or swept.
pub const EXCLUDED_FOLDERS: [&str; 1] = [".sync"];

/// Subtitle extensions kept out of the local inventory, so sidecar files
/// survive a purge even when the remote tree lacks them.
pub const EXCLUDED_EXTENSIONS: [&str; 3] = [".ass", ".srt", ".ssa"];

/// Auxiliary cloud-drive folder expected directly under the media root.
pub const AUX_FOLDER: &str = "115";

/// Browser User-Agent for the liveness probe and scan-list retrieval; the
/// gateway serves library-default agents an error page.
pub const PROBE_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/96.0.4664.110 Safari/537.36";

/// Percent-encodes a configured path for use in URLs.
pub fn encode_path(path: &str) -> String {
    utf8_percent_encode(path, PATH_ESCAPE).to_string()
}

/// Percent-decodes an encoded path back to its filesystem form.
///
/// # Returns
///
/// * `Ok(String)` - The decoded path.
/// * `Err(anyhow::Error)` - The decoded bytes are not valid UTF-8.
pub fn decode_path(path: &str) -> Result<String> {
    Ok(percent_decode_str(path)
        .decode_utf8()
        .with_context(|| format!("path {:?} does not decode to UTF-8", path))?
        .into_owned())
}

/// Resolves the selected paths for a run, percent-encoded.
///
/// `--all` selects the full canonical list. Otherwise `selector` (the
/// `--paths` argument) may be an integer bitmap over the canonical list or
/// the path of a file listing one unencoded path per line; with no selector
/// the default subset applies.
///
/// # Arguments
///
/// * `all` - Whether `--all` was given.
/// * `selector` - The raw `--paths` argument, if any.
///
/// # Returns
///
/// * `Ok(Vec<String>)` - The encoded selected paths, each ending in `/`.
/// * `Err(anyhow::Error)` - The selector is out of range or names unknown paths.
pub fn select_paths(all: bool, selector: Option<&str>) -> Result<Vec<String>> {
    let canonical: Vec<String> = ALL_PATHS.iter().map(|p| encode_path(p)).collect();
    if all {
        return Ok(canonical);
    }
    match selector {
        None => Ok(DEFAULT_PATHS.iter().map(|p| encode_path(p)).collect()),
        Some(selector) => match selector.parse::<u32>() {
            Ok(bitmap) => bitmap_paths(bitmap, &canonical),
            Err(_) => paths_from_file(Path::new(selector), &canonical),
        },
    }
}

/// Decodes an integer bitmap into a path subset.
///
/// The bitmap is read high-bit-first across the canonical list: with `n`
/// known paths, the bit of weight `2^(n-1)` selects path 0.
fn bitmap_paths(bitmap: u32, canonical: &[String]) -> Result<Vec<String>> {
    let n = canonical.len();
    if bitmap == 0 || bitmap >= (1u32 << n) {
        bail!("path bitmap {} is out of range for {} known paths", bitmap, n);
    }
    let mut selected = Vec::new();
    for (i, path) in canonical.iter().enumerate() {
        if bitmap & (1u32 << (n - 1 - i)) != 0 {
            selected.push(path.clone());
        }
    }
    Ok(selected)
}

/// Reads a path subset from a file of unencoded paths, one per line.
///
/// Each non-empty line must, once encoded, extend one of the canonical
/// top-level paths (deeper paths like `电影/2023/` are accepted); any other
/// line aborts the run.
fn paths_from_file(file: &Path, canonical: &[String]) -> Result<Vec<String>> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("cannot read paths file {}", file.display()))?;
    let mut selected = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let encoded = encode_path(line);
        if !canonical.iter().any(|p| encoded.starts_with(p.as_str())) {
            bail!("{:?} does not match any known top-level path", line);
        }
        selected.push(encoded);
    }
    if selected.is_empty() {
        bail!("paths file {} selects nothing", file.display());
    }
    Ok(selected)
}
