use super::types::{Listing, RemoteFile};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::error;
use percent_encoding::percent_decode_str;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Date/time format of the listing tail. `%b` is chrono's built-in English
/// month table, so the host locale cannot change the parse.
const LISTING_TIME_FORMAT: &str = "%d-%b-%Y %H:%M";

/// Anchors that never describe listing content.
const PARENT_LINK: &str = "../";
const SCAN_LIST_LINK: &str = "scan.list";

/// Parses one autoindex page into its files and subdirectories.
///
/// Anchors ending in `/` become subdirectory URLs; every other anchor is
/// expected to be followed by a `DD-Mon-YYYY HH:MM <size>` text tail and
/// becomes a [`RemoteFile`]. The parent link and the `scan.list` sentinel
/// are ignored. A row whose tail cannot be parsed is logged and skipped
/// without aborting the rest of the page.
///
/// # Arguments
///
/// * `base` - The URL the page was fetched from; hrefs resolve against it.
/// * `html` - The page body.
///
/// # Examples
///
/// ```rust
/// use url::Url;
/// use emd::parse::parse_listing;
///
/// let base = Url::parse("https://example.com/a/").unwrap();
/// let listing = parse_listing(
///     &base,
///     r#"<a href="b/">b/</a>  <a href="c.mkv">c.mkv</a> 01-Jan-2024 00:00  42"#,
/// );
/// assert_eq!(listing.dirs[0].as_str(), "https://example.com/a/b/");
/// assert_eq!(listing.files[0].path, "/a/c.mkv");
/// ```
pub fn parse_listing(base: &Url, html: &str) -> Listing {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a").unwrap();
    let mut listing = Listing::default();
    for element in document.select(&selector) {
        let href = match element.value().attr("href") {
            Some(href) => href,
            None => continue,
        };
        if href == PARENT_LINK || href == SCAN_LIST_LINK {
            continue;
        }
        let abs = match base.join(href) {
            Ok(url) => url,
            Err(e) => {
                error!("Unresolvable href {:?} under {}: {}", href, base, e);
                continue;
            }
        };
        if href.ends_with('/') {
            listing.dirs.push(abs);
            continue;
        }
        match parse_file_row(&element, abs) {
            Ok(file) => listing.files.push(file),
            Err(e) => error!("Skipping listing row {:?}: {:#}", href, e),
        }
    }
    listing
}

/// Parses the text tail following a file anchor into a [`RemoteFile`].
fn parse_file_row(element: &ElementRef, abs: Url) -> Result<RemoteFile> {
    let path = percent_decode_str(abs.path())
        .decode_utf8()
        .context("path does not decode to UTF-8")?
        .into_owned();
    let tail = element
        .next_sibling()
        .and_then(|node| node.value().as_text().map(|text| text.to_string()))
        .context("no text tail after anchor")?;
    let mut columns = tail.split_whitespace();
    let date = columns.next().context("missing date column")?;
    let time = columns.next().context("missing time column")?;
    let size = columns.next().context("missing size column")?;
    let mtime_unix = NaiveDateTime::parse_from_str(&format!("{} {}", date, time), LISTING_TIME_FORMAT)
        .with_context(|| format!("bad timestamp {:?} {:?}", date, time))?
        .and_utc()
        .timestamp();
    let size_bytes = size
        .parse::<i64>()
        .with_context(|| format!("bad size {:?}", size))?;
    Ok(RemoteFile {
        abs_url: abs,
        path,
        mtime_unix,
        size_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/a/").unwrap()
    }

    const PAGE: &str = concat!(
        r#"<html><body><h1>Index of /a/</h1><hr><pre>"#,
        "<a href=\"../\">../</a>\n",
        "<a href=\"shows/\">shows/</a>                 09-Oct-2015 16:12       -\n",
        "<a href=\"movie.mkv\">movie.mkv</a>           01-Jan-2024 00:00     2610000\n",
        "<a href=\"%E5%8A%A8%E6%BC%AB.nfo\">&#21160;&#28459;.nfo</a>  11-Jul-2014 23:17     123\n",
        "<a href=\"scan.list\">scan.list</a>           01-Jan-2024 00:00     5\n",
        "<a href=\"/cdn-cgi/l/email-protection\">[email&#160;protected]</a>\n",
        "</pre><hr></body></html>",
    );

    #[test]
    fn test_files_and_dirs_split() {
        let listing = parse_listing(&base(), PAGE);
        assert_eq!(listing.dirs.len(), 1);
        assert_eq!(listing.dirs[0].as_str(), "https://example.com/a/shows/");
        assert_eq!(listing.files.len(), 2);
    }

    /// 2024-01-01T00:00:00Z is 1704067200; the listing timestamp is read as
    /// UTC regardless of host timezone.
    #[test]
    fn test_file_row_columns() {
        let listing = parse_listing(&base(), PAGE);
        let movie = &listing.files[0];
        assert_eq!(movie.abs_url.as_str(), "https://example.com/a/movie.mkv");
        assert_eq!(movie.path, "/a/movie.mkv");
        assert_eq!(movie.mtime_unix, 1_704_067_200);
        assert_eq!(movie.size_bytes, 2_610_000);
    }

    #[test]
    fn test_percent_decoded_path() {
        let listing = parse_listing(&base(), PAGE);
        assert_eq!(listing.files[1].path, "/a/动漫.nfo");
        assert_eq!(
            listing.files[1].abs_url.as_str(),
            "https://example.com/a/%E5%8A%A8%E6%BC%AB.nfo"
        );
    }

    /// `../` and `scan.list` rows are dropped, and an anchor without a
    /// parseable tail (the cdn-cgi link) skips only itself.
    #[test]
    fn test_sentinels_and_bad_rows_skipped() {
        let listing = parse_listing(&base(), PAGE);
        assert!(listing.dirs.iter().all(|d| !d.as_str().ends_with("/a/../")));
        assert!(listing.files.iter().all(|f| !f.path.ends_with("scan.list")));
        assert!(listing
            .files
            .iter()
            .all(|f| !f.path.contains("email-protection")));
    }

    #[test]
    fn test_bad_timestamp_preserves_other_rows() {
        let page = concat!(
            "<a href=\"x.mkv\">x.mkv</a>  not-a-date 10:00  5\n",
            "<a href=\"y.mkv\">y.mkv</a>  02-Feb-2024 10:00  5\n",
        );
        let listing = parse_listing(&base(), page);
        assert_eq!(listing.files.len(), 1);
        assert_eq!(listing.files[0].path, "/a/y.mkv");
    }

    #[test]
    fn test_parent_only_listing_is_empty() {
        let listing = parse_listing(&base(), "<a href=\"../\">../</a>");
        assert!(listing.files.is_empty());
        assert!(listing.dirs.is_empty());
    }

    /// Relative hrefs resolve per RFC 3986 against the listing base.
    #[test]
    fn test_join_matches_reference_resolution() {
        let listing = parse_listing(
            &Url::parse("https://example.com/a/b/").unwrap(),
            "<a href=\"c%20d.mkv\">c d.mkv</a>  03-Mar-2024 08:30  77\n",
        );
        assert_eq!(
            listing.files[0].abs_url.as_str(),
            "https://example.com/a/b/c%20d.mkv"
        );
        assert_eq!(listing.files[0].path, "/a/b/c d.mkv");
    }
}
