use url::Url;

/// One file row of a remote listing.
///
/// `path` is the canonical filename key shared with the local inventory: the
/// URL-decoded path component of `abs_url`, leading `/` retained. Joining it
/// (without the leading `/`) onto the media root yields the mirror location.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFile {
    /// Absolute URL of the file, resolved against the listing base.
    pub abs_url: Url,
    /// URL-decoded path component of `abs_url`, leading `/` retained.
    pub path: String,
    /// Listing mtime as seconds since the Unix epoch (the listing's
    /// date/time columns read as UTC).
    pub mtime_unix: i64,
    /// Listing size column in bytes.
    pub size_bytes: i64,
}

/// Parse result for one listing page.
#[derive(Debug, Default)]
pub struct Listing {
    /// File rows, in page order.
    pub files: Vec<RemoteFile>,
    /// Absolute subdirectory URLs, each ending in `/`.
    pub dirs: Vec<Url>,
}
