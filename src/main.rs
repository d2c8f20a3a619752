//! Media Mirror Synchronizer: Crawl, Download, and Reconcile an Autoindex Tree
//!
//! This application mirrors selected top-level paths of a remote media
//! library served as an HTTP autoindex tree into a local media root. One run
//! is a single-shot pipeline:
//!
//! 1. Pick a live server from the fallback pool (or take `--url`).
//! 2. Fetch the authoritative `.scan.list.gz` file count.
//! 3. Ensure the local inventory database exists (walking the media root).
//! 4. Crawl the selected paths, downloading stale files and recording the
//!    remote inventory.
//! 5. Purge local files absent remotely, guarded by the gap gate, sweep
//!    empty directories, and rotate the databases for the next run.
//!
//! ## Usage
//!
//! ```sh
//! cargo run -- --media /srv/media --count 100
//! ```
//!
//! Logs go to the console via `env_logger`; `--debug` forces debug level and
//! the `RUST_LOG` environment variable is respected otherwise.

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use url::Url;

use emd::crawl::{self, CrawlContext};
use emd::inventory;
use emd::reconcile;
use emd::{config, fetch};

/// A present local inventory whose row count strays this far from the
/// expected count is regenerated before the purge relies on it.
const RESEED_THRESHOLD: i64 = 1000;

/// Command-line arguments for one synchronizer run.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to store downloaded media files.
    #[clap(long, value_name = "folder", env = "EMD_MEDIA")]
    media: PathBuf,

    /// Max concurrent HTTP requests.
    #[clap(long, value_name = "number", default_value_t = 100)]
    count: usize,

    /// Verbose debug logging.
    #[clap(long, action)]
    debug: bool,

    /// Force regeneration of the local inventory database.
    #[clap(long, action)]
    db: bool,

    /// Download NFO files.
    #[clap(long, action)]
    nfo: bool,

    /// Base URL override; skips the pool probe.
    #[clap(long, value_name = "url")]
    url: Option<String>,

    /// Purge files that disappeared remotely (pass `--purge false` to keep
    /// them).
    #[clap(long, default_value_t = true, action = clap::ArgAction::Set,
           num_args = 0..=1, default_missing_value = "true")]
    purge: bool,

    /// Mirror every known top-level path.
    #[clap(long, action)]
    all: bool,

    /// Directory holding the inventory databases [default: media root].
    #[clap(long, value_name = "folder")]
    location: Option<PathBuf>,

    /// Path subset: an integer bitmap over the known paths, or a file with
    /// one path per line.
    #[clap(long, value_name = "bitmap-or-file")]
    paths: Option<String>,
}

/// Entry point: runs the crawl/download/reconcile pipeline once.
///
/// Precondition failures (missing media folders, invalid `--paths`, no
/// reachable server, conflicting flags) abort before any state changes;
/// everything after that is contained per URL and the run finishes.
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let mut pool: Vec<String> = config::SERVER_POOL.iter().map(|s| s.to_string()).collect();
    let mut regenerate_db = args.db;
    let selected = if args.all {
        // The primary member only serves the daily-update subset; an --all
        // run also always re-seeds the local inventory before purging.
        pool.remove(0);
        if args.purge {
            regenerate_db = true;
        }
        config::select_paths(true, None)?
    } else {
        config::select_paths(false, args.paths.as_deref())?
    };

    let media = args.media.clone();
    ensure_media_layout(&media, &selected)?;

    let probe_client = fetch::build_probe_client()?;
    let url = match &args.url {
        Some(url) => Url::parse(url).context("invalid --url")?,
        None => {
            let picked = fetch::pick_server(&probe_client, &pool, config::POOL_SENTINEL)
                .await
                .context("No servers are reachable, please check your Internet connection")?;
            Url::parse(&picked).context("picked server URL is invalid")?
        }
    };

    let root_mode = url.path() == "/";
    if !root_mode && (args.purge || regenerate_db) {
        bail!("--db and --purge are only supported in root path mode");
    }

    let mut expected = -1;
    if root_mode {
        expected = fetch::expected_count(&probe_client, &url, &media, &selected).await;
        info!("There are {} files in {}", expected, url);
    }

    let location = args.location.clone().unwrap_or_else(|| media.clone());
    let local_db = location.join(".localfiles.db");
    let temp_db = location.join(".tempfiles.db");

    let remote_db = if args.purge || regenerate_db {
        prepare_local_inventory(&local_db, &media, &selected, regenerate_db, expected)?;
        if temp_db.exists() {
            fs::remove_file(&temp_db)
                .with_context(|| format!("remove stale {}", temp_db.display()))?;
        }
        Some(Mutex::new(inventory::db::open(&temp_db)?))
    } else {
        None
    };

    let ctx = Arc::new(CrawlContext {
        client: fetch::build_client()?,
        semaphore: Arc::new(Semaphore::new(args.count)),
        media: media.clone(),
        nfo: args.nfo,
        paths: selected.clone(),
        remote_db,
    });
    info!("Crawling {} with {} concurrent requests", url, args.count);
    crawl::crawl(Arc::clone(&ctx), url, 0).await;
    // Releases the remote-inventory handle before the files are rotated.
    drop(ctx);

    if args.purge {
        reconcile::purge_removed_files(&local_db, &temp_db, &media, expected)?;
        reconcile::sweep_empty_dirs(&media, &selected);
        reconcile::rotate_databases(&local_db, &temp_db, !args.all)?;
    }
    info!("Done");
    Ok(())
}

/// Initializes `env_logger`: info by default, debug with `--debug`,
/// `RUST_LOG` respected otherwise.
fn init_logging(debug: bool) {
    let mut builder = env_logger::Builder::new();
    builder
        .format_timestamp(Some(env_logger::TimestampPrecision::Seconds))
        .format_module_path(false)
        .format_level(true)
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG");
    if debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

/// Creates the auxiliary cloud-drive folder when missing and verifies every
/// selected path already exists under the media root.
fn ensure_media_layout(media: &Path, paths: &[String]) -> Result<()> {
    let aux = media.join(config::AUX_FOLDER);
    if !aux.exists() {
        warn!("{} is missing, creating it", aux.display());
        fs::create_dir_all(&aux).with_context(|| format!("create {}", aux.display()))?;
    }
    for path in paths {
        let decoded = config::decode_path(path)?;
        if !media.join(&decoded).exists() {
            bail!(
                "{} doesn't contain the desired folder {}, please correct the --media parameter",
                media.display(),
                decoded
            );
        }
    }
    Ok(())
}

/// Ensures `.localfiles.db` exists and is trustworthy for the purge diff.
///
/// A missing database is generated; `--db` (or an `--all --purge` run)
/// regenerates unconditionally; otherwise a database whose row count has
/// drifted more than [`RESEED_THRESHOLD`] from the expected count is
/// regenerated, since a purge diffed against it would be meaningless.
fn prepare_local_inventory(
    local_db: &Path,
    media: &Path,
    paths: &[String],
    regenerate: bool,
    expected: i64,
) -> Result<()> {
    if local_db.exists() {
        if regenerate {
            fs::remove_file(local_db).context("remove local inventory for regeneration")?;
        } else {
            let count = inventory::db::row_count(&inventory::db::open(local_db)?)?;
            if expected > 0 && (count - expected).abs() > RESEED_THRESHOLD {
                warn!(
                    "Local inventory has {} rows but {} files are expected; regenerating",
                    count, expected
                );
                fs::remove_file(local_db).context("remove drifted local inventory")?;
            } else {
                return Ok(());
            }
        }
    }
    info!("Generating local inventory at {}", local_db.display());
    inventory::build(local_db, media, paths)
}
