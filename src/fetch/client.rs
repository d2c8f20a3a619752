use crate::config;
use anyhow::{Context, Result};
use log::{debug, warn};
use percent_encoding::percent_decode_str;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

/// Idle connections are kept around as long as the gateway's DNS TTL.
const POOL_IDLE_TTL: Duration = Duration::from_secs(600);

/// Whole-operation ceiling; there is no per-request timeout below it.
const TOTAL_TIMEOUT: Duration = Duration::from_secs(36_000);

/// Builds the shared crawl/download client.
///
/// TLS verification is disabled because pool members sit behind self-signed
/// gateways, and the per-host connection pool is unbounded; the semaphore,
/// not the pool, limits concurrency.
pub fn build_client() -> Result<Client> {
    Client::builder()
        .danger_accept_invalid_certs(true)
        .pool_max_idle_per_host(usize::MAX)
        .pool_idle_timeout(POOL_IDLE_TTL)
        .timeout(TOTAL_TIMEOUT)
        .build()
        .context("build HTTP client")
}

/// Builds the probe client carrying a browser User-Agent. The gateway
/// serves library-default agents an error page, so the liveness probe and
/// the scan-list retrieval must look like a browser.
pub fn build_probe_client() -> Result<Client> {
    Client::builder()
        .danger_accept_invalid_certs(true)
        .user_agent(config::PROBE_USER_AGENT)
        .build()
        .context("build probe client")
}

/// Fetches a URL's body behind the global semaphore.
///
/// The permit is acquired before the GET and released only after the body
/// has been read. Non-2xx statuses and transport failures are errors for
/// the caller to contain; a body that is not valid UTF-8 is logged and
/// reported as `None`, which the crawler treats as an empty listing.
///
/// # Arguments
///
/// * `client` - The shared client from [`build_client`].
/// * `semaphore` - The global GET gate.
/// * `url` - The page to fetch.
///
/// # Returns
///
/// * `Ok(Some(String))` - The decoded body.
/// * `Ok(None)` - The body was not UTF-8.
/// * `Err(anyhow::Error)` - Transport failure or non-2xx status.
pub async fn fetch_html(
    client: &Client,
    semaphore: &Arc<Semaphore>,
    url: &Url,
) -> Result<Option<String>> {
    let _permit = Arc::clone(semaphore)
        .acquire_owned()
        .await
        .context("semaphore closed")?;
    let resp = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("request failed for {}", display_url(url)))?;
    let resp = resp
        .error_for_status()
        .with_context(|| format!("bad status for {}", display_url(url)))?;
    debug!("Got response [{}] for URL: {}", resp.status(), display_url(url));
    let bytes = resp
        .bytes()
        .await
        .with_context(|| format!("failed reading body for {}", display_url(url)))?;
    match String::from_utf8(bytes.to_vec()) {
        Ok(body) => Ok(Some(body)),
        Err(_) => {
            warn!("Non-UTF-8 body for {}", display_url(url));
            Ok(None)
        }
    }
}

/// Human-readable form of a URL for logs, percent-encoding undone.
pub fn display_url(url: &Url) -> String {
    percent_decode_str(url.as_str())
        .decode_utf8_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_url_decodes() {
        let url = Url::parse("https://example.com/%E6%AF%8F%E6%97%A5%E6%9B%B4%E6%96%B0/").unwrap();
        assert_eq!(display_url(&url), "https://example.com/每日更新/");
    }
}
