use anyhow::{Context, Result};
use log::{debug, info};
use rand::seq::SliceRandom;
use reqwest::Client;

/// Probes the candidate pool in shuffled order and returns the first member
/// whose index page answers 200 and contains the sentinel substring.
///
/// Shuffling spreads load across mirrors; the sentinel filters members that
/// answer 200 with a placeholder page. Probe failures are informational,
/// not fatal, until the whole pool is exhausted.
///
/// # Arguments
///
/// * `client` - The probe client (browser User-Agent).
/// * `candidates` - Base URLs to try.
/// * `sentinel` - Substring a live index page must contain.
///
/// # Returns
///
/// * `Some(String)` - The first live member.
/// * `None` - No member qualified; the run cannot proceed.
pub async fn pick_server(
    client: &Client,
    candidates: &[String],
    sentinel: &str,
) -> Option<String> {
    let mut pool = candidates.to_vec();
    pool.shuffle(&mut rand::thread_rng());
    for member in pool {
        debug!("Testing: {}", member);
        match probe(client, &member, sentinel).await {
            Ok(true) => {
                info!("Picked: {}", member);
                return Some(member);
            }
            Ok(false) => info!("Skipping {}: index page has no library content", member),
            Err(e) => info!("Error accessing {}: {:#}", member, e),
        }
    }
    None
}

/// One GET against a pool member's index page.
async fn probe(client: &Client, member: &str, sentinel: &str) -> Result<bool> {
    let resp = client
        .get(member)
        .send()
        .await
        .context("probe request failed")?
        .error_for_status()
        .context("probe status")?;
    let body = resp.text().await.context("probe body")?;
    Ok(body.contains(sentinel))
}
