use anyhow::{Context, Result};
use clap::crate_version;
use futures::{prelude::*, stream};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::fs;

use crate::config::Config;

pub(crate) const BACKOFF_DELAY: Duration = Duration::from_secs(10);
const ZERO_DURATION: Duration = Duration::from_secs(0);

/// Builds the HTTP client shared by the tile and feature downloads.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if timeout > ZERO_DURATION {
        builder = builder.timeout(timeout);
    }

    let mut headers = reqwest::header::HeaderMap::new();
    headers.append(
        reqwest::header::USER_AGENT,
        format!("pdok-downloader_rs_{}", crate_version!())
            .parse::<reqwest::header::HeaderValue>()
            .context("invalid user agent")?,
    );

    builder
        .default_headers(headers)
        .build()
        .with_context(|| "failed creating HTTP client")
}

/// Asynchronously fetch the WMTS tiles specified in `cfg` and save them
/// to the file system.
///
/// Creates the required directories recursively. Tiles that fail after all
/// retries are logged and skipped.
///
/// # Example
/// ```rust,no_run
/// use pdok_downloader::{fetch, Config, Fixture, UrlFormat};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() {
/// let config = Config {
///     bounding_box: Fixture::Amsterdam.into(),
///     fetch_existing: false,
///     fetch_rate: 4,
///     output_folder: "./data".into(),
///     request_retries_amount: 10,
///     url: UrlFormat::default(),
///     timeout: Duration::from_secs(30),
///     min_zoom: 14,
///     max_zoom: 14,
/// };
///
/// fetch(config).await.expect("failed fetching tiles");
/// # }
/// ```
pub async fn fetch(cfg: Config) -> Result<()> {
    let output_folder = cfg.layer_folder();

    if output_folder.exists() && !output_folder.is_dir() {
        anyhow::bail!("output {} must be a directory", output_folder.display());
    }

    if !output_folder.exists() {
        fs::create_dir_all(&output_folder)
            .await
            .context("failed to create root output directory")?;
    }

    let ranges = cfg.tile_ranges()?;
    let tile_count: usize = ranges.iter().map(|r| r.len()).sum();
    log::info!(
        "fetching {} tiles of layer {} into {}",
        tile_count,
        cfg.url.layer(),
        output_folder.display()
    );

    let pb = ProgressBar::new(tile_count as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:60.cyan/blue} {pos:>7}/{len:7} ETA: {eta} {msg}")
            .context("invalid progress bar template")?
            .progress_chars("##-"),
    );

    let client = http_client(cfg.timeout)?;

    let num_retries = cfg.request_retries_amount.max(1);
    let fetch_existing = cfg.fetch_existing;
    let url_fmt = &cfg.url;
    let output_folder = output_folder.as_path();

    let tiles = ranges.into_iter().flat_map(|range| range.tiles());
    let s = stream::iter(pb.wrap_iter(tiles));
    s.for_each_concurrent(cfg.fetch_rate.max(1) as usize, |tile| {
        let http_client = client.clone();

        async move {
            let mut res = Ok(());

            for attempt in 1..=num_retries {
                res = tile
                    .fetch_from(&http_client, url_fmt, output_folder, fetch_existing)
                    .await;

                match &res {
                    Ok(()) => return,
                    Err(e) if attempt < num_retries => {
                        log::debug!(
                            "attempt {}/{} for tile {} failed: {:#}",
                            attempt,
                            num_retries,
                            tile,
                            e
                        );
                        tokio::time::sleep(BACKOFF_DELAY).await;
                    }
                    Err(_) => {}
                }
            }

            if let Err(e) = res {
                log::error!("Failed fetching tile {}: {:?}", tile, e);
            }
        }
    })
    .await;

    pb.finish_and_clear();

    Ok(())
}
