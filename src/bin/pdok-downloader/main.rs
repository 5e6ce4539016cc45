mod args;
mod validators;

use anyhow::{Context, Result};
use args::{Args, BagArgs, OrthoArgs};
use pdok_downloader::{
    bbox_wgs84_to_rdnew, fetch, fetch_features, layer_extent, output_path, read_layer,
    save_features, Config, FeatureConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Args::parse()? {
        Args::Ortho(args) => ortho(args).await,
        Args::Bag(args) => bag(args).await,
    }
}

async fn ortho(args: OrthoArgs) -> Result<()> {
    let dry_run = args.dry_run;
    let config: Config = args.into();
    log::info!("area of interest (WGS84): {}", config.bounding_box);

    if dry_run {
        let tile_count: usize = config.tile_ranges()?.iter().map(|r| r.len()).sum();

        eprintln!(
            "would download {} tiles (approx {}, assuming 20 kb per tile)",
            tile_count,
            pretty_bytes::converter::convert((tile_count as f64) * 20_000f64)
        );

        Ok(())
    } else {
        fetch(config).await
    }
}

async fn bag(args: BagArgs) -> Result<()> {
    let mut config = FeatureConfig::from(&args);

    let extent_stem = match &args.extent {
        Some(path) => {
            let layer = read_layer(path)?;
            let extent = layer_extent(&layer).with_context(|| {
                format!("{} contains no geometries to bound the download", path.display())
            })?;
            let rd_extent = bbox_wgs84_to_rdnew(&extent)
                .with_context(|| format!("failed converting extent {} to RD New", extent))?;
            log::info!("bounding download by {} (RD New: {})", extent, rd_extent);

            config.bbox = Some(rd_extent);
            path.file_stem().and_then(|s| s.to_str()).map(str::to_owned)
        }
        None => None,
    };

    let features = fetch_features(&config).await?;
    let out_file = output_path(&args.data_dir, &config.type_name, extent_stem.as_deref());
    save_features(features, &out_file).await
}
