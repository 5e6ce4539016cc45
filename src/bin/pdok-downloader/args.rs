use anyhow::{Context, Result};
use clap::{
    app_from_crate, crate_authors, crate_description, crate_name, crate_version, value_t,
    AppSettings, Arg, ArgMatches, SubCommand,
};
use std::{path::PathBuf, time::Duration};

use crate::validators::*;
use pdok_downloader::{
    bbox_rdnew_to_wgs84, Bbox, Config, FeatureConfig, Fixture, UrlFormat, PDOK_BAG_TYPE_NAME,
    PDOK_BAG_URL, PDOK_ORTHO_LAYER, PDOK_ORTHO_URL,
};

const ORTHO_CMD: &str = "ortho";
const BAG_CMD: &str = "bag";

const DATA_DIR_ARG: &str = "data_dir";
const URL_ARG: &str = "url";
const LAYER_ARG: &str = "layer";
const TYPE_NAME_ARG: &str = "type_name";
const ZOOM_ARG: &str = "zoom";
const MIN_ZOOM_ARG: &str = "min_zoom";
const MAX_ZOOM_ARG: &str = "max_zoom";
const BBOX_FIXTURE_ARG: &str = "fixture";
const BBOX_NORTH_ARG: &str = "north";
const BBOX_SOUTH_ARG: &str = "south";
const BBOX_WEST_ARG: &str = "west";
const BBOX_EAST_ARG: &str = "east";
const RD_NEW_ARG: &str = "rd";
const EXTENT_ARG: &str = "extent";
const PAGE_SIZE_ARG: &str = "page_size";
const TIMEOUT_ARG: &str = "timeout";
const DRY_RUN_ARG: &str = "dry_run";
const REQUEST_RETRIES_ARG: &str = "num_retries";
const PARALLEL_FETCHES_ARG: &str = "num_parallel";
const FETCH_EXISTING_ARG: &str = "should_fetch_existing";

const BBOX_COORD_ARGS: &[&str] = &[BBOX_WEST_ARG, BBOX_SOUTH_ARG, BBOX_EAST_ARG, BBOX_NORTH_ARG];

pub enum Args {
    Ortho(OrthoArgs),
    Bag(BagArgs),
}

/// Aerial photography download.
pub struct OrthoArgs {
    pub bounding_box: Bbox,
    pub parallel_fetches: u8,
    pub retries: u8,
    pub timeout: Duration,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub data_dir: PathBuf,
    pub url: String,
    pub layer: String,
    pub fetch_existing: bool,
    pub dry_run: bool,
}

/// Building footprint download.
pub struct BagArgs {
    pub data_dir: PathBuf,
    pub extent: Option<PathBuf>,
    pub url: String,
    pub type_name: String,
    pub page_size: usize,
    pub retries: u8,
    pub timeout: Duration,
}

impl std::convert::From<OrthoArgs> for Config {
    fn from(args: OrthoArgs) -> Self {
        Self {
            bounding_box: args.bounding_box,
            fetch_existing: args.fetch_existing,
            fetch_rate: args.parallel_fetches,
            output_folder: args.data_dir,
            request_retries_amount: args.retries,
            url: UrlFormat::new(args.url, args.layer),
            timeout: args.timeout,
            min_zoom: args.min_zoom,
            max_zoom: args.max_zoom,
        }
    }
}

impl std::convert::From<&BagArgs> for FeatureConfig {
    fn from(args: &BagArgs) -> Self {
        Self {
            url: args.url.clone(),
            type_name: args.type_name.clone(),
            page_size: args.page_size,
            request_retries_amount: args.retries,
            timeout: args.timeout,
            bbox: None,
        }
    }
}

impl Args {
    pub fn parse() -> Result<Self> {
        let matches = get_matches();

        match matches.subcommand() {
            (ORTHO_CMD, Some(sub)) => OrthoArgs::from_matches(sub).map(Args::Ortho),
            (BAG_CMD, Some(sub)) => BagArgs::from_matches(sub).map(Args::Bag),
            (other, _) => anyhow::bail!("unknown subcommand {:?}", other),
        }
    }
}

impl OrthoArgs {
    fn from_matches(matches: &ArgMatches<'_>) -> Result<Self> {
        let (min_zoom, max_zoom) = match matches.value_of(ZOOM_ARG) {
            // if `zoom` is set, use it for both min/max
            Some(_) => {
                let zoom = value_t!(matches, ZOOM_ARG, u8)?;
                (zoom, zoom)
            }
            // otherwise, parse min/max separately
            None => (
                value_t!(matches, MIN_ZOOM_ARG, u8)?,
                value_t!(matches, MAX_ZOOM_ARG, u8)?,
            ),
        };

        let bounding_box = if matches.is_present(BBOX_WEST_ARG) {
            let bbox = Bbox::new(
                value_t!(matches, BBOX_WEST_ARG, f64)?,
                value_t!(matches, BBOX_SOUTH_ARG, f64)?,
                value_t!(matches, BBOX_EAST_ARG, f64)?,
                value_t!(matches, BBOX_NORTH_ARG, f64)?,
            )
            .context("invalid bounding box")?;

            if matches.is_present(RD_NEW_ARG) {
                bbox_rdnew_to_wgs84(&bbox).context("failed converting RD New bounding box")?
            } else {
                is_tileable(&bbox).context("invalid WGS84 bounding box")?;
                bbox
            }
        } else {
            // without coordinates, fall back to a named area
            let fixture = matches
                .value_of(BBOX_FIXTURE_ARG)
                .unwrap_or("netherlands")
                .parse::<Fixture>()
                .map_err(anyhow::Error::msg)?;
            Bbox::from(fixture)
        };

        Ok(Self {
            min_zoom,
            max_zoom,
            bounding_box,
            data_dir: value_t!(matches, DATA_DIR_ARG, PathBuf)?,
            parallel_fetches: value_t!(matches, PARALLEL_FETCHES_ARG, u8)?,
            retries: value_t!(matches, REQUEST_RETRIES_ARG, u8)?,
            timeout: Duration::from_secs(value_t!(matches, TIMEOUT_ARG, u64)?),
            url: value_t!(matches, URL_ARG, String)?,
            layer: value_t!(matches, LAYER_ARG, String)?,
            fetch_existing: matches.is_present(FETCH_EXISTING_ARG),
            dry_run: matches.is_present(DRY_RUN_ARG),
        })
    }
}

impl BagArgs {
    fn from_matches(matches: &ArgMatches<'_>) -> Result<Self> {
        Ok(Self {
            data_dir: value_t!(matches, DATA_DIR_ARG, PathBuf)?,
            extent: matches.value_of(EXTENT_ARG).map(PathBuf::from),
            url: value_t!(matches, URL_ARG, String)?,
            type_name: value_t!(matches, TYPE_NAME_ARG, String)?,
            page_size: value_t!(matches, PAGE_SIZE_ARG, usize)?,
            retries: value_t!(matches, REQUEST_RETRIES_ARG, u8)?,
            timeout: Duration::from_secs(value_t!(matches, TIMEOUT_ARG, u64)?),
        })
    }
}

fn data_dir_arg() -> Arg<'static, 'static> {
    Arg::with_name(DATA_DIR_ARG)
        .help("The data directory to write the downloads to")
        .required(true)
        .index(1)
}

fn retries_arg() -> Arg<'static, 'static> {
    Arg::with_name(REQUEST_RETRIES_ARG)
        .help("The amount of times to try a failed HTTP request.")
        .validator(is_numeric_min(1))
        .default_value("10")
        .takes_value(true)
        .long("retries")
}

fn timeout_arg(default: &'static str) -> Arg<'static, 'static> {
    Arg::with_name(TIMEOUT_ARG)
        .help("The timeout (in seconds) for a single request. Pass 0 for no timeout.")
        .validator(is_numeric_min(0))
        .default_value(default)
        .takes_value(true)
        .short("t")
        .long("timeout")
}

fn coord_arg(name: &'static str, short: &'static str, help: &'static str) -> Arg<'static, 'static> {
    Arg::with_name(name)
        .help(help)
        .validator(is_numeric::<f64>)
        .takes_value(true)
        .allow_hyphen_values(true)
        .requires_all(BBOX_COORD_ARGS)
        .conflicts_with(BBOX_FIXTURE_ARG)
        .short(short)
        .long(name)
}

fn ortho_command() -> clap::App<'static, 'static> {
    SubCommand::with_name(ORTHO_CMD)
        .about("Download aerial photography tiles from the PDOK WMTS")
        .arg(data_dir_arg())
        .arg(coord_arg(
            BBOX_WEST_ARG,
            "w",
            "West boundary (longitude in degrees, or RD New x with --rd)",
        ))
        .arg(coord_arg(
            BBOX_SOUTH_ARG,
            "s",
            "South boundary (latitude in degrees, or RD New y with --rd)",
        ))
        .arg(coord_arg(
            BBOX_EAST_ARG,
            "e",
            "East boundary (longitude in degrees, or RD New x with --rd)",
        ))
        .arg(coord_arg(
            BBOX_NORTH_ARG,
            "n",
            "North boundary (latitude in degrees, or RD New y with --rd)",
        ))
        .arg(
            Arg::with_name(RD_NEW_ARG)
                .help("Interpret the bounding box coordinates as RD New (EPSG:28992) meters")
                .requires(BBOX_WEST_ARG)
                .long("rd"),
        )
        .arg(
            Arg::with_name(BBOX_FIXTURE_ARG)
                .help("Use a known, named bounding box (netherlands, amsterdam). Defaults to netherlands.")
                .validator(is_bb_fixture)
                .takes_value(true)
                .short("f")
                .long("fixture"),
        )
        .arg(
            Arg::with_name(PARALLEL_FETCHES_ARG)
                .help("The amount of tiles fetched in parallel.")
                .validator(is_numeric_min(1))
                .default_value("5")
                .takes_value(true)
                .short("r")
                .long("rate"),
        )
        .arg(retries_arg())
        .arg(timeout_arg("10"))
        .arg(
            Arg::with_name(MIN_ZOOM_ARG)
                .help("The minimum zoom level to fetch")
                .validator(is_zoom)
                .default_value("19")
                .takes_value(true)
                .long("min-zoom"),
        )
        .arg(
            Arg::with_name(MAX_ZOOM_ARG)
                .help("The maximum zoom level to fetch")
                .validator(is_zoom)
                .default_value("19")
                .takes_value(true)
                .long("max-zoom"),
        )
        .arg(
            Arg::with_name(ZOOM_ARG)
                .help("Only fetch a single zoom level (implies min=x/max=x)")
                .validator(is_zoom)
                .takes_value(true)
                .long("zoom")
                .short("z"),
        )
        .arg(
            Arg::with_name(URL_ARG)
                .help("The WMTS GetTile URL with format specifiers `{layer}`, `{z}`, `{x}` (column) and `{y}` (row).")
                .default_value(PDOK_ORTHO_URL)
                .takes_value(true)
                .short("u")
                .long("url"),
        )
        .arg(
            Arg::with_name(LAYER_ARG)
                .help("The WMTS layer to download")
                .default_value(PDOK_ORTHO_LAYER)
                .takes_value(true)
                .short("l")
                .long("layer"),
        )
        .arg(
            Arg::with_name(FETCH_EXISTING_ARG)
                .help("Fetch tiles that we've already downloaded (this usually isn't required)")
                .long("fetch-existing"),
        )
        .arg(
            Arg::with_name(DRY_RUN_ARG)
                .help("Don't actually fetch anything, just determine how many tiles would be fetched.")
                .long("dry-run"),
        )
}

fn bag_command() -> clap::App<'static, 'static> {
    SubCommand::with_name(BAG_CMD)
        .about("Download building footprints from the PDOK BAG WFS")
        .arg(data_dir_arg())
        .arg(
            Arg::with_name(EXTENT_ARG)
                .help("GeoJSON file whose extent bounds the download")
                .takes_value(true)
                .long("extent"),
        )
        .arg(
            Arg::with_name(PAGE_SIZE_ARG)
                .help("The amount of features requested per page")
                .validator(is_numeric_min(1))
                .default_value("1000")
                .takes_value(true)
                .long("page-size"),
        )
        .arg(retries_arg())
        .arg(timeout_arg("60"))
        .arg(
            Arg::with_name(URL_ARG)
                .help("The WFS endpoint")
                .default_value(PDOK_BAG_URL)
                .takes_value(true)
                .short("u")
                .long("url"),
        )
        .arg(
            Arg::with_name(TYPE_NAME_ARG)
                .help("The feature type to download")
                .default_value(PDOK_BAG_TYPE_NAME)
                .takes_value(true)
                .long("type-name"),
        )
}

fn get_matches() -> ArgMatches<'static> {
    app_from_crate!()
        .setting(AppSettings::GlobalVersion)
        .setting(AppSettings::VersionlessSubcommands)
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(ortho_command())
        .subcommand(bag_command())
        .get_matches()
}
