use anyhow::{Context, Result};
use geojson::{FeatureCollection, GeoJson};
use reqwest::Url;
use std::convert::TryFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::bounding_box::Bbox;
use crate::fetch::{http_client, BACKOFF_DELAY};

/// The PDOK WFS serving the BAG (buildings and addresses) registry.
pub const PDOK_BAG_URL: &str = "https://service.pdok.nl/lv/bag/wfs/v2_0";

/// Building footprints.
pub const PDOK_BAG_TYPE_NAME: &str = "bag:pand";

const RD_NEW_URN: &str = "urn:ogc:def:crs:EPSG::28992";

/// Feature download configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureConfig {
    /// WFS endpoint, without query parameters.
    pub url: String,

    /// The feature type to download.
    pub type_name: String,

    /// Number of features requested per page.
    pub page_size: usize,

    /// How many times to try a failed page request.
    pub request_retries_amount: u8,

    /// Timeout for a single page request, zero to disable.
    pub timeout: Duration,

    /// Only download features within this RD New box.
    pub bbox: Option<Bbox>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            url: PDOK_BAG_URL.to_owned(),
            type_name: PDOK_BAG_TYPE_NAME.to_owned(),
            page_size: 1000,
            request_retries_amount: 10,
            timeout: Duration::from_secs(60),
            bbox: None,
        }
    }
}

impl FeatureConfig {
    /// The GetFeature request for the page starting at `start_index`.
    pub fn page_url(&self, start_index: usize) -> Result<Url> {
        let count = self.page_size.to_string();
        let start_index = start_index.to_string();
        let mut params = vec![
            ("service", "WFS".to_owned()),
            ("version", "2.0.0".to_owned()),
            ("request", "GetFeature".to_owned()),
            ("typeNames", self.type_name.clone()),
            ("outputFormat", "application/json".to_owned()),
            ("srsName", "EPSG:28992".to_owned()),
            ("count", count),
            ("startIndex", start_index),
        ];
        if let Some(bbox) = &self.bbox {
            params.push(("bbox", format!("{},{}", bbox, RD_NEW_URN)));
        }

        Url::parse_with_params(&self.url, &params)
            .with_context(|| format!("invalid WFS url {}", self.url))
    }
}

/// Download every feature matching `cfg`, one page at a time.
///
/// Each page starts where the previous one ended. The service may return
/// fewer features than requested (PDOK caps pages at 1000), so only an empty
/// page or reaching the reported `numberMatched` ends the download.
pub async fn fetch_features(cfg: &FeatureConfig) -> Result<FeatureCollection> {
    if cfg.page_size == 0 {
        anyhow::bail!("page size must be > 0");
    }

    let client = http_client(cfg.timeout)?;
    let mut features = Vec::new();
    let mut start_index = 0;

    loop {
        let page = fetch_page(&client, cfg, start_index).await?;
        let count = page.features.len();
        let matched = number_matched(&page);
        log::info!(
            "fetched {} {} features starting at {}",
            count,
            cfg.type_name,
            start_index
        );
        if count < cfg.page_size && count > 0 {
            log::debug!("service returned {} of {} requested features", count, cfg.page_size);
        }
        features.extend(page.features);

        match next_start_index(start_index, count, matched) {
            Some(next) => start_index = next,
            None => break,
        }
    }

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

/// The `numberMatched` member of a WFS 2.0 GeoJSON response, absent or
/// `"unknown"` when the service didn't count the matches.
fn number_matched(page: &FeatureCollection) -> Option<u64> {
    page.foreign_members
        .as_ref()
        .and_then(|members| members.get("numberMatched"))
        .and_then(|v| v.as_u64())
}

/// Where the next page starts after `returned` features were read from
/// `start_index`, or `None` once every feature has been read.
fn next_start_index(start_index: usize, returned: usize, matched: Option<u64>) -> Option<usize> {
    if returned == 0 {
        return None;
    }

    let next = start_index + returned;
    match matched {
        Some(total) if next as u64 >= total => None,
        _ => Some(next),
    }
}

async fn fetch_page(
    client: &reqwest::Client,
    cfg: &FeatureConfig,
    start_index: usize,
) -> Result<FeatureCollection> {
    let url = cfg.page_url(start_index)?;
    let num_retries = cfg.request_retries_amount.max(1);

    let mut attempt = 1;
    loop {
        match request_page(client, &url).await {
            Ok(page) => return Ok(page),
            Err(e) if attempt < num_retries => {
                log::warn!(
                    "attempt {}/{} for page at {} failed: {:#}",
                    attempt,
                    num_retries,
                    start_index,
                    e
                );
                attempt += 1;
                tokio::time::sleep(BACKOFF_DELAY).await;
            }
            Err(e) => {
                return Err(e.context(format!(
                    "failed fetching {} features starting at {}",
                    cfg.type_name, start_index
                )))
            }
        }
    }
}

async fn request_page(client: &reqwest::Client, url: &Url) -> Result<FeatureCollection> {
    let text = client
        .get(url.clone())
        .send()
        .await
        .context("request failed")?
        .error_for_status()
        .context("received invalid status code")?
        .text()
        .await
        .context("failed reading response body")?;

    parse_page(&text)
}

/// Parse a GetFeature response body.
pub fn parse_page(text: &str) -> Result<FeatureCollection> {
    let geojson = text
        .parse::<GeoJson>()
        .context("response is not valid GeoJSON")?;
    FeatureCollection::try_from(geojson).context("response is not a feature collection")
}

/// Where downloaded features are stored:
/// `<data_dir>/<type name>[_<extent stem>].geojson`, with the namespace
/// separator of the type name replaced.
pub fn output_path(data_dir: &Path, type_name: &str, extent_stem: Option<&str>) -> PathBuf {
    let name = type_name.replace(':', "_");
    match extent_stem {
        Some(stem) => data_dir.join(format!("{}_{}.geojson", name, stem)),
        None => data_dir.join(format!("{}.geojson", name)),
    }
}

/// Write the collection as GeoJSON to `path`.
pub async fn save_features(features: FeatureCollection, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed creating {}", parent.display()))?;
    }

    let count = features.features.len();
    fs::write(path, GeoJson::from(features).to_string())
        .await
        .with_context(|| format!("failed writing {}", path.display()))?;
    log::info!("wrote {} features to {}", count, path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(url: &Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn page_url_without_bbox() {
        let cfg = FeatureConfig::default();
        let url = cfg.page_url(2000).unwrap();

        assert_eq!(url.host_str(), Some("service.pdok.nl"));
        assert_eq!(query(&url, "typeNames").as_deref(), Some("bag:pand"));
        assert_eq!(query(&url, "count").as_deref(), Some("1000"));
        assert_eq!(query(&url, "startIndex").as_deref(), Some("2000"));
        assert_eq!(query(&url, "bbox"), None);
    }

    #[test]
    fn page_url_with_bbox() {
        let cfg = FeatureConfig {
            bbox: Some(Bbox::new(120_000.0, 480_000.0, 125_000.5, 490_000.0).unwrap()),
            ..FeatureConfig::default()
        };
        let url = cfg.page_url(0).unwrap();

        assert_eq!(
            query(&url, "bbox").as_deref(),
            Some("120000,480000,125000.5,490000,urn:ogc:def:crs:EPSG::28992")
        );
    }

    #[test]
    fn invalid_service_url() {
        let cfg = FeatureConfig {
            url: "not a url".to_owned(),
            ..FeatureConfig::default()
        };
        assert!(cfg.page_url(0).is_err());
    }

    #[test]
    fn parses_pages() {
        let page = parse_page(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"identificatie": "0363100012165490"},
                 "geometry": {"type": "Point", "coordinates": [121000.0, 487000.0]}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(page.features.len(), 1);

        assert!(parse_page(r#"{"type": "Point", "coordinates": [1.0, 2.0]}"#).is_err());
        assert!(parse_page("<ExceptionReport/>").is_err());
    }

    #[test]
    fn capped_pages_advance_by_returned_count() {
        // 2000 requested, server capped at 1000 of 2500 matches
        assert_eq!(next_start_index(0, 1000, Some(2500)), Some(1000));
        assert_eq!(next_start_index(1000, 1000, Some(2500)), Some(2000));
        assert_eq!(next_start_index(2000, 500, Some(2500)), None);
    }

    #[test]
    fn pagination_without_match_count() {
        assert_eq!(next_start_index(0, 1000, None), Some(1000));
        assert_eq!(next_start_index(1000, 37, None), Some(1037));
        assert_eq!(next_start_index(1037, 0, None), None);
    }

    #[test]
    fn empty_first_page_stops() {
        assert_eq!(next_start_index(0, 0, Some(0)), None);
        assert_eq!(next_start_index(0, 0, None), None);
    }

    #[test]
    fn reads_number_matched() {
        let counted = parse_page(
            r#"{"type": "FeatureCollection", "features": [],
                "numberMatched": 2500, "numberReturned": 0}"#,
        )
        .unwrap();
        assert_eq!(number_matched(&counted), Some(2500));

        let unknown = parse_page(
            r#"{"type": "FeatureCollection", "features": [], "numberMatched": "unknown"}"#,
        )
        .unwrap();
        assert_eq!(number_matched(&unknown), None);

        let plain = parse_page(r#"{"type": "FeatureCollection", "features": []}"#).unwrap();
        assert_eq!(number_matched(&plain), None);
    }

    #[test]
    fn output_paths() {
        let dir = Path::new("data");
        assert_eq!(
            output_path(dir, "bag:pand", None),
            PathBuf::from("data/bag_pand.geojson")
        );
        assert_eq!(
            output_path(dir, "bag:pand", Some("centrum")),
            PathBuf::from("data/bag_pand_centrum.geojson")
        );
    }

    #[tokio::test]
    async fn saves_features() {
        let dir = tempfile::tempdir().unwrap();
        let path = output_path(dir.path(), "bag:pand", None);
        let page = parse_page(r#"{"type": "FeatureCollection", "features": []}"#).unwrap();

        save_features(page, &path).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(parse_page(&written).unwrap().features.len(), 0);
    }
}
