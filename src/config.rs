use std::{path::PathBuf, time::Duration};

use crate::bounding_box::Bbox;
use crate::tile::{Tile, TileRange};
use crate::url::UrlFormat;

/// Tile fetching configuration.
#[derive(Debug, PartialEq)]
pub struct Config {
    /// Area to download, in WGS84 (longitude, latitude) degrees.
    pub bounding_box: Bbox,

    /// Whether to download tiles again that already exist on disk.
    pub fetch_existing: bool,

    /// Maximum number of parallel downloads.
    pub fetch_rate: u8,

    /// The data directory. Tiles are written below `<output>/<layer>`.
    pub output_folder: PathBuf,

    /// How many times to try a failed HTTP request.
    pub request_retries_amount: u8,

    /// The WMTS GetTile template.
    pub url: UrlFormat,

    /// Timeout for fetching a single tile.
    ///
    /// Pass the zero duration to disable the timeout.
    pub timeout: Duration,

    /// The minimum zoom level to download.
    pub min_zoom: u8,

    /// The maximum zoom level to download.
    pub max_zoom: u8,
}

impl Config {
    /// The tile ranges to fetch, one per zoom level.
    pub fn tile_ranges(&self) -> crate::Result<Vec<TileRange>> {
        (self.min_zoom..=self.max_zoom)
            .map(|zoom| TileRange::covering(&self.bounding_box, zoom))
            .collect()
    }

    /// Creates an iterator iterating over all tiles in the contained bounding box.
    pub fn tiles(&self) -> crate::Result<impl Iterator<Item = Tile>> {
        Ok(self.tile_ranges()?.into_iter().flat_map(TileRange::tiles))
    }

    /// The folder the layer's tiles are written to.
    pub fn layer_folder(&self) -> PathBuf {
        self.output_folder.join(self.url.layer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounding_box::Fixture;

    fn config(min_zoom: u8, max_zoom: u8) -> Config {
        Config {
            bounding_box: Fixture::Amsterdam.into(),
            fetch_existing: false,
            fetch_rate: 4,
            output_folder: "data".into(),
            request_retries_amount: 10,
            url: UrlFormat::default(),
            timeout: Duration::from_secs(10),
            min_zoom,
            max_zoom,
        }
    }

    #[test]
    fn tiles_span_all_zoom_levels() {
        let cfg = config(10, 12);
        let ranges = cfg.tile_ranges().unwrap();
        assert_eq!(ranges.iter().map(|r| r.zoom).collect::<Vec<_>>(), vec![10, 11, 12]);

        let total: usize = ranges.iter().map(TileRange::len).sum();
        assert_eq!(cfg.tiles().unwrap().count(), total);
    }

    #[test]
    fn empty_zoom_span() {
        assert_eq!(config(5, 4).tiles().unwrap().count(), 0);
    }

    #[test]
    fn layer_folder() {
        assert_eq!(config(1, 1).layer_folder(), PathBuf::from("data/Actueel_ortho25"));
    }
}
