//! Download aerial imagery tiles and building footprints from the Dutch
//! national geodata services (PDOK).
//!
//! The crate bundles the geometry needed to drive those downloads: a
//! [`Bbox`] value type, conversions between WGS84 and the Dutch RD New grid
//! (EPSG:28992), and the slippy-map tile index of a WGS84 coordinate.
//!
//! # CLI Example
//!
//! ```bash
//! # aerial photography of Amsterdam at zoom level 19
//! pdok-downloader ortho ./data --fixture amsterdam --zoom 19
//!
//! # all building footprints within the extent of a GeoJSON file
//! pdok-downloader bag ./data --extent centrum.geojson
//! ```
//!
//! # Library Example
//! ```rust,no_run
//! use pdok_downloader::{bbox_wgs84_to_rdnew, Bbox, TileRange};
//!
//! let area = Bbox::new(4.8810, 52.3660, 4.9080, 52.3800).unwrap();
//! let tiles = TileRange::covering(&area, 19).unwrap();
//! println!("{} tiles, {} in RD New", tiles.len(), bbox_wgs84_to_rdnew(&area).unwrap());
//! ```

mod bounding_box;
mod config;
mod convert;
mod error;
mod extent;
mod fetch;
mod tile;
mod url;
mod wfs;

pub use bounding_box::{Bbox, Corner, Fixture, Operand, Point};
pub use config::Config;
pub use convert::{
    bbox_rdnew_to_wgs84, bbox_wgs84_to_rdnew, rdnew_to_wgs84, wgs84_to_rdnew,
    wgs84_to_tile_number, RdNewTransformer, MAX_ZOOM, MERCATOR_LAT_LIMIT,
};
pub use error::{Error, Result};
pub use extent::{layer_extent, read_layer, Envelope};
pub use fetch::fetch;
pub use tile::{Tile, TileRange};
pub use url::{UrlFormat, PDOK_ORTHO_LAYER, PDOK_ORTHO_URL};
pub use wfs::{
    fetch_features, output_path, parse_page, save_features, FeatureConfig,
    PDOK_BAG_TYPE_NAME, PDOK_BAG_URL,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_rejects_inverted_x() {
        assert!(matches!(
            Bbox::new(5.0, 0.0, 2.0, 1.0),
            Err(Error::InvalidBounds { .. })
        ));
    }

    #[test]
    fn tile_index() {
        let tile = Tile::from_wgs84(Point::new(6.0402, 50.7929), 18).unwrap();
        assert_eq!((tile.x, tile.y), (135470, 87999));
    }

    #[test]
    fn tile_index_outside_mercator() {
        assert!(matches!(
            wgs84_to_tile_number(86.0, 5.0, 10),
            Err(Error::CoordinateOutOfRange { .. })
        ));
    }

    #[test]
    fn amsterdam_in_rd_new_is_inside_the_netherlands() {
        let nl = bbox_wgs84_to_rdnew(&Fixture::Netherlands.into()).unwrap();
        let ams = bbox_wgs84_to_rdnew(&Fixture::Amsterdam.into()).unwrap();
        assert!(nl.contains(ams));
        assert!(nl.contains(Point::new(155_000.0, 463_000.0)));
    }

    #[test]
    fn empty_layer_is_not_a_zero_box() {
        let layer: Vec<Point> = Vec::new();
        assert_eq!(layer_extent(layer), None);
    }
}
