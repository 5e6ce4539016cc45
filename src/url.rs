use anyhow::{Context, Result};
use maplit::hashmap;
use std::fmt;
use strfmt::strfmt;

use crate::tile::Tile;

/// GetTile template for the PDOK aerial photography WMTS.
pub const PDOK_ORTHO_URL: &str = "https://service.pdok.nl/hwh/luchtfotorgb/wmts/v1_0?layer={layer}&style=default&tilematrixset=EPSG:3857&Service=WMTS&Request=GetTile&Version=1.0.0&Format=image/jpeg&TileMatrix={z}&TileCol={x}&TileRow={y}";

/// The most recent 25cm aerial photography layer.
pub const PDOK_ORTHO_LAYER: &str = "Actueel_ortho25";

/// A WMTS GetTile URL template with the specifiers `{layer}`, `{z}` (the
/// tile matrix, zero padded to two digits), `{x}` (column) and `{y}` (row).
#[derive(Clone, PartialEq)]
pub struct UrlFormat {
    format_str: String,
    layer: String,
}

impl UrlFormat {
    pub fn new(format_str: String, layer: String) -> Self {
        Self { format_str, layer }
    }

    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// File extension matching the image format the template requests.
    pub fn extension(&self) -> &'static str {
        if self.format_str.contains("image/png") {
            "png"
        } else {
            "jpg"
        }
    }

    pub fn tile_url(&self, tile: &Tile) -> Result<String> {
        let vars = hashmap! {
            "layer".to_owned() => self.layer.clone(),
            "x".to_owned() => tile.x.to_string(),
            "y".to_owned() => tile.y.to_string(),
            "z".to_owned() => format!("{:02}", tile.z),
        };

        strfmt(&self.format_str, &vars).context("failed formatting URL")
    }
}

impl Default for UrlFormat {
    fn default() -> Self {
        Self::new(PDOK_ORTHO_URL.to_owned(), PDOK_ORTHO_LAYER.to_owned())
    }
}

impl fmt::Debug for UrlFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlFormat")
            .field("format_str", &self.format_str)
            .field("layer", &self.layer)
            .finish()
    }
}
