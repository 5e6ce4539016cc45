use std::convert::TryFrom;
use std::path::Path;

use anyhow::{Context, Result};
use geo::BoundingRect;
use geojson::GeoJson;

use crate::bounding_box::{Bbox, Point};

/// Anything with an axis-aligned bounding envelope.
pub trait Envelope {
    /// The envelope, or `None` if there is nothing to enclose (an empty
    /// geometry or a feature without one).
    fn envelope(&self) -> Option<Bbox>;
}

impl Envelope for Point {
    fn envelope(&self) -> Option<Bbox> {
        Bbox::from_points(*self, *self).ok()
    }
}

impl Envelope for Bbox {
    fn envelope(&self) -> Option<Bbox> {
        Some(*self)
    }
}

impl Envelope for geo::Geometry<f64> {
    fn envelope(&self) -> Option<Bbox> {
        let rect = self.bounding_rect()?;
        Bbox::from_points(
            Point::new(rect.min().x, rect.min().y),
            Point::new(rect.max().x, rect.max().y),
        )
        .ok()
    }
}

impl Envelope for geojson::Feature {
    fn envelope(&self) -> Option<Bbox> {
        let geometry = self.geometry.clone()?;
        geo::Geometry::<f64>::try_from(geometry).ok()?.envelope()
    }
}

impl<T: Envelope + ?Sized> Envelope for &T {
    fn envelope(&self) -> Option<Bbox> {
        (**self).envelope()
    }
}

/// The overall extent of a layer: the componentwise min/max over the
/// envelopes of all its features.
///
/// Features without an envelope are skipped. Returns `None` if no feature
/// has one, which is distinct from a valid zero-area extent.
pub fn layer_extent<I>(features: I) -> Option<Bbox>
where
    I: IntoIterator,
    I::Item: Envelope,
{
    features
        .into_iter()
        .filter_map(|feature| feature.envelope())
        .fold(None, |extent: Option<Bbox>, env| {
            let merged = match extent {
                None => env,
                Some(e) => Bbox::new(
                    e.xmin().min(env.xmin()),
                    e.ymin().min(env.ymin()),
                    e.xmax().max(env.xmax()),
                    e.ymax().max(env.ymax()),
                )
                .unwrap_or(e),
            };
            Some(merged)
        })
}

/// Read the geometries of a GeoJSON file (a feature collection, a single
/// feature or a bare geometry).
pub fn read_layer(path: &Path) -> Result<Vec<geo::Geometry<f64>>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed reading layer {}", path.display()))?;
    let geojson = text
        .parse::<GeoJson>()
        .with_context(|| format!("failed parsing {} as GeoJSON", path.display()))?;
    let collection: geo::GeometryCollection<f64> = geojson::quick_collection(&geojson)
        .with_context(|| format!("failed converting geometries of {}", path.display()))?;

    Ok(collection.0)
}
