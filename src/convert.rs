use std::f64::consts::PI;

use proj::Proj;

use crate::bounding_box::{Bbox, Point};
use crate::error::{Error, Result};
use crate::extent::layer_extent;

/// Maximum latitude (in degrees) covered by the web mercator tile pyramid.
pub const MERCATOR_LAT_LIMIT: f64 = 85.051_128_779_806_59;

/// Highest zoom level whose tile indices fit a `u32`.
pub const MAX_ZOOM: u8 = 32;

/// Points sampled along each edge when projecting a bounding box.
const EDGE_SAMPLES: usize = 32;

const WGS84: &str = "EPSG:4326";
const RD_NEW: &str = "EPSG:28992";

/// Transforms coordinates between WGS84 and RD New.
///
/// Both directions use PROJ's pipelines normalized for visualization, so
/// geographic coordinates are always (longitude, latitude) on either side
/// of the transform and projected ones (easting, northing).
pub struct RdNewTransformer {
    to_rdnew: Proj,
    to_wgs84: Proj,
}

impl RdNewTransformer {
    pub fn new() -> Result<Self> {
        Ok(RdNewTransformer {
            to_rdnew: known_crs(WGS84, RD_NEW)?,
            to_wgs84: known_crs(RD_NEW, WGS84)?,
        })
    }

    /// Convert a (longitude, latitude) point to RD New meters.
    pub fn to_rdnew(&self, point: Point) -> Result<Point> {
        convert(&self.to_rdnew, point)
    }

    /// Convert an RD New point to (longitude, latitude).
    pub fn to_wgs84(&self, point: Point) -> Result<Point> {
        convert(&self.to_wgs84, point)
    }
}

fn known_crs(from: &str, to: &str) -> Result<Proj> {
    Proj::new_known_crs(from, to, None).map_err(|e| {
        Error::Projection(format!(
            "failed building {} -> {} transform: {}",
            from, to, e
        ))
    })
}

fn convert(proj: &Proj, point: Point) -> Result<Point> {
    let (x, y) = proj
        .convert((point.x, point.y))
        .map_err(|e| Error::Projection(format!("failed transforming {}: {}", point, e)))?;

    if !x.is_finite() || !y.is_finite() {
        return Err(Error::Projection(format!(
            "transforming {} produced a non-finite coordinate",
            point
        )));
    }

    Ok(Point::new(x, y))
}

/// Convert WGS84 (longitude, latitude) points to RD New (easting, northing)
/// in meters.
///
/// # Example
/// ```rust,no_run
/// # use pdok_downloader::{wgs84_to_rdnew, Point};
/// let dam = wgs84_to_rdnew(&[Point::new(4.8932, 52.3731)]).unwrap();
/// ```
pub fn wgs84_to_rdnew(points: &[Point]) -> Result<Vec<Point>> {
    let transformer = RdNewTransformer::new()?;
    points.iter().map(|&p| transformer.to_rdnew(p)).collect()
}

/// Convert RD New points back to WGS84 (longitude, latitude).
pub fn rdnew_to_wgs84(points: &[Point]) -> Result<Vec<Point>> {
    let transformer = RdNewTransformer::new()?;
    points.iter().map(|&p| transformer.to_wgs84(p)).collect()
}

/// The RD New box enclosing a WGS84 box.
///
/// Parallels and meridians become curves in RD New, so the box's outline is
/// sampled along every edge rather than projecting the corners alone.
pub fn bbox_wgs84_to_rdnew(bbox: &Bbox) -> Result<Bbox> {
    enclosing(&wgs84_to_rdnew(&outline(bbox, EDGE_SAMPLES))?)
}

/// The WGS84 box enclosing an RD New box, sampled like
/// [`bbox_wgs84_to_rdnew`].
pub fn bbox_rdnew_to_wgs84(bbox: &Bbox) -> Result<Bbox> {
    enclosing(&rdnew_to_wgs84(&outline(bbox, EDGE_SAMPLES))?)
}

/// Points along the boundary of `bbox`, `segments` steps per edge, walking
/// lower-left, lower-right, upper-right, upper-left.
fn outline(bbox: &Bbox, segments: usize) -> Vec<Point> {
    let segments = segments.max(1);
    let lerp = |a: Point, b: Point, t: f64| {
        Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
    };
    let ring = [
        bbox.lower_left(),
        bbox.lower_right(),
        bbox.upper_right(),
        bbox.upper_left(),
        bbox.lower_left(),
    ];

    ring.windows(2)
        .flat_map(|edge| {
            let (a, b) = (edge[0], edge[1]);
            (0..segments).map(move |i| lerp(a, b, i as f64 / segments as f64))
        })
        .collect()
}

fn enclosing(points: &[Point]) -> Result<Bbox> {
    layer_extent(points).ok_or_else(|| Error::Projection("no points to enclose".to_owned()))
}

/// Convert a WGS84 coordinate to the (column, row) index of the slippy-map
/// tile containing it at `zoom`.
///
/// ref: https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames
///
/// Fails with [`Error::CoordinateOutOfRange`] if `lat` is outside the
/// mercator range or `lon` outside [-180, 180], and with
/// [`Error::ZoomOutOfRange`] above [`MAX_ZOOM`]. `lon == 180` maps to the
/// last column.
pub fn wgs84_to_tile_number(lat: f64, lon: f64, zoom: u8) -> Result<(u32, u32)> {
    // written negated so NaN is rejected as well
    if !(lat.abs() < MERCATOR_LAT_LIMIT) {
        return Err(Error::CoordinateOutOfRange {
            axis: "latitude",
            value: lat,
            limit: MERCATOR_LAT_LIMIT,
        });
    }
    if !(lon.abs() <= 180_f64) {
        return Err(Error::CoordinateOutOfRange {
            axis: "longitude",
            value: lon,
            limit: 180_f64,
        });
    }
    if zoom > MAX_ZOOM {
        return Err(Error::ZoomOutOfRange {
            zoom,
            max: MAX_ZOOM,
        });
    }

    // scale factor
    let n = 2_f64.powi(zoom as i32);
    let last = n - 1_f64;

    let lat_rad = lat.to_radians();
    let sec = 1_f64 / lat_rad.cos();

    let col = (lon + 180_f64) / 360_f64 * n;
    let row = (1_f64 - (lat_rad.tan() + sec).ln() / PI) / 2_f64 * n;

    Ok((col.min(last) as u32, row.max(0_f64).min(last) as u32))
}
