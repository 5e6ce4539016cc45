use std::convert::TryFrom;
use std::fmt;

use crate::error::{Error, Result};

/// A two-dimensional coordinate.
///
/// Depending on the context this is either a (longitude, latitude) pair in
/// degrees or an (easting, northing) pair in RD New meters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// The corners of a [`Bbox`], in the order used for positional access and
/// iteration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Corner {
    LowerLeft,
    LowerRight,
    UpperLeft,
    UpperRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::LowerLeft,
        Corner::LowerRight,
        Corner::UpperLeft,
        Corner::UpperRight,
    ];

    /// Position of the corner in [`Corner::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Corner::LowerLeft => "lower_left",
            Corner::LowerRight => "lower_right",
            Corner::UpperLeft => "upper_left",
            Corner::UpperRight => "upper_right",
        }
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An axis-aligned bounding box.
///
/// The bounds are checked on construction, so `xmin <= xmax` and
/// `ymin <= ymax` hold for every value of this type.
///
/// # Example
/// ```rust
/// # use pdok_downloader::{Bbox, Point};
/// let bbox = Bbox::new(4.7287, 52.2782, 5.0683, 52.4311).unwrap();
/// assert!(bbox.contains(Point::new(4.9041, 52.3676)));
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bbox {
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
}

impl Bbox {
    /// Create a new bounding box.
    ///
    /// Fails with [`Error::InvalidBounds`] if a minimum exceeds its maximum
    /// or any bound is NaN.
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Result<Self> {
        // written negated so NaN bounds are rejected as well
        if !(xmin <= xmax) || !(ymin <= ymax) {
            return Err(Error::InvalidBounds {
                xmin,
                ymin,
                xmax,
                ymax,
            });
        }

        Ok(Bbox {
            xmin,
            ymin,
            xmax,
            ymax,
        })
    }

    /// Create a bounding box spanning from `point_min` to `point_max`.
    pub fn from_points(point_min: Point, point_max: Point) -> Result<Self> {
        Self::new(point_min.x, point_min.y, point_max.x, point_max.y)
    }

    pub fn xmin(&self) -> f64 {
        self.xmin
    }

    pub fn ymin(&self) -> f64 {
        self.ymin
    }

    pub fn xmax(&self) -> f64 {
        self.xmax
    }

    pub fn ymax(&self) -> f64 {
        self.ymax
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.xmin + self.width() / 2.0,
            self.ymin + self.height() / 2.0,
        )
    }

    pub fn lower_left(&self) -> Point {
        Point::new(self.xmin, self.ymin)
    }

    pub fn lower_right(&self) -> Point {
        Point::new(self.xmax, self.ymin)
    }

    pub fn upper_left(&self) -> Point {
        Point::new(self.xmin, self.ymax)
    }

    pub fn upper_right(&self) -> Point {
        Point::new(self.xmax, self.ymax)
    }

    /// Named corner access.
    pub fn get(&self, corner: Corner) -> Point {
        match corner {
            Corner::LowerLeft => self.lower_left(),
            Corner::LowerRight => self.lower_right(),
            Corner::UpperLeft => self.upper_left(),
            Corner::UpperRight => self.upper_right(),
        }
    }

    /// Positional corner access: 0 is lower-left, 1 lower-right, 2 upper-left
    /// and 3 upper-right.
    pub fn corner(&self, index: usize) -> Result<Point> {
        Corner::ALL
            .get(index)
            .map(|&corner| self.get(corner))
            .ok_or(Error::IndexOutOfRange(index))
    }

    /// All four corners in positional order.
    pub fn corners(&self) -> [Point; 4] {
        [
            self.lower_left(),
            self.lower_right(),
            self.upper_left(),
            self.upper_right(),
        ]
    }

    /// Whether the point or box lies inside this box. Boundaries are
    /// inclusive; a box is contained if all of its corners are.
    pub fn contains<O: Into<Operand>>(&self, other: O) -> bool {
        match other.into() {
            Operand::Point(p) => {
                self.xmin <= p.x
                    && p.x <= self.xmax
                    && self.ymin <= p.y
                    && p.y <= self.ymax
            }
            Operand::Bbox(b) => b.corners().iter().all(|&p| self.contains(p)),
        }
    }

    /// Containment check for operands that first have to be recognized as a
    /// point or a box, like raw coordinate slices or arbitrary geometries.
    pub fn try_contains<T>(&self, other: T) -> Result<bool>
    where
        Operand: TryFrom<T, Error = Error>,
    {
        Operand::try_from(other).map(|operand| self.contains(operand))
    }
}

impl fmt::Display for Bbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.xmin, self.ymin, self.xmax, self.ymax)
    }
}

impl<'a> IntoIterator for &'a Bbox {
    type Item = Point;
    type IntoIter = std::array::IntoIter<Point, 4>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIterator::into_iter(self.corners())
    }
}

/// The values a containment check accepts.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Operand {
    Point(Point),
    Bbox(Bbox),
}

impl From<Point> for Operand {
    fn from(p: Point) -> Self {
        Operand::Point(p)
    }
}

impl From<&Point> for Operand {
    fn from(p: &Point) -> Self {
        Operand::Point(*p)
    }
}

impl From<Bbox> for Operand {
    fn from(b: Bbox) -> Self {
        Operand::Bbox(b)
    }
}

impl From<&Bbox> for Operand {
    fn from(b: &Bbox) -> Self {
        Operand::Bbox(*b)
    }
}

/// A raw `[x, y]` coordinate pair.
impl TryFrom<&[f64]> for Operand {
    type Error = Error;

    fn try_from(coords: &[f64]) -> Result<Self> {
        match *coords {
            [x, y] => Ok(Operand::Point(Point::new(x, y))),
            _ => Err(Error::UnsupportedOperand(format!(
                "coordinate slice of length {} (expected 2)",
                coords.len()
            ))),
        }
    }
}

impl TryFrom<&geo::Geometry<f64>> for Operand {
    type Error = Error;

    fn try_from(geometry: &geo::Geometry<f64>) -> Result<Self> {
        use geo::Geometry as G;

        let kind = match geometry {
            G::Point(p) => return Ok(Operand::Point(Point::new(p.x(), p.y()))),
            G::Rect(r) => {
                let (min, max) = (r.min(), r.max());
                return Bbox::new(min.x, min.y, max.x, max.y).map(Operand::Bbox);
            }
            G::Line(_) => "Line",
            G::LineString(_) => "LineString",
            G::Polygon(_) => "Polygon",
            G::MultiPoint(_) => "MultiPoint",
            G::MultiLineString(_) => "MultiLineString",
            G::MultiPolygon(_) => "MultiPolygon",
            G::GeometryCollection(_) => "GeometryCollection",
            G::Triangle(_) => "Triangle",
        };

        Err(Error::UnsupportedOperand(format!("geometry of type {}", kind)))
    }
}

/// A bounding box fixture containing preset WGS84 coordinates (longitude,
/// latitude) for a known region.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Fixture {
    Netherlands,
    Amsterdam,
}

impl std::str::FromStr for Fixture {
    type Err = &'static str;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        use Fixture::*;

        let s = s.to_lowercase();
        if s == "nl" || s.starts_with("netherlands") {
            return Ok(Netherlands);
        }

        if s.starts_with("amsterdam") || s == "ams" {
            return Ok(Amsterdam);
        }

        Err("unrecognized fixture")
    }
}

impl From<Fixture> for Bbox {
    fn from(fixture: Fixture) -> Self {
        use Fixture::*;

        let (xmin, ymin, xmax, ymax) = match fixture {
            Netherlands => (3.3079, 50.7504, 7.2275, 53.5560),
            Amsterdam => (4.7287, 52.2782, 5.0683, 52.4311),
        };

        Bbox {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }
}
