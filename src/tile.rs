use anyhow::{Context, Result};
use futures::prelude::*;
use reqwest::StatusCode;
use std::{
    fmt,
    ops::RangeInclusive,
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{fs, io::AsyncWriteExt};

use crate::bounding_box::{Bbox, Point};
use crate::convert::wgs84_to_tile_number;
use crate::fetch::BACKOFF_DELAY;
use crate::url::UrlFormat;

/// A web mercator slippy-map tile: `x` is the WMTS tile column, `y` the
/// tile row and `z` the zoom level.
/// ref: https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl Tile {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// The tile containing the (longitude, latitude) point at `zoom`.
    pub fn from_wgs84(point: Point, zoom: u8) -> crate::Result<Self> {
        let (x, y) = wgs84_to_tile_number(point.y, point.x, zoom)?;
        Ok(Self::new(x, y, zoom))
    }

    /// Path of the tile below `folder`, laid out as `<zz>/<col>_<row>.<ext>`.
    pub fn path_in(&self, folder: &Path, extension: &str) -> PathBuf {
        folder
            .join(format!("{:02}", self.z))
            .join(format!("{}_{}.{}", self.x, self.y, extension))
    }

    /// Fetches the given tile from the given URL using the given HTTP client.
    pub async fn fetch_from(
        &self,
        client: &reqwest::Client,
        url_fmt: &UrlFormat,
        output_folder: &Path,
        fetch_existing: bool,
    ) -> Result<()> {
        let formatted_url = url_fmt.tile_url(&self)?;
        let output_file = self.path_in(output_folder, url_fmt.extension());

        if let Some(parent) = output_file.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("failed creating output directory for tile {}", self)
            })?;
        }

        // if the tile's already been downloaded, skip it
        if !fetch_existing && output_file.exists() {
            log::debug!("skipping existing tile {}", output_file.display());
            return Ok(());
        }

        let response = loop {
            let raw_response = client
                .get(&formatted_url)
                .send()
                .await
                .with_context(|| format!("failed fetching tile {}", self))?;

            if raw_response.status() == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = raw_response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|val| val.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(BACKOFF_DELAY);

                log::warn!("rate limited fetching tile {}, waiting {:?}", self, retry_after);
                tokio::time::sleep(retry_after).await;
                continue;
            }

            break raw_response
                .error_for_status()
                .with_context(|| format!("received invalid status code fetching tile {}", self))?;
        };

        write_atomically(response.bytes_stream(), &output_file)
            .await
            .with_context(|| format!("failed streaming tile {} to disk", self))
    }
}

/// `<col>x<row>x<zoom>`, the order of [`Tile::new`].
impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}

/// `<path>.part`, where a download is staged until it completes.
fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Streams `body` into a `.part` sibling of `path` and renames it into place
/// once the stream has ended, so `path` never holds a truncated download. The
/// staging file is removed when anything fails.
async fn write_atomically<S, B, E>(body: S, path: &Path) -> Result<()>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let part = part_path(path);

    let result = match stream_to_file(body, &part).await {
        Ok(()) => fs::rename(&part, path)
            .await
            .with_context(|| format!("failed moving {} into place", part.display())),
        Err(e) => Err(e),
    };
    if result.is_err() {
        let _ = fs::remove_file(&part).await;
    }

    result
}

async fn stream_to_file<S, B, E>(body: S, path: &Path) -> Result<()>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    futures::pin_mut!(body);

    let mut file = fs::File::create(path)
        .await
        .with_context(|| format!("failed creating {}", path.display()))?;
    while let Some(chunk) = body.next().await {
        file.write_all(chunk?.as_ref()).await?;
    }
    file.flush().await?;

    Ok(())
}

/// The inclusive range of tiles covering a WGS84 bounding box at one zoom
/// level.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TileRange {
    pub cols: RangeInclusive<u32>,
    pub rows: RangeInclusive<u32>,
    pub zoom: u8,
}

impl TileRange {
    /// Computes the range from the tiles of the box's corners. Rows count
    /// from north to south, so the upper corners give the first row.
    pub fn covering(bbox: &Bbox, zoom: u8) -> crate::Result<Self> {
        let lower_left = Tile::from_wgs84(bbox.lower_left(), zoom)?;
        let lower_right = Tile::from_wgs84(bbox.lower_right(), zoom)?;
        let upper_left = Tile::from_wgs84(bbox.upper_left(), zoom)?;

        let range = TileRange {
            cols: lower_left.x..=lower_right.x,
            rows: upper_left.y..=lower_left.y,
            zoom,
        };
        log::debug!(
            "zoom {}: cols {:?}, rows {:?} ({} tiles)",
            zoom,
            range.cols,
            range.rows,
            range.len()
        );

        Ok(range)
    }

    pub fn len(&self) -> usize {
        let span = |r: &RangeInclusive<u32>| (*r.end() - *r.start()) as usize + 1;
        span(&self.cols).saturating_mul(span(&self.rows))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the tiles column by column.
    pub fn tiles(self) -> impl Iterator<Item = Tile> {
        let TileRange { cols, rows, zoom } = self;
        cols.flat_map(move |x| rows.clone().map(move |y| Tile::new(x, y, zoom)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_from_wgs84_swaps_to_lat_lon() {
        let tile = Tile::from_wgs84(Point::new(6.0402, 50.7929), 18).unwrap();
        assert_eq!(tile, Tile::new(135470, 87999, 18));
    }

    #[test]
    fn tile_label_is_col_row_zoom() {
        assert_eq!(Tile::new(135470, 87999, 18).to_string(), "135470x87999x18");
    }

    #[test]
    fn tile_path() {
        let tile = Tile::new(33, 21, 6);
        assert_eq!(
            tile.path_in(Path::new("data/ortho"), "jpg"),
            Path::new("data/ortho/06/33_21.jpg")
        );
    }

    type Chunk = std::result::Result<Vec<u8>, std::io::Error>;

    fn broken_body() -> impl Stream<Item = Chunk> {
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        stream::iter(vec![Ok(b"\xff\xd8 half a jpeg".to_vec()), Err(reset)])
    }

    #[tokio::test]
    async fn completed_download_is_moved_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("33_21.jpg");

        let body = stream::iter(vec![Ok(b"\xff\xd8".to_vec()), Ok(b"\xff\xd9".to_vec())]);
        write_atomically::<_, _, std::io::Error>(body, &path)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"\xff\xd8\xff\xd9");
        assert!(!part_path(&path).exists());
    }

    #[tokio::test]
    async fn interrupted_download_leaves_no_tile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("33_21.jpg");

        assert!(write_atomically(broken_body(), &path).await.is_err());

        // a rerun without --fetch-existing must not mistake a partial
        // download for a finished tile
        assert!(!path.exists());
        assert!(!part_path(&path).exists());
    }

    #[tokio::test]
    async fn interrupted_refetch_keeps_previous_tile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("33_21.jpg");
        std::fs::write(&path, b"previous").unwrap();

        assert!(write_atomically(broken_body(), &path).await.is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"previous");
    }

    #[test]
    fn part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("data/06/33_21.jpg")),
            Path::new("data/06/33_21.jpg.part")
        );
    }

    #[test]
    fn range_covers_box() {
        let bbox = Bbox::new(4.7287, 52.2782, 5.0683, 52.4311).unwrap();
        let range = TileRange::covering(&bbox, 12).unwrap();

        assert!(range.cols.start() <= range.cols.end());
        assert!(range.rows.start() <= range.rows.end());

        let tiles: Vec<Tile> = range.clone().tiles().collect();
        assert_eq!(tiles.len(), range.len());
        for corner in &bbox {
            assert!(tiles.contains(&Tile::from_wgs84(corner, 12).unwrap()));
        }
    }

    #[test]
    fn single_tile_at_zoom_zero() {
        let bbox = Bbox::new(3.3, 50.7, 7.2, 53.5).unwrap();
        let range = TileRange::covering(&bbox, 0).unwrap();
        assert_eq!(range.len(), 1);
        assert_eq!(range.tiles().collect::<Vec<_>>(), vec![Tile::new(0, 0, 0)]);
    }

    #[test]
    fn range_rejects_polar_boxes() {
        let bbox = Bbox::new(0.0, 80.0, 10.0, 89.0).unwrap();
        assert!(TileRange::covering(&bbox, 4).is_err());
    }
}
