use pdok_downloader::{wgs84_to_tile_number, Bbox, Fixture};
use std::str::FromStr;

pub fn is_numeric<T: FromStr>(v: String) -> Result<(), String> {
    v.parse::<T>()
        .map(|_| ())
        .map_err(|_| "must be numeric".to_owned())
}

pub fn is_numeric_min(min: usize) -> impl Fn(String) -> Result<(), String> {
    move |v: String| {
        let val = v
            .parse::<usize>()
            .map_err(|_| "must be numeric".to_owned())?;

        if val < min {
            return Err(format!("must be >= {}", min));
        }

        Ok(())
    }
}

/// Zoom levels whose tile indices fit the web mercator pyramid of the
/// PDOK services.
pub fn is_zoom(v: String) -> Result<(), String> {
    let val = v.parse::<u8>().map_err(|_| "must be numeric".to_owned())?;

    if val > 24 {
        return Err("must be <= 24".to_owned());
    }

    Ok(())
}

pub fn is_bb_fixture(v: String) -> Result<(), String> {
    v.parse::<Fixture>()
        .map(|_| ())
        .map_err(|_| "invalid fixture (expected netherlands or amsterdam)".to_owned())
}

/// Both opposite corners of a WGS84 box must fall on the web mercator grid.
pub fn is_tileable(bbox: &Bbox) -> pdok_downloader::Result<()> {
    for corner in [bbox.lower_left(), bbox.upper_right()].iter() {
        wgs84_to_tile_number(corner.y, corner.x, 0)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric() {
        assert!(is_numeric::<f64>("-12.5".to_owned()).is_ok());
        assert!(is_numeric::<f64>("west".to_owned()).is_err());
        assert!(is_numeric_min(1)("0".to_owned()).is_err());
        assert!(is_numeric_min(1)("4".to_owned()).is_ok());
    }

    #[test]
    fn zoom() {
        assert!(is_zoom("0".to_owned()).is_ok());
        assert!(is_zoom("19".to_owned()).is_ok());
        assert!(is_zoom("25".to_owned()).is_err());
        assert!(is_zoom("-1".to_owned()).is_err());
    }

    #[test]
    fn tileable() {
        assert!(is_tileable(&Bbox::from(Fixture::Netherlands)).is_ok());
        assert!(is_tileable(&Bbox::new(-180.0, -85.0, 180.0, 85.0).unwrap()).is_ok());

        let east_of_grid = Bbox::new(4.0, 52.0, 200.0, 53.0).unwrap();
        let err = is_tileable(&east_of_grid).unwrap_err();
        assert!(err.to_string().starts_with("longitude 200°"), "{}", err);

        // RD New meters passed without --rd
        let meters = Bbox::new(120_000.0, 480_000.0, 125_000.0, 490_000.0).unwrap();
        assert!(is_tileable(&meters).is_err());
    }

    #[test]
    fn fixture() {
        assert!(is_bb_fixture("NL".to_owned()).is_ok());
        assert!(is_bb_fixture("usa".to_owned()).is_err());
    }
}
