use proj::Proj;

use crate::error::{Error, Result};
use crate::projection::coordinate::Coordinate;
use crate::raster::Crs;

/// Transforms coordinates between two coordinate reference systems.
///
/// Coordinates are in traditional GIS order (longitude/easting first).
/// A `Transformer` is not shareable across threads; parallel callers
/// build one per worker.
pub struct Transformer {
    proj: Proj,
    from: Crs,
    to: Crs,
}

impl Transformer {
    pub fn new(from: &Crs, to: &Crs) -> Result<Self> {
        let proj = Proj::new_known_crs(from.as_str(), to.as_str(), None).map_err(|e| {
            Error::ReprojectionFailure(format!("Cannot transform {} to {}: {}", from, to, e))
        })?;

        Ok(Self {
            proj,
            from: from.clone(),
            to: to.clone(),
        })
    }

    /// Transforms a coordinate from source to target CRS
    pub fn transform(&self, coord: Coordinate) -> Result<Coordinate> {
        self.proj.convert((coord.x, coord.y)).map(Coordinate::from).map_err(|e| {
            Error::ReprojectionFailure(format!(
                "Cannot transform ({}, {}) from {} to {}: {}",
                coord.x, coord.y, self.from, self.to, e
            ))
        })
    }

    /// Transforms a coordinate, yielding `None` where the projection is undefined
    pub fn try_transform(&self, coord: Coordinate) -> Option<Coordinate> {
        self.transform(coord).ok().filter(Coordinate::is_finite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wgs84_to_web_mercator() {
        let t = Transformer::new(&Crs::from_epsg(4326), &Crs::from_epsg(3857)).unwrap();
        let origin = t.transform(Coordinate::from_lonlat(0.0, 0.0)).unwrap();
        assert!(origin.x.abs() < 1e-6 && origin.y.abs() < 1e-6);

        let east = t.transform(Coordinate::from_lonlat(180.0, 0.0)).unwrap();
        assert!((east.x - 20037508.342789244).abs() < 1e-3);
    }

    #[test]
    fn test_try_transform_outside_domain() {
        let t = Transformer::new(&Crs::from_epsg(4326), &Crs::from_epsg(3857)).unwrap();
        assert!(t.try_transform(Coordinate::from_lonlat(10.0, 90.0)).is_none());
        assert!(t.try_transform(Coordinate::from_lonlat(10.0, 45.0)).is_some());
    }

    #[test]
    fn test_round_trip() {
        let forward = Transformer::new(&Crs::from_epsg(4326), &Crs::from_epsg(32633)).unwrap();
        let back = Transformer::new(&Crs::from_epsg(32633), &Crs::from_epsg(4326)).unwrap();
        let utm = forward.transform(Coordinate::from_lonlat(15.0, 45.0)).unwrap();
        assert!((utm.x - 500000.0).abs() < 1e-3);
        let lonlat = back.transform(utm).unwrap();
        assert!((lonlat.x - 15.0).abs() < 1e-9 && (lonlat.y - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_crs() {
        let result = Transformer::new(&Crs::from_epsg(4326), &Crs::new("EPSG:999999"));
        assert!(matches!(result, Err(Error::ReprojectionFailure(_))));
    }
}
