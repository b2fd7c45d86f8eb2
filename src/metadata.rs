//! Geometric and band metadata of a raster file

use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::raster::{Bounds, RasterProfile};
use crate::types::DataType;

/// Driver name reported for every file this crate reads
pub const DRIVER: &str = "GTiff";

/// Summary record of a raster file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub width: usize,
    pub height: usize,
    pub count: usize,
    /// CRS identifier, empty when the file carries none
    pub crs: String,
    /// Affine coefficients `a b c d e f`
    pub transform: [f64; 6],
    pub bounds: Bounds,
    pub driver: &'static str,
    pub dtype: DataType,
    pub nodata: Option<f64>,
}

impl From<&RasterProfile> for Metadata {
    fn from(profile: &RasterProfile) -> Self {
        Self {
            width: profile.width,
            height: profile.height,
            count: profile.count,
            crs: profile.crs.as_ref().map(|crs| crs.to_string()).unwrap_or_default(),
            transform: profile.transform.to_array(),
            bounds: profile.bounds(),
            driver: DRIVER,
            dtype: profile.dtype,
            nodata: profile.nodata,
        }
    }
}

/// Reads the metadata record of a file without decoding its pixels
pub fn extract<P: AsRef<Path>>(path: P) -> Result<Metadata> {
    let profile = RasterProfile::read(path.as_ref())?;
    debug!(path = %path.as_ref().display(), width = profile.width, height = profile.height, "extracted metadata");
    Ok(Metadata::from(&profile))
}
