//! In-memory rasters and their georeferencing profile

use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result, TiffError};
use crate::formats::tiff::{GeoInfo, TiffReader, IFD};
use crate::types::DataType;

use super::{Bounds, Crs, GeoTransform};

/// Geometry and encoding of a raster without its pixels
#[derive(Debug, Clone, PartialEq)]
pub struct RasterProfile {
    pub width: usize,
    pub height: usize,
    /// Number of bands
    pub count: usize,
    pub crs: Option<Crs>,
    pub transform: GeoTransform,
    pub nodata: Option<f64>,
    pub dtype: DataType,
}

impl RasterProfile {
    /// Reads the profile of the first image in a GeoTIFF without decoding pixels
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = TiffReader::open(path).map_err(invalid(path))?;
        let tiff = reader.read().map_err(invalid(path))?;
        let ifd = tiff
            .main_ifd()
            .ok_or_else(|| Error::InvalidFormat(format!("{}: no image", path.display())))?;
        Self::from_ifd(ifd).map_err(invalid(path))
    }

    pub fn from_ifd(ifd: &IFD) -> std::result::Result<Self, TiffError> {
        let dims = ifd
            .dimensions()
            .ok_or(TiffError::MissingTag(crate::formats::tiff::tags::IMAGE_WIDTH))?;
        let geo = GeoInfo::from_ifd(ifd);

        Ok(Self {
            width: dims.width as usize,
            height: dims.height as usize,
            count: ifd.samples_per_pixel() as usize,
            crs: geo.crs(),
            transform: geo.transform().unwrap_or_default(),
            nodata: geo.nodata,
            dtype: ifd.data_type()?,
        })
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn bounds(&self) -> Bounds {
        self.transform.bounds(self.width, self.height)
    }

    /// Same width, height and transform within `tolerance`
    pub fn same_grid(&self, other: &RasterProfile, tolerance: f64) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.transform.approx_eq(&other.transform, tolerance)
    }

    /// NaN, or equal to the declared no-data value
    pub fn is_nodata(&self, value: f64) -> bool {
        value.is_nan() || self.nodata.is_some_and(|nodata| value == nodata)
    }
}

/// A raster held in memory, one widened vector per band in row-major order
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGrid {
    pub profile: RasterProfile,
    pub bands: Vec<Vec<f64>>,
}

impl RasterGrid {
    pub fn new(profile: RasterProfile, bands: Vec<Vec<f64>>) -> Result<Self> {
        if bands.len() != profile.count {
            return Err(Error::ComputationFailure(format!(
                "Profile declares {} bands, got {}",
                profile.count,
                bands.len()
            )));
        }
        let expected = profile.pixel_count();
        if let Some(band) = bands.iter().find(|band| band.len() != expected) {
            return Err(Error::ComputationFailure(format!(
                "Band holds {} pixels, expected {}x{}",
                band.len(),
                profile.width,
                profile.height
            )));
        }
        Ok(Self { profile, bands })
    }

    /// Reads the first image of a GeoTIFF with all of its bands
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = TiffReader::open(path).map_err(invalid(path))?;
        let tiff = reader.read().map_err(invalid(path))?;
        let ifd = tiff
            .main_ifd()
            .ok_or_else(|| Error::InvalidFormat(format!("{}: no image", path.display())))?;

        let profile = RasterProfile::from_ifd(ifd).map_err(invalid(path))?;
        let raster = reader.read_raster(ifd).map_err(invalid(path))?;
        debug!(
            path = %path.display(),
            width = profile.width,
            height = profile.height,
            bands = profile.count,
            dtype = profile.dtype.name(),
            "read raster"
        );

        Self::new(profile, raster.bands)
    }

    /// Band by 1-based index
    pub fn band(&self, index: usize) -> Result<&[f64]> {
        crate::algebra::validate_band(index, self.profile.count)?;
        Ok(&self.bands[index - 1])
    }

    pub fn width(&self) -> usize {
        self.profile.width
    }

    pub fn height(&self) -> usize {
        self.profile.height
    }

    pub fn bounds(&self) -> Bounds {
        self.profile.bounds()
    }
}

fn invalid(path: &Path) -> impl Fn(TiffError) -> Error + '_ {
    move |e| Error::InvalidFormat(format!("{}: {}", path.display(), e))
}
