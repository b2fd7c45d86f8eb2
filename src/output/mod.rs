//! Writing computed rasters and their preview images

pub mod png;
pub mod ramp;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::raster::{RasterGrid, RasterProfile};
use crate::types::DataType;

pub use ramp::ColorRamp;

/// Paths of one written result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenOutput {
    pub raster: PathBuf,
    pub preview: PathBuf,
}

/// Writes results into one output directory, creating it on first use
#[derive(Debug, Clone)]
pub struct ResultWriter {
    output_dir: PathBuf,
}

impl ResultWriter {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes `values` as a float32 single-band GeoTIFF on `reference`'s grid,
    /// no-data NaN, plus a PNG preview rendered with `ramp`.
    ///
    /// Files are named `<name>.tif` and `<name>.png`.
    pub fn write(
        &self,
        values: Vec<f64>,
        reference: &RasterProfile,
        name: &str,
        ramp: ColorRamp,
    ) -> Result<WrittenOutput> {
        let profile = RasterProfile {
            count: 1,
            dtype: DataType::F32,
            nodata: Some(f64::NAN),
            ..reference.clone()
        };
        let grid = RasterGrid::new(profile, vec![values])?;

        let raster = self.write_raster(&grid, &format!("{}.tif", name))?;
        let preview = self.write_preview(&grid.bands[0], grid.width(), grid.height(), &format!("{}.png", name), ramp)?;

        Ok(WrittenOutput { raster, preview })
    }

    /// Writes `grid` unchanged as `<file_name>` and returns its path
    pub fn write_raster(&self, grid: &RasterGrid, file_name: &str) -> Result<PathBuf> {
        let path = self.prepare(file_name)?;
        crate::formats::tiff::GeoTiffWriter::new(grid)
            .write(&path)
            .map_err(|e| Error::WriteFailure(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), width = grid.width(), height = grid.height(), "wrote raster");
        Ok(path)
    }

    /// Renders `values` with `ramp` and writes the PNG as `<file_name>`
    pub fn write_preview(
        &self,
        values: &[f64],
        width: usize,
        height: usize,
        file_name: &str,
        ramp: ColorRamp,
    ) -> Result<PathBuf> {
        let path = self.prepare(file_name)?;
        let rgba = ramp.render(values);
        let bytes = png::create_png(&rgba, width, height)
            .map_err(|e| Error::WriteFailure(format!("{}: {}", path.display(), e)))?;
        fs::write(&path, bytes).map_err(|e| Error::WriteFailure(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), ramp = ?ramp, "wrote preview");
        Ok(path)
    }

    fn prepare(&self, file_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir).map_err(|e| {
            Error::WriteFailure(format!(
                "Cannot create output directory {}: {}",
                self.output_dir.display(),
                e
            ))
        })?;
        Ok(self.output_dir.join(file_name))
    }
}
