//! The processing pipelines behind the CLI and the HTTP API
//!
//! Each call reads its inputs from disk, works on in-memory grids and writes
//! its results into the configured output directory. Calls share nothing but
//! that directory and may run concurrently.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::algebra::{self, BandView, Statistics};
use crate::align;
use crate::config::Config;
use crate::error::Result;
use crate::metadata::{self, Metadata};
use crate::output::{ColorRamp, ResultWriter};
use crate::raster::{Crs, RasterGrid, RasterProfile};
use crate::reproject;

/// Band holding red reflectance in a multi-band scene
pub const DEFAULT_RED_BAND: usize = 3;
/// Band holding near-infrared reflectance in a multi-band scene
pub const DEFAULT_NIR_BAND: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReprojectOutput {
    pub output_path: PathBuf,
    pub crs: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VegetationIndexOutput {
    #[serde(flatten)]
    pub statistics: Statistics,
    pub ndvi_geotiff: PathBuf,
    pub ndvi_png: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeOutput {
    pub changed_area_pixels: usize,
    pub changed_area_percentage: f64,
    pub output_tiff: PathBuf,
    pub output_png: PathBuf,
    pub threshold_used: f64,
    /// `<height>x<width>` of the compared grid
    pub dimensions: String,
}

/// Runs the pipelines with one [`Config`]
#[derive(Debug, Clone)]
pub struct Processor {
    config: Config,
    writer: ResultWriter,
}

impl Processor {
    pub fn new(config: Config) -> Self {
        let writer = ResultWriter::new(&config.output_dir);
        Self { config, writer }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metadata<P: AsRef<Path>>(&self, path: P) -> Result<Metadata> {
        info!(path = %path.as_ref().display(), "reading metadata");
        metadata::extract(path)
    }

    /// Reprojects every band into `target` and writes `<stem>_reprojected.tif`
    pub fn reproject<P: AsRef<Path>>(&self, path: P, target: &Crs) -> Result<ReprojectOutput> {
        let path = path.as_ref();
        info!(path = %path.display(), target = %target, "reprojection requested");

        let grid = RasterGrid::read(path)?;
        let out = reproject::reproject(&grid, target)?;
        let output_path = self
            .writer
            .write_raster(&out, &format!("{}_reprojected.tif", stem(path)))?;

        Ok(ReprojectOutput {
            output_path,
            crs: target.to_string(),
        })
    }

    /// Vegetation index from the first band of two files.
    ///
    /// The NIR raster is aligned onto the red raster's grid first.
    pub fn vegetation_index<P: AsRef<Path>, Q: AsRef<Path>>(&self, red_path: P, nir_path: Q) -> Result<VegetationIndexOutput> {
        let (red_path, nir_path) = (red_path.as_ref(), nir_path.as_ref());
        info!(red = %red_path.display(), nir = %nir_path.display(), "vegetation index requested");

        align::check_crs(&RasterProfile::read(red_path)?, &RasterProfile::read(nir_path)?)?;
        let red = RasterGrid::read(red_path)?;
        let nir = RasterGrid::read(nir_path)?;
        let pair = align::align(&red, &nir, self.config.alignment_tolerance)?;

        let index = algebra::vegetation_index(
            BandView::new(red.band(1)?, red.profile.nodata),
            BandView::new(pair.aligned.band(1)?, pair.aligned.profile.nodata),
        )?;
        self.finish_index(index, &red.profile, red_path)
    }

    /// Vegetation index from two bands of one file.
    ///
    /// Both band numbers are checked before any pixel is read.
    pub fn vegetation_index_from_bands<P: AsRef<Path>>(&self, path: P, red_band: usize, nir_band: usize) -> Result<VegetationIndexOutput> {
        let path = path.as_ref();
        info!(path = %path.display(), red_band, nir_band, "multi-band vegetation index requested");

        let profile = RasterProfile::read(path)?;
        algebra::validate_band(red_band, profile.count)?;
        algebra::validate_band(nir_band, profile.count)?;

        let grid = RasterGrid::read(path)?;
        let nodata = grid.profile.nodata;
        let index = algebra::vegetation_index(
            BandView::new(grid.band(red_band)?, nodata),
            BandView::new(grid.band(nir_band)?, nodata),
        )?;
        self.finish_index(index, &grid.profile, path)
    }

    fn finish_index(&self, index: Vec<f64>, reference: &RasterProfile, named_after: &Path) -> Result<VegetationIndexOutput> {
        let statistics = Statistics::compute(&index);
        info!(
            min = statistics.min,
            max = statistics.max,
            mean = statistics.mean,
            valid = statistics.valid,
            "vegetation index computed"
        );

        let written = self
            .writer
            .write(index, reference, &format!("{}_ndvi", stem(named_after)), ColorRamp::RdYlGn)?;
        Ok(VegetationIndexOutput {
            statistics,
            ndvi_geotiff: written.raster,
            ndvi_png: written.preview,
        })
    }

    /// Compares `band` of two rasters in one CRS.
    ///
    /// CRS and band number are checked from the file headers before pixels are
    /// read. Image B is resampled onto image A's grid when the grids differ.
    pub fn detect_change<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        path_a: P,
        path_b: Q,
        band: usize,
        threshold: Option<f64>,
    ) -> Result<ChangeOutput> {
        let (path_a, path_b) = (path_a.as_ref(), path_b.as_ref());
        let threshold = threshold.unwrap_or(self.config.default_threshold);
        info!(a = %path_a.display(), b = %path_b.display(), band, threshold, "change detection requested");

        let profile_a = RasterProfile::read(path_a)?;
        let profile_b = RasterProfile::read(path_b)?;
        align::check_crs(&profile_a, &profile_b)?;
        algebra::validate_band(band, profile_a.count)?;
        algebra::validate_band(band, profile_b.count)?;

        let a = RasterGrid::read(path_a)?;
        let b = RasterGrid::read(path_b)?;
        let pair = align::align(&a, &b, self.config.alignment_tolerance)?;

        let change = algebra::detect_change(
            BandView::new(a.band(band)?, a.profile.nodata),
            BandView::new(pair.aligned.band(band)?, pair.aligned.profile.nodata),
            threshold,
            self.config.normalization_epsilon,
        )?;
        info!(
            changed = change.changed_pixel_count,
            percentage = change.changed_percentage,
            resampled = pair.resampled(),
            "change mask computed"
        );

        let dimensions = format!("{}x{}", a.height(), a.width());
        let written = self
            .writer
            .write(change.mask, &a.profile, &format!("change_{}", stem(path_a)), ColorRamp::Grayscale)?;

        Ok(ChangeOutput {
            changed_area_pixels: change.changed_pixel_count,
            changed_area_percentage: change.changed_percentage,
            output_tiff: written.raster,
            output_png: written.preview,
            threshold_used: threshold,
            dimensions,
        })
    }
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "raster".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::formats::tiff::GeoTiffWriter;
    use crate::raster::GeoTransform;
    use crate::types::DataType;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    const SIZE: usize = 100;

    fn setup() -> (TempDir, Processor) {
        let dir = tempdir().unwrap();
        let processor = Processor::new(Config::in_dir(dir.path()));
        (dir, processor)
    }

    fn write_fixture(dir: &Path, name: &str, crs: u32, dtype: DataType, bands: Vec<Vec<f64>>) -> PathBuf {
        let transform = if crs == 4326 {
            GeoTransform::from_origin(10.0, 50.0, 0.01, 0.01)
        } else {
            GeoTransform::from_origin(500000.0, 5000000.0, 10.0, 10.0)
        };
        let profile = RasterProfile {
            width: SIZE,
            height: SIZE,
            count: bands.len(),
            crs: Some(Crs::from_epsg(crs)),
            transform,
            nodata: None,
            dtype,
        };
        let path = dir.join(name);
        GeoTiffWriter::new(&RasterGrid::new(profile, bands).unwrap())
            .write(&path)
            .unwrap();
        path
    }

    fn constant(value: f64) -> Vec<f64> {
        vec![value; SIZE * SIZE]
    }

    fn output_files(processor: &Processor) -> usize {
        fs::read_dir(&processor.config().output_dir).map_or(0, |entries| entries.count())
    }

    #[test]
    fn test_metadata_round_trip() {
        let (dir, processor) = setup();
        let path = write_fixture(dir.path(), "rgb.tif", 4326, DataType::U8, vec![constant(1.0); 3]);

        let metadata = processor.metadata(&path).unwrap();
        assert_eq!(metadata.width, 100);
        assert_eq!(metadata.height, 100);
        assert_eq!(metadata.count, 3);
        assert_eq!(metadata.crs, "EPSG:4326");
    }

    #[test]
    fn test_reproject_to_web_mercator() {
        let (dir, processor) = setup();
        let band = (0..SIZE * SIZE).map(|i| (i % 250) as f64).collect();
        let path = write_fixture(dir.path(), "scene.tif", 4326, DataType::U8, vec![band]);

        let out = processor.reproject(&path, &Crs::from_epsg(3857)).unwrap();
        assert_eq!(out.crs, "EPSG:3857");
        assert_eq!(out.output_path, processor.config().output_dir.join("scene_reprojected.tif"));

        let metadata = processor.metadata(&out.output_path).unwrap();
        assert_eq!(metadata.crs, "EPSG:3857");
        assert_eq!(metadata.dtype, DataType::U8);
        let pixels = (metadata.width * metadata.height) as f64;
        assert!(pixels > 1000.0 && pixels < 100_000.0);
    }

    #[test]
    fn test_reproject_unknown_crs() {
        let (dir, processor) = setup();
        let path = write_fixture(dir.path(), "scene.tif", 4326, DataType::U8, vec![constant(1.0)]);
        let err = processor.reproject(&path, &Crs::new("EPSG:999999")).unwrap_err();
        assert!(matches!(err, Error::ReprojectionFailure(_)));
    }

    #[test]
    fn test_vegetation_index_exact_value() {
        let (dir, processor) = setup();
        let red = write_fixture(dir.path(), "red.tif", 32633, DataType::U16, vec![constant(100.0)]);
        let nir = write_fixture(dir.path(), "nir.tif", 32633, DataType::U16, vec![constant(200.0)]);

        let out = processor.vegetation_index(&red, &nir).unwrap();
        let stats = out.statistics;
        assert!((stats.mean - 0.333).abs() < 0.01);
        assert!(stats.min <= stats.mean && stats.mean <= stats.max);
        assert_eq!(out.ndvi_geotiff, processor.config().output_dir.join("red_ndvi.tif"));
        assert!(out.ndvi_png.exists());

        let json = serde_json::to_value(&out).unwrap();
        assert!(json["median"].is_number());
        assert!(json["ndvi_png"].as_str().unwrap().ends_with("red_ndvi.png"));
    }

    #[test]
    fn test_division_by_zero_is_missing() {
        let (dir, processor) = setup();
        let mut red = constant(100.0);
        let mut nir = constant(200.0);
        red[0] = 0.0;
        nir[0] = 0.0;
        let red = write_fixture(dir.path(), "red.tif", 32633, DataType::U16, vec![red]);
        let nir = write_fixture(dir.path(), "nir.tif", 32633, DataType::U16, vec![nir]);

        let out = processor.vegetation_index(&red, &nir).unwrap();
        let stats = out.statistics;
        assert!(stats.min.is_finite() && stats.max.is_finite());
        assert!((stats.min - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(stats.valid, SIZE * SIZE - 1);

        let written = RasterGrid::read(&out.ndvi_geotiff).unwrap();
        assert!(written.bands[0][0].is_nan());
        assert!(written.bands[0].iter().all(|v| !v.is_infinite()));
    }

    #[test]
    fn test_all_missing_statistics_serialize_as_null() {
        let (dir, processor) = setup();
        let path = write_fixture(dir.path(), "zeros.tif", 32633, DataType::U16, vec![constant(0.0); 4]);

        let out = processor.vegetation_index_from_bands(&path, 3, 4).unwrap();
        let json = serde_json::to_value(&out).unwrap();
        assert!(json["min"].is_null());
        assert!(json["mean"].is_null());
    }

    #[test]
    fn test_vegetation_index_from_bands() {
        let (dir, processor) = setup();
        let bands = vec![constant(0.0), constant(0.0), constant(100.0), constant(300.0)];
        let path = write_fixture(dir.path(), "s2.tif", 32633, DataType::U16, bands);

        let out = processor
            .vegetation_index_from_bands(&path, DEFAULT_RED_BAND, DEFAULT_NIR_BAND)
            .unwrap();
        assert!((out.statistics.median - 0.5).abs() < 1e-6);
        assert_eq!(out.ndvi_geotiff.file_name().unwrap(), "s2_ndvi.tif");
    }

    #[test]
    fn test_from_bands_validates_before_output() {
        let (dir, processor) = setup();
        let path = write_fixture(dir.path(), "rgb.tif", 32633, DataType::U16, vec![constant(1.0); 3]);

        let err = processor.vegetation_index_from_bands(&path, 3, 4).unwrap_err();
        assert!(matches!(err, Error::BandIndexOutOfRange(_)));
        assert_eq!(output_files(&processor), 0);
    }

    #[test]
    fn test_vegetation_index_crs_mismatch() {
        let (dir, processor) = setup();
        let red = write_fixture(dir.path(), "red.tif", 32633, DataType::U16, vec![constant(1.0)]);
        let nir = write_fixture(dir.path(), "nir.tif", 32634, DataType::U16, vec![constant(2.0)]);
        let err = processor.vegetation_index(&red, &nir).unwrap_err();
        assert!(matches!(err, Error::CrsMismatch(_)));
    }

    #[test]
    fn test_change_detection_pixel_count() {
        let (dir, processor) = setup();
        let mut after = constant(100.0);
        for row in 40..60 {
            for col in 10..30 {
                after[row * SIZE + col] = 200.0;
            }
        }
        let a = write_fixture(dir.path(), "before.tif", 32633, DataType::U16, vec![constant(100.0)]);
        let b = write_fixture(dir.path(), "after.tif", 32633, DataType::U16, vec![after]);

        let out = processor.detect_change(&a, &b, 1, Some(0.2)).unwrap();
        assert_eq!(out.changed_area_pixels, 400);
        assert!((out.changed_area_percentage - 4.0).abs() < 1e-9);
        assert_eq!(out.threshold_used, 0.2);
        assert_eq!(out.dimensions, "100x100");
        assert_eq!(out.output_tiff.file_name().unwrap(), "change_before.tif");
        assert!(out.output_png.exists());

        let mask = RasterGrid::read(&out.output_tiff).unwrap();
        assert_eq!(mask.profile.dtype, DataType::F32);
        assert_eq!(mask.bands[0][40 * SIZE + 10], 255.0);
        assert_eq!(mask.bands[0][0], 0.0);
    }

    #[test]
    fn test_change_detection_default_threshold() {
        let (dir, processor) = setup();
        let a = write_fixture(dir.path(), "a.tif", 32633, DataType::U16, vec![constant(100.0)]);

        let out = processor.detect_change(&a, &a, 1, None).unwrap();
        assert_eq!(out.threshold_used, 0.1);
        assert_eq!(out.changed_area_pixels, 0);
    }

    #[test]
    fn test_change_detection_resamples_second_image() {
        let (dir, processor) = setup();
        let a = write_fixture(dir.path(), "a.tif", 32633, DataType::U16, vec![constant(100.0)]);

        let profile = RasterProfile {
            width: SIZE / 2,
            height: SIZE / 2,
            count: 1,
            crs: Some(Crs::from_epsg(32633)),
            transform: GeoTransform::from_origin(500000.0, 5000000.0, 20.0, 20.0),
            nodata: None,
            dtype: DataType::U16,
        };
        let coarse = RasterGrid::new(profile, vec![vec![100.0; SIZE * SIZE / 4]]).unwrap();
        let b = dir.path().join("coarse.tif");
        GeoTiffWriter::new(&coarse).write(&b).unwrap();

        let out = processor.detect_change(&a, &b, 1, Some(0.5)).unwrap();
        assert_eq!(out.dimensions, "100x100");
        assert_eq!(out.changed_area_pixels, 0);
    }

    #[test]
    fn test_change_band_out_of_range() {
        let (dir, processor) = setup();
        let a = write_fixture(dir.path(), "a.tif", 32633, DataType::U16, vec![constant(1.0); 3]);
        let b = write_fixture(dir.path(), "b.tif", 32633, DataType::U16, vec![constant(1.0); 3]);

        let err = processor.detect_change(&a, &b, 5, None).unwrap_err();
        assert!(matches!(err, Error::BandIndexOutOfRange(_)));
        assert_eq!(output_files(&processor), 0);
    }

    #[test]
    fn test_alignment_idempotence() {
        let (dir, _) = setup();
        let path = write_fixture(dir.path(), "a.tif", 32633, DataType::U16, vec![constant(7.0)]);
        let grid = RasterGrid::read(&path).unwrap();

        let pair = align::align(&grid, &grid, Config::default().alignment_tolerance).unwrap();
        assert!(!pair.resampled());
        assert_eq!(pair.aligned.profile, grid.profile);
    }

    #[test]
    fn test_change_crs_mismatch() {
        let (dir, processor) = setup();
        let a = write_fixture(dir.path(), "a.tif", 32633, DataType::U16, vec![constant(1.0)]);
        let b = write_fixture(dir.path(), "b.tif", 4326, DataType::U16, vec![constant(1.0)]);

        let err = processor.detect_change(&a, &b, 1, None).unwrap_err();
        assert!(matches!(err, Error::CrsMismatch(_)));
        assert_eq!(output_files(&processor), 0);
    }

    #[test]
    fn test_invalid_input() {
        let (dir, processor) = setup();
        let path = dir.path().join("empty.tif");
        fs::write(&path, b"").unwrap();
        assert!(matches!(processor.metadata(&path), Err(Error::InvalidFormat(_))));
        assert!(matches!(
            processor.detect_change(&path, &path, 1, None),
            Err(Error::InvalidFormat(_))
        ));
    }
}
