use std::path::Path;

use serde::Serialize;

use crate::config::Config;
use crate::processor::{ChangeOutput, ReprojectOutput, VegetationIndexOutput};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct WelcomeResponse {
    pub message: String,
}

pub const REPROJECT_MESSAGE: &str = "Reprojection successful";

#[derive(Debug, Serialize)]
pub struct ReprojectResponse {
    pub message: &'static str,
    pub output_path: String,
    pub crs: String,
}

/// Upload names appear only on the endpoint that received them
#[derive(Debug, Serialize)]
pub struct NdviResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename_red: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename_nir: Option<String>,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub ndvi_geotiff: String,
    pub ndvi_png: String,
}

#[derive(Debug, Serialize)]
pub struct ChangeResponse {
    pub changed_area_pixels: usize,
    pub changed_area_percentage: f64,
    pub output_tiff: String,
    pub output_png: String,
    pub threshold_used: f64,
    pub dimensions: String,
}

/// Path under which the API serves a written output file
fn public_path(config: &Config, path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    config.output_url(&name)
}

impl ReprojectResponse {
    pub fn new(output: ReprojectOutput, config: &Config) -> Self {
        Self {
            message: REPROJECT_MESSAGE,
            output_path: public_path(config, &output.output_path),
            crs: output.crs,
        }
    }
}

impl NdviResponse {
    pub fn new(output: VegetationIndexOutput, config: &Config) -> Self {
        let stats = output.statistics;
        Self {
            filename: None,
            filename_red: None,
            filename_nir: None,
            min: stats.min,
            max: stats.max,
            mean: stats.mean,
            median: stats.median,
            ndvi_geotiff: public_path(config, &output.ndvi_geotiff),
            ndvi_png: public_path(config, &output.ndvi_png),
        }
    }
}

impl ChangeResponse {
    pub fn new(output: ChangeOutput, config: &Config) -> Self {
        Self {
            changed_area_pixels: output.changed_area_pixels,
            changed_area_percentage: output.changed_area_percentage,
            output_tiff: public_path(config, &output.output_tiff),
            output_png: public_path(config, &output.output_png),
            threshold_used: output.threshold_used,
            dimensions: output.dimensions,
        }
    }
}
