//! Runtime configuration shared by the binaries and the processor

use std::fs;
use std::path::PathBuf;

use clap::Args;

use crate::error::{Error, Result};

pub const DEFAULT_TEMP_DIR: &str = "data/temp";
pub const DEFAULT_OUTPUT_DIR: &str = "data/output";
pub const DEFAULT_MAX_FILE_SIZE_MB: usize = 100;
pub const DEFAULT_API_PREFIX: &str = "/api/v1";
pub const DEFAULT_PROJECT_NAME: &str = "Satellite Processing API";
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8000";
pub const DEFAULT_ALIGNMENT_TOLERANCE: f64 = 1e-6;
pub const DEFAULT_NORMALIZATION_EPSILON: f64 = 1e-10;
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// Directories, limits and numeric tunables of a processing run.
///
/// Every field can be set by flag or by a `SATPROC_*` environment variable.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory for uploaded inputs while they are processed
    #[arg(long, default_value = DEFAULT_TEMP_DIR, env = "SATPROC_TEMP_DIR")]
    pub temp_dir: PathBuf,

    /// Directory that receives written results
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR, env = "SATPROC_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Largest accepted upload in megabytes
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE_MB, env = "SATPROC_MAX_FILE_SIZE_MB")]
    pub max_file_size_mb: usize,

    /// Path prefix of the HTTP API
    #[arg(long, default_value = DEFAULT_API_PREFIX, env = "SATPROC_API_PREFIX")]
    pub api_prefix: String,

    #[arg(long, default_value = DEFAULT_PROJECT_NAME, env = "SATPROC_PROJECT_NAME")]
    pub project_name: String,

    /// Listen address of the HTTP API
    #[arg(long, default_value = DEFAULT_LISTEN, env = "SATPROC_LISTEN")]
    pub listen: String,

    /// Per-coefficient tolerance under which two transforms are the same grid
    #[arg(long, default_value_t = DEFAULT_ALIGNMENT_TOLERANCE, env = "SATPROC_ALIGNMENT_TOLERANCE")]
    pub alignment_tolerance: f64,

    /// Added to each band's range when normalising for change detection
    #[arg(long, default_value_t = DEFAULT_NORMALIZATION_EPSILON, env = "SATPROC_NORMALIZATION_EPSILON")]
    pub normalization_epsilon: f64,

    /// Change threshold used when a request does not give one
    #[arg(long, default_value_t = DEFAULT_THRESHOLD, env = "SATPROC_DEFAULT_THRESHOLD")]
    pub default_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from(DEFAULT_TEMP_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            project_name: DEFAULT_PROJECT_NAME.to_string(),
            listen: DEFAULT_LISTEN.to_string(),
            alignment_tolerance: DEFAULT_ALIGNMENT_TOLERANCE,
            normalization_epsilon: DEFAULT_NORMALIZATION_EPSILON,
            default_threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl Config {
    /// Config rooted at `dir`, with `temp/` and `output/` below it
    pub fn in_dir<P: Into<PathBuf>>(dir: P) -> Self {
        let dir = dir.into();
        Self {
            temp_dir: dir.join("temp"),
            output_dir: dir.join("output"),
            ..Self::default()
        }
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    /// Public path under which an output file is served
    pub fn output_url(&self, file_name: &str) -> String {
        format!("{}/output/{}", self.api_prefix.trim_end_matches('/'), file_name)
    }

    /// Creates the temp and output directories
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.temp_dir, &self.output_dir] {
            fs::create_dir_all(dir)
                .map_err(|e| Error::WriteFailure(format!("Cannot create {}: {}", dir.display(), e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::tempdir;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        config: Config,
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.output_dir, PathBuf::from("data/output"));
        assert_eq!(config.max_body_bytes(), 100 * 1024 * 1024);
        assert_eq!(config.alignment_tolerance, 1e-6);
        assert_eq!(config.normalization_epsilon, 1e-10);
        assert_eq!(config.default_threshold, 0.1);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "satproc",
            "--output-dir",
            "/srv/out",
            "--max-file-size-mb",
            "5",
            "--default-threshold",
            "0.25",
        ])
        .unwrap();
        assert_eq!(cli.config.output_dir, PathBuf::from("/srv/out"));
        assert_eq!(cli.config.max_file_size_mb, 5);
        assert_eq!(cli.config.default_threshold, 0.25);
    }

    #[test]
    fn test_output_url() {
        let mut config = Config::default();
        assert_eq!(config.output_url("a_ndvi.png"), "/api/v1/output/a_ndvi.png");
        config.api_prefix = "/v2/".to_string();
        assert_eq!(config.output_url("x.tif"), "/v2/output/x.tif");
    }

    #[test]
    fn test_ensure_dirs() {
        let dir = tempdir().unwrap();
        let config = Config::in_dir(dir.path().join("data"));
        config.ensure_dirs().unwrap();
        assert!(config.temp_dir.is_dir());
        assert!(config.output_dir.is_dir());
    }
}
