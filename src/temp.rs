//! Uploaded inputs held on disk for the duration of one request

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::error::{Error, Result};

/// A byte payload stored under its upload name in a private directory.
///
/// Dropping the guard removes the file and the directory.
#[derive(Debug)]
pub struct ScopedTempFile {
    path: PathBuf,
    _dir: TempDir,
}

impl ScopedTempFile {
    /// Stores `bytes` as `<temp_dir>/<random>/<file_name>`
    pub fn create<P: AsRef<Path>>(temp_dir: P, file_name: &str, bytes: &[u8]) -> Result<Self> {
        let temp_dir = temp_dir.as_ref();
        let failure = |e: std::io::Error| Error::WriteFailure(format!("{}: {}", temp_dir.display(), e));

        fs::create_dir_all(temp_dir).map_err(failure)?;
        let dir = tempfile::Builder::new()
            .prefix("upload-")
            .tempdir_in(temp_dir)
            .map_err(failure)?;

        let path = dir.path().join(sanitize(file_name));
        fs::write(&path, bytes).map_err(failure)?;
        debug!(path = %path.display(), bytes = bytes.len(), "stored upload");

        Ok(Self { path, _dir: dir })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Final path component with anything but `[A-Za-z0-9._-]` replaced by `_`
pub fn sanitize(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim_start_matches('.');
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "upload.tif".to_string() } else { cleaned }
}
