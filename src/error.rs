//! Error types for satproc

use std::io;

use thiserror::Error;

/// Result type for satproc operations
pub type Result<T> = std::result::Result<T, Error>;

/// The failure kinds a processing operation can report.
///
/// Every variant carries a human-readable detail string. Lower layers keep
/// their own error types and convert into one of these at the boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// Input could not be read as a raster
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Operation needs rasters in the same CRS
    #[error("CRS mismatch: {0}")]
    CrsMismatch(String),

    /// Requested band does not exist
    #[error("Band index out of range: {0}")]
    BandIndexOutOfRange(String),

    /// Unknown target CRS or a degenerate transform
    #[error("Reprojection failed: {0}")]
    ReprojectionFailure(String),

    /// Output could not be written
    #[error("Write failed: {0}")]
    WriteFailure(String),

    /// Unexpected numeric failure
    #[error("Computation failed: {0}")]
    ComputationFailure(String),
}

impl Error {
    /// Stable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidFormat(_) => "InvalidFormat",
            Error::CrsMismatch(_) => "CrsMismatch",
            Error::BandIndexOutOfRange(_) => "BandIndexOutOfRange",
            Error::ReprojectionFailure(_) => "ReprojectionFailure",
            Error::WriteFailure(_) => "WriteFailure",
            Error::ComputationFailure(_) => "ComputationFailure",
        }
    }

    /// Whether the failure was caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Error::WriteFailure(_) | Error::ComputationFailure(_))
    }
}

/// Low-level failures of the TIFF codec
#[derive(Debug, Error)]
pub enum TiffError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file holds no bytes at all
    #[error("File is empty")]
    Empty,

    /// Invalid TIFF magic number
    #[error("Invalid TIFF magic number: {0}")]
    InvalidMagic(u16),

    /// Missing required tag
    #[error("Missing required tag: {0}")]
    MissingTag(u16),

    /// Unsupported feature
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Offset points outside the file
    #[error("Invalid offset: {0}")]
    InvalidOffset(u64),

    /// Structurally broken data
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

impl From<TiffError> for Error {
    fn from(error: TiffError) -> Self {
        Error::InvalidFormat(error.to_string())
    }
}
