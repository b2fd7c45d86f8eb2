//! JPEG decompression for TIFF blocks

use crate::error::TiffError;

/// Decompresses a self-contained JPEG block into 8-bit samples
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, TiffError> {
    let mut decoder = jpeg_decoder::Decoder::new(data);

    decoder
        .decode()
        .map_err(|e| TiffError::InvalidFormat(format!("JPEG error: {}", e)))
}
