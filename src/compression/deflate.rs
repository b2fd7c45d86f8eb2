//! Deflate/ZIP compression

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::error::TiffError;

/// Decompresses Deflate/ZIP compressed data
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, TiffError> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| TiffError::InvalidFormat(format!("Deflate stream: {}", e)))?;
    Ok(decompressed)
}

/// Compresses a block with zlib framing, as TIFF Deflate expects
pub fn compress(data: &[u8]) -> Result<Vec<u8>, TiffError> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), flate2::Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
