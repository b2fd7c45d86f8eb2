//! Compression and decompression of TIFF block payloads

pub mod deflate;
pub mod lzw;
pub mod packbits;
pub mod jpeg;

use crate::error::TiffError;

/// Compression types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// No compression
    None,
    /// Deflate/ZIP compression
    Deflate,
    /// LZW compression
    Lzw,
    /// PackBits compression
    PackBits,
    /// JPEG compression
    Jpeg,
}

impl Compression {
    /// Creates compression from TIFF compression tag value
    pub fn from_tag(value: u64) -> Result<Self, TiffError> {
        match value {
            1 => Ok(Compression::None),
            5 => Ok(Compression::Lzw),
            8 | 32946 => Ok(Compression::Deflate),
            32773 => Ok(Compression::PackBits),
            7 => Ok(Compression::Jpeg),
            _ => Err(TiffError::Unsupported(format!("Compression type {}", value))),
        }
    }

    /// TIFF compression tag value written for this scheme
    pub fn tag(&self) -> u16 {
        match self {
            Compression::None => 1,
            Compression::Lzw => 5,
            Compression::Deflate => 8,
            Compression::PackBits => 32773,
            Compression::Jpeg => 7,
        }
    }

    /// Returns the name of this compression type
    pub fn name(&self) -> &'static str {
        match self {
            Compression::None => "None",
            Compression::Deflate => "Deflate/ZIP",
            Compression::Lzw => "LZW",
            Compression::PackBits => "PackBits",
            Compression::Jpeg => "JPEG",
        }
    }

    /// Decompresses data
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, TiffError> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Deflate => deflate::decompress(data),
            Compression::Lzw => lzw::decompress(data),
            Compression::PackBits => packbits::decompress(data),
            Compression::Jpeg => jpeg::decompress(data),
        }
    }

    /// Compresses data for writing; only uncompressed and Deflate output is produced
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>, TiffError> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Deflate => deflate::compress(data),
            other => Err(TiffError::Unsupported(format!("{} encoding", other.name()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_from_tag() {
        assert_eq!(Compression::from_tag(1).unwrap(), Compression::None);
        assert_eq!(Compression::from_tag(8).unwrap(), Compression::Deflate);
        assert_eq!(Compression::from_tag(32946).unwrap(), Compression::Deflate);
        assert_eq!(Compression::from_tag(5).unwrap(), Compression::Lzw);
        assert!(matches!(Compression::from_tag(34887), Err(TiffError::Unsupported(_))));
    }

    #[test]
    fn test_tag_matches_from_tag() {
        for compression in [Compression::None, Compression::Lzw, Compression::Deflate, Compression::PackBits] {
            assert_eq!(Compression::from_tag(compression.tag() as u64).unwrap(), compression);
        }
    }

    #[test]
    fn test_no_compression() {
        let data = vec![1u8, 2, 3, 4];
        let result = Compression::None.decompress(&data).unwrap();
        assert_eq!(result, data);
    }

    #[test]
    fn test_only_deflate_encodes() {
        let data = vec![7u8; 64];
        let packed = Compression::Deflate.compress(&data).unwrap();
        assert_eq!(Compression::Deflate.decompress(&packed).unwrap(), data);
        assert!(Compression::Lzw.compress(&data).is_err());
    }
}
