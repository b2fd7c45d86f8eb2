//! Byte order (endianness) handling
//!
//! Reads multi-byte values out of an in-memory buffer (usually a memory
//! mapped file) in either TIFF byte order.

use std::io::{self, Result};

/// Represents the byte order (endianness) of binary data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian byte order (least significant byte first)
    LittleEndian,
    /// Big-endian byte order (most significant byte first)
    BigEndian,
}

macro_rules! read_fn {
    ($name:ident, $ty:ty, $len:expr) => {
        #[doc = concat!("Reads a `", stringify!($ty), "` at `offset`")]
        pub fn $name(&self, data: &[u8], offset: usize) -> Result<$ty> {
            let bytes: [u8; $len] = take(data, offset)?;
            Ok(match self {
                ByteOrder::LittleEndian => <$ty>::from_le_bytes(bytes),
                ByteOrder::BigEndian => <$ty>::from_be_bytes(bytes),
            })
        }
    };
}

impl ByteOrder {
    /// Detects byte order from TIFF magic bytes
    ///
    /// TIFF files start with either "II" (0x4949) for little-endian
    /// or "MM" (0x4D4D) for big-endian.
    pub fn from_tiff_magic(magic: [u8; 2]) -> Option<Self> {
        match &magic {
            b"II" => Some(ByteOrder::LittleEndian),
            b"MM" => Some(ByteOrder::BigEndian),
            _ => None,
        }
    }

    /// Detects the byte order from the first two bytes of a buffer
    pub fn detect(data: &[u8]) -> Result<Self> {
        let magic: [u8; 2] = take(data, 0)?;

        Self::from_tiff_magic(magic).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid byte order magic bytes: {:02X}{:02X}", magic[0], magic[1]),
            )
        })
    }

    read_fn!(read_u8, u8, 1);
    read_fn!(read_i8, i8, 1);
    read_fn!(read_u16, u16, 2);
    read_fn!(read_i16, i16, 2);
    read_fn!(read_u32, u32, 4);
    read_fn!(read_i32, i32, 4);
    read_fn!(read_u64, u64, 8);
    read_fn!(read_i64, i64, 8);
    read_fn!(read_f32, f32, 4);
    read_fn!(read_f64, f64, 8);
}

fn take<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N]> {
    offset
        .checked_add(N)
        .and_then(|end| data.get(offset..end))
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("read of {} bytes at offset {} past end of data ({} bytes)", N, offset, data.len()),
            )
        })
}
