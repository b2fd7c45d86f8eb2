//! Core data types for satproc

use serde::Serialize;

/// Pixel sample kinds a raster can store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "&'static str")]
pub enum DataType {
    /// Unsigned 8-bit integer
    U8,
    /// Unsigned 16-bit integer
    U16,
    /// Unsigned 32-bit integer
    U32,
    /// Signed 8-bit integer
    I8,
    /// Signed 16-bit integer
    I16,
    /// Signed 32-bit integer
    I32,
    /// 32-bit floating point
    F32,
    /// 64-bit floating point
    F64,
}

impl DataType {
    /// Returns the size in bytes for this data type
    pub fn size(&self) -> usize {
        match self {
            DataType::U8 | DataType::I8 => 1,
            DataType::U16 | DataType::I16 => 2,
            DataType::U32 | DataType::I32 | DataType::F32 => 4,
            DataType::F64 => 8,
        }
    }

    /// Returns the conventional raster name ("uint8", "float32", ...)
    pub fn name(&self) -> &'static str {
        match self {
            DataType::U8 => "uint8",
            DataType::U16 => "uint16",
            DataType::U32 => "uint32",
            DataType::I8 => "int8",
            DataType::I16 => "int16",
            DataType::I32 => "int32",
            DataType::F32 => "float32",
            DataType::F64 => "float64",
        }
    }

    /// Maps TIFF SampleFormat and BitsPerSample to a data type
    pub fn from_tiff(sample_format: u64, bits: u64) -> Option<Self> {
        match (sample_format, bits) {
            (1, 8) => Some(DataType::U8),
            (1, 16) => Some(DataType::U16),
            (1, 32) => Some(DataType::U32),
            (2, 8) => Some(DataType::I8),
            (2, 16) => Some(DataType::I16),
            (2, 32) => Some(DataType::I32),
            (3, 32) => Some(DataType::F32),
            (3, 64) => Some(DataType::F64),
            _ => None,
        }
    }

    /// TIFF SampleFormat value (1=unsigned, 2=signed, 3=float)
    pub fn sample_format(&self) -> u16 {
        match self {
            DataType::U8 | DataType::U16 | DataType::U32 => 1,
            DataType::I8 | DataType::I16 | DataType::I32 => 2,
            DataType::F32 | DataType::F64 => 3,
        }
    }

    /// TIFF BitsPerSample value
    pub fn bits(&self) -> u16 {
        (self.size() * 8) as u16
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }

    /// Converts a widened sample back to this kind, saturating integers
    pub fn narrow(&self, value: f64) -> f64 {
        let (min, max) = match self {
            DataType::U8 => (u8::MIN as f64, u8::MAX as f64),
            DataType::U16 => (u16::MIN as f64, u16::MAX as f64),
            DataType::U32 => (u32::MIN as f64, u32::MAX as f64),
            DataType::I8 => (i8::MIN as f64, i8::MAX as f64),
            DataType::I16 => (i16::MIN as f64, i16::MAX as f64),
            DataType::I32 => (i32::MIN as f64, i32::MAX as f64),
            DataType::F32 | DataType::F64 => return value,
        };
        if value.is_nan() {
            0.0
        } else {
            value.round().clamp(min, max)
        }
    }
}

impl From<DataType> for &'static str {
    fn from(value: DataType) -> Self {
        value.name()
    }
}

/// Represents image dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    /// Width in pixels
    pub width: u64,
    /// Height in pixels
    pub height: u64,
}

impl Dimensions {
    /// Creates new dimensions
    pub fn new(width: u64, height: u64) -> Self {
        Self { width, height }
    }

    /// Returns the total number of pixels
    pub fn pixel_count(&self) -> u64 {
        self.width * self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_size() {
        assert_eq!(DataType::U8.size(), 1);
        assert_eq!(DataType::U16.size(), 2);
        assert_eq!(DataType::U32.size(), 4);
        assert_eq!(DataType::F32.size(), 4);
        assert_eq!(DataType::F64.size(), 8);
    }

    #[test]
    fn test_data_type_name() {
        assert_eq!(DataType::U8.name(), "uint8");
        assert_eq!(DataType::F32.name(), "float32");
        assert_eq!(serde_json::to_string(&DataType::U16).unwrap(), "\"uint16\"");
    }

    #[test]
    fn test_from_tiff() {
        assert_eq!(DataType::from_tiff(1, 16), Some(DataType::U16));
        assert_eq!(DataType::from_tiff(3, 32), Some(DataType::F32));
        assert_eq!(DataType::from_tiff(3, 16), None);
        assert_eq!(DataType::I16.sample_format(), 2);
        assert_eq!(DataType::F64.bits(), 64);
    }

    #[test]
    fn test_narrow() {
        assert_eq!(DataType::U8.narrow(300.0), 255.0);
        assert_eq!(DataType::U8.narrow(-4.0), 0.0);
        assert_eq!(DataType::I16.narrow(12.6), 13.0);
        assert_eq!(DataType::F32.narrow(0.25), 0.25);
    }

    #[test]
    fn test_dimensions() {
        let dims = Dimensions::new(100, 200);
        assert_eq!(dims.width, 100);
        assert_eq!(dims.height, 200);
        assert_eq!(dims.pixel_count(), 20000);
    }
}
