//! Image File Directory (IFD) structures

use std::collections::HashMap;

use crate::error::TiffError;
use crate::types::{DataType, Dimensions};
use super::tags::{self, field_types};

/// Decoded value of a tag
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// BYTE, SHORT, LONG, LONG8 and IFD offsets
    Unsigned(Vec<u64>),
    /// SBYTE, SSHORT, SLONG, SLONG8
    Signed(Vec<i64>),
    /// FLOAT, DOUBLE and the rational types
    Float(Vec<f64>),
    /// NUL-terminated text
    Ascii(String),
}

impl TagValue {
    /// Number of values
    pub fn len(&self) -> usize {
        match self {
            TagValue::Unsigned(v) => v.len(),
            TagValue::Signed(v) => v.len(),
            TagValue::Float(v) => v.len(),
            TagValue::Ascii(s) => s.len() + 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values as unsigned integers; negative or fractional values are rejected
    pub fn to_u64s(&self) -> Option<Vec<u64>> {
        match self {
            TagValue::Unsigned(v) => Some(v.clone()),
            TagValue::Signed(v) => v.iter().map(|&x| u64::try_from(x).ok()).collect(),
            TagValue::Float(v) => v
                .iter()
                .map(|&x| (x >= 0.0 && x.fract() == 0.0).then_some(x as u64))
                .collect(),
            TagValue::Ascii(_) => None,
        }
    }

    /// Values widened to f64
    pub fn to_f64s(&self) -> Option<Vec<f64>> {
        match self {
            TagValue::Unsigned(v) => Some(v.iter().map(|&x| x as f64).collect()),
            TagValue::Signed(v) => Some(v.iter().map(|&x| x as f64).collect()),
            TagValue::Float(v) => Some(v.clone()),
            TagValue::Ascii(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Ascii(s) => Some(s),
            _ => None,
        }
    }
}

/// Represents an Image File Directory entry
#[derive(Debug, Clone)]
pub struct IFDEntry {
    /// TIFF tag identifier
    pub tag: u16,
    /// Field type
    pub field_type: u16,
    /// Number of values
    pub count: u64,
    /// Decoded values
    pub value: TagValue,
}

impl IFDEntry {
    /// Creates a new IFD entry
    pub fn new(tag: u16, field_type: u16, value: TagValue) -> Self {
        let count = value.len() as u64;
        Self {
            tag,
            field_type,
            count,
            value,
        }
    }

    /// Returns the size in bytes of a field type, `None` for unknown types
    pub fn type_size(field_type: u16) -> Option<usize> {
        match field_type {
            field_types::BYTE | field_types::ASCII | field_types::SBYTE | field_types::UNDEFINED => Some(1),
            field_types::SHORT | field_types::SSHORT => Some(2),
            field_types::LONG | field_types::SLONG | field_types::FLOAT => Some(4),
            field_types::RATIONAL
            | field_types::SRATIONAL
            | field_types::DOUBLE
            | field_types::LONG8
            | field_types::SLONG8
            | field_types::IFD8 => Some(8),
            _ => None,
        }
    }

    /// Size in bytes of the encoded value
    pub fn byte_len(&self) -> usize {
        Self::type_size(self.field_type).unwrap_or(1) * self.count as usize
    }

    /// Returns whether the value is stored inline (in the value/offset field)
    pub fn is_inline(&self, is_big_tiff: bool) -> bool {
        let inline_size = if is_big_tiff { 8 } else { 4 };
        self.byte_len() <= inline_size
    }
}

/// Represents an Image File Directory
#[derive(Debug, Clone)]
pub struct IFD {
    /// IFD number (0-based)
    pub number: usize,
    /// Offset to this IFD in file
    pub offset: u64,
    /// Entries in this IFD
    pub entries: Vec<IFDEntry>,
    /// Tag map for quick lookup
    tag_map: HashMap<u16, usize>,
}

impl IFD {
    /// Creates a new IFD
    pub fn new(number: usize, offset: u64) -> Self {
        Self {
            number,
            offset,
            entries: Vec::new(),
            tag_map: HashMap::new(),
        }
    }

    /// Adds an entry to this IFD
    pub fn add_entry(&mut self, entry: IFDEntry) {
        let index = self.entries.len();
        self.tag_map.insert(entry.tag, index);
        self.entries.push(entry);
    }

    /// Gets an entry by tag
    pub fn get_entry(&self, tag: u16) -> Option<&IFDEntry> {
        self.tag_map.get(&tag).and_then(|&idx| self.entries.get(idx))
    }

    /// First value of an integer tag
    pub fn get_u64(&self, tag: u16) -> Option<u64> {
        self.get_u64s(tag)?.first().copied()
    }

    /// All values of an integer tag
    pub fn get_u64s(&self, tag: u16) -> Option<Vec<u64>> {
        self.get_entry(tag)?.value.to_u64s()
    }

    /// All values of a numeric tag as f64
    pub fn get_f64s(&self, tag: u16) -> Option<Vec<f64>> {
        self.get_entry(tag)?.value.to_f64s()
    }

    /// Text of an ASCII tag
    pub fn get_ascii(&self, tag: u16) -> Option<&str> {
        self.get_entry(tag)?.value.as_str()
    }

    /// Integer tag that must be present
    pub fn require_u64(&self, tag: u16) -> Result<u64, TiffError> {
        self.get_u64(tag).ok_or(TiffError::MissingTag(tag))
    }

    /// Returns image dimensions if available
    pub fn dimensions(&self) -> Option<Dimensions> {
        let width = self.get_u64(tags::IMAGE_WIDTH)?;
        let height = self.get_u64(tags::IMAGE_LENGTH)?;
        Some(Dimensions::new(width, height))
    }

    /// Returns compression type (1 when the tag is absent)
    pub fn compression(&self) -> u64 {
        self.get_u64(tags::COMPRESSION).unwrap_or(1)
    }

    /// Returns samples per pixel
    pub fn samples_per_pixel(&self) -> u64 {
        self.get_u64(tags::SAMPLES_PER_PIXEL).unwrap_or(1)
    }

    /// Returns bits per sample; all samples must share one width
    pub fn bits_per_sample(&self) -> Result<u64, TiffError> {
        let bits = self.get_u64s(tags::BITS_PER_SAMPLE).unwrap_or_else(|| vec![1]);
        match bits.split_first() {
            Some((&first, rest)) if rest.iter().all(|&b| b == first) => Ok(first),
            Some(_) => Err(TiffError::Unsupported(format!("Mixed bits per sample {:?}", bits))),
            None => Err(TiffError::MissingTag(tags::BITS_PER_SAMPLE)),
        }
    }

    /// Returns sample format (1=unsigned, 2=signed, 3=float)
    pub fn sample_format(&self) -> u64 {
        self.get_u64(tags::SAMPLE_FORMAT).unwrap_or(1)
    }

    /// Determines the pixel data type based on TIFF tags
    pub fn data_type(&self) -> Result<DataType, TiffError> {
        let bits = self.bits_per_sample()?;
        let format = self.sample_format();
        DataType::from_tiff(format, bits).ok_or_else(|| {
            TiffError::Unsupported(format!("Sample format {} with {} bits", format, bits))
        })
    }

    /// 1 = chunky (interleaved), 2 = planar (band sequential)
    pub fn planar_configuration(&self) -> u64 {
        self.get_u64(tags::PLANAR_CONFIGURATION).unwrap_or(1)
    }

    /// 1 = none, 2 = horizontal differencing, 3 = floating point
    pub fn predictor(&self) -> u64 {
        self.get_u64(tags::PREDICTOR).unwrap_or(1)
    }

    /// Returns whether this IFD represents a tiled image
    pub fn is_tiled(&self) -> bool {
        self.get_entry(tags::TILE_WIDTH).is_some()
    }

    /// Returns tile dimensions if tiled
    pub fn tile_dimensions(&self) -> Option<Dimensions> {
        let width = self.get_u64(tags::TILE_WIDTH)?;
        let height = self.get_u64(tags::TILE_LENGTH)?;
        Some(Dimensions::new(width, height))
    }

    /// Returns number of entries
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns all GeoTIFF related tags
    pub fn geotiff_tags(&self) -> Vec<&IFDEntry> {
        self.entries
            .iter()
            .filter(|e| {
                matches!(
                    e.tag,
                    tags::MODEL_PIXEL_SCALE
                        | tags::MODEL_TIEPOINT
                        | tags::MODEL_TRANSFORMATION
                        | tags::GEO_KEY_DIRECTORY
                        | tags::GEO_DOUBLE_PARAMS
                        | tags::GEO_ASCII_PARAMS
                )
            })
            .collect()
    }

    /// Checks if this IFD has GeoTIFF tags
    pub fn is_geotiff(&self) -> bool {
        !self.geotiff_tags().is_empty()
    }
}
