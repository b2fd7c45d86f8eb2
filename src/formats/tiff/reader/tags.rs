//! Tag value reading operations

use tracing::debug;

use crate::error::TiffError;
use crate::io::ByteOrder;
use crate::formats::tiff::ifd::{IFDEntry, TagValue};
use crate::formats::tiff::tags::{field_type_name, field_types, tag_name};

/// Decodes IFD entries and their values out of the mapped file
pub struct TagReader<'a> {
    data: &'a [u8],
    byte_order: ByteOrder,
    is_big_tiff: bool,
}

impl<'a> TagReader<'a> {
    pub fn new(data: &'a [u8], byte_order: ByteOrder, is_big_tiff: bool) -> Self {
        Self {
            data,
            byte_order,
            is_big_tiff,
        }
    }

    /// Size of one directory entry
    pub fn entry_size(&self) -> usize {
        if self.is_big_tiff { 20 } else { 12 }
    }

    /// Reads an offset-sized unsigned value (u32 for TIFF, u64 for BigTIFF)
    pub fn read_offset(&self, pos: usize) -> Result<u64, TiffError> {
        if self.is_big_tiff {
            Ok(self.byte_order.read_u64(self.data, pos)?)
        } else {
            Ok(self.byte_order.read_u32(self.data, pos)? as u64)
        }
    }

    /// Reads the directory entry starting at `pos`.
    ///
    /// Entries with a field type this reader does not know are skipped.
    pub fn read_entry(&self, pos: usize) -> Result<Option<IFDEntry>, TiffError> {
        let order = self.byte_order;
        let tag = order.read_u16(self.data, pos)?;
        let field_type = order.read_u16(self.data, pos + 2)?;
        let count = self.read_offset(pos + 4)?;
        let value_field = pos + if self.is_big_tiff { 12 } else { 8 };

        let Some(size) = IFDEntry::type_size(field_type) else {
            debug!(tag, name = tag_name(tag), field_type, "skipping entry with unknown field type");
            return Ok(None);
        };

        let byte_len = (count as usize)
            .checked_mul(size)
            .filter(|&len| len <= self.data.len())
            .ok_or_else(|| TiffError::InvalidFormat(format!("Tag {} claims {} values", tag, count)))?;

        let inline_size = if self.is_big_tiff { 8 } else { 4 };
        let value_pos = if byte_len <= inline_size {
            value_field
        } else {
            self.read_offset(value_field)? as usize
        };
        if value_pos.saturating_add(byte_len) > self.data.len() {
            return Err(TiffError::InvalidOffset(value_pos as u64));
        }

        let value = self.read_values(field_type, count as usize, value_pos)?;
        Ok(Some(IFDEntry {
            tag,
            field_type,
            count,
            value,
        }))
    }

    fn read_values(&self, field_type: u16, count: usize, pos: usize) -> Result<TagValue, TiffError> {
        let order = self.byte_order;
        let data = self.data;

        let value = match field_type {
            field_types::BYTE | field_types::UNDEFINED => {
                TagValue::Unsigned(data[pos..pos + count].iter().map(|&b| b as u64).collect())
            }
            field_types::ASCII => {
                let text = String::from_utf8_lossy(&data[pos..pos + count]);
                TagValue::Ascii(text.trim_end_matches('\0').to_string())
            }
            field_types::SHORT => TagValue::Unsigned(
                (0..count).map(|i| order.read_u16(data, pos + i * 2).map(u64::from)).collect::<Result<_, _>>()?,
            ),
            field_types::LONG => TagValue::Unsigned(
                (0..count).map(|i| order.read_u32(data, pos + i * 4).map(u64::from)).collect::<Result<_, _>>()?,
            ),
            field_types::LONG8 | field_types::IFD8 => TagValue::Unsigned(
                (0..count).map(|i| order.read_u64(data, pos + i * 8)).collect::<Result<_, _>>()?,
            ),
            field_types::SBYTE => TagValue::Signed(data[pos..pos + count].iter().map(|&b| b as i8 as i64).collect()),
            field_types::SSHORT => TagValue::Signed(
                (0..count).map(|i| order.read_i16(data, pos + i * 2).map(i64::from)).collect::<Result<_, _>>()?,
            ),
            field_types::SLONG => TagValue::Signed(
                (0..count).map(|i| order.read_i32(data, pos + i * 4).map(i64::from)).collect::<Result<_, _>>()?,
            ),
            field_types::SLONG8 => TagValue::Signed(
                (0..count).map(|i| order.read_i64(data, pos + i * 8)).collect::<Result<_, _>>()?,
            ),
            field_types::FLOAT => TagValue::Float(
                (0..count).map(|i| order.read_f32(data, pos + i * 4).map(f64::from)).collect::<Result<_, _>>()?,
            ),
            field_types::DOUBLE => TagValue::Float(
                (0..count).map(|i| order.read_f64(data, pos + i * 8)).collect::<Result<_, _>>()?,
            ),
            field_types::RATIONAL => TagValue::Float(
                (0..count)
                    .map(|i| -> std::io::Result<f64> {
                        let num = order.read_u32(data, pos + i * 8)?;
                        let den = order.read_u32(data, pos + i * 8 + 4)?;
                        Ok(num as f64 / den as f64)
                    })
                    .collect::<std::io::Result<_>>()?,
            ),
            field_types::SRATIONAL => TagValue::Float(
                (0..count)
                    .map(|i| -> std::io::Result<f64> {
                        let num = order.read_i32(data, pos + i * 8)?;
                        let den = order.read_i32(data, pos + i * 8 + 4)?;
                        Ok(num as f64 / den as f64)
                    })
                    .collect::<std::io::Result<_>>()?,
            ),
            other => {
                return Err(TiffError::Unsupported(format!("Field type {}", field_type_name(other))));
            }
        };

        Ok(value)
    }
}
