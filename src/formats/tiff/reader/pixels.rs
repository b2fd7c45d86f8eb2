//! Sample decoding: raw block bytes to widened f64 values

use crate::error::TiffError;
use crate::io::ByteOrder;
use crate::types::DataType;

/// Decodes every sample in `bytes`, widening to f64
pub fn decode_samples(bytes: &[u8], data_type: DataType, byte_order: ByteOrder) -> Result<Vec<f64>, TiffError> {
    let size = data_type.size();
    if bytes.len() % size != 0 {
        return Err(TiffError::InvalidFormat(format!(
            "{} bytes is not a whole number of {} samples",
            bytes.len(),
            data_type.name()
        )));
    }

    bytes
        .chunks_exact(size)
        .map(|chunk| -> Result<f64, TiffError> {
            let value = match data_type {
                DataType::U8 => chunk[0] as f64,
                DataType::I8 => chunk[0] as i8 as f64,
                DataType::U16 => byte_order.read_u16(chunk, 0)? as f64,
                DataType::I16 => byte_order.read_i16(chunk, 0)? as f64,
                DataType::U32 => byte_order.read_u32(chunk, 0)? as f64,
                DataType::I32 => byte_order.read_i32(chunk, 0)? as f64,
                DataType::F32 => byte_order.read_f32(chunk, 0)? as f64,
                DataType::F64 => byte_order.read_f64(chunk, 0)?,
            };
            Ok(value)
        })
        .collect()
}
