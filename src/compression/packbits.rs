//! PackBits run-length decoding

use crate::error::TiffError;

/// Expands a PackBits stream.
///
/// A header byte `n` in `0..=127` copies the next `n + 1` bytes, `-127..=-1`
/// repeats the next byte `1 - n` times, and `-128` is skipped.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, TiffError> {
    let mut output = Vec::with_capacity(data.len() * 2);
    let mut rest = data;

    while let Some((&header, tail)) = rest.split_first() {
        let header = header as i8;
        rest = match header {
            -128 => tail,
            0..=127 => {
                let count = header as usize + 1;
                let literal = tail.get(..count).ok_or_else(|| {
                    TiffError::InvalidFormat(format!(
                        "PackBits literal run of {} bytes with {} remaining",
                        count,
                        tail.len()
                    ))
                })?;
                output.extend_from_slice(literal);
                &tail[count..]
            }
            _ => {
                let (&byte, after) = tail.split_first().ok_or_else(|| {
                    TiffError::InvalidFormat("PackBits repeat run without a value byte".to_string())
                })?;
                let count = (1 - header as isize) as usize;
                output.resize(output.len() + count, byte);
                after
            }
        };
    }

    Ok(output)
}
