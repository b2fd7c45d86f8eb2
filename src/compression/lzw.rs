//! LZW decompression
//!
//! TIFF flavour of LZW: codes are packed most significant bit first and the
//! code width grows one code early (at 511, 1023 and 2047 entries).

use crate::error::TiffError;

const CLEAR_CODE: u16 = 256;
const END_OF_INFORMATION: u16 = 257;
const FIRST_FREE: usize = 258;
const MAX_CODE_SIZE: u8 = 12;

/// Decompresses LZW compressed data
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, TiffError> {
    LzwDecoder::new().decode(data)
}

/// LZW decoder
struct LzwDecoder {
    dictionary: Vec<Vec<u8>>,
}

impl LzwDecoder {
    fn new() -> Self {
        let mut dictionary = Vec::with_capacity(4096);

        for i in 0..256 {
            dictionary.push(vec![i as u8]);
        }
        // placeholders for the clear and end codes
        dictionary.push(Vec::new());
        dictionary.push(Vec::new());

        Self { dictionary }
    }

    fn next_code(&self) -> usize {
        self.dictionary.len()
    }

    fn decode(&mut self, data: &[u8]) -> Result<Vec<u8>, TiffError> {
        let mut output = Vec::with_capacity(data.len() * 2);
        let mut reader = BitReader::new(data);
        let mut code_size = 9;
        let mut previous_code: Option<u16> = None;

        while let Some(code) = reader.read_bits(code_size) {
            if code == END_OF_INFORMATION {
                break;
            }

            if code == CLEAR_CODE {
                self.reset();
                code_size = 9;
                previous_code = None;
                continue;
            }

            let entry = self.get_entry(code as usize, previous_code)?;
            output.extend_from_slice(&entry);

            if let Some(prev) = previous_code {
                self.add_entry(prev as usize, entry[0]);

                if self.next_code() + 1 >= (1 << code_size) && code_size < MAX_CODE_SIZE {
                    code_size += 1;
                }
            }

            previous_code = Some(code);
        }

        Ok(output)
    }

    fn get_entry(&self, code: usize, previous: Option<u16>) -> Result<Vec<u8>, TiffError> {
        if code < self.next_code() && (code < 256 || code >= FIRST_FREE) {
            Ok(self.dictionary[code].clone())
        } else if code == self.next_code() {
            match previous {
                Some(prev) => {
                    let mut entry = self.dictionary[prev as usize].clone();
                    entry.push(entry[0]);
                    Ok(entry)
                }
                None => Err(TiffError::InvalidFormat("Invalid LZW sequence".to_string())),
            }
        } else {
            Err(TiffError::InvalidFormat(format!("Invalid LZW code: {}", code)))
        }
    }

    fn add_entry(&mut self, previous_code: usize, first_byte: u8) {
        if self.next_code() < 4096 {
            let mut entry = self.dictionary[previous_code].clone();
            entry.push(first_byte);
            self.dictionary.push(entry);
        }
    }

    fn reset(&mut self) {
        self.dictionary.truncate(FIRST_FREE);
    }
}

/// Reads MSB-first variable-length codes from a byte stream
struct BitReader<'a> {
    data: &'a [u8],
    bit_position: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, bit_position: 0 }
    }

    fn read_bits(&mut self, count: u8) -> Option<u16> {
        if count > 16 || count == 0 || self.bit_position + count as usize > self.data.len() * 8 {
            return None;
        }

        let mut result = 0u16;
        for _ in 0..count {
            let byte = self.data[self.bit_position / 8];
            let bit = (byte >> (7 - (self.bit_position % 8))) & 1;
            result = (result << 1) | bit as u16;
            self.bit_position += 1;
        }

        Some(result)
    }
}
