//! Strip and tile decoding
//!
//! A TIFF image is stored as a grid of blocks: full-width strips or
//! rectangular tiles. Planar images repeat that grid once per band.

use crate::compression::Compression;
use crate::error::TiffError;
use crate::formats::tiff::{tags, IFD};
use crate::io::ByteOrder;
use crate::types::DataType;

/// Where a decoded block lands in the image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPosition {
    /// Band for planar images, 0 for interleaved ones
    pub plane: usize,
    pub col0: usize,
    pub row0: usize,
    /// Pixels of this block that fall inside the image
    pub cols: usize,
    pub rows: usize,
}

/// Block geometry of one image directory
#[derive(Debug, Clone)]
pub struct BlockLayout {
    pub width: usize,
    pub height: usize,
    pub block_width: usize,
    pub block_height: usize,
    pub blocks_across: usize,
    pub blocks_down: usize,
    /// Number of block grids (1 for interleaved, samples per pixel for planar)
    pub planes: usize,
    /// Samples stored per pixel inside one block
    pub samples: usize,
    pub sample_size: usize,
    pub tiled: bool,
    pub offsets: Vec<u64>,
    pub byte_counts: Vec<u64>,
}

impl BlockLayout {
    pub fn from_ifd(ifd: &IFD, data_type: DataType) -> Result<Self, TiffError> {
        let width = ifd.require_u64(tags::IMAGE_WIDTH)? as usize;
        let height = ifd.require_u64(tags::IMAGE_LENGTH)? as usize;
        if width == 0 || height == 0 {
            return Err(TiffError::InvalidFormat(format!("Image has zero size {}x{}", width, height)));
        }

        let spp = ifd.samples_per_pixel() as usize;
        let (planes, samples) = match ifd.planar_configuration() {
            1 => (1, spp),
            2 => (spp, 1),
            other => return Err(TiffError::Unsupported(format!("Planar configuration {}", other))),
        };

        let tiled = ifd.is_tiled();
        let (block_width, block_height, offsets_tag, counts_tag) = if tiled {
            let tile = ifd
                .tile_dimensions()
                .ok_or(TiffError::MissingTag(tags::TILE_LENGTH))?;
            (tile.width as usize, tile.height as usize, tags::TILE_OFFSETS, tags::TILE_BYTE_COUNTS)
        } else {
            let rows = ifd
                .get_u64(tags::ROWS_PER_STRIP)
                .map(|r| (r as usize).min(height))
                .unwrap_or(height);
            (width, rows, tags::STRIP_OFFSETS, tags::STRIP_BYTE_COUNTS)
        };
        if block_width == 0 || block_height == 0 {
            return Err(TiffError::InvalidFormat("Zero sized blocks".to_string()));
        }

        let offsets = ifd.get_u64s(offsets_tag).ok_or(TiffError::MissingTag(offsets_tag))?;
        let byte_counts = ifd.get_u64s(counts_tag).ok_or(TiffError::MissingTag(counts_tag))?;

        let layout = Self {
            width,
            height,
            block_width,
            block_height,
            blocks_across: width.div_ceil(block_width),
            blocks_down: height.div_ceil(block_height),
            planes,
            samples,
            sample_size: data_type.size(),
            tiled,
            offsets,
            byte_counts,
        };

        let expected = layout.block_count();
        if layout.offsets.len() < expected || layout.byte_counts.len() < expected {
            return Err(TiffError::InvalidFormat(format!(
                "Expected {} blocks, found {} offsets and {} byte counts",
                expected,
                layout.offsets.len(),
                layout.byte_counts.len()
            )));
        }

        Ok(layout)
    }

    pub fn block_count(&self) -> usize {
        self.blocks_across * self.blocks_down * self.planes
    }

    pub fn locate(&self, index: usize) -> BlockPosition {
        let per_plane = self.blocks_across * self.blocks_down;
        let plane = index / per_plane;
        let within = index % per_plane;
        let col0 = (within % self.blocks_across) * self.block_width;
        let row0 = (within / self.blocks_across) * self.block_height;

        BlockPosition {
            plane,
            col0,
            row0,
            cols: self.block_width.min(self.width - col0),
            rows: self.block_height.min(self.height - row0),
        }
    }

    /// Bytes of one decoded block row
    pub fn row_bytes(&self) -> usize {
        self.block_width * self.samples * self.sample_size
    }

    /// Rows actually stored for a block (the last strip may be short)
    fn stored_rows(&self, position: &BlockPosition) -> usize {
        if self.tiled { self.block_height } else { position.rows }
    }
}

/// Raw block payload after decompression and predictor reversal
pub struct DecodedBlock {
    pub bytes: Vec<u8>,
    /// Byte order of the samples in `bytes`
    pub byte_order: ByteOrder,
}

/// Decompresses one block and undoes its predictor
pub fn decode_block(
    data: &[u8],
    layout: &BlockLayout,
    index: usize,
    compression: Compression,
    predictor: u64,
    byte_order: ByteOrder,
) -> Result<DecodedBlock, TiffError> {
    let position = layout.locate(index);
    let needed = layout.stored_rows(&position) * layout.row_bytes();

    let offset = layout.offsets[index];
    let count = layout.byte_counts[index];
    if count == 0 {
        // sparse block
        return Ok(DecodedBlock { bytes: vec![0; needed], byte_order });
    }

    let start = offset as usize;
    let raw = start
        .checked_add(count as usize)
        .and_then(|end| data.get(start..end))
        .ok_or(TiffError::InvalidOffset(offset))?;

    let mut bytes = compression.decompress(raw)?;
    if bytes.len() < needed {
        return Err(TiffError::InvalidFormat(format!(
            "Block {} decoded to {} bytes, expected {}",
            index,
            bytes.len(),
            needed
        )));
    }
    bytes.truncate(needed);

    let byte_order = match predictor {
        1 => byte_order,
        2 => {
            undo_horizontal_differencing(&mut bytes, layout.row_bytes(), layout.samples, layout.sample_size, byte_order);
            byte_order
        }
        3 => {
            undo_floating_point_predictor(&mut bytes, layout.row_bytes(), layout.samples, layout.sample_size);
            ByteOrder::BigEndian
        }
        other => return Err(TiffError::Unsupported(format!("Predictor {}", other))),
    };

    Ok(DecodedBlock { bytes, byte_order })
}

fn read_uint(bytes: &[u8], byte_order: ByteOrder) -> u64 {
    match byte_order {
        ByteOrder::LittleEndian => bytes.iter().rev().fold(0u64, |acc, &b| (acc << 8) | b as u64),
        ByteOrder::BigEndian => bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64),
    }
}

fn write_uint(bytes: &mut [u8], value: u64, byte_order: ByteOrder) {
    let len = bytes.len();
    for k in 0..len {
        let byte = (value >> (8 * k)) as u8;
        match byte_order {
            ByteOrder::LittleEndian => bytes[k] = byte,
            ByteOrder::BigEndian => bytes[len - 1 - k] = byte,
        }
    }
}

/// Predictor 2: each sample stores the difference to the same sample of the previous pixel
fn undo_horizontal_differencing(
    buf: &mut [u8],
    row_bytes: usize,
    samples: usize,
    sample_size: usize,
    byte_order: ByteOrder,
) {
    if sample_size == 1 {
        for row in buf.chunks_exact_mut(row_bytes) {
            for i in samples..row.len() {
                row[i] = row[i].wrapping_add(row[i - samples]);
            }
        }
        return;
    }

    let stride = samples * sample_size;
    for row in buf.chunks_exact_mut(row_bytes) {
        for pos in (stride..row.len()).step_by(sample_size) {
            let previous = read_uint(&row[pos - stride..pos - stride + sample_size], byte_order);
            let current = read_uint(&row[pos..pos + sample_size], byte_order);
            write_uint(&mut row[pos..pos + sample_size], current.wrapping_add(previous), byte_order);
        }
    }
}

/// Predictor 3: bytes of each row are split into planes (most significant first) then differenced
fn undo_floating_point_predictor(buf: &mut [u8], row_bytes: usize, samples: usize, sample_size: usize) {
    let values = row_bytes / sample_size;
    let mut planes = vec![0u8; row_bytes];

    for row in buf.chunks_exact_mut(row_bytes) {
        for i in samples..row.len() {
            row[i] = row[i].wrapping_add(row[i - samples]);
        }
        planes.copy_from_slice(row);
        for value in 0..values {
            for byte in 0..sample_size {
                row[value * sample_size + byte] = planes[byte * values + value];
            }
        }
    }
}
