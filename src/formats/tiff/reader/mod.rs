//! TIFF reader modules

pub mod tags;
pub mod blocks;
pub mod pixels;

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use rayon::prelude::*;
use tracing::debug;

use crate::compression::Compression;
use crate::error::TiffError;
use crate::formats::tiff::{Tiff, IFD, TIFF_MAGIC, BIGTIFF_MAGIC};
use crate::io::ByteOrder;
use crate::types::DataType;

use self::blocks::BlockLayout;
use self::tags::TagReader;

const MAX_IFDS: usize = 1000;

/// Pixel data of one image directory, one widened vector per band
#[derive(Debug, Clone)]
pub struct DecodedRaster {
    pub width: usize,
    pub height: usize,
    pub data_type: DataType,
    pub bands: Vec<Vec<f64>>,
}

/// Memory-mapped TIFF/BigTIFF reader
pub struct TiffReader {
    mmap: Mmap,
    byte_order: ByteOrder,
    is_big_tiff: bool,
    first_ifd_offset: u64,
}

impl TiffReader {
    /// Opens and validates the header of a TIFF file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TiffError> {
        let file = File::open(&path)?;
        if file.metadata()?.len() == 0 {
            return Err(TiffError::Empty);
        }

        let mmap = unsafe { Mmap::map(&file)? };

        #[cfg(unix)]
        unsafe {
            libc::madvise(
                mmap.as_ptr() as *mut libc::c_void,
                mmap.len(),
                libc::MADV_SEQUENTIAL | libc::MADV_WILLNEED,
            );
        }

        let byte_order = ByteOrder::detect(&mmap)?;
        let magic = byte_order.read_u16(&mmap, 2)?;

        let (is_big_tiff, first_ifd_offset) = match magic {
            TIFF_MAGIC => (false, byte_order.read_u32(&mmap, 4)? as u64),
            BIGTIFF_MAGIC => {
                let offset_size = byte_order.read_u16(&mmap, 4)?;
                if offset_size != 8 {
                    return Err(TiffError::InvalidFormat(format!(
                        "Invalid BigTIFF offset size: {}",
                        offset_size
                    )));
                }
                (true, byte_order.read_u64(&mmap, 8)?)
            }
            _ => return Err(TiffError::InvalidMagic(magic)),
        };

        Ok(Self {
            mmap,
            byte_order,
            is_big_tiff,
            first_ifd_offset,
        })
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn is_big_tiff(&self) -> bool {
        self.is_big_tiff
    }

    fn tag_reader(&self) -> TagReader<'_> {
        TagReader::new(&self.mmap, self.byte_order, self.is_big_tiff)
    }

    /// Reads every image directory in the file
    pub fn read(&self) -> Result<Tiff, TiffError> {
        let mut tiff = Tiff::new(self.is_big_tiff);
        let mut visited = HashSet::new();
        let mut next_ifd_offset = self.first_ifd_offset;

        while next_ifd_offset != 0 {
            if tiff.ifd_count() >= MAX_IFDS {
                return Err(TiffError::InvalidFormat("Too many IFDs".to_string()));
            }
            if !visited.insert(next_ifd_offset) {
                return Err(TiffError::InvalidFormat(format!(
                    "IFD chain loops back to offset {}",
                    next_ifd_offset
                )));
            }

            let (ifd, next) = self.read_ifd(tiff.ifd_count(), next_ifd_offset)?;
            tiff.add_ifd(ifd);
            next_ifd_offset = next;
        }

        if tiff.ifd_count() == 0 {
            return Err(TiffError::InvalidFormat("No image directory".to_string()));
        }

        Ok(tiff)
    }

    /// Reads a single IFD and the offset of the one after it
    fn read_ifd(&self, number: usize, offset: u64) -> Result<(IFD, u64), TiffError> {
        let reader = self.tag_reader();
        let pos = usize::try_from(offset).map_err(|_| TiffError::InvalidOffset(offset))?;

        let (entry_count, first_entry) = if self.is_big_tiff {
            (self.byte_order.read_u64(&self.mmap, pos)? as usize, pos + 8)
        } else {
            (self.byte_order.read_u16(&self.mmap, pos)? as usize, pos + 2)
        };

        let mut ifd = IFD::new(number, offset);
        for i in 0..entry_count {
            if let Some(entry) = reader.read_entry(first_entry + i * reader.entry_size())? {
                ifd.add_entry(entry);
            }
        }

        let next = reader.read_offset(first_entry + entry_count * reader.entry_size())?;
        debug!(number, offset, entries = ifd.entry_count(), "read IFD");

        Ok((ifd, next))
    }

    /// Decodes the full raster of an image directory
    pub fn read_raster(&self, ifd: &IFD) -> Result<DecodedRaster, TiffError> {
        let data_type = ifd.data_type()?;
        let compression = Compression::from_tag(ifd.compression())?;
        if compression == Compression::Jpeg && data_type != DataType::U8 {
            return Err(TiffError::Unsupported(format!("JPEG with {} samples", data_type.name())));
        }

        let layout = BlockLayout::from_ifd(ifd, data_type)?;
        let predictor = ifd.predictor();
        let band_count = ifd.samples_per_pixel() as usize;
        let data: &[u8] = &self.mmap;

        let blocks = (0..layout.block_count())
            .into_par_iter()
            .map(|index| {
                let block = blocks::decode_block(data, &layout, index, compression, predictor, self.byte_order)?;
                pixels::decode_samples(&block.bytes, data_type, block.byte_order)
            })
            .collect::<Result<Vec<_>, TiffError>>()?;

        let (width, height) = (layout.width, layout.height);
        let mut bands = vec![vec![0.0f64; width * height]; band_count];

        for (index, samples) in blocks.iter().enumerate() {
            let position = layout.locate(index);
            for r in 0..position.rows {
                let src_row = r * layout.block_width;
                let dst_row = (position.row0 + r) * width + position.col0;
                for c in 0..position.cols {
                    let src = (src_row + c) * layout.samples;
                    if layout.planes == 1 {
                        for (band, values) in bands.iter_mut().enumerate() {
                            values[dst_row + c] = samples[src + band];
                        }
                    } else {
                        bands[position.plane][dst_row + c] = samples[src];
                    }
                }
            }
        }

        debug!(width, height, bands = band_count, blocks = layout.block_count(), "decoded raster");

        Ok(DecodedRaster {
            width,
            height,
            data_type,
            bands,
        })
    }
}
