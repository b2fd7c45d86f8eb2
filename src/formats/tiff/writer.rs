//! GeoTIFF writer for in-memory rasters
//!
//! Produces a little-endian classic TIFF with one strip grid per band
//! (planar layout for multi-band rasters), the GeoTIFF transform and
//! GeoKey tags, and the GDAL no-data tag.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::compression::Compression;
use crate::error::TiffError;
use crate::raster::RasterGrid;
use crate::types::DataType;

use super::geotiff::geo_keys;
use super::ifd::{IFDEntry, TagValue};
use super::tags::{self, field_types};
use super::TIFF_MAGIC;

/// Target size of one uncompressed strip
const STRIP_BYTES: usize = 64 * 1024;

/// Builder for writing a [`RasterGrid`] as GeoTIFF
pub struct GeoTiffWriter<'a> {
    grid: &'a RasterGrid,
    compression: Compression,
}

impl<'a> GeoTiffWriter<'a> {
    #[must_use]
    pub fn new(grid: &'a RasterGrid) -> Self {
        Self {
            grid,
            compression: Compression::None,
        }
    }

    /// Set the compression method (`None` or `Deflate`)
    #[must_use]
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Write to a file path
    pub fn write<P: AsRef<Path>>(self, path: P) -> Result<(), TiffError> {
        let bytes = self.to_bytes()?;
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        writer.write_all(&bytes)?;
        writer.flush()?;
        debug!(path = %path.as_ref().display(), bytes = bytes.len(), "wrote GeoTIFF");
        Ok(())
    }

    /// Encode the whole file in memory
    pub fn to_bytes(&self) -> Result<Vec<u8>, TiffError> {
        let profile = &self.grid.profile;
        let (width, height, bands) = (profile.width, profile.height, profile.count);
        if width == 0 || height == 0 || bands == 0 {
            return Err(TiffError::InvalidFormat(format!(
                "Cannot write an empty raster ({}x{}, {} bands)",
                width, height, bands
            )));
        }

        let dtype = profile.dtype;
        let row_bytes = width * dtype.size();
        let rows_per_strip = (STRIP_BYTES / row_bytes).clamp(1, height);

        let mut out = Vec::with_capacity(8 + bands * height * row_bytes);
        out.extend_from_slice(b"II");
        out.extend_from_slice(&TIFF_MAGIC.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());

        let mut offsets = Vec::new();
        let mut byte_counts = Vec::new();
        for band in &self.grid.bands {
            for rows in band.chunks(rows_per_strip * width) {
                let raw = encode_samples(rows, dtype);
                let block = self.compression.compress(&raw)?;
                offsets.push(out.len() as u64);
                byte_counts.push(block.len() as u64);
                out.extend_from_slice(&block);
            }
        }

        let entries = self.entries(rows_per_strip, offsets, byte_counts);
        write_ifd(&mut out, entries)?;
        Ok(out)
    }

    fn entries(&self, rows_per_strip: usize, offsets: Vec<u64>, byte_counts: Vec<u64>) -> Vec<IFDEntry> {
        let profile = &self.grid.profile;
        let dtype = profile.dtype;
        let bands = profile.count;
        let short = |tag, values: Vec<u64>| IFDEntry::new(tag, field_types::SHORT, TagValue::Unsigned(values));
        let long = |tag, values: Vec<u64>| IFDEntry::new(tag, field_types::LONG, TagValue::Unsigned(values));
        let double = |tag, values: Vec<f64>| IFDEntry::new(tag, field_types::DOUBLE, TagValue::Float(values));
        let ascii = |tag, text: String| IFDEntry::new(tag, field_types::ASCII, TagValue::Ascii(text));

        let mut entries = vec![
            long(tags::IMAGE_WIDTH, vec![profile.width as u64]),
            long(tags::IMAGE_LENGTH, vec![profile.height as u64]),
            short(tags::BITS_PER_SAMPLE, vec![dtype.bits() as u64; bands]),
            short(tags::COMPRESSION, vec![self.compression.tag() as u64]),
            short(tags::PHOTOMETRIC_INTERPRETATION, vec![1]),
            long(tags::STRIP_OFFSETS, offsets),
            short(tags::SAMPLES_PER_PIXEL, vec![bands as u64]),
            long(tags::ROWS_PER_STRIP, vec![rows_per_strip as u64]),
            long(tags::STRIP_BYTE_COUNTS, byte_counts),
            short(tags::PLANAR_CONFIGURATION, vec![if bands > 1 { 2 } else { 1 }]),
            ascii(tags::SOFTWARE, "satproc".to_string()),
            short(tags::SAMPLE_FORMAT, vec![dtype.sample_format() as u64; bands]),
        ];
        if bands > 1 {
            // unspecified meaning for every sample past the first
            entries.push(short(tags::EXTRA_SAMPLES, vec![0; bands - 1]));
        }

        let t = profile.transform;
        if t.is_north_up() {
            entries.push(double(tags::MODEL_PIXEL_SCALE, vec![t.a, -t.e, 0.0]));
            entries.push(double(tags::MODEL_TIEPOINT, vec![0.0, 0.0, 0.0, t.c, t.f, 0.0]));
        } else {
            entries.push(double(
                tags::MODEL_TRANSFORMATION,
                vec![
                    t.a, t.b, 0.0, t.c,
                    t.d, t.e, 0.0, t.f,
                    0.0, 0.0, 0.0, 0.0,
                    0.0, 0.0, 0.0, 1.0,
                ],
            ));
        }

        if let Some(crs) = &profile.crs {
            let mut keys = vec![];
            let mut citation = None;
            match crs.epsg().and_then(|code| u16::try_from(code).ok()) {
                Some(code) if crs.is_geographic() || crs.is_geocentric() => {
                    let model = if crs.is_geocentric() {
                        geo_keys::MODEL_TYPE_GEOCENTRIC
                    } else {
                        geo_keys::MODEL_TYPE_GEOGRAPHIC
                    };
                    keys.push([geo_keys::MODEL_TYPE, 0, 1, model]);
                    keys.push([geo_keys::RASTER_TYPE, 0, 1, geo_keys::RASTER_PIXEL_IS_AREA]);
                    keys.push([geo_keys::GEOGRAPHIC_TYPE, 0, 1, code]);
                }
                Some(code) => {
                    keys.push([geo_keys::MODEL_TYPE, 0, 1, geo_keys::MODEL_TYPE_PROJECTED]);
                    keys.push([geo_keys::RASTER_TYPE, 0, 1, geo_keys::RASTER_PIXEL_IS_AREA]);
                    keys.push([geo_keys::PROJECTED_CS_TYPE, 0, 1, code]);
                }
                None => {
                    let text = format!("{}|", crs.as_str());
                    keys.push([geo_keys::MODEL_TYPE, 0, 1, geo_keys::MODEL_TYPE_PROJECTED]);
                    keys.push([geo_keys::RASTER_TYPE, 0, 1, geo_keys::RASTER_PIXEL_IS_AREA]);
                    keys.push([geo_keys::CITATION, tags::GEO_ASCII_PARAMS, text.len() as u16, 0]);
                    keys.push([geo_keys::PROJECTED_CS_TYPE, 0, 1, geo_keys::USER_DEFINED]);
                    citation = Some(text);
                }
            }

            let mut directory = vec![1, 1, 0, keys.len() as u64];
            directory.extend(keys.iter().flatten().map(|&v| v as u64));
            entries.push(short(tags::GEO_KEY_DIRECTORY, directory));
            if let Some(text) = citation {
                entries.push(ascii(tags::GEO_ASCII_PARAMS, text));
            }
        }

        if let Some(nodata) = profile.nodata {
            let text = if nodata.is_nan() { "nan".to_string() } else { nodata.to_string() };
            entries.push(ascii(tags::GDAL_NODATA, text));
        }

        entries
    }
}

/// Narrows samples to `dtype` and lays them out little-endian
fn encode_samples(values: &[f64], dtype: DataType) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * dtype.size());
    for &value in values {
        let v = dtype.narrow(value);
        match dtype {
            DataType::U8 => out.push(v as u8),
            DataType::I8 => out.push(v as i8 as u8),
            DataType::U16 => out.extend_from_slice(&(v as u16).to_le_bytes()),
            DataType::I16 => out.extend_from_slice(&(v as i16).to_le_bytes()),
            DataType::U32 => out.extend_from_slice(&(v as u32).to_le_bytes()),
            DataType::I32 => out.extend_from_slice(&(v as i32).to_le_bytes()),
            DataType::F32 => out.extend_from_slice(&(v as f32).to_le_bytes()),
            DataType::F64 => out.extend_from_slice(&v.to_le_bytes()),
        }
    }
    out
}

fn encode_value(value: &TagValue, field_type: u16) -> Vec<u8> {
    let mut out = Vec::new();
    match value {
        TagValue::Unsigned(values) => {
            for &v in values {
                match field_type {
                    field_types::SHORT => out.extend_from_slice(&(v as u16).to_le_bytes()),
                    field_types::LONG => out.extend_from_slice(&(v as u32).to_le_bytes()),
                    _ => out.push(v as u8),
                }
            }
        }
        TagValue::Signed(values) => {
            for &v in values {
                out.extend_from_slice(&(v as i32).to_le_bytes());
            }
        }
        TagValue::Float(values) => {
            for &v in values {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        TagValue::Ascii(text) => {
            out.extend_from_slice(text.as_bytes());
            out.push(0);
        }
    }
    out
}

/// Appends the IFD (word aligned) and its out-of-line values, then patches the header
fn write_ifd(out: &mut Vec<u8>, mut entries: Vec<IFDEntry>) -> Result<(), TiffError> {
    entries.sort_by_key(|e| e.tag);

    if out.len() % 2 == 1 {
        out.push(0);
    }
    let ifd_offset = out.len();
    let values_start = ifd_offset + 2 + entries.len() * 12 + 4;

    let mut directory = Vec::with_capacity(values_start - ifd_offset);
    let mut values = Vec::new();
    directory.extend_from_slice(&(entries.len() as u16).to_le_bytes());

    for entry in &entries {
        let bytes = encode_value(&entry.value, entry.field_type);
        directory.extend_from_slice(&entry.tag.to_le_bytes());
        directory.extend_from_slice(&entry.field_type.to_le_bytes());
        directory.extend_from_slice(&(entry.count as u32).to_le_bytes());

        if bytes.len() <= 4 {
            let mut inline = [0u8; 4];
            inline[..bytes.len()].copy_from_slice(&bytes);
            directory.extend_from_slice(&inline);
        } else {
            let offset = to_u32(values_start + values.len())?;
            directory.extend_from_slice(&offset.to_le_bytes());
            values.extend_from_slice(&bytes);
            if values.len() % 2 == 1 {
                values.push(0);
            }
        }
    }
    directory.extend_from_slice(&0u32.to_le_bytes());

    out.extend_from_slice(&directory);
    out.extend_from_slice(&values);
    to_u32(out.len())?;

    let header_offset = to_u32(ifd_offset)?.to_le_bytes();
    out[4..8].copy_from_slice(&header_offset);
    Ok(())
}

fn to_u32(offset: usize) -> Result<u32, TiffError> {
    u32::try_from(offset)
        .map_err(|_| TiffError::Unsupported(format!("Offset {} needs BigTIFF output", offset)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::tiff::{GeoInfo, TiffReader};
    use crate::raster::{Crs, GeoTransform, RasterProfile};
    use tempfile::tempdir;

    fn grid(dtype: DataType, count: usize, crs: Option<Crs>, nodata: Option<f64>) -> RasterGrid {
        let (width, height) = (5, 4);
        let profile = RasterProfile {
            width,
            height,
            count,
            crs,
            transform: GeoTransform::from_origin(500000.0, 4100000.0, 30.0, 30.0),
            nodata,
            dtype,
        };
        let bands = (0..count)
            .map(|b| (0..width * height).map(|i| (i + b * 100) as f64).collect())
            .collect();
        RasterGrid::new(profile, bands).unwrap()
    }

    fn round_trip(grid: &RasterGrid, compression: Compression) -> (GeoInfo, Vec<Vec<f64>>) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.tif");
        GeoTiffWriter::new(grid).compression(compression).write(&path).unwrap();

        let reader = TiffReader::open(&path).unwrap();
        let tiff = reader.read().unwrap();
        let ifd = tiff.main_ifd().unwrap();
        (GeoInfo::from_ifd(ifd), reader.read_raster(ifd).unwrap().bands)
    }

    #[test]
    fn test_single_band_projected() {
        let g = grid(DataType::U16, 1, Some(Crs::from_epsg(32633)), Some(0.0));
        let (info, bands) = round_trip(&g, Compression::None);
        assert_eq!(bands, g.bands);
        assert_eq!(info.crs(), Some(Crs::from_epsg(32633)));
        assert_eq!(info.model_type, Some(geo_keys::MODEL_TYPE_PROJECTED));
        assert_eq!(info.transform(), Some(g.profile.transform));
        assert_eq!(info.nodata, Some(0.0));
    }

    #[test]
    fn test_multi_band_deflate() {
        let g = grid(DataType::F32, 3, Some(Crs::from_epsg(4326)), Some(f64::NAN));
        let (info, bands) = round_trip(&g, Compression::Deflate);
        assert_eq!(bands, g.bands);
        assert_eq!(info.model_type, Some(geo_keys::MODEL_TYPE_GEOGRAPHIC));
        assert!(info.nodata.unwrap().is_nan());
    }

    #[test]
    fn test_projected_code_in_geographic_block() {
        let g = grid(DataType::F32, 1, Some(Crs::from_epsg(4087)), None);
        let (info, _) = round_trip(&g, Compression::None);
        assert_eq!(info.model_type, Some(geo_keys::MODEL_TYPE_PROJECTED));
        assert_eq!(info.projected_type, Some(4087));
        assert!(info.geographic_type.is_none());
        assert_eq!(info.crs(), Some(Crs::from_epsg(4087)));
    }

    #[test]
    fn test_geocentric_crs() {
        let g = grid(DataType::F32, 1, Some(Crs::from_epsg(4978)), None);
        let (info, _) = round_trip(&g, Compression::None);
        assert_eq!(info.model_type, Some(geo_keys::MODEL_TYPE_GEOCENTRIC));
        assert_eq!(info.crs(), Some(Crs::from_epsg(4978)));
    }

    #[test]
    fn test_rotated_transform_and_custom_crs() {
        let mut g = grid(DataType::F64, 1, Some(Crs::new("ESRI:54009")), None);
        g.profile.transform = GeoTransform::new(30.0, 2.0, 100.0, 1.0, -30.0, 900.0);
        let (info, _) = round_trip(&g, Compression::None);
        assert_eq!(info.transform(), Some(g.profile.transform));
        assert_eq!(info.crs(), Some(Crs::new("ESRI:54009")));
        assert!(info.nodata.is_none());
    }

    #[test]
    fn test_narrowing_saturates() {
        let mut g = grid(DataType::U8, 1, None, None);
        g.bands[0][0] = 300.0;
        g.bands[0][1] = -5.0;
        let (info, bands) = round_trip(&g, Compression::None);
        assert_eq!(&bands[0][..3], &[255.0, 0.0, 2.0]);
        assert!(info.crs().is_none());
    }

    #[test]
    fn test_unsupported_compression() {
        let g = grid(DataType::U8, 1, None, None);
        assert!(GeoTiffWriter::new(&g).compression(Compression::Lzw).to_bytes().is_err());
    }

    #[test]
    fn test_multiple_strips() {
        let profile = RasterProfile {
            width: 300,
            height: 500,
            count: 1,
            crs: None,
            transform: GeoTransform::IDENTITY,
            nodata: None,
            dtype: DataType::F32,
        };
        let band: Vec<f64> = (0..300 * 500).map(|i| (i % 977) as f64).collect();
        let g = RasterGrid::new(profile, vec![band]).unwrap();
        let (_, bands) = round_trip(&g, Compression::None);
        assert_eq!(bands, g.bands);
    }
}
