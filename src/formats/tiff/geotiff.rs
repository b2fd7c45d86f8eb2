//! GeoTIFF specific functionality

use std::fmt;

use tracing::debug;

use crate::raster::{Crs, GeoTransform};
use super::ifd::IFD;
use super::tags;

/// GeoKey identifiers
pub mod geo_keys {
    pub const MODEL_TYPE: u16 = 1024;
    pub const RASTER_TYPE: u16 = 1025;
    pub const CITATION: u16 = 1026;
    pub const GEOGRAPHIC_TYPE: u16 = 2048;
    pub const PROJECTED_CS_TYPE: u16 = 3072;

    pub const MODEL_TYPE_PROJECTED: u16 = 1;
    pub const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
    pub const MODEL_TYPE_GEOCENTRIC: u16 = 3;
    pub const RASTER_PIXEL_IS_AREA: u16 = 1;
    pub const RASTER_PIXEL_IS_POINT: u16 = 2;
    pub const USER_DEFINED: u16 = 32767;
}

/// GeoTIFF information extracted from an IFD
#[derive(Debug, Default)]
pub struct GeoInfo {
    /// Model pixel scale (ScaleX, ScaleY, ScaleZ)
    pub pixel_scale: Option<(f64, f64, f64)>,
    /// Model tiepoints (pixel coord -> geo coord mapping)
    pub tiepoints: Vec<TiePoint>,
    /// Row-major 4x4 ModelTransformation
    pub transformation: Option<[f64; 16]>,
    /// GeographicTypeGeoKey, possibly user defined
    pub geographic_type: Option<u16>,
    /// ProjectedCSTypeGeoKey, possibly user defined
    pub projected_type: Option<u16>,
    /// 1 = projected, 2 = geographic, 3 = geocentric
    pub model_type: Option<u16>,
    /// 1 = pixel is area, 2 = pixel is point
    pub raster_type: Option<u16>,
    /// Citation text, used when the CRS is user defined
    pub citation: Option<String>,
    /// GDAL no-data value
    pub nodata: Option<f64>,
}

/// Represents a GeoTIFF tiepoint
#[derive(Debug, Clone, Copy)]
pub struct TiePoint {
    pub pixel_x: f64,
    pub pixel_y: f64,
    pub pixel_z: f64,
    pub geo_x: f64,
    pub geo_y: f64,
    pub geo_z: f64,
}

impl GeoInfo {
    /// Extracts GeoTIFF information from an IFD
    pub fn from_ifd(ifd: &IFD) -> Self {
        let mut geo_info = GeoInfo::default();

        if let Some(values) = ifd.get_f64s(tags::MODEL_PIXEL_SCALE) {
            if values.len() >= 3 {
                geo_info.pixel_scale = Some((values[0], values[1], values[2]));
            }
        }

        if let Some(values) = ifd.get_f64s(tags::MODEL_TIEPOINT) {
            geo_info.tiepoints = values
                .chunks_exact(6)
                .map(|chunk| TiePoint {
                    pixel_x: chunk[0],
                    pixel_y: chunk[1],
                    pixel_z: chunk[2],
                    geo_x: chunk[3],
                    geo_y: chunk[4],
                    geo_z: chunk[5],
                })
                .collect();
        }

        if let Some(values) = ifd.get_f64s(tags::MODEL_TRANSFORMATION) {
            if let Ok(matrix) = <[f64; 16]>::try_from(values.as_slice()) {
                geo_info.transformation = Some(matrix);
            }
        }

        if let Some(keys) = ifd.get_u64s(tags::GEO_KEY_DIRECTORY) {
            let ascii = ifd.get_ascii(tags::GEO_ASCII_PARAMS).unwrap_or("");
            geo_info.read_geo_keys(&keys, ascii);
        }

        if let Some(text) = ifd.get_ascii(tags::GDAL_NODATA) {
            geo_info.nodata = text.trim().parse::<f64>().ok();
        }

        geo_info
    }

    fn read_geo_keys(&mut self, keys: &[u64], ascii: &str) {
        if keys.len() < 4 {
            return;
        }
        let num_keys = keys[3] as usize;

        for entry in keys[4..].chunks_exact(4).take(num_keys) {
            let (key_id, location, count, value) = (entry[0] as u16, entry[1], entry[2] as usize, entry[3]);

            match key_id {
                geo_keys::MODEL_TYPE => self.model_type = Some(value as u16),
                geo_keys::RASTER_TYPE => self.raster_type = Some(value as u16),
                geo_keys::GEOGRAPHIC_TYPE if location == 0 => self.geographic_type = Some(value as u16),
                geo_keys::PROJECTED_CS_TYPE if location == 0 => self.projected_type = Some(value as u16),
                geo_keys::CITATION if location == tags::GEO_ASCII_PARAMS as u64 => {
                    let start = value as usize;
                    let text = ascii
                        .get(start..(start + count).min(ascii.len()))
                        .unwrap_or("")
                        .trim_end_matches(['|', '\0'])
                        .trim();
                    if !text.is_empty() {
                        self.citation = Some(text.to_string());
                    }
                }
                _ => debug!(key_id, "ignoring GeoKey"),
            }
        }
    }

    /// Affine transform of the pixel corners, from the transformation matrix
    /// or from scale and tiepoint.
    ///
    /// PixelIsPoint files georeference pixel centres; their origin moves back
    /// by half a pixel.
    pub fn transform(&self) -> Option<GeoTransform> {
        let mut t = match self.transformation {
            Some(m) => GeoTransform::new(m[0], m[1], m[3], m[4], m[5], m[7]),
            None => {
                let (scale_x, scale_y, _) = self.pixel_scale?;
                let tp = self.tiepoints.first()?;
                GeoTransform::new(
                    scale_x,
                    0.0,
                    tp.geo_x - tp.pixel_x * scale_x,
                    0.0,
                    -scale_y,
                    tp.geo_y + tp.pixel_y * scale_y,
                )
            }
        };

        if self.raster_type == Some(geo_keys::RASTER_PIXEL_IS_POINT) {
            t.c -= 0.5 * (t.a + t.b);
            t.f -= 0.5 * (t.d + t.e);
        }
        Some(t)
    }

    /// EPSG code of the CRS.
    ///
    /// A projected model never falls back to its geographic base code.
    pub fn epsg_code(&self) -> Option<u16> {
        let known = |code: Option<u16>| code.filter(|&c| c != 0 && c != geo_keys::USER_DEFINED);
        let projected = self.model_type == Some(geo_keys::MODEL_TYPE_PROJECTED) || self.projected_type.is_some();

        match known(self.projected_type) {
            Some(code) => Some(code),
            None if projected => None,
            None => known(self.geographic_type),
        }
    }

    /// `EPSG:<code>` when known, otherwise the citation text
    pub fn crs(&self) -> Option<Crs> {
        match (self.epsg_code(), &self.citation) {
            (Some(code), _) => Some(Crs::from_epsg(code as u32)),
            (None, Some(citation)) => Some(Crs::new(citation)),
            (None, None) => None,
        }
    }
}

impl fmt::Display for GeoInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\nGeoTIFF Information:")?;

        if let Some(crs) = self.crs() {
            writeln!(f, "  CRS: {}", crs)?;
        }

        if let Some((sx, sy, _sz)) = self.pixel_scale {
            writeln!(f, "  Pixel Size: {} x {}", sx, sy)?;
        }

        if let Some(t) = self.transform() {
            writeln!(f, "  Origin (geo): ({}, {})", t.c, t.f)?;
        }

        if let Some(nodata) = self.nodata {
            writeln!(f, "  NoData: {}", nodata)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::tiff::ifd::{IFDEntry, TagValue};
    use crate::formats::tiff::tags::field_types;

    fn doubles(tag: u16, values: &[f64]) -> IFDEntry {
        IFDEntry::new(tag, field_types::DOUBLE, TagValue::Float(values.to_vec()))
    }

    fn keys(values: &[u64]) -> IFDEntry {
        IFDEntry::new(tags::GEO_KEY_DIRECTORY, field_types::SHORT, TagValue::Unsigned(values.to_vec()))
    }

    #[test]
    fn test_scale_and_tiepoint() {
        let mut ifd = IFD::new(0, 8);
        ifd.add_entry(doubles(tags::MODEL_PIXEL_SCALE, &[0.5, 0.25, 0.0]));
        ifd.add_entry(doubles(tags::MODEL_TIEPOINT, &[0.0, 0.0, 0.0, 10.0, 50.0, 0.0]));
        ifd.add_entry(keys(&[1, 1, 0, 2, 1024, 0, 1, 2, 2048, 0, 1, 4326]));

        let info = GeoInfo::from_ifd(&ifd);
        assert_eq!(info.transform(), Some(GeoTransform::from_origin(10.0, 50.0, 0.5, 0.25)));
        assert_eq!(info.crs(), Some(Crs::new("EPSG:4326")));
        assert_eq!(info.model_type, Some(geo_keys::MODEL_TYPE_GEOGRAPHIC));
    }

    #[test]
    fn test_tiepoint_not_at_origin() {
        let mut ifd = IFD::new(0, 8);
        ifd.add_entry(doubles(tags::MODEL_PIXEL_SCALE, &[2.0, 2.0, 0.0]));
        ifd.add_entry(doubles(tags::MODEL_TIEPOINT, &[10.0, 5.0, 0.0, 120.0, 80.0, 0.0]));
        let t = GeoInfo::from_ifd(&ifd).transform().unwrap();
        assert_eq!(t.apply(10.0, 5.0), (120.0, 80.0));
        assert_eq!((t.c, t.f), (100.0, 90.0));
    }

    #[test]
    fn test_transformation_matrix() {
        let mut ifd = IFD::new(0, 8);
        let mut m = [0.0; 16];
        m[0] = 30.0;
        m[1] = 1.0;
        m[3] = 500000.0;
        m[4] = 2.0;
        m[5] = -30.0;
        m[7] = 4000000.0;
        m[15] = 1.0;
        ifd.add_entry(doubles(tags::MODEL_TRANSFORMATION, &m));
        let t = GeoInfo::from_ifd(&ifd).transform().unwrap();
        assert_eq!(t, GeoTransform::new(30.0, 1.0, 500000.0, 2.0, -30.0, 4000000.0));
    }

    #[test]
    fn test_projected_wins_and_citation_fallback() {
        let mut ifd = IFD::new(0, 8);
        ifd.add_entry(keys(&[1, 1, 0, 2, 2048, 0, 1, 4326, 3072, 0, 1, 32633]));
        assert_eq!(GeoInfo::from_ifd(&ifd).crs(), Some(Crs::from_epsg(32633)));

        let mut ifd = IFD::new(0, 8);
        ifd.add_entry(keys(&[1, 1, 0, 2, 1026, 34737, 11, 0, 3072, 0, 1, 32767]));
        ifd.add_entry(IFDEntry::new(tags::GEO_ASCII_PARAMS, field_types::ASCII, TagValue::Ascii("ESRI:54009|".into())));
        assert_eq!(GeoInfo::from_ifd(&ifd).crs(), Some(Crs::new("ESRI:54009")));
    }

    #[test]
    fn test_user_defined_projection_keeps_citation() {
        let mut ifd = IFD::new(0, 8);
        ifd.add_entry(keys(&[
            1, 1, 0, 4,
            1024, 0, 1, 1,
            1026, 34737, 32, 0,
            2048, 0, 1, 4326,
            3072, 0, 1, 32767,
        ]));
        ifd.add_entry(IFDEntry::new(
            tags::GEO_ASCII_PARAMS,
            field_types::ASCII,
            TagValue::Ascii("+proj=utm +zone=33 +datum=WGS84|".into()),
        ));

        let info = GeoInfo::from_ifd(&ifd);
        assert_eq!(info.epsg_code(), None);
        assert_eq!(info.crs(), Some(Crs::new("+proj=utm +zone=33 +datum=WGS84")));
    }

    #[test]
    fn test_projected_model_without_code_has_no_crs() {
        let mut ifd = IFD::new(0, 8);
        ifd.add_entry(keys(&[1, 1, 0, 2, 1024, 0, 1, 1, 2048, 0, 1, 4326]));
        assert_eq!(GeoInfo::from_ifd(&ifd).crs(), None);
    }

    #[test]
    fn test_pixel_is_point_shifts_origin() {
        let mut ifd = IFD::new(0, 8);
        ifd.add_entry(doubles(tags::MODEL_PIXEL_SCALE, &[10.0, 10.0, 0.0]));
        ifd.add_entry(doubles(tags::MODEL_TIEPOINT, &[0.0, 0.0, 0.0, 100.0, 200.0, 0.0]));
        ifd.add_entry(keys(&[1, 1, 0, 2, 1024, 0, 1, 1, 1025, 0, 1, 2]));

        let t = GeoInfo::from_ifd(&ifd).transform().unwrap();
        assert_eq!((t.c, t.f), (95.0, 205.0));
        assert_eq!(t.apply(0.5, 0.5), (100.0, 200.0));
    }

    #[test]
    fn test_nodata() {
        let mut ifd = IFD::new(0, 8);
        ifd.add_entry(IFDEntry::new(tags::GDAL_NODATA, field_types::ASCII, TagValue::Ascii("nan".into())));
        assert!(GeoInfo::from_ifd(&ifd).nodata.unwrap().is_nan());

        let mut ifd = IFD::new(0, 8);
        ifd.add_entry(IFDEntry::new(tags::GDAL_NODATA, field_types::ASCII, TagValue::Ascii(" -9999 ".into())));
        assert_eq!(GeoInfo::from_ifd(&ifd).nodata, Some(-9999.0));
    }

    #[test]
    fn test_plain_tiff() {
        let info = GeoInfo::from_ifd(&IFD::new(0, 8));
        assert!(info.transform().is_none());
        assert!(info.crs().is_none());
    }
}
