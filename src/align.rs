//! Putting two rasters on one pixel grid

use std::borrow::Cow;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterGrid, RasterProfile};

/// Two grids sharing width, height and transform
#[derive(Debug)]
pub struct AlignmentResult<'a> {
    pub reference: &'a RasterGrid,
    /// The second input itself, or a resampled copy of it
    pub aligned: Cow<'a, RasterGrid>,
}

impl AlignmentResult<'_> {
    /// Whether the second grid had to be resampled
    pub fn resampled(&self) -> bool {
        matches!(self.aligned, Cow::Owned(_))
    }
}

/// Fails with `CrsMismatch` when the CRSs differ; returns `b` untouched when
/// it already sits on `a`'s grid, otherwise resamples it bilinearly onto it.
pub fn align<'a>(a: &'a RasterGrid, b: &'a RasterGrid, tolerance: f64) -> Result<AlignmentResult<'a>> {
    check_crs(&a.profile, &b.profile)?;

    if a.profile.same_grid(&b.profile, tolerance) {
        debug!("grids already aligned");
        return Ok(AlignmentResult {
            reference: a,
            aligned: Cow::Borrowed(b),
        });
    }

    info!(
        from = ?(b.width(), b.height()),
        to = ?(a.width(), a.height()),
        "resampling second raster onto the reference grid"
    );
    let resampled = resample_bilinear(b, a.width(), a.height(), &a.profile.transform)?;
    Ok(AlignmentResult {
        reference: a,
        aligned: Cow::Owned(resampled),
    })
}

/// `CrsMismatch` unless both profiles name the same CRS
pub fn check_crs(a: &RasterProfile, b: &RasterProfile) -> Result<()> {
    if a.crs != b.crs {
        let name = |p: &RasterProfile| p.crs.as_ref().map_or_else(|| "none".to_string(), |c| c.to_string());
        return Err(Error::CrsMismatch(format!(
            "rasters must share a CRS, got {} and {}",
            name(a),
            name(b)
        )));
    }
    Ok(())
}

/// Resamples every band of `source` onto a `width x height` grid with `transform`.
///
/// Each output pixel is the distance-weighted mean of the four source pixel
/// centres around it. Missing neighbours drop out and the remaining weights are
/// renormalised. Pixels outside the source footprint are NaN.
pub fn resample_bilinear(
    source: &RasterGrid,
    width: usize,
    height: usize,
    transform: &GeoTransform,
) -> Result<RasterGrid> {
    let profile = &source.profile;
    let inverse = profile.transform.inverse()?;
    let (src_w, src_h) = (profile.width, profile.height);

    let bands = source
        .bands
        .iter()
        .map(|band| {
            let mut out = vec![f64::NAN; width * height];
            out.par_chunks_mut(width).enumerate().for_each(|(row, cells)| {
                for (col, cell) in cells.iter_mut().enumerate() {
                    let (x, y) = transform.apply(col as f64 + 0.5, row as f64 + 0.5);
                    let (c, r) = inverse.apply(x, y);
                    if c < 0.0 || r < 0.0 || c > src_w as f64 || r > src_h as f64 {
                        continue;
                    }
                    *cell = bilinear(band, src_w, src_h, c - 0.5, r - 0.5, |v| profile.is_nodata(v));
                }
            });
            out
        })
        .collect();

    let out = RasterProfile {
        width,
        height,
        transform: *transform,
        ..profile.clone()
    };
    RasterGrid::new(out, bands)
}

/// Samples `band` at fractional pixel-centre coordinates, clamping at the edges
fn bilinear(
    band: &[f64],
    width: usize,
    height: usize,
    x: f64,
    y: f64,
    is_missing: impl Fn(f64) -> bool,
) -> f64 {
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let clamp_col = |c: f64| c.clamp(0.0, (width - 1) as f64) as usize;
    let clamp_row = |r: f64| r.clamp(0.0, (height - 1) as f64) as usize;

    let taps = [
        (clamp_col(x0), clamp_row(y0), (1.0 - fx) * (1.0 - fy)),
        (clamp_col(x0 + 1.0), clamp_row(y0), fx * (1.0 - fy)),
        (clamp_col(x0), clamp_row(y0 + 1.0), (1.0 - fx) * fy),
        (clamp_col(x0 + 1.0), clamp_row(y0 + 1.0), fx * fy),
    ];

    let (sum, weight) = taps
        .iter()
        .map(|&(c, r, w)| (band[r * width + c], w))
        .filter(|&(v, w)| w > 0.0 && !is_missing(v))
        .fold((0.0, 0.0), |(s, ws), (v, w)| (s + v * w, ws + w));

    if weight > 0.0 { sum / weight } else { f64::NAN }
}
