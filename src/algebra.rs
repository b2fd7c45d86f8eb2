//! Element-wise band math: normalized-difference index and change masks

use rayon::prelude::*;
use serde::Serialize;

use crate::error::{Error, Result};

/// Mask value of a changed pixel
pub const CHANGED: f64 = 255.0;

/// Checks a 1-based band number against a band count
pub fn validate_band(band: usize, count: usize) -> Result<()> {
    if band == 0 || band > count {
        return Err(Error::BandIndexOutOfRange(format!(
            "band {} requested, raster has {} band{}",
            band,
            count,
            if count == 1 { "" } else { "s" }
        )));
    }
    Ok(())
}

/// One band's pixels together with its no-data sentinel
#[derive(Debug, Clone, Copy)]
pub struct BandView<'a> {
    pub values: &'a [f64],
    pub nodata: Option<f64>,
}

impl<'a> BandView<'a> {
    pub fn new(values: &'a [f64], nodata: Option<f64>) -> Self {
        Self { values, nodata }
    }

    #[inline]
    fn is_missing(&self, value: f64) -> bool {
        value.is_nan() || self.nodata.is_some_and(|nodata| value == nodata)
    }

    /// Min and max over valid pixels, NaN when there are none
    fn range(&self) -> (f64, f64) {
        let (lo, hi) = self
            .values
            .par_iter()
            .copied()
            .filter(|&v| !self.is_missing(v))
            .fold(|| (f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
            .reduce(|| (f64::INFINITY, f64::NEG_INFINITY), |a, b| (a.0.min(b.0), a.1.max(b.1)));

        if lo > hi { (f64::NAN, f64::NAN) } else { (lo, hi) }
    }
}

fn check_shape(a: &[f64], b: &[f64]) -> Result<()> {
    if a.len() != b.len() {
        return Err(Error::ComputationFailure(format!(
            "Bands differ in size: {} vs {} pixels",
            a.len(),
            b.len()
        )));
    }
    Ok(())
}

/// `(nir - red) / (nir + red)` per pixel.
///
/// A zero denominator or a missing input pixel gives NaN.
pub fn vegetation_index(red: BandView<'_>, nir: BandView<'_>) -> Result<Vec<f64>> {
    check_shape(red.values, nir.values)?;

    Ok(red
        .values
        .par_iter()
        .zip(nir.values.par_iter())
        .map(|(&r, &n)| {
            let denominator = n + r;
            if red.is_missing(r) || nir.is_missing(n) || denominator == 0.0 {
                f64::NAN
            } else {
                (n - r) / denominator
            }
        })
        .collect())
}

/// Summary of a band ignoring NaN pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Statistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Pixels that took part
    #[serde(skip)]
    pub valid: usize,
}

impl Statistics {
    /// All fields are NaN when no pixel is valid
    pub fn compute(values: &[f64]) -> Self {
        let mut valid: Vec<f64> = values.par_iter().copied().filter(|v| !v.is_nan()).collect();
        if valid.is_empty() {
            return Self {
                min: f64::NAN,
                max: f64::NAN,
                mean: f64::NAN,
                median: f64::NAN,
                valid: 0,
            };
        }

        valid.par_sort_unstable_by(f64::total_cmp);
        let n = valid.len();
        let median = if n % 2 == 1 {
            valid[n / 2]
        } else {
            (valid[n / 2 - 1] + valid[n / 2]) / 2.0
        };

        Self {
            min: valid[0],
            max: valid[n - 1],
            mean: (compensated_sum(&valid) / n as f64).clamp(valid[0], valid[n - 1]),
            median,
            valid: n,
        }
    }
}

/// Neumaier summation, so long runs of equal values keep their exact mean
fn compensated_sum(values: &[f64]) -> f64 {
    let (sum, correction) = values.iter().fold((0.0f64, 0.0f64), |(sum, c), &v| {
        let t = sum + v;
        let c = if sum.abs() >= v.abs() { c + ((sum - t) + v) } else { c + ((v - t) + sum) };
        (t, c)
    });
    sum + correction
}

/// Thresholded change between two aligned bands
#[derive(Debug, Clone)]
pub struct ChangeMask {
    /// 0 (unchanged) or 255 (changed) per pixel
    pub mask: Vec<f64>,
    pub changed_pixel_count: usize,
    /// Share of all pixels, rounded to two decimals
    pub changed_percentage: f64,
}

/// Per-band min-max normalisation, then `|a - b| > threshold`.
///
/// Missing pixels stay out of the normalisation range and are marked unchanged.
pub fn detect_change(a: BandView<'_>, b: BandView<'_>, threshold: f64, epsilon: f64) -> Result<ChangeMask> {
    check_shape(a.values, b.values)?;
    if !threshold.is_finite() {
        return Err(Error::ComputationFailure(format!("Threshold {} is not a number", threshold)));
    }

    let (a_min, a_max) = a.range();
    let (b_min, b_max) = b.range();
    let a_scale = a_max - a_min + epsilon;
    let b_scale = b_max - b_min + epsilon;

    let mask: Vec<f64> = a
        .values
        .par_iter()
        .zip(b.values.par_iter())
        .map(|(&va, &vb)| {
            if a.is_missing(va) || b.is_missing(vb) {
                return 0.0;
            }
            let diff = ((va - a_min) / a_scale - (vb - b_min) / b_scale).abs();
            if diff > threshold { CHANGED } else { 0.0 }
        })
        .collect();

    let changed_pixel_count = mask.par_iter().filter(|&&v| v == CHANGED).count();
    let changed_percentage = if mask.is_empty() {
        0.0
    } else {
        round2(100.0 * changed_pixel_count as f64 / mask.len() as f64)
    };

    Ok(ChangeMask {
        mask,
        changed_pixel_count,
        changed_percentage,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
