//! Colour ramps for preview rendering

use rayon::prelude::*;

/// Red-yellow-green diverging ramp (ColorBrewer RdYlGn, 11 classes)
const RD_YL_GN: [[u8; 3]; 11] = [
    [165, 0, 38],
    [215, 48, 39],
    [244, 109, 67],
    [253, 174, 97],
    [254, 224, 139],
    [255, 255, 191],
    [217, 239, 139],
    [166, 217, 106],
    [102, 189, 99],
    [26, 152, 80],
    [0, 104, 55],
];

const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// How a band of values becomes RGBA pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorRamp {
    /// Diverging red-yellow-green over [-1, 1], for normalized-difference indices
    RdYlGn,
    /// Black to white over [0, 255], for change masks
    Grayscale,
}

impl ColorRamp {
    /// Value range mapped onto the full ramp
    pub fn domain(&self) -> (f64, f64) {
        match self {
            ColorRamp::RdYlGn => (-1.0, 1.0),
            ColorRamp::Grayscale => (0.0, 255.0),
        }
    }

    /// RGBA for one value; NaN is fully transparent and values outside the domain clamp
    pub fn color(&self, value: f64) -> [u8; 4] {
        if value.is_nan() {
            return TRANSPARENT;
        }
        let (lo, hi) = self.domain();
        let t = ((value - lo) / (hi - lo)).clamp(0.0, 1.0);

        match self {
            ColorRamp::Grayscale => {
                let v = (t * 255.0).round() as u8;
                [v, v, v, 255]
            }
            ColorRamp::RdYlGn => {
                let scaled = t * (RD_YL_GN.len() - 1) as f64;
                let i = (scaled.floor() as usize).min(RD_YL_GN.len() - 2);
                let f = scaled - i as f64;
                let (a, b) = (RD_YL_GN[i], RD_YL_GN[i + 1]);
                let mix = |k: usize| (a[k] as f64 + (b[k] as f64 - a[k] as f64) * f).round() as u8;
                [mix(0), mix(1), mix(2), 255]
            }
        }
    }

    /// Renders row-major values into RGBA bytes
    pub fn render(&self, values: &[f64]) -> Vec<u8> {
        let mut pixels = vec![0u8; values.len() * 4];
        pixels
            .par_chunks_mut(4)
            .zip(values.par_iter())
            .for_each(|(pixel, &value)| pixel.copy_from_slice(&self.color(value)));
        pixels
    }
}
