//! Affine pixel-to-world transform

use serde::Serialize;

use crate::error::{Error, Result};

/// Axis-aligned envelope in world coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    /// Smallest envelope holding every point
    pub fn enclosing(points: &[(f64, f64)]) -> Option<Self> {
        let (&(x0, y0), rest) = points.split_first()?;
        let mut bounds = Bounds { left: x0, bottom: y0, right: x0, top: y0 };
        for &(x, y) in rest {
            bounds.left = bounds.left.min(x);
            bounds.right = bounds.right.max(x);
            bounds.bottom = bounds.bottom.min(y);
            bounds.top = bounds.top.max(y);
        }
        Some(bounds)
    }
}

/// Six-coefficient affine transform in `a b c d e f` order:
/// `x = a*col + b*row + c`, `y = d*col + e*row + f`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    pub const IDENTITY: GeoTransform = GeoTransform { a: 1.0, b: 0.0, c: 0.0, d: 0.0, e: 1.0, f: 0.0 };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// North-up transform from an upper-left corner and pixel sizes
    pub fn from_origin(left: f64, top: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self::new(pixel_width, 0.0, left, 0.0, -pixel_height, top)
    }

    pub fn from_array(v: [f64; 6]) -> Self {
        Self::new(v[0], v[1], v[2], v[3], v[4], v[5])
    }

    pub fn to_array(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }

    /// Maps fractional pixel coordinates (col, row) to world coordinates
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// World-to-pixel transform
    pub fn inverse(&self) -> Result<GeoTransform> {
        let det = self.determinant();
        if det.abs() < 1e-12 || !det.is_finite() {
            return Err(Error::ComputationFailure(format!(
                "Transform {:?} is not invertible",
                self.to_array()
            )));
        }

        let a = self.e / det;
        let b = -self.b / det;
        let d = -self.d / det;
        let e = self.a / det;
        Ok(GeoTransform::new(
            a,
            b,
            -(a * self.c + b * self.f),
            d,
            e,
            -(d * self.c + e * self.f),
        ))
    }

    /// The four outer corners of a `width x height` grid, clockwise from upper-left
    pub fn corners(&self, width: usize, height: usize) -> [(f64, f64); 4] {
        let (w, h) = (width as f64, height as f64);
        [self.apply(0.0, 0.0), self.apply(w, 0.0), self.apply(w, h), self.apply(0.0, h)]
    }

    /// Envelope of a `width x height` grid
    pub fn bounds(&self, width: usize, height: usize) -> Bounds {
        let corners = self.corners(width, height);
        let (x, y) = corners[0];
        corners[1..].iter().fold(
            Bounds { left: x, bottom: y, right: x, top: y },
            |b, &(x, y)| Bounds {
                left: b.left.min(x),
                bottom: b.bottom.min(y),
                right: b.right.max(x),
                top: b.top.max(y),
            },
        )
    }

    /// Every coefficient within `tolerance`
    pub fn approx_eq(&self, other: &GeoTransform, tolerance: f64) -> bool {
        self.to_array()
            .iter()
            .zip(other.to_array().iter())
            .all(|(x, y)| (x - y).abs() <= tolerance)
    }

    /// Only scale and translation terms
    pub fn is_north_up(&self) -> bool {
        self.b == 0.0 && self.d == 0.0
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
