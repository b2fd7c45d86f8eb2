//! Raster geometry and in-memory grids

pub mod crs;
pub mod grid;
pub mod transform;

pub use crs::Crs;
pub use grid::{RasterGrid, RasterProfile};
pub use transform::{Bounds, GeoTransform};
