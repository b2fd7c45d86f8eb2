//! Coordinate transformation between reference systems

pub mod coordinate;
pub mod transformer;

pub use coordinate::Coordinate;
pub use transformer::Transformer;
