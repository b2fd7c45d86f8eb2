//! I/O utilities for satproc
//!
//! Provides the byte-level primitives the raster codecs are built on.

pub mod byte_order;

pub use byte_order::ByteOrder;
