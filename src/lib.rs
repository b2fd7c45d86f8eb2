//! satproc - Satellite raster analysis without GDAL
//!
//! satproc reads GeoTIFF scenes with a pure-Rust decoder and runs four
//! pipelines over them: metadata extraction, CRS reprojection, a
//! normalized-difference vegetation index and two-date change detection.
//! Results are written as float32 GeoTIFFs with PNG previews.
//!
//! # Examples
//!
//! ## Metadata
//!
//! ```no_run
//! use satproc::{Config, Processor};
//!
//! let processor = Processor::new(Config::default());
//! let metadata = processor.metadata("scene.tif")?;
//! println!("{} x {} in {}", metadata.width, metadata.height, metadata.crs);
//! # Ok::<(), satproc::Error>(())
//! ```
//!
//! ## Change detection
//!
//! ```no_run
//! use satproc::{Config, Processor};
//!
//! let processor = Processor::new(Config::default());
//! let change = processor.detect_change("2020.tif", "2024.tif", 1, Some(0.2))?;
//! println!("{}% changed", change.changed_area_percentage);
//! # Ok::<(), satproc::Error>(())
//! ```

pub mod io;
pub mod error;
pub mod types;
pub mod formats;
pub mod compression;
pub mod raster;
pub mod projection;
pub mod metadata;
pub mod reproject;
pub mod align;
pub mod algebra;
pub mod output;
pub mod temp;
pub mod config;
pub mod processor;
pub mod api;

pub use error::{Error, Result};
pub use types::{DataType, Dimensions};
pub use formats::tiff::{
    GeoInfo, GeoTiffWriter, Tiff, TiffReader, IFD, IFDEntry,
    tags, TIFF_MAGIC, BIGTIFF_MAGIC
};
pub use io::ByteOrder;
pub use projection::{Coordinate, Transformer};
pub use raster::{Bounds, Crs, GeoTransform, RasterGrid, RasterProfile};
pub use metadata::Metadata;
pub use config::Config;
pub use processor::Processor;
pub use temp::ScopedTempFile;
