use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use satproc::processor::{DEFAULT_NIR_BAND, DEFAULT_RED_BAND};
use satproc::{Config, Crs, GeoInfo, Processor, TiffReader};

#[derive(Parser, Debug)]
#[command(name = "satproc")]
#[command(about = "Satellite raster analysis on local GeoTIFF files")]
struct Args {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    config: Config,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "warn", env = "SATPROC_LOG_LEVEL")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print size, bands, CRS and georeferencing of a raster
    Metadata { path: PathBuf },
    /// Reproject a raster into another CRS
    Reproject {
        path: PathBuf,
        #[arg(long, default_value = "EPSG:4326")]
        target_crs: String,
    },
    /// Vegetation index from separate red and NIR rasters
    Ndvi { red: PathBuf, nir: PathBuf },
    /// Vegetation index from two bands of one raster
    NdviBands {
        path: PathBuf,
        #[arg(long, default_value_t = DEFAULT_RED_BAND)]
        red_band: usize,
        #[arg(long, default_value_t = DEFAULT_NIR_BAND)]
        nir_band: usize,
    },
    /// Change mask between two acquisitions
    Change {
        before: PathBuf,
        after: PathBuf,
        #[arg(long, default_value_t = 1)]
        band: usize,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Dump the TIFF structure and GeoTIFF tags of a file
    Inspect { path: PathBuf },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let processor = Processor::new(args.config);

    match args.command {
        Command::Metadata { path } => print_json(&processor.metadata(path)?),
        Command::Reproject { path, target_crs } => print_json(&processor.reproject(path, &Crs::new(target_crs))?),
        Command::Ndvi { red, nir } => print_json(&processor.vegetation_index(red, nir)?),
        Command::NdviBands { path, red_band, nir_band } => {
            print_json(&processor.vegetation_index_from_bands(path, red_band, nir_band)?)
        }
        Command::Change { before, after, band, threshold } => {
            print_json(&processor.detect_change(before, after, band, threshold)?)
        }
        Command::Inspect { path } => {
            let reader = TiffReader::open(&path)?;
            let tiff = reader.read()?;
            println!("{}", tiff);
            if let Some(ifd) = tiff.main_ifd() {
                println!("{}", GeoInfo::from_ifd(ifd));
            }
            Ok(())
        }
    }
}
