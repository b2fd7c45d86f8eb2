//! CRS reprojection with nearest-neighbour resampling

use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::projection::{Coordinate, Transformer};
use crate::raster::{Bounds, Crs, GeoTransform, RasterGrid, RasterProfile};

/// Destination rows handled by one parallel task (one PROJ context each)
const ROWS_PER_TASK: usize = 16;

/// Points sampled along each edge of the source footprint
const EDGE_SAMPLES: usize = 21;

/// Geometry of a destination grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DestinationGrid {
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
}

fn source_crs(profile: &RasterProfile) -> Result<&Crs> {
    profile
        .crs
        .as_ref()
        .ok_or_else(|| Error::ReprojectionFailure("Source raster has no CRS".to_string()))
}

/// Pixel positions along the four edges of a `width x height` grid, corners included
fn edge_points(width: usize, height: usize) -> Vec<(f64, f64)> {
    let (w, h) = (width as f64, height as f64);
    let steps = EDGE_SAMPLES - 1;
    (0..=steps)
        .flat_map(|i| {
            let t = i as f64 / steps as f64;
            [(t * w, 0.0), (t * w, h), (0.0, t * h), (w, t * h)]
        })
        .collect()
}

/// North-up grid covering the source footprint in `target`.
///
/// Points along the edges of the source grid are projected and their
/// envelope is covered with square pixels whose diagonal count matches the
/// source. Points the target cannot represent, such as the poles in Web
/// Mercator, are left out.
pub fn calculate_default_transform(profile: &RasterProfile, target: &Crs) -> Result<DestinationGrid> {
    let transformer = Transformer::new(source_crs(profile)?, target)?;

    let samples = edge_points(profile.width, profile.height);
    let projected: Vec<(f64, f64)> = samples
        .iter()
        .map(|&(col, row)| profile.transform.apply(col, row))
        .filter_map(|(x, y)| transformer.try_transform(Coordinate::new(x, y)))
        .map(|c| (c.x, c.y))
        .collect();
    if projected.len() < samples.len() {
        debug!(dropped = samples.len() - projected.len(), "edge points outside the target CRS");
    }

    let envelope = Bounds::enclosing(&projected)
        .ok_or_else(|| Error::ReprojectionFailure(format!("Source footprint is undefined in {}", target)))?;

    let diagonal = envelope.width().hypot(envelope.height());
    if diagonal <= 0.0 {
        return Err(Error::ReprojectionFailure(format!("Source footprint collapses in {}", target)));
    }
    let resolution = diagonal / (profile.width as f64).hypot(profile.height as f64);

    let width = ((envelope.width() / resolution).round() as usize).max(1);
    let height = ((envelope.height() / resolution).round() as usize).max(1);

    Ok(DestinationGrid {
        transform: GeoTransform::from_origin(envelope.left, envelope.top, resolution, resolution),
        width,
        height,
    })
}

/// Reprojects every band of `grid` into `target`
pub fn reproject(grid: &RasterGrid, target: &Crs) -> Result<RasterGrid> {
    let profile = &grid.profile;
    let source = source_crs(profile)?;
    info!(from = %source, to = %target, width = profile.width, height = profile.height, "reprojecting");

    let destination = calculate_default_transform(profile, target)?;
    let lookup = nearest_lookup(profile, source, target, &destination)?;

    let fill = profile.nodata.unwrap_or(0.0);
    let bands = grid
        .bands
        .par_iter()
        .map(|band| {
            lookup
                .iter()
                .map(|cell| cell.map_or(fill, |index| band[index]))
                .collect::<Vec<_>>()
        })
        .collect();

    let out = RasterProfile {
        width: destination.width,
        height: destination.height,
        crs: Some(target.clone()),
        transform: destination.transform,
        ..profile.clone()
    };
    debug!(
        width = out.width,
        height = out.height,
        transform = ?out.transform.to_array(),
        "reprojected grid"
    );

    RasterGrid::new(out, bands)
}

/// Source pixel index of every destination pixel, `None` outside the source footprint
fn nearest_lookup(
    profile: &RasterProfile,
    source: &Crs,
    target: &Crs,
    destination: &DestinationGrid,
) -> Result<Vec<Option<usize>>> {
    let source_inverse = profile
        .transform
        .inverse()
        .map_err(|e| Error::ReprojectionFailure(e.to_string()))?;
    let (src_w, src_h) = (profile.width as f64, profile.height as f64);
    let width = destination.width;

    let mut lookup = vec![None; destination.width * destination.height];
    lookup
        .par_chunks_mut(width * ROWS_PER_TASK)
        .enumerate()
        .try_for_each(|(task, cells)| -> Result<()> {
            // PROJ handles are not shareable between threads
            let back = Transformer::new(target, source)?;
            let first_row = task * ROWS_PER_TASK;

            for (i, cell) in cells.iter_mut().enumerate() {
                let (row, col) = (first_row + i / width, i % width);
                let (x, y) = destination.transform.apply(col as f64 + 0.5, row as f64 + 0.5);

                *cell = back.try_transform(Coordinate::new(x, y)).and_then(|src| {
                    let (c, r) = source_inverse.apply(src.x, src.y);
                    (c >= 0.0 && r >= 0.0 && c < src_w && r < src_h)
                        .then(|| r as usize * profile.width + c as usize)
                });
            }
            Ok(())
        })?;

    Ok(lookup)
}
