//! Polygon rasterization
//!
//! A cell is covered by a feature when its centre lies inside the feature's
//! polygon(s), or, with a buffer distance, when its centre is within that
//! distance of them. Polygons in another CRS than the grid are transformed
//! first, so buffer distances are always in grid units.

use crate::maybe_rayon::*;
use ecotypes_core::crs::CoordTransform;
use ecotypes_core::vector::{AttributeValue, Feature, FeatureCollection};
use ecotypes_core::{Error, Grid, Raster, Result};
use geo::{BoundingRect, Coord, Distance, Euclidean, Geometry, MapCoords, MultiPolygon, Point, Rect};
use tracing::debug;

/// Parameters for rasterization
#[derive(Debug, Clone, Default)]
pub struct RasterizeParams {
    /// Numeric attribute burned into covered cells; `None` burns 1
    pub value_field: Option<String>,
    /// Extra distance around each polygon that also counts as covered
    pub buffer: f64,
}

/// A polygon feature prepared for scanning: grid coordinates plus the pixel
/// window it can touch.
struct Shape {
    index: usize,
    value: f64,
    polygons: MultiPolygon<f64>,
    rows: (usize, usize),
    cols: (usize, usize),
}

impl Shape {
    fn in_window(&self, row: usize, col: usize) -> bool {
        self.rows.0 <= row && row < self.rows.1 && self.cols.0 <= col && col < self.cols.1
    }

    /// Distance is zero inside the polygons, so this also covers `buffer == 0`
    fn covers(&self, x: f64, y: f64, buffer: f64) -> bool {
        Euclidean::distance(&Point::new(x, y), &self.polygons) <= buffer
    }
}

/// Rasterize features onto `grid`.
///
/// Each covered cell holds the mean value of the features covering it; cells
/// no feature covers are NaN.
pub fn rasterize(features: &FeatureCollection, grid: &Grid, params: &RasterizeParams) -> Result<Raster<f64>> {
    let shapes = prepare(features, grid, params)?;

    let data = scan(grid, &shapes, params.buffer, |hits| {
        let (sum, n) = hits.fold((0.0, 0usize), |(s, n), shape| (s + shape.value, n + 1));
        if n == 0 { f64::NAN } else { sum / n as f64 }
    });

    into_raster(grid, data, Some(f64::NAN))
}

/// Rasterize features onto `grid` as a 0/1 mask
pub fn rasterize_mask(features: &FeatureCollection, grid: &Grid, buffer: f64) -> Result<Raster<u8>> {
    let params = RasterizeParams { value_field: None, buffer };
    let shapes = prepare(features, grid, &params)?;

    let data = scan(grid, &shapes, buffer, |hits| u8::from(hits.next().is_some()));

    into_raster(grid, data, None)
}

/// Rasterize features onto `grid`, burning each feature's position in the
/// collection. Where features overlap the later one wins; uncovered cells
/// are no-data (`i32::MIN`).
pub fn rasterize_index(features: &FeatureCollection, grid: &Grid) -> Result<Raster<i32>> {
    let shapes = prepare(features, grid, &RasterizeParams::default())?;

    let data = scan(grid, &shapes, 0.0, |hits| {
        hits.last().map(|shape| shape.index as i32).unwrap_or(i32::MIN)
    });

    into_raster(grid, data, Some(i32::MIN))
}

fn into_raster<T: ecotypes_core::RasterElement>(grid: &Grid, data: Vec<T>, nodata: Option<T>) -> Result<Raster<T>> {
    let mut raster = Raster::from_vec(data, grid.rows, grid.cols)?;
    raster.set_transform(grid.transform);
    raster.set_crs(grid.crs.clone());
    raster.set_nodata(nodata);
    Ok(raster)
}

/// Visit every cell, handing `reduce` the shapes covering its centre in
/// collection order.
fn scan<V, F>(grid: &Grid, shapes: &[Shape], buffer: f64, reduce: F) -> Vec<V>
where
    V: Send,
    F: Fn(&mut dyn Iterator<Item = &Shape>) -> V + Sync,
{
    let (rows, cols) = grid.shape();

    (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let active: Vec<&Shape> = shapes
                .iter()
                .filter(|s| s.rows.0 <= row && row < s.rows.1)
                .collect();

            (0..cols)
                .map(|col| {
                    let (x, y) = grid.transform.pixel_to_geo(col, row);
                    let mut hits = active
                        .iter()
                        .copied()
                        .filter(|s| s.in_window(row, col) && s.covers(x, y, buffer));
                    reduce(&mut hits)
                })
                .collect::<Vec<V>>()
        })
        .collect()
}

fn prepare(features: &FeatureCollection, grid: &Grid, params: &RasterizeParams) -> Result<Vec<Shape>> {
    let transform = CoordTransform::new(features.crs.as_ref(), grid.crs.as_ref())?;
    let mut shapes = Vec::with_capacity(features.len());
    let mut skipped = 0usize;

    for (index, feature) in features.iter().enumerate() {
        let polygons = match &feature.geometry {
            Some(geometry) => polygons_of(geometry),
            None => MultiPolygon::new(vec![]),
        };
        if polygons.0.is_empty() {
            skipped += 1;
            continue;
        }

        let polygons = if transform.is_identity() {
            polygons
        } else {
            polygons.map_coords(move |c| {
                let (x, y) = transform.apply(c.x, c.y);
                Coord { x, y }
            })
        };

        let value = match &params.value_field {
            Some(field) => feature_value(feature, field)?,
            None => 1.0,
        };

        let Some(rect) = polygons.bounding_rect() else {
            continue;
        };
        if let Some((rows, cols)) = pixel_window(grid, rect, params.buffer) {
            shapes.push(Shape { index, value, polygons, rows, cols });
        }
    }

    if skipped > 0 {
        debug!("Skipped {} features without polygon geometry", skipped);
    }
    debug!("Rasterizing {} of {} features onto {}x{} grid", shapes.len(), features.len(), grid.rows, grid.cols);

    Ok(shapes)
}

fn polygons_of(geometry: &Geometry<f64>) -> MultiPolygon<f64> {
    match geometry {
        Geometry::Polygon(p) => MultiPolygon::new(vec![p.clone()]),
        Geometry::MultiPolygon(mp) => mp.clone(),
        Geometry::Rect(r) => MultiPolygon::new(vec![r.to_polygon()]),
        Geometry::GeometryCollection(gc) => {
            MultiPolygon::new(gc.iter().flat_map(|g| polygons_of(g).0).collect())
        }
        _ => MultiPolygon::new(vec![]),
    }
}

fn feature_value(feature: &Feature, field: &str) -> Result<f64> {
    match feature.get_property(field) {
        Some(AttributeValue::Int(i)) => Ok(*i as f64),
        Some(AttributeValue::Float(f)) => Ok(*f),
        _ => Err(Error::MissingAttribute(field.to_string())),
    }
}

/// Pixel rows and cols (start inclusive, end exclusive) the rectangle plus
/// buffer can reach, clipped to the grid
fn pixel_window(grid: &Grid, rect: Rect<f64>, buffer: f64) -> Option<((usize, usize), (usize, usize))> {
    let (min, max) = (rect.min(), rect.max());
    let (c0, r0) = grid.transform.geo_to_pixel(min.x - buffer, max.y + buffer);
    let (c1, r1) = grid.transform.geo_to_pixel(max.x + buffer, min.y - buffer);

    let span = |a: f64, b: f64, len: usize| -> Option<(usize, usize)> {
        if a.is_nan() || b.is_nan() {
            return None;
        }
        let start = a.min(b).floor().max(0.0) as usize;
        let end = (a.max(b).ceil().max(0.0) as usize).min(len);
        (start < end).then_some((start, end))
    };

    Some((span(r0, r1, grid.rows)?, span(c0, c1, grid.cols)?))
}
