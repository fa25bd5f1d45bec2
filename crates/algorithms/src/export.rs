//! Export jobs
//!
//! A job is a complete description of one product: a name, what to write,
//! at which scale and over which extent, the pixel budget, and where it
//! goes. Jobs run independently and each reports its own outcome; a failed
//! job never stops the others and is never retried here.

use crate::resample::{resample, target_grid, ResampleParams};
use crate::statistics::RegionTable;
use ecotypes_core::io::{write_geojson, write_geotiff};
use ecotypes_core::raster::Raster;
use ecotypes_core::{Error, Grid, Result};
use std::fmt;
use std::path::PathBuf;
use tracing::{error, info};

/// What a job writes
#[derive(Debug, Clone)]
pub enum ExportPayload {
    /// Single-band categorical raster, written as GeoTIFF
    Raster(Raster<i32>),
    /// Per-region table, written as a GeoJSON feature collection
    Table(RegionTable),
}

/// One export job
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// Product name, used as the job's identity
    pub description: String,
    pub payload: ExportPayload,
    /// Output cell size; `None` keeps the raster's own
    pub scale: Option<f64>,
    /// Export extent (min_x, min_y, max_x, max_y); `None` is the full raster
    pub bounds: Option<(f64, f64, f64, f64)>,
    pub max_pixels: u64,
    pub destination: PathBuf,
}

/// Outcome of a job
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Completed(PathBuf),
    Failed(String),
}

/// Job name plus outcome
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub description: String,
    pub status: JobStatus,
}

impl JobReport {
    pub fn is_ok(&self) -> bool {
        matches!(self.status, JobStatus::Completed(_))
    }
}

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            JobStatus::Completed(path) => write!(f, "{}: written to {}", self.description, path.display()),
            JobStatus::Failed(reason) => write!(f, "{}: FAILED ({})", self.description, reason),
        }
    }
}

impl ExportJob {
    /// Raster job at the raster's own grid
    pub fn raster(description: impl Into<String>, raster: Raster<i32>, max_pixels: u64, destination: PathBuf) -> Self {
        Self {
            description: description.into(),
            payload: ExportPayload::Raster(raster),
            scale: None,
            bounds: None,
            max_pixels,
            destination,
        }
    }

    /// Table job
    pub fn table(description: impl Into<String>, table: RegionTable, destination: PathBuf) -> Self {
        Self {
            description: description.into(),
            payload: ExportPayload::Table(table),
            scale: None,
            bounds: None,
            max_pixels: u64::MAX,
            destination,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_bounds(mut self, bounds: (f64, f64, f64, f64)) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Grid the raster payload is written on
    pub fn output_grid(&self, raster: &Raster<i32>) -> Result<Grid> {
        let scale = self.scale.unwrap_or_else(|| raster.cell_size());
        match self.bounds {
            Some(bounds) => {
                if scale.is_nan() || scale <= 0.0 {
                    return Err(Error::InvalidParameter {
                        name: "scale",
                        value: scale.to_string(),
                        reason: "must be positive".into(),
                    });
                }
                Ok(Grid::covering(bounds, scale, raster.crs().cloned()))
            }
            None if self.scale.is_none() => Ok(raster.grid()),
            None => target_grid(raster, None, scale),
        }
    }

    /// Write the product. Nothing is written when the job fails.
    pub fn execute(&self) -> Result<PathBuf> {
        match &self.payload {
            ExportPayload::Raster(raster) => {
                let grid = self.output_grid(raster)?;
                let pixels = grid.rows as u64 * grid.cols as u64;
                if pixels > self.max_pixels {
                    return Err(Error::PixelBudgetExceeded {
                        description: self.description.clone(),
                        pixels,
                        max_pixels: self.max_pixels,
                    });
                }

                let output = if grid.is_aligned_with(&raster.grid()) {
                    None
                } else {
                    Some(resample(raster, &grid, ResampleParams::default())?)
                };
                write_geotiff(output.as_ref().unwrap_or(raster), &self.destination)?;
            }
            ExportPayload::Table(table) => {
                write_geojson(&table.to_feature_collection(), &self.destination)?;
            }
        }
        Ok(self.destination.clone())
    }

    /// Run the job and turn its outcome into a report
    pub fn run(&self) -> JobReport {
        let status = match self.execute() {
            Ok(path) => {
                info!("Export '{}' completed: {}", self.description, path.display());
                JobStatus::Completed(path)
            }
            Err(e) => {
                error!("Export '{}' failed: {}", self.description, e);
                JobStatus::Failed(e.to_string())
            }
        };
        JobReport {
            description: self.description.clone(),
            status,
        }
    }
}

/// Run every job; one report per job, in order
pub fn run_all(jobs: &[ExportJob]) -> Vec<JobReport> {
    jobs.iter().map(ExportJob::run).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecotypes_core::io::{read_geojson, read_geotiff};
    use ecotypes_core::{GeoTransform, CRS};

    fn classified() -> Raster<i32> {
        let mut values = Vec::new();
        for row in 0..10 {
            for col in 0..10 {
                values.push(if row < 5 && col < 5 { 101 } else { 201 });
            }
        }
        let mut r = Raster::from_vec(values, 10, 10).unwrap();
        r.set_transform(GeoTransform::new(0.0, 50.0, 5.0, -5.0));
        r.set_crs(Some(CRS::from_epsg(25833)));
        r.set_nodata(Some(i32::MIN));
        r
    }

    #[test]
    fn test_native_job_writes_raster() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ecoTypes_5m.tif");
        let report = ExportJob::raster("ecoTypes_5m", classified(), 1_000, path.clone()).run();

        assert!(report.is_ok(), "{}", report);
        let back: Raster<i32> = read_geotiff(&path, None).unwrap();
        assert_eq!(back.shape(), (10, 10));
        assert_eq!(back.valid(0, 0), Some(101));
    }

    #[test]
    fn test_coarser_job_resamples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ecoTypes_25m.tif");
        let job = ExportJob::raster("ecoTypes_25m", classified(), 1_000, path.clone()).with_scale(25.0);
        job.execute().unwrap();

        let back: Raster<i32> = read_geotiff(&path, None).unwrap();
        assert_eq!(back.shape(), (2, 2));
        assert_eq!(back.valid(0, 0), Some(101));
        assert_eq!(back.valid(1, 1), Some(201));
    }

    #[test]
    fn test_budget_exceeded_fails_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("too_big.tif");
        let job = ExportJob::raster("too_big", classified(), 99, path.clone());

        assert!(matches!(
            job.execute(),
            Err(Error::PixelBudgetExceeded { pixels: 100, max_pixels: 99, .. })
        ));
        let report = job.run();
        assert!(!report.is_ok());
        assert!(!path.exists());
    }

    #[test]
    fn test_failures_are_per_job() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = vec![
            ExportJob::raster("bad", classified(), 1, dir.path().join("bad.tif")),
            ExportJob::raster("good", classified(), 1_000, dir.path().join("good.tif")),
        ];
        let reports = run_all(&jobs);
        assert!(!reports[0].is_ok());
        assert!(reports[1].is_ok());
    }

    #[test]
    fn test_bounds_select_extent() {
        let job = ExportJob::raster("part", classified(), 1_000, PathBuf::from("unused.tif"))
            .with_scale(5.0)
            .with_bounds((0.0, 25.0, 25.0, 50.0));
        let grid = job.output_grid(&classified()).unwrap();
        assert_eq!(grid.shape(), (5, 5));
    }

    #[test]
    fn test_table_job_writes_geojson() {
        use crate::statistics::{RegionRow, RegionTable};
        use ecotypes_core::{AttributeValue, Feature, FeatureCollection};
        use geo::{point, Geometry};

        let table = RegionTable {
            band_names: vec!["101".into(), "201".into()],
            rows: vec![RegionRow {
                region: Feature::new(Geometry::Point(point!(x: 1.0, y: 2.0))).with_property("navn", "Oslo"),
                areas: vec![1.5, 0.0],
            }],
            crs: None,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("EcoType_municipal.geojson");
        ExportJob::table("EcoType_municipal", table, path.clone()).execute().unwrap();

        let back: FeatureCollection = read_geojson(&path).unwrap();
        assert_eq!(back.len(), 1);
        let f = &back.features[0];
        assert!(f.property_equals("navn", "Oslo"));
        assert_eq!(f.get_property("101"), Some(&AttributeValue::Float(1.5)));
    }
}
