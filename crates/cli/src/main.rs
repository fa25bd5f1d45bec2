//! Ecotypes CLI - ecosystem-type mapping from land-cover rasters

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use ecotypes_algorithms::config::{group_name, PipelineParams, NATIVE_EXPORT, TABLE_EXPORT};
use ecotypes_algorithms::export::{run_all, ExportJob, JobReport};
use ecotypes_algorithms::pipeline::{export_jobs, statistics, unify, EcotypePipeline, PipelineInputs};
use ecotypes_algorithms::rules::{taxonomy_a, taxonomy_b};
use ecotypes_algorithms::statistics::RegionTable;
use ecotypes_core::io::{read_geojson, read_geotiff};
use ecotypes_core::{Algorithm, FeatureCollection, Raster};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "ecotypes")]
#[command(author, version, about = "Rule-based ecosystem-type mapping", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a classified raster
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Print both rule tables in evaluation order
    Rules,
    /// Classify land cover and write the fused, cleaned 5 m raster
    Classify {
        #[command(flatten)]
        sources: SourceArgs,
        /// Output GeoTIFF
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Sum ecosystem-type areas of a classified raster per region
    Stats {
        /// Classified raster (output of `classify`)
        input: PathBuf,
        /// Region polygons (GeoJSON)
        #[arg(short, long)]
        regions: PathBuf,
        /// Output GeoJSON table
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Full run: all raster products and the region table
    Run {
        #[command(flatten)]
        sources: SourceArgs,
        /// Region polygons (GeoJSON)
        #[arg(short, long)]
        regions: PathBuf,
        /// Output directory
        #[arg(short, long)]
        output_dir: PathBuf,
        /// EPSG code of the 25 m and 50 m products (default: zone-line CRS)
        #[arg(long)]
        output_epsg: Option<u32>,
    },
}

/// Inputs shared by `classify` and `run`
#[derive(Args)]
struct SourceArgs {
    /// Taxonomy-A tiles (GeoTIFF), repeatable
    #[arg(long = "taxonomy-a", required = true, num_args = 1..)]
    taxonomy_a: Vec<PathBuf>,
    /// Taxonomy-B tiles (GeoTIFF), repeatable
    #[arg(long = "taxonomy-b", required = true, num_args = 1..)]
    taxonomy_b: Vec<PathBuf>,
    /// Vegetation-zone-line raster (GeoTIFF)
    #[arg(long)]
    zone_line: PathBuf,
    /// Vegetation-zone polygons (GeoJSON)
    #[arg(long)]
    vegetation_zones: PathBuf,
    /// Arctic-zone polygons (GeoJSON)
    #[arg(long)]
    arctic: PathBuf,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set default subscriber")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_codes(path: &Path) -> Result<Raster<i32>> {
    let pb = spinner(&format!("Reading {}...", path.display()));
    let raster: Raster<i32> =
        read_geotiff(path, None).with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("{}: {} x {}", path.display(), raster.cols(), raster.rows());
    Ok(raster)
}

fn read_tiles(paths: &[PathBuf]) -> Result<Vec<Raster<i32>>> {
    paths.iter().map(|p| read_codes(p)).collect()
}

fn read_layer(path: &Path) -> Result<FeatureCollection> {
    let pb = spinner(&format!("Reading {}...", path.display()));
    let layer = read_geojson(path).with_context(|| format!("Failed to read vector layer {}", path.display()))?;
    pb.finish_and_clear();
    info!("{}: {} features", path.display(), layer.len());
    Ok(layer)
}

fn read_inputs(sources: &SourceArgs, regions: Option<&Path>) -> Result<PipelineInputs> {
    Ok(PipelineInputs {
        taxonomy_a: read_tiles(&sources.taxonomy_a)?,
        taxonomy_b: read_tiles(&sources.taxonomy_b)?,
        zone_line: read_codes(&sources.zone_line)?,
        vegetation_zones: read_layer(&sources.vegetation_zones)?,
        arctic: read_layer(&sources.arctic)?,
        regions: match regions {
            Some(path) => read_layer(path)?,
            None => FeatureCollection::new(),
        },
    })
}

fn run_jobs(jobs: &[ExportJob]) -> Vec<JobReport> {
    let pb = spinner("Writing products...");
    let reports = run_all(jobs);
    pb.finish_and_clear();
    for report in &reports {
        println!("{}", report);
    }
    reports
}

fn ensure_all_ok(reports: &[JobReport]) -> Result<()> {
    let failed = reports.iter().filter(|r| !r.is_ok()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} export jobs failed", failed, reports.len());
    }
    Ok(())
}

fn print_table(table: &RegionTable) {
    for row in &table.rows {
        let name = row.name().unwrap_or("<unnamed>");
        println!("{:<32} {:>14.2} ha", name, row.total());
    }
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Info { input } => {
            let raster = read_codes(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.3}, {:.3}) - ({:.3}, {:.3})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = raster.crs() {
                println!("CRS: {}", crs);
            }
            println!(
                "Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
            );

            let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
            for row in 0..rows {
                for col in 0..cols {
                    if let Some(code) = raster.valid(row, col) {
                        *counts.entry(code).or_default() += 1;
                    }
                }
            }
            println!("\nCodes:");
            for (code, count) in counts {
                println!("  {:>5}  {:<16} {}", code, group_name(code), count);
            }
        }

        Commands::Rules => {
            println!("{}\n", taxonomy_a());
            println!("{}", taxonomy_b());
        }

        Commands::Classify { sources, output } => {
            let inputs = read_inputs(&sources, None)?;
            let start = Instant::now();
            let unified = unify(&inputs, &PipelineParams::default()).context("Classification failed")?;
            let elapsed = start.elapsed();

            let params = PipelineParams::default();
            let job = ExportJob::raster(NATIVE_EXPORT, unified, params.products.max_pixels, output.clone());
            ensure_all_ok(&run_jobs(std::slice::from_ref(&job)))?;
            done("Ecosystem types", &output, elapsed);
        }

        Commands::Stats { input, regions, output } => {
            let unified = read_codes(&input)?;
            let regions = read_layer(&regions)?;
            let params = PipelineParams::default();

            let start = Instant::now();
            let table = statistics(&unified, &regions, &params.stats).context("Statistics failed")?;
            let elapsed = start.elapsed();

            print_table(&table);
            let job = ExportJob::table(TABLE_EXPORT, table, output.clone());
            ensure_all_ok(&run_jobs(std::slice::from_ref(&job)))?;
            done("Region table", &output, elapsed);
        }

        Commands::Run {
            sources,
            regions,
            output_dir,
            output_epsg,
        } => {
            std::fs::create_dir_all(&output_dir)
                .with_context(|| format!("Failed to create {}", output_dir.display()))?;
            let inputs = read_inputs(&sources, Some(regions.as_path()))?;
            let params = PipelineParams {
                output_epsg,
                ..Default::default()
            };
            if output_epsg.is_none() && inputs.zone_line.crs().is_none() {
                warn!("Zone-line raster has no CRS; coarse products stay in the reference CRS");
            }

            let start = Instant::now();
            let outputs = EcotypePipeline
                .execute(inputs, params.clone())
                .context("Pipeline failed")?;
            let elapsed = start.elapsed();

            print_table(&outputs.table);
            let reports = run_jobs(&export_jobs(&outputs, &output_dir, &params.products));
            ensure_all_ok(&reports)?;
            done("Products", &output_dir, elapsed);
        }
    }

    Ok(())
}
