//! # Ecotypes Algorithms
//!
//! Pipeline stages for rule-based ecosystem-type mapping.
//!
//! ## Modules
//!
//! - **masks**: Coastal, forest-line and arctic masks
//! - **composite**: Tile mosaics and the validity mask
//! - **rules**: Ordered override rule tables and the two land-cover tables
//! - **fusion**: Primary/fallback fusion, sliver removal, smoothing
//! - **resample**: Mode-reducing resampling and reprojection
//! - **statistics**: Dense recode, presence bands, per-region areas
//! - **export**: Export jobs with a pixel budget
//! - **pipeline**: The stages chained into one run
//! - **vector**: Polygon rasterization

pub mod composite;
pub mod config;
pub mod export;
pub mod fusion;
pub mod masks;
pub(crate) mod maybe_rayon;
pub mod pipeline;
pub mod resample;
pub mod rules;
pub mod statistics;
pub mod vector;

