//! shoal: yearly Sentinel-2 scene search and NDWI extraction
//!
//! Finds the least cloudy scene per year over a coastal region of interest,
//! locates its green and near-infrared bands in the acquired archive and
//! writes a float32 NDWI GeoTIFF for shoreline change analysis.

pub mod types;
pub mod config;
pub mod io;
pub mod core;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    RegionOfInterest, TimeWindow, SceneRecord, SceneCollection, BandPath, Band, Mission,
    RasterProfile, IndexRaster, ShoalError, ShoalResult
};

pub use config::Config;
pub use io::{ODataCatalog, LocalArchive, ArchiveLocator, RasterIo};
pub use crate::core::{GeometryProvider, SceneSelector, IndexComputer, YearlyPipeline, RunSummary};
