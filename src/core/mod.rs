//! Scene selection, index computation and yearly orchestration

pub mod geometry;
pub mod selection;
pub mod ndwi;
pub mod pipeline;

// Re-export main types
pub use geometry::GeometryProvider;
pub use selection::{SceneSelector, RankingKey, cloud_cover_key};
pub use ndwi::{IndexComputer, normalized_difference, normalized_difference_value};
pub use pipeline::{YearlyPipeline, PipelineSettings, PipelineStage, YearReport, YearStatus, RunSummary};
