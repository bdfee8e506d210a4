use anyhow::{bail, Context, Result};
use clap::Parser;
use shoal::core::pipeline::YearlyPipeline;
use shoal::io::catalog::{ODataCatalog, DEFAULT_CLOUD_COVER_CEILING};
use shoal::io::LocalArchive;
use shoal::{Config, Mission, RunSummary, ShoalResult};
use std::ops::RangeInclusive;
use std::path::PathBuf;

/// Find the least cloudy scene per year and derive its NDWI raster
#[derive(Parser, Debug)]
#[command(name = "shoal", version, about)]
struct Args {
    /// First year to process
    #[arg(long, default_value_t = 2018)]
    start_year: i32,

    /// Last year to process (inclusive)
    #[arg(long, default_value_t = 2020)]
    end_year: i32,

    /// Maximum cloud cover percentage accepted by the catalog query
    #[arg(long, default_value_t = DEFAULT_CLOUD_COVER_CEILING)]
    cloud_cover: f64,

    /// Imagery family: s2-l1c, s2-l2a or landsat8
    #[arg(long, default_value = "s2-l1c")]
    mission: String,

    /// Abort the run when a selected scene's archive is not present locally
    #[arg(long)]
    strict: bool,

    /// Process years concurrently
    #[arg(long)]
    parallel: bool,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[cfg(feature = "parallel")]
fn run(pipeline: &YearlyPipeline, years: RangeInclusive<i32>, parallel: bool) -> ShoalResult<RunSummary> {
    if parallel {
        pipeline.run_parallel(years)
    } else {
        pipeline.run(years)
    }
}

#[cfg(not(feature = "parallel"))]
fn run(pipeline: &YearlyPipeline, years: RangeInclusive<i32>, parallel: bool) -> ShoalResult<RunSummary> {
    if parallel {
        log::warn!("Built without the parallel feature, processing years sequentially");
    }
    pipeline.run(years)
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level.as_str()))
        .init();

    if args.end_year < args.start_year {
        bail!("end year {} is before start year {}", args.end_year, args.start_year);
    }
    let mission: Mission = args.mission.parse()?;

    let config = Config::from_env().context("invalid environment configuration")?;
    log::info!("Working directory: {}", config.home.display());

    let catalog = ODataCatalog::new(config.catalog_url.clone(), config.http_timeout)?;
    let acquirer = LocalArchive::new(mission);
    let settings = config.pipeline_settings(mission, args.cloud_cover, args.strict);
    let pipeline = YearlyPipeline::new(settings, &catalog, &acquirer)?;

    let summary = run(&pipeline, args.start_year..=args.end_year, args.parallel)
        .context("run aborted")?;

    if let Some(path) = &args.summary {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, json).with_context(|| format!("writing summary to {}", path.display()))?;
        log::info!("Run summary written to {}", path.display());
    }

    if summary.failed() > 0 {
        bail!("{} year(s) failed", summary.failed());
    }
    Ok(())
}
