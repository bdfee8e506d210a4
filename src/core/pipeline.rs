use crate::core::ndwi::IndexComputer;
use crate::core::selection::SceneSelector;
use crate::io::acquisition::ArchiveAcquirer;
use crate::io::archive::{ArchiveLocator, BandPatterns};
use crate::io::catalog::{Catalog, CatalogQueryBuilder};
use crate::io::manifest::ManifestReader;
use crate::types::{Mission, RegionOfInterest, SceneRecord, ShoalError, ShoalResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// Per-year processing stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineStage {
    Querying,
    Selecting,
    Acquiring,
    LocatingBands,
    ComputingIndex,
    Done,
    Skipped,
}

/// Inputs the pipeline needs, and nothing more
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub region: RegionOfInterest,
    pub mission: Mission,
    pub cloud_cover_ceiling: f64,
    pub output_root: PathBuf,
    /// Abort the whole run when a selected scene's archive is missing
    pub strict: bool,
}

impl PipelineSettings {
    pub fn year_dir(&self, year: i32) -> PathBuf {
        self.output_root.join(year.to_string())
    }

    pub fn output_path(&self, year: i32) -> PathBuf {
        self.year_dir(year).join(format!("NDWI_{}.tif", year))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum YearStatus {
    Done,
    Skipped,
    Failed,
}

/// Outcome of one year
#[derive(Debug, Clone, Serialize)]
pub struct YearReport {
    pub year: i32,
    pub status: YearStatus,
    /// Last stage entered; for skips and failures, the stage that stopped the year
    pub stage: PipelineStage,
    pub scene: Option<String>,
    pub cloud_cover: Option<f64>,
    /// Acquisition start of the selected scene, when the catalog supplied it
    pub acquired: Option<DateTime<Utc>>,
    pub output: Option<PathBuf>,
    pub reason: Option<String>,
}

/// Outcomes of a multi-year run, in year order
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub years: Vec<YearReport>,
}

impl RunSummary {
    fn count(&self, status: YearStatus) -> usize {
        self.years.iter().filter(|r| r.status == status).count()
    }

    pub fn completed(&self) -> usize {
        self.count(YearStatus::Done)
    }

    pub fn skipped(&self) -> usize {
        self.count(YearStatus::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(YearStatus::Failed)
    }

    pub fn report(&self, year: i32) -> Option<&YearReport> {
        self.years.iter().find(|r| r.year == year)
    }

    pub fn log(&self) {
        log::info!(
            "Run finished: {} done, {} skipped, {} failed",
            self.completed(),
            self.skipped(),
            self.failed()
        );
        for r in &self.years {
            match r.status {
                YearStatus::Done => log::info!(
                    "  {}: {} ({:.2}% cloud, acquired {}) -> {}",
                    r.year,
                    r.scene.as_deref().unwrap_or("-"),
                    r.cloud_cover.unwrap_or(f64::NAN),
                    r.acquired.map(|t| t.to_rfc3339()).unwrap_or_else(|| "unknown".to_string()),
                    r.output.as_ref().map(|p| p.display().to_string()).unwrap_or_default()
                ),
                _ => log::warn!(
                    "  {}: {:?} at {:?}: {}",
                    r.year,
                    r.status,
                    r.stage,
                    r.reason.as_deref().unwrap_or("unknown")
                ),
            }
        }
    }
}

/// Tracks the stage and selected scene of one year while it runs
struct YearTrace {
    year: i32,
    stage: PipelineStage,
    scene: Option<SceneRecord>,
}

impl YearTrace {
    fn new(year: i32) -> Self {
        Self {
            year,
            stage: PipelineStage::Querying,
            scene: None,
        }
    }

    fn enter(&mut self, stage: PipelineStage) {
        log::debug!("{}: {:?} -> {:?}", self.year, self.stage, stage);
        self.stage = stage;
    }

    fn record_scene(&mut self, scene: &SceneRecord) {
        self.scene = Some(scene.clone());
    }

    fn finish(self, status: YearStatus, output: Option<PathBuf>, reason: Option<String>) -> YearReport {
        let (scene, cloud_cover, acquired) = match self.scene {
            Some(scene) => (Some(scene.name), Some(scene.cloud_cover), scene.acquired),
            None => (None, None, None),
        };
        YearReport {
            year: self.year,
            status,
            stage: self.stage,
            scene,
            cloud_cover,
            acquired,
            output,
            reason,
        }
    }
}

/// Query -> select -> acquire -> locate bands -> compute NDWI, one year at a time
pub struct YearlyPipeline<'a> {
    settings: PipelineSettings,
    catalog: &'a dyn Catalog,
    acquirer: &'a dyn ArchiveAcquirer,
    selector: SceneSelector,
    patterns: BandPatterns,
}

impl<'a> YearlyPipeline<'a> {
    pub fn new(
        settings: PipelineSettings,
        catalog: &'a dyn Catalog,
        acquirer: &'a dyn ArchiveAcquirer,
    ) -> ShoalResult<Self> {
        let patterns = BandPatterns::for_mission(settings.mission)?;
        Ok(Self {
            settings,
            catalog,
            acquirer,
            selector: SceneSelector::default(),
            patterns,
        })
    }

    pub fn with_selector(mut self, selector: SceneSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_band_patterns(mut self, patterns: BandPatterns) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Process one year.
    ///
    /// Skips and per-year failures are returned as reports; `Err` is returned only for
    /// a missing archive in strict mode, which ends the run.
    pub fn run_year(&self, year: i32) -> ShoalResult<YearReport> {
        log::info!("Processing year {}", year);
        let mut trace = YearTrace::new(year);

        match self.process(year, &mut trace) {
            Ok(output) => {
                trace.enter(PipelineStage::Done);
                Ok(trace.finish(YearStatus::Done, Some(output), None))
            }
            Err(e @ ShoalError::AcquisitionMissing { .. }) if self.settings.strict => {
                log::error!("{}: archive missing in strict mode, aborting run: {}", year, e);
                Err(e)
            }
            Err(e) if e.is_skippable() => {
                log::warn!("{}: skipped at {:?}: {}", year, trace.stage, e);
                log::debug!("{}: {:?} -> {:?}", year, trace.stage, PipelineStage::Skipped);
                Ok(trace.finish(YearStatus::Skipped, None, Some(e.to_string())))
            }
            Err(e) => {
                log::error!("{}: failed at {:?}: {}", year, trace.stage, e);
                Ok(trace.finish(YearStatus::Failed, None, Some(e.to_string())))
            }
        }
    }

    fn process(&self, year: i32, trace: &mut YearTrace) -> ShoalResult<PathBuf> {
        let settings = &self.settings;

        trace.enter(PipelineStage::Querying);
        let filter = CatalogQueryBuilder::new(settings.mission, settings.region.clone())
            .build_query(year, settings.cloud_cover_ceiling)?;
        let response = self.catalog.query(filter)?;
        if let Some(reason) = response.recovered {
            return Err(ShoalError::QueryFailed(reason));
        }
        let scenes = response.scenes;

        trace.enter(PipelineStage::Selecting);
        let best = self.selector.select_best(&scenes)?;
        trace.record_scene(best);
        log::info!(
            "{}: best of {} scene(s): {} ({:.2}% cloud, acquired {})",
            year,
            scenes.len(),
            best.name,
            best.cloud_cover,
            best.acquired
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "at unknown time".to_string())
        );

        trace.enter(PipelineStage::Acquiring);
        let year_dir = settings.year_dir(year);
        std::fs::create_dir_all(&year_dir)?;
        let archive = self.acquirer.acquire(best, &year_dir)?;
        self.check_manifest(&archive);

        trace.enter(PipelineStage::LocatingBands);
        let (green, nir) = ArchiveLocator::locate_bands(&archive, &self.patterns).require(&archive)?;
        log::info!("{}: green band {}", year, green.display());
        log::info!("{}: near-infrared band {}", year, nir.display());

        trace.enter(PipelineStage::ComputingIndex);
        let raster = IndexComputer::compute_index(&green, &nir, settings.output_path(year))?;
        Ok(raster.path)
    }

    /// Log the archive's product metadata; never fails the year
    fn check_manifest(&self, archive: &Path) {
        match ManifestReader::read(archive) {
            Ok(Some(manifest)) => {
                log::info!(
                    "Archive product: {} {} sensed {} ({} cloud assessment)",
                    manifest.spacecraft.as_deref().unwrap_or("unknown spacecraft"),
                    manifest.product_type.as_deref().unwrap_or("unknown type"),
                    manifest.sensing_start.as_deref().unwrap_or("at unknown time"),
                    manifest
                        .cloud_coverage
                        .map(|c| format!("{:.2}%", c))
                        .unwrap_or_else(|| "no".to_string())
                );
                let expected = self.settings.mission.product_type();
                if let Some(found) = manifest.product_type.as_deref() {
                    if found != expected {
                        log::warn!("Archive product type {} differs from expected {}", found, expected);
                    }
                }
            }
            Ok(None) => log::debug!("No product metadata in {}", archive.display()),
            Err(e) => log::warn!("Unreadable product metadata in {}: {}", archive.display(), e),
        }
    }

    /// Process every year in order; a strict-mode abort discards the partial summary
    pub fn run(&self, years: RangeInclusive<i32>) -> ShoalResult<RunSummary> {
        let mut summary = RunSummary::default();
        for year in years {
            summary.years.push(self.run_year(year)?);
        }
        summary.log();
        Ok(summary)
    }

    /// Process independent years on the rayon pool
    #[cfg(feature = "parallel")]
    pub fn run_parallel(&self, years: RangeInclusive<i32>) -> ShoalResult<RunSummary> {
        use rayon::prelude::*;

        let reports = years
            .into_par_iter()
            .map(|year| self.run_year(year))
            .collect::<ShoalResult<Vec<_>>>()?;

        let summary = RunSummary { years: reports };
        summary.log();
        Ok(summary)
    }
}
