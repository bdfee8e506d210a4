use crate::types::{Band, BandPath, Mission, ShoalError, ShoalResult};
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File name patterns identifying the green and near-infrared band files
#[derive(Debug, Clone)]
pub struct BandPatterns {
    pub green: Regex,
    pub nir: Regex,
}

impl BandPatterns {
    pub fn new(green: &str, nir: &str) -> ShoalResult<Self> {
        Ok(Self {
            green: Regex::new(green)?,
            nir: Regex::new(nir)?,
        })
    }

    /// Default patterns for a mission's archive layout
    pub fn for_mission(mission: Mission) -> ShoalResult<Self> {
        Self::new(mission.green_pattern(), mission.nir_pattern())
    }
}

/// Band files resolved inside one archive; `None` means no file matched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandPaths {
    pub green: Option<BandPath>,
    pub nir: Option<BandPath>,
}

impl BandPaths {
    pub fn missing(&self) -> Vec<Band> {
        let mut missing = Vec::new();
        if self.green.is_none() {
            missing.push(Band::Green);
        }
        if self.nir.is_none() {
            missing.push(Band::Nir);
        }
        missing
    }

    /// Both paths, or `BandNotFound` naming whichever bands are absent
    pub fn require(self, archive: &Path) -> ShoalResult<(BandPath, BandPath)> {
        match (self.green, self.nir) {
            (Some(green), Some(nir)) => Ok((green, nir)),
            (green, nir) => {
                let missing = BandPaths { green, nir }
                    .missing()
                    .iter()
                    .map(|b| b.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                Err(ShoalError::BandNotFound {
                    archive: archive.to_path_buf(),
                    missing,
                })
            }
        }
    }
}

/// Resolves band files inside an already extracted archive
pub struct ArchiveLocator;

impl ArchiveLocator {
    /// Search `archive_root` recursively for the first file name matching each pattern.
    ///
    /// Files are visited depth first with siblings sorted by name, so with duplicates the
    /// first in that order wins (e.g. `GRANULE/*/IMG_DATA` before `QI_DATA`).
    /// Never fails: unreadable directories are logged and skipped.
    pub fn locate_bands(archive_root: &Path, patterns: &BandPatterns) -> BandPaths {
        let files = Self::list_files(archive_root);
        log::debug!("Scanning {} files under {}", files.len(), archive_root.display());

        let first_match = |pattern: &Regex| {
            files
                .iter()
                .find(|path| {
                    path.file_name()
                        .map(|name| pattern.is_match(&name.to_string_lossy()))
                        .unwrap_or(false)
                })
                .cloned()
        };

        let bands = BandPaths {
            green: first_match(&patterns.green),
            nir: first_match(&patterns.nir),
        };

        for band in bands.missing() {
            log::warn!("No {} band file found under {}", band, archive_root.display());
        }
        bands
    }

    /// All regular files under `root`, depth first with siblings in file name order.
    /// Symlinks count when they point at a file; linked directories are not entered.
    pub fn list_files(root: &Path) -> Vec<PathBuf> {
        WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    None
                }
            })
            .filter(|entry| {
                let ft = entry.file_type();
                ft.is_file() || (ft.is_symlink() && entry.path().is_file())
            })
            .map(|entry| entry.into_path())
            .collect()
    }
}
