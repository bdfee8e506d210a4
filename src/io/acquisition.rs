use crate::types::{Mission, SceneRecord, ShoalError, ShoalResult};
use std::fs::File;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Makes the archive of a selected scene available locally.
///
/// Retrieval itself happens out of band; implementations only report where the
/// extracted archive is, or fail with `AcquisitionMissing`.
pub trait ArchiveAcquirer: Send + Sync {
    fn acquire(&self, scene: &SceneRecord, year_dir: &Path) -> ShoalResult<PathBuf>;
}

/// Archives downloaded by hand into the year folder
#[derive(Debug, Clone)]
pub struct LocalArchive {
    suffix: &'static str,
}

impl LocalArchive {
    pub fn new(mission: Mission) -> Self {
        Self {
            suffix: mission.archive_suffix(),
        }
    }

    /// Scene name without the archive suffix (`X.SAFE` -> `X`)
    fn scene_stem<'a>(&self, name: &'a str) -> &'a str {
        if self.suffix.is_empty() {
            name
        } else {
            name.strip_suffix(self.suffix).unwrap_or(name)
        }
    }

    /// `{year_dir}/{scene stem}{suffix}`
    pub fn expected_path(&self, scene: &SceneRecord, year_dir: &Path) -> PathBuf {
        year_dir.join(format!("{}{}", self.scene_stem(&scene.name), self.suffix))
    }

    fn candidate_zips(&self, scene: &SceneRecord, year_dir: &Path) -> Vec<PathBuf> {
        let stem = self.scene_stem(&scene.name);
        let mut candidates = vec![year_dir.join(format!("{}.zip", stem))];
        let full = year_dir.join(format!("{}.zip", scene.name));
        if !candidates.contains(&full) {
            candidates.push(full);
        }
        candidates
    }

    /// Extract every entry of `zip_path` into `dest`
    pub fn extract_zip(zip_path: &Path, dest: &Path) -> ShoalResult<()> {
        log::info!("Extracting {} into {}", zip_path.display(), dest.display());
        let file = File::open(zip_path)?;
        let mut archive = ZipArchive::new(file)?;
        archive.extract(dest)?;
        log::info!("Extracted {} entries", archive.len());
        Ok(())
    }
}

impl ArchiveAcquirer for LocalArchive {
    fn acquire(&self, scene: &SceneRecord, year_dir: &Path) -> ShoalResult<PathBuf> {
        let expected = self.expected_path(scene, year_dir);
        if expected.is_dir() {
            log::info!("Found archive: {}", expected.display());
            return Ok(expected);
        }

        for zip_path in self.candidate_zips(scene, year_dir) {
            if zip_path.is_file() {
                Self::extract_zip(&zip_path, year_dir)?;
                if expected.is_dir() {
                    log::info!("Archive ready: {}", expected.display());
                    return Ok(expected);
                }
                log::warn!(
                    "{} did not contain {}",
                    zip_path.display(),
                    expected.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
                );
            }
        }

        match &scene.download_link {
            Some(link) => log::warn!("Manual download link for {}: {}", scene.name, link),
            None => log::warn!("Catalog gave no download link for {}", scene.name),
        }
        log::warn!(
            "Download and extract the archive to {} to continue",
            expected.display()
        );
        Err(ShoalError::AcquisitionMissing { path: expected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;

    fn scene(name: &str) -> SceneRecord {
        SceneRecord {
            id: "id".to_string(),
            name: name.to_string(),
            cloud_cover: 5.0,
            download_link: Some("https://example.test/id/$value".to_string()),
            acquired: None,
        }
    }

    #[test]
    fn test_expected_path_strips_existing_suffix() {
        let acquirer = LocalArchive::new(Mission::Sentinel2L1C);
        let year_dir = Path::new("/data/2019");

        assert_eq!(
            acquirer.expected_path(&scene("S2A_MSIL1C_X.SAFE"), year_dir),
            PathBuf::from("/data/2019/S2A_MSIL1C_X.SAFE")
        );
        assert_eq!(
            acquirer.expected_path(&scene("S2A_MSIL1C_X"), year_dir),
            PathBuf::from("/data/2019/S2A_MSIL1C_X.SAFE")
        );
    }

    #[test]
    fn test_existing_directory_is_used() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("S2A_X.SAFE")).unwrap();

        let acquirer = LocalArchive::new(Mission::Sentinel2L1C);
        let path = acquirer.acquire(&scene("S2A_X.SAFE"), dir.path()).unwrap();
        assert_eq!(path, dir.path().join("S2A_X.SAFE"));
    }

    #[test]
    fn test_missing_archive_fails() {
        let dir = TempDir::new().unwrap();
        let acquirer = LocalArchive::new(Mission::Sentinel2L1C);
        let err = acquirer.acquire(&scene("S2A_X.SAFE"), dir.path()).unwrap_err();
        assert!(matches!(err, ShoalError::AcquisitionMissing { ref path } if path.ends_with("S2A_X.SAFE")));
    }

    #[test]
    fn test_downloaded_zip_is_extracted() {
        let dir = TempDir::new().unwrap();
        let zip_path = dir.path().join("S2A_X.zip");
        {
            let file = File::create(&zip_path).unwrap();
            let mut writer = zip::ZipWriter::new(file);
            writer
                .start_file("S2A_X.SAFE/MTD_MSIL1C.xml", FileOptions::default())
                .unwrap();
            writer.write_all(b"<root/>").unwrap();
            writer.finish().unwrap();
        }

        let acquirer = LocalArchive::new(Mission::Sentinel2L1C);
        let path = acquirer.acquire(&scene("S2A_X.SAFE"), dir.path()).unwrap();
        assert!(path.join("MTD_MSIL1C.xml").is_file());
    }
}
