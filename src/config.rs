//! Process configuration read once at startup from the environment

use crate::core::geometry::GeometryProvider;
use crate::core::pipeline::PipelineSettings;
use crate::io::catalog::DEFAULT_CATALOG_URL;
use crate::types::{Mission, ShoalError, ShoalResult};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Username/password pair for a data service
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Credentials and reference datasets are checked at startup only; the yearly
    /// pipeline reads none of them and gets its inputs from `pipeline_settings`.
    pub esa: Credentials,
    pub usgs: Option<Credentials>,
    pub roi_shapefile: PathBuf,
    pub sentinel2_grid_shapefile: PathBuf,
    pub landsat_grid_shapefile: PathBuf,
    pub home: PathBuf,
    pub catalog_url: String,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> ShoalResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; required settings that are missing or invalid are fatal
    pub fn from_lookup<F>(lookup: F) -> ShoalResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| ShoalError::Config(format!("{} is not set", key)))
        };
        let existing_file = |key: &str| -> ShoalResult<PathBuf> {
            let path = PathBuf::from(require(key)?);
            if !path.is_file() {
                return Err(ShoalError::Config(format!(
                    "{} points to a missing file: {}",
                    key,
                    path.display()
                )));
            }
            Ok(path)
        };

        let esa = Credentials {
            user: require("ESA_USER")?,
            password: require("ESA_PASSWORD")?,
        };
        let usgs = match (get("USGS_USER"), get("USGS_PASSWORD")) {
            (Some(user), Some(password)) => Some(Credentials { user, password }),
            (None, None) => None,
            _ => {
                return Err(ShoalError::Config(
                    "USGS_USER and USGS_PASSWORD must be set together".to_string(),
                ))
            }
        };

        let home = match get("SHOAL_HOME") {
            Some(home) => PathBuf::from(home),
            None => dirs::home_dir()
                .map(|h| h.join("shoal"))
                .ok_or_else(|| ShoalError::Config("SHOAL_HOME is not set and no home directory found".to_string()))?,
        };

        let http_timeout = match get("SHOAL_HTTP_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    ShoalError::Config(format!("SHOAL_HTTP_TIMEOUT_SECS is not a number: {}", raw))
                })?;
                if secs == 0 {
                    return Err(ShoalError::Config("SHOAL_HTTP_TIMEOUT_SECS must be positive".to_string()));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            esa,
            usgs,
            roi_shapefile: existing_file("ROI_SHAPEFILE")?,
            sentinel2_grid_shapefile: existing_file("SENTINEL2_GRID_SHAPEFILE")?,
            landsat_grid_shapefile: existing_file("LANDSAT_GRID_SHAPEFILE")?,
            home,
            catalog_url: get("SHOAL_CATALOG_URL").unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string()),
            http_timeout,
        })
    }

    /// Yearly results live under `{home}/results/{year}`
    pub fn results_dir(&self) -> PathBuf {
        self.home.join("results")
    }

    /// The narrow set of inputs handed to the pipeline
    pub fn pipeline_settings(&self, mission: Mission, cloud_cover_ceiling: f64, strict: bool) -> PipelineSettings {
        PipelineSettings {
            region: GeometryProvider::region_of_interest(),
            mission,
            cloud_cover_ceiling,
            output_root: self.results_dir(),
            strict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn full_env(dir: &TempDir) -> HashMap<String, String> {
        let mut env = HashMap::new();
        for name in ["roi.shp", "s2grid.shp", "l8grid.shp"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        env.insert("ESA_USER".into(), "alice".into());
        env.insert("ESA_PASSWORD".into(), "secret".into());
        env.insert("ROI_SHAPEFILE".into(), dir.path().join("roi.shp").display().to_string());
        env.insert(
            "SENTINEL2_GRID_SHAPEFILE".into(),
            dir.path().join("s2grid.shp").display().to_string(),
        );
        env.insert(
            "LANDSAT_GRID_SHAPEFILE".into(),
            dir.path().join("l8grid.shp").display().to_string(),
        );
        env.insert("SHOAL_HOME".into(), dir.path().display().to_string());
        env
    }

    #[test]
    fn test_complete_environment() {
        let dir = TempDir::new().unwrap();
        let env = full_env(&dir);
        let config = Config::from_lookup(|k| env.get(k).cloned()).unwrap();

        assert_eq!(config.esa.user, "alice");
        assert!(config.usgs.is_none());
        assert_eq!(config.catalog_url, DEFAULT_CATALOG_URL);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.results_dir(), dir.path().join("results"));

        let settings = config.pipeline_settings(Mission::Sentinel2L1C, 20.0, false);
        assert_eq!(settings.output_path(2019), dir.path().join("results/2019/NDWI_2019.tif"));
    }

    #[test]
    fn test_missing_credentials_are_fatal() {
        let dir = TempDir::new().unwrap();
        let mut env = full_env(&dir);
        env.remove("ESA_PASSWORD");
        let err = Config::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("ESA_PASSWORD"));
    }

    #[test]
    fn test_missing_reference_dataset_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut env = full_env(&dir);
        env.insert("LANDSAT_GRID_SHAPEFILE".into(), "/nonexistent/grid.shp".into());
        let err = Config::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ShoalError::Config(ref msg) if msg.contains("LANDSAT_GRID_SHAPEFILE")));
    }

    #[test]
    fn test_half_usgs_credentials_rejected() {
        let dir = TempDir::new().unwrap();
        let mut env = full_env(&dir);
        env.insert("USGS_USER".into(), "bob".into());
        assert!(Config::from_lookup(|k| env.get(k).cloned()).is_err());
    }

    #[test]
    fn test_timeout_override_and_redacted_debug() {
        let dir = TempDir::new().unwrap();
        let mut env = full_env(&dir);
        env.insert("SHOAL_HTTP_TIMEOUT_SECS".into(), "5".into());
        let config = Config::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert!(!format!("{:?}", config).contains("secret"));

        env.insert("SHOAL_HTTP_TIMEOUT_SECS".into(), "soon".into());
        assert!(Config::from_lookup(|k| env.get(k).cloned()).is_err());
    }
}
