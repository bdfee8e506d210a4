use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Band sample after widening to 32-bit float
pub type BandSample = f32;

/// 2D band grid (rows x columns)
pub type BandGrid = Array2<BandSample>;

/// Resolved location of one spectral band inside an acquired archive
pub type BandPath = PathBuf;

/// Scenes returned by one catalog query, in catalog response order
pub type SceneCollection = Vec<SceneRecord>;

/// Geospatial bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

/// Closed polygon in geographic coordinates (EPSG:4326) bounding the study area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionOfInterest {
    pub(crate) bbox: BoundingBox,
}

impl RegionOfInterest {
    /// Build a region from its corner bounds, rejecting empty or inverted boxes
    pub fn from_bounds(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> ShoalResult<Self> {
        let finite = [min_lon, min_lat, max_lon, max_lat].iter().all(|v| v.is_finite());
        if !finite || min_lon >= max_lon || min_lat >= max_lat {
            return Err(ShoalError::InvalidInput(format!(
                "Invalid region bounds: lon {}..{}, lat {}..{}",
                min_lon, max_lon, min_lat, max_lat
            )));
        }

        Ok(Self {
            bbox: BoundingBox { min_lon, max_lon, min_lat, max_lat },
        })
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }

    /// Polygon ring starting at the north-west corner, clockwise, first vertex repeated last
    pub fn ring(&self) -> [(f64, f64); 5] {
        let b = &self.bbox;
        [
            (b.min_lon, b.max_lat),
            (b.max_lon, b.max_lat),
            (b.max_lon, b.min_lat),
            (b.min_lon, b.min_lat),
            (b.min_lon, b.max_lat),
        ]
    }

    /// Well-known-text rendering, e.g. `POLYGON((104.5 9.7,105.5 9.7,...))`
    pub fn to_wkt(&self) -> String {
        let vertices: Vec<String> = self
            .ring()
            .iter()
            .map(|(lon, lat)| format!("{} {}", lon, lat))
            .collect();
        format!("POLYGON(({}))", vertices.join(","))
    }
}

/// Inclusive date range at day granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> ShoalResult<Self> {
        if start > end {
            return Err(ShoalError::InvalidInput(format!(
                "Time window start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// January 1st through December 31st of `year`
    pub fn calendar_year(year: i32) -> ShoalResult<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1);
        let end = NaiveDate::from_ymd_opt(year, 12, 31);
        match (start, end) {
            (Some(start), Some(end)) => Self::new(start, end),
            _ => Err(ShoalError::InvalidInput(format!("Year out of range: {}", year))),
        }
    }

    pub fn year(&self) -> i32 {
        self.start.year()
    }

    /// First instant of the window (00:00:00.000 UTC on the start day)
    pub fn start_instant(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    /// Last millisecond of the window (23:59:59.999 UTC on the end day)
    pub fn end_instant(&self) -> DateTime<Utc> {
        let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
        self.end.and_time(last).and_utc()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// One scene candidate parsed from a catalog response item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    pub id: String,
    pub name: String,
    /// Percentage 0-100; unknown values are recorded as the catalog's unknown-cloud-cover default
    pub cloud_cover: f64,
    pub download_link: Option<String>,
    pub acquired: Option<DateTime<Utc>>,
}

/// Spectral bands used by the water index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    Green,
    Nir,
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Band::Green => write!(f, "green"),
            Band::Nir => write!(f, "near-infrared"),
        }
    }
}

/// Imagery family queried from the catalog, with its band naming conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mission {
    /// Sentinel-2 Level-1C top-of-atmosphere product
    #[default]
    Sentinel2L1C,
    /// Sentinel-2 Level-2A surface reflectance product
    Sentinel2L2A,
    /// Landsat 8 Level-1 terrain-precision product
    Landsat8,
}

impl Mission {
    pub fn collection(&self) -> &'static str {
        match self {
            Mission::Sentinel2L1C | Mission::Sentinel2L2A => "SENTINEL-2",
            Mission::Landsat8 => "LANDSAT-8",
        }
    }

    pub fn product_type(&self) -> &'static str {
        match self {
            Mission::Sentinel2L1C => "S2MSI1C",
            Mission::Sentinel2L2A => "S2MSI2A",
            Mission::Landsat8 => "L1TP",
        }
    }

    /// File name pattern (regex) of the green band
    pub fn green_pattern(&self) -> &'static str {
        match self {
            Mission::Sentinel2L1C => r"B03.*\.jp2$",
            Mission::Sentinel2L2A => r"B03_10m.*\.jp2$",
            Mission::Landsat8 => r"(?i)_B3\.tif$",
        }
    }

    /// File name pattern (regex) of the near-infrared band
    pub fn nir_pattern(&self) -> &'static str {
        match self {
            Mission::Sentinel2L1C => r"B08.*\.jp2$",
            Mission::Sentinel2L2A => r"B08_10m.*\.jp2$",
            Mission::Landsat8 => r"(?i)_B5\.tif$",
        }
    }

    /// Suffix of the extracted archive directory
    pub fn archive_suffix(&self) -> &'static str {
        match self {
            Mission::Sentinel2L1C | Mission::Sentinel2L2A => ".SAFE",
            Mission::Landsat8 => "",
        }
    }
}

impl std::fmt::Display for Mission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mission::Sentinel2L1C => write!(f, "s2-l1c"),
            Mission::Sentinel2L2A => write!(f, "s2-l2a"),
            Mission::Landsat8 => write!(f, "landsat8"),
        }
    }
}

impl FromStr for Mission {
    type Err = ShoalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s2-l1c" | "s2msi1c" | "sentinel2" => Ok(Mission::Sentinel2L1C),
            "s2-l2a" | "s2msi2a" => Ok(Mission::Sentinel2L2A),
            "landsat8" | "l8" | "landsat-8" => Ok(Mission::Landsat8),
            _ => Err(ShoalError::InvalidInput(format!("Unknown mission: {}", s))),
        }
    }
}

/// Geospatial transformation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }
}

/// Spatial profile of a raster, propagated unchanged to derived rasters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterProfile {
    pub width: usize,
    pub height: usize,
    pub geo_transform: Option<GeoTransform>,
    /// Coordinate reference system as WKT; empty when the source has none
    pub projection: String,
    pub no_data: Option<f64>,
}

/// Single-band float32 water index raster written to disk
#[derive(Debug, Clone)]
pub struct IndexRaster {
    pub path: PathBuf,
    pub profile: RasterProfile,
    pub values: BandGrid,
}

impl IndexRaster {
    /// Number of pixels holding a defined (finite) index value
    pub fn valid_pixels(&self) -> usize {
        self.values.iter().filter(|v| v.is_finite()).count()
    }

    /// Mean over defined pixels, `None` when every pixel is undefined
    pub fn mean(&self) -> Option<f64> {
        let (sum, count) = self
            .values
            .iter()
            .filter(|v| v.is_finite())
            .fold((0.0f64, 0usize), |(s, n), &v| (s + v as f64, n + 1));
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }
}

/// Error types for scene search and index extraction
#[derive(Debug, thiserror::Error)]
pub enum ShoalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Catalog transport failure: {0}")]
    Transport(String),

    #[error("No scenes satisfy the catalog filter")]
    NotFound,

    /// A failed query that the catalog's error policy reported as no scenes
    #[error("No scenes, catalog query failed: {0}")]
    QueryFailed(String),

    #[error("Archive not present at {}", .path.display())]
    AcquisitionMissing { path: PathBuf },

    #[error("Band(s) not found under {}: {}", .archive.display(), .missing)]
    BandNotFound { archive: PathBuf, missing: String },

    #[error("Band shapes differ: green {green:?} vs near-infrared {nir:?}")]
    ShapeMismatch { green: (usize, usize), nir: (usize, usize) },

    #[error("Failed to write {}: {}", .path.display(), .reason)]
    Write { path: PathBuf, reason: String },

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Archive extraction error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Invalid band pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ShoalError {
    /// Per-year failures after which the run moves on to the next year
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            ShoalError::Transport(_)
                | ShoalError::NotFound
                | ShoalError::QueryFailed(_)
                | ShoalError::AcquisitionMissing { .. }
                | ShoalError::BandNotFound { .. }
        )
    }
}

impl From<reqwest::Error> for ShoalError {
    fn from(e: reqwest::Error) -> Self {
        ShoalError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for ShoalError {
    fn from(e: serde_json::Error) -> Self {
        ShoalError::InvalidFormat(format!("Catalog response is not valid JSON: {}", e))
    }
}

/// Result type for scene search and index operations
pub type ShoalResult<T> = Result<T, ShoalError>;
