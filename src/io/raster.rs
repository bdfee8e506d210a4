use crate::types::{BandGrid, GeoTransform, RasterProfile, ShoalError, ShoalResult};
use gdal::{Dataset, DriverManager};
use ndarray::Array2;
use std::path::Path;

/// GDAL-backed band reader and float32 GeoTIFF writer
pub struct RasterIo;

impl RasterIo {
    /// Read band 1 of `path` widened to f32, together with its spatial profile
    pub fn read_band<P: AsRef<Path>>(path: P) -> ShoalResult<(BandGrid, RasterProfile)> {
        log::info!("Reading band from: {}", path.as_ref().display());

        let dataset = Dataset::open(path.as_ref())?;
        let (width, height) = dataset.raster_size();
        let geo_transform = dataset.geo_transform().ok().map(GeoTransform::from_gdal);
        let projection = dataset.projection();

        let rasterband = dataset.rasterband(1)?;
        let no_data = rasterband.no_data_value();
        let band_data = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;

        log::debug!("Band size: {}x{}, nodata: {:?}", width, height, no_data);

        let grid = Array2::from_shape_vec((height, width), band_data.data)
            .map_err(|e| ShoalError::InvalidFormat(format!("Failed to reshape band data: {}", e)))?;

        Ok((
            grid,
            RasterProfile {
                width,
                height,
                geo_transform,
                projection,
                no_data,
            },
        ))
    }

    /// Read only the spatial profile of band 1
    pub fn read_profile<P: AsRef<Path>>(path: P) -> ShoalResult<RasterProfile> {
        let dataset = Dataset::open(path.as_ref())?;
        let (width, height) = dataset.raster_size();
        let no_data = dataset.rasterband(1)?.no_data_value();

        Ok(RasterProfile {
            width,
            height,
            geo_transform: dataset.geo_transform().ok().map(GeoTransform::from_gdal),
            projection: dataset.projection(),
            no_data,
        })
    }

    /// Write `grid` as a single-band float32 GeoTIFF carrying `profile`.
    ///
    /// The raster is written to a temporary file beside `output_path` and renamed into
    /// place, so a failed write leaves no file at `output_path` and no temporary behind.
    pub fn write_float32<P: AsRef<Path>>(
        grid: &BandGrid,
        profile: &RasterProfile,
        output_path: P,
    ) -> ShoalResult<()> {
        let output_path = output_path.as_ref();
        let write_error = |reason: String| ShoalError::Write {
            path: output_path.to_path_buf(),
            reason,
        };

        let (height, width) = grid.dim();
        if (width, height) != (profile.width, profile.height) {
            return Err(write_error(format!(
                "grid is {}x{} but profile is {}x{}",
                width, height, profile.width, profile.height
            )));
        }

        let parent = match output_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => std::env::current_dir().map_err(|e| write_error(e.to_string()))?,
        };
        std::fs::create_dir_all(&parent).map_err(|e| write_error(e.to_string()))?;

        let temp_path = tempfile::Builder::new()
            .prefix(".shoal-")
            .suffix(".tif")
            .tempfile_in(&parent)
            .map_err(|e| write_error(e.to_string()))?
            .into_temp_path();

        log::info!("Saving float32 GeoTIFF: {}", output_path.display());

        // On error the temporary is removed when `temp_path` drops
        Self::write_gtiff(grid, profile, &temp_path).map_err(|e| write_error(e.to_string()))?;
        temp_path
            .persist(output_path)
            .map_err(|e| write_error(e.error.to_string()))?;

        log::info!("GeoTIFF saved: {}", output_path.display());
        Ok(())
    }

    fn write_gtiff(grid: &BandGrid, profile: &RasterProfile, path: &Path) -> ShoalResult<()> {
        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let (height, width) = grid.dim();

        let mut dataset = driver.create_with_band_type::<f32, _>(
            path,
            width as isize,
            height as isize,
            1,
        )?;

        if let Some(transform) = &profile.geo_transform {
            dataset.set_geo_transform(&transform.to_gdal())?;
        }
        if !profile.projection.is_empty() {
            dataset.set_projection(&profile.projection)?;
        }

        let mut rasterband = dataset.rasterband(1)?;
        let flat_data: Vec<f32> = grid.iter().cloned().collect();
        let buffer = gdal::raster::Buffer::new((width, height), flat_data);
        rasterband.write((0, 0), (width, height), &buffer)?;

        if let Some(no_data) = profile.no_data {
            rasterband.set_no_data_value(Some(no_data))?;
        }

        // Dataset is flushed and closed on drop, before the caller renames the file
        drop(rasterband);
        drop(dataset);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn utm_profile(width: usize, height: usize) -> RasterProfile {
        RasterProfile {
            width,
            height,
            geo_transform: Some(GeoTransform::from_gdal([500000.0, 10.0, 0.0, 1000000.0, 0.0, -10.0])),
            projection: gdal::spatial_ref::SpatialRef::from_epsg(32648)
                .unwrap()
                .to_wkt()
                .unwrap(),
            no_data: None,
        }
    }

    #[test]
    fn test_write_then_read_preserves_profile() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.tif");
        let grid = Array2::from_shape_vec((2, 3), vec![0.5, -0.5, 1.0, f32::NAN, 0.0, -1.0]).unwrap();
        let profile = utm_profile(3, 2);

        RasterIo::write_float32(&grid, &profile, &path).unwrap();
        let (read, read_profile) = RasterIo::read_band(&path).unwrap();

        assert_eq!(read.dim(), (2, 3));
        assert_eq!(read[[0, 1]], -0.5);
        assert!(read[[1, 0]].is_nan());
        assert_eq!(read_profile.geo_transform, profile.geo_transform);
        assert_eq!((read_profile.width, read_profile.height), (3, 2));
        assert!(!read_profile.projection.is_empty());
    }

    #[test]
    fn test_failed_write_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        // Renaming a file over an existing directory fails
        let blocked = dir.path().join("NDWI_2019.tif");
        std::fs::create_dir(&blocked).unwrap();

        let grid = Array2::<f32>::zeros((2, 2));
        let err = RasterIo::write_float32(&grid, &utm_profile(2, 2), &blocked).unwrap_err();
        assert!(matches!(err, ShoalError::Write { .. }));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(leftovers, vec!["NDWI_2019.tif".to_string()]);
        assert!(blocked.is_dir());
    }

    #[test]
    fn test_grid_profile_mismatch_is_write_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.tif");
        let grid = Array2::<f32>::zeros((2, 2));

        let err = RasterIo::write_float32(&grid, &utm_profile(3, 3), &path).unwrap_err();
        assert!(matches!(err, ShoalError::Write { .. }));
        assert!(!path.exists());
    }
}
