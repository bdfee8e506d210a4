use crate::io::raster::RasterIo;
use crate::types::{BandGrid, IndexRaster, ShoalError, ShoalResult};
use ndarray::{Array2, Zip};
use num_traits::Float;
use std::path::Path;

/// Normalized difference `(a - b) / (a + b)` for one pixel.
///
/// Infinite results (zero denominator, nonzero numerator) become NaN;
/// 0/0 is already NaN and stays NaN.
#[inline]
pub fn normalized_difference_value<T: Float>(a: T, b: T) -> T {
    let value = (a - b) / (a + b);
    if value.is_infinite() {
        T::nan()
    } else {
        value
    }
}

/// Elementwise normalized difference of two equal-shaped grids
pub fn normalized_difference(green: &BandGrid, nir: &BandGrid) -> ShoalResult<BandGrid> {
    if green.dim() != nir.dim() {
        return Err(ShoalError::ShapeMismatch {
            green: green.dim(),
            nir: nir.dim(),
        });
    }

    let mut index = Array2::<f32>::zeros(green.dim());
    let zip = Zip::from(&mut index).and(green).and(nir);

    #[cfg(feature = "parallel")]
    zip.par_for_each(|out, &g, &n| *out = normalized_difference_value(g, n));

    #[cfg(not(feature = "parallel"))]
    zip.for_each(|out, &g, &n| *out = normalized_difference_value(g, n));

    Ok(index)
}

/// Computes NDWI rasters from green and near-infrared band files
pub struct IndexComputer;

impl IndexComputer {
    /// Load both bands, compute NDWI and write it to `output_path` with the green band's profile
    pub fn compute_index<P, Q, R>(green_band: P, nir_band: Q, output_path: R) -> ShoalResult<IndexRaster>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        R: AsRef<Path>,
    {
        let (green, profile) = RasterIo::read_band(green_band)?;
        let (nir, _) = RasterIo::read_band(nir_band)?;

        log::info!("Computing NDWI over {}x{} pixels", profile.width, profile.height);
        let values = normalized_difference(&green, &nir)?;

        RasterIo::write_float32(&values, &profile, output_path.as_ref())?;

        let raster = IndexRaster {
            path: output_path.as_ref().to_path_buf(),
            profile,
            values,
        };
        match raster.mean() {
            Some(mean) => log::info!(
                "NDWI written: {} ({} valid pixels, mean {:.3})",
                raster.path.display(),
                raster.valid_pixels(),
                mean
            ),
            None => log::warn!("NDWI written with no valid pixels: {}", raster.path.display()),
        }
        Ok(raster)
    }
}
