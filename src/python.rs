//! Python bindings, built with the `python` feature

use crate::core::ndwi::{normalized_difference, IndexComputer};
use crate::io::archive::{ArchiveLocator, BandPatterns};
use crate::types::{Mission, ShoalError};
use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
use pyo3::prelude::*;
use std::path::Path;

fn to_py_err(e: ShoalError) -> PyErr {
    match e {
        ShoalError::InvalidInput(_) | ShoalError::ShapeMismatch { .. } => {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{}", e))
        }
        _ => PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e)),
    }
}

/// NDWI of two equal-shaped float32 arrays; undefined pixels are NaN
#[pyfunction]
#[pyo3(name = "normalized_difference")]
fn py_normalized_difference<'py>(
    py: Python<'py>,
    green: PyReadonlyArray2<'py, f32>,
    nir: PyReadonlyArray2<'py, f32>,
) -> PyResult<&'py PyArray2<f32>> {
    let green = green.as_array().to_owned();
    let nir = nir.as_array().to_owned();
    let index = normalized_difference(&green, &nir).map_err(to_py_err)?;
    Ok(index.into_pyarray(py))
}

/// Compute an NDWI GeoTIFF from two band files; returns (valid pixels, mean)
#[pyfunction]
fn compute_ndwi(green_path: &str, nir_path: &str, output_path: &str) -> PyResult<(usize, Option<f64>)> {
    let raster = IndexComputer::compute_index(green_path, nir_path, output_path).map_err(to_py_err)?;
    Ok((raster.valid_pixels(), raster.mean()))
}

/// Locate (green, nir) band files under an extracted archive
#[pyfunction]
#[pyo3(signature = (archive_root, mission = "s2-l1c"))]
fn locate_bands(archive_root: &str, mission: &str) -> PyResult<(Option<String>, Option<String>)> {
    let mission: Mission = mission.parse().map_err(to_py_err)?;
    let patterns = BandPatterns::for_mission(mission).map_err(to_py_err)?;
    let bands = ArchiveLocator::locate_bands(Path::new(archive_root), &patterns);
    let as_string = |p: Option<std::path::PathBuf>| p.map(|p| p.display().to_string());
    Ok((as_string(bands.green), as_string(bands.nir)))
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(py_normalized_difference, m)?)?;
    m.add_function(wrap_pyfunction!(compute_ndwi, m)?)?;
    m.add_function(wrap_pyfunction!(locate_bands, m)?)?;
    Ok(())
}
