//! Spatial aggregation of weather-derived power fields onto aggregation
//! units (buses, regions) via a weighting matrix.

use std::error::Error;
use std::fmt;

use ndarray::{Array2, ArrayD, Axis, IxDyn};

use crate::array::{ArrayError, Coord, LabeledArray, UnitIndex};

/// Aggregation error with a human-readable description.
#[derive(Debug)]
pub struct AggregateError {
    /// What went wrong.
    pub message: String,
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "aggregation error: {}", self.message)
    }
}

impl Error for AggregateError {}

impl From<ArrayError> for AggregateError {
    fn from(e: ArrayError) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}

/// Collapses the `time` axis by summation, preserving all other axes.
///
/// NaN samples are excluded from the sums. Chunked input that is chunked
/// along `time` is reduced block-by-block without materializing the full
/// array; other chunkings are materialized first.
///
/// # Errors
///
/// Returns an [`AggregateError`] if the array has no `time` axis.
pub fn aggregate_sum(array: &LabeledArray) -> Result<LabeledArray, AggregateError> {
    let t = array.axis_index("time").ok_or_else(|| AggregateError {
        message: "aggregate_sum requires a time axis".to_string(),
    })?;

    let summed: ArrayD<f64> = if let Some(backing) = array.chunked_backing() {
        if backing.axis() == t {
            // Partial sums per block, accumulated elementwise.
            let mut acc: Option<ArrayD<f64>> = None;
            for block in backing.evaluated() {
                let partial = nan_sum_axis(&block?, t);
                acc = Some(match acc {
                    Some(a) => a + partial,
                    None => partial,
                });
            }
            acc.ok_or_else(|| AggregateError {
                message: "chunked array has no chunks".to_string(),
            })?
        } else {
            let dense = array.compute()?;
            nan_sum_axis(dense.values()?, t)
        }
    } else {
        nan_sum_axis(array.values()?, t)
    };

    let mut dims = array.dims().to_vec();
    dims.remove(t);
    let coords: Vec<Vec<Coord>> = array
        .dims()
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != t)
        .map(|(_, d)| array.coords(d).unwrap_or(&[]).to_vec())
        .collect();

    let mut out = LabeledArray::new(summed, dims, coords)?;
    if let Some(name) = array.name() {
        out.set_name(name);
    }
    Ok(out)
}

/// Remaps a spatial power field onto aggregation units with a weighting
/// matrix.
///
/// The array's `y` and `x` axes are flattened in row-major order (`y` outer,
/// `x` inner) into one spatial axis whose ordering must match the matrix
/// columns; for every unit `u` and time `t` the result is
/// `Σ_cell matrix[u, cell] * array[cell, t]`. No normalization is applied —
/// averaging weights are the caller's responsibility.
///
/// Chunked arrays (chunked along `time`) stay lazy: the matrix product is
/// planned per block and the result is materialized only on
/// [`LabeledArray::compute`]. Eager arrays take a dense matrix-product path;
/// both paths produce numerically equal results up to floating-point
/// associativity.
///
/// # Errors
///
/// Returns an [`AggregateError`] if the array axes are not exactly
/// `y`/`x`/`time`, the matrix column count differs from the flattened cell
/// count, the matrix row count differs from the unit index length, or a
/// chunked array is chunked along a spatial axis.
pub fn aggregate_matrix(
    array: &LabeledArray,
    matrix: &Array2<f64>,
    index: &UnitIndex,
) -> Result<LabeledArray, AggregateError> {
    let (y, x, t) = spatial_axes(array)?;
    let shape = array.shape();
    let (ny, nx, nt) = (shape[y], shape[x], shape[t]);
    let cells = ny * nx;

    if matrix.ncols() != cells {
        return Err(AggregateError {
            message: format!(
                "matrix has {} columns but the array has {ny}×{nx} = {cells} spatial cells",
                matrix.ncols()
            ),
        });
    }
    if matrix.nrows() != index.len() {
        return Err(AggregateError {
            message: format!(
                "matrix has {} rows but the unit index \"{}\" has {} entries",
                matrix.nrows(),
                index.name(),
                index.len()
            ),
        });
    }

    let time_coords = array.coords("time").unwrap_or(&[]).to_vec();
    let out_dims = vec![index.name().to_string(), "time".to_string()];
    let out_coords = vec![index.values().to_vec(), time_coords];

    if let Some(backing) = array.chunked_backing() {
        if backing.axis() != t {
            return Err(AggregateError {
                message: "chunked aggregation requires chunking along the time axis".to_string(),
            });
        }
        let weights = matrix.clone();
        let perm = [y, x, t];
        let mut out = array.map_blocks(out_dims, out_coords, move |block| {
            let tc = block.shape()[perm[2]];
            let flat = flatten_spatial(&block, perm, cells, tc);
            weights.dot(&flat).into_dyn()
        })?;
        if let Some(name) = array.name() {
            out.set_name(name);
        }
        Ok(out)
    } else {
        let flat = flatten_spatial(array.values()?, [y, x, t], cells, nt);
        let product = matrix.dot(&flat).into_dyn();
        let mut out = LabeledArray::new(product, out_dims, out_coords)?;
        if let Some(name) = array.name() {
            out.set_name(name);
        }
        Ok(out)
    }
}

/// Resolves the `y`, `x` and `time` axis positions, requiring exactly those
/// three axes.
fn spatial_axes(array: &LabeledArray) -> Result<(usize, usize, usize), AggregateError> {
    let lookup = |name: &str| {
        array.axis_index(name).ok_or_else(|| AggregateError {
            message: format!("aggregate_matrix requires a {name} axis"),
        })
    };
    let (y, x, t) = (lookup("y")?, lookup("x")?, lookup("time")?);
    if array.dims().len() != 3 {
        return Err(AggregateError {
            message: format!(
                "aggregate_matrix expects axes y, x, time only, got {:?}",
                array.dims()
            ),
        });
    }
    Ok((y, x, t))
}

/// Reorders a block to (y, x, time) and flattens the spatial axes row-major
/// into a (cells × time) matrix.
///
/// The permutation and extents are validated by the caller, so the reshape
/// of the standard-layout copy cannot fail.
fn flatten_spatial(block: &ArrayD<f64>, perm: [usize; 3], cells: usize, nt: usize) -> Array2<f64> {
    let ordered = block
        .view()
        .permuted_axes(IxDyn(&perm))
        .as_standard_layout()
        .into_owned();
    ordered
        .into_shape_with_order((cells, nt))
        .expect("standard-layout block flattens to (cells, time)")
}

/// Sums along one axis, treating NaN samples as absent.
fn nan_sum_axis(data: &ArrayD<f64>, axis: usize) -> ArrayD<f64> {
    data.map_axis(Axis(axis), |lane| {
        lane.iter().filter(|v| !v.is_nan()).sum::<f64>()
    })
}
