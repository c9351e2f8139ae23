//! Labeled n-dimensional arrays with named, coordinate-valued axes.

pub mod chunked;

use std::error::Error;
use std::fmt;

use ndarray::{ArrayD, Axis, IxDyn};

use crate::array::chunked::ChunkedBacking;

/// A coordinate label along a named axis.
///
/// Spatial and temporal axes carry numeric coordinates, aggregation-unit
/// axes (buses, regions) carry string identifiers.
#[derive(Debug, Clone, PartialEq)]
pub enum Coord {
    /// Numeric coordinate (grid position, timestamp offset).
    Num(f64),
    /// String coordinate (bus or region identifier).
    Str(String),
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coord::Num(v) => write!(f, "{v}"),
            Coord::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for Coord {
    fn from(v: f64) -> Self {
        Coord::Num(v)
    }
}

impl From<&str> for Coord {
    fn from(s: &str) -> Self {
        Coord::Str(s.to_string())
    }
}

impl From<String> for Coord {
    fn from(s: String) -> Self {
        Coord::Str(s)
    }
}

/// Array construction or evaluation error with axis context.
#[derive(Debug)]
pub struct ArrayError {
    /// Axis name the error relates to (or `"array"` for whole-array errors).
    pub axis: String,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for ArrayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "array error: {} — {}", self.axis, self.message)
    }
}

impl Error for ArrayError {}

/// An ordered, named coordinate vector labeling an aggregation axis
/// (e.g. bus identifiers).
#[derive(Debug, Clone)]
pub struct UnitIndex {
    name: String,
    values: Vec<Coord>,
}

impl UnitIndex {
    /// Creates a unit index with the given axis name and coordinate values.
    pub fn new(name: impl Into<String>, values: Vec<Coord>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Axis name this index labels.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Coordinate values in order.
    pub fn values(&self) -> &[Coord] {
        &self.values
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Storage backing of a [`LabeledArray`].
#[derive(Debug, Clone)]
enum Backing {
    /// Fully materialized in-memory buffer.
    Eager(ArrayD<f64>),
    /// Lazily evaluated, chunked along one axis.
    Chunked(ChunkedBacking),
}

/// An n-dimensional `f64` array with named axes and per-axis coordinate
/// vectors.
///
/// Invariant: every axis length equals the length of its coordinate vector
/// (checked at construction). Values may contain NaN missing-data markers;
/// downstream calculations handle those explicitly.
///
/// The array is backed either by an eager in-memory buffer or by a chunked
/// lazy backing (see [`chunked::ChunkedBacking`]); consumers select an
/// execution strategy via [`LabeledArray::is_chunked`] and force evaluation
/// with [`LabeledArray::compute`].
#[derive(Debug, Clone)]
pub struct LabeledArray {
    backing: Backing,
    dims: Vec<String>,
    coords: Vec<Vec<Coord>>,
    name: Option<String>,
}

impl LabeledArray {
    /// Creates an eager labeled array.
    ///
    /// # Errors
    ///
    /// Returns an [`ArrayError`] if the number of dims does not match the
    /// array rank, or any coordinate vector length differs from its axis
    /// length.
    pub fn new(
        data: ArrayD<f64>,
        dims: Vec<String>,
        coords: Vec<Vec<Coord>>,
    ) -> Result<Self, ArrayError> {
        check_labels(data.shape(), &dims, &coords)?;
        Ok(Self {
            backing: Backing::Eager(data),
            dims,
            coords,
            name: None,
        })
    }

    /// Creates a chunked labeled array from a prepared backing.
    ///
    /// # Errors
    ///
    /// Returns an [`ArrayError`] on a dims/coords/shape mismatch.
    pub fn from_chunked(
        backing: ChunkedBacking,
        dims: Vec<String>,
        coords: Vec<Vec<Coord>>,
    ) -> Result<Self, ArrayError> {
        check_labels(&backing.shape(), &dims, &coords)?;
        Ok(Self {
            backing: Backing::Chunked(backing),
            dims,
            coords,
            name: None,
        })
    }

    /// Splits an eager array into a chunked one along the named axis, with
    /// chunks of at most `chunk_len`.
    ///
    /// Useful for out-of-core-style processing of data that arrives in
    /// blocks, and for exercising the chunked execution path in tests.
    ///
    /// # Errors
    ///
    /// Returns an [`ArrayError`] if the axis is unknown, `chunk_len` is zero,
    /// or `self` is already chunked.
    pub fn rechunk(&self, axis: &str, chunk_len: usize) -> Result<Self, ArrayError> {
        let data = match &self.backing {
            Backing::Eager(d) => d,
            Backing::Chunked(_) => {
                return Err(ArrayError {
                    axis: axis.to_string(),
                    message: "rechunk of an already chunked array is not supported".to_string(),
                });
            }
        };
        if chunk_len == 0 {
            return Err(ArrayError {
                axis: axis.to_string(),
                message: "chunk length must be > 0".to_string(),
            });
        }
        let ax = self.axis_index(axis).ok_or_else(|| ArrayError {
            axis: axis.to_string(),
            message: "unknown axis".to_string(),
        })?;

        let mut blocks = Vec::new();
        let len = data.shape()[ax];
        let mut start = 0;
        while start < len {
            let end = (start + chunk_len).min(len);
            blocks.push(
                data.slice_axis(
                    Axis(ax),
                    ndarray::Slice::new(start as isize, Some(end as isize), 1),
                )
                .to_owned(),
            );
            start = end;
        }

        let backing = ChunkedBacking::from_arrays(ax, blocks)?;
        let mut out = Self::from_chunked(backing, self.dims.clone(), self.coords.clone())?;
        out.name = self.name.clone();
        Ok(out)
    }

    /// Axis names in storage order.
    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    /// Axis lengths in storage order.
    pub fn shape(&self) -> Vec<usize> {
        match &self.backing {
            Backing::Eager(d) => d.shape().to_vec(),
            Backing::Chunked(c) => c.shape(),
        }
    }

    /// Position of the named axis, if present.
    pub fn axis_index(&self, name: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == name)
    }

    /// Coordinate vector of the named axis, if present.
    pub fn coords(&self, name: &str) -> Option<&[Coord]> {
        self.axis_index(name).map(|i| self.coords[i].as_slice())
    }

    /// Optional array name (set by metric functions to the measure name).
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Sets the array name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Whether the array is backed by the lazy chunked engine.
    pub fn is_chunked(&self) -> bool {
        matches!(self.backing, Backing::Chunked(_))
    }

    /// The chunked backing, if the array is lazy.
    pub fn chunked_backing(&self) -> Option<&ChunkedBacking> {
        match &self.backing {
            Backing::Chunked(c) => Some(c),
            Backing::Eager(_) => None,
        }
    }

    /// The eager data buffer.
    ///
    /// # Errors
    ///
    /// Returns an [`ArrayError`] if the array is chunked; call
    /// [`LabeledArray::compute`] first.
    pub fn values(&self) -> Result<&ArrayD<f64>, ArrayError> {
        match &self.backing {
            Backing::Eager(d) => Ok(d),
            Backing::Chunked(_) => Err(ArrayError {
                axis: "array".to_string(),
                message: "array is chunked; call compute() to materialize it".to_string(),
            }),
        }
    }

    /// Materializes the array into an eager one.
    ///
    /// Chunk thunks are evaluated in order and concatenated along the chunk
    /// axis; an eager array is returned as a clone.
    ///
    /// # Errors
    ///
    /// Returns an [`ArrayError`] if a chunk evaluates to a shape different
    /// from its declared shape.
    pub fn compute(&self) -> Result<Self, ArrayError> {
        match &self.backing {
            Backing::Eager(_) => Ok(self.clone()),
            Backing::Chunked(c) => {
                let data = c.compute()?;
                let mut out = Self::new(data, self.dims.clone(), self.coords.clone())?;
                out.name = self.name.clone();
                Ok(out)
            }
        }
    }

    /// Applies a per-block transform to a chunked array without forcing
    /// computation.
    ///
    /// The caller declares the full output layout up front (`output_dims` and
    /// `output_coords`, which must include the chunk axis with its original
    /// coordinates) so the chunk graph can be planned without evaluating any
    /// block. `f` receives one input block at a time, with axes in `self`'s
    /// dim order, and must return a block with axes in `output_dims` order
    /// whose chunk-axis length equals the input block's.
    ///
    /// # Errors
    ///
    /// Returns an [`ArrayError`] if `self` is not chunked, the chunk axis is
    /// missing from `output_dims`, or the declared coords are inconsistent.
    pub fn map_blocks<F>(
        &self,
        output_dims: Vec<String>,
        output_coords: Vec<Vec<Coord>>,
        f: F,
    ) -> Result<Self, ArrayError>
    where
        F: Fn(ArrayD<f64>) -> ArrayD<f64> + Send + Sync + 'static,
    {
        let backing = match &self.backing {
            Backing::Chunked(c) => c,
            Backing::Eager(_) => {
                return Err(ArrayError {
                    axis: "array".to_string(),
                    message: "map_blocks requires a chunked array".to_string(),
                });
            }
        };
        if output_dims.len() != output_coords.len() {
            return Err(ArrayError {
                axis: "array".to_string(),
                message: "output dims and coords must have the same length".to_string(),
            });
        }

        let chunk_axis_name = &self.dims[backing.axis()];
        let out_axis = output_dims
            .iter()
            .position(|d| d == chunk_axis_name)
            .ok_or_else(|| ArrayError {
                axis: chunk_axis_name.clone(),
                message: "chunk axis must be preserved by map_blocks".to_string(),
            })?;

        // Output chunk shapes: declared coord lengths everywhere, except the
        // chunk axis which carries over each input chunk's extent.
        let out_axis_sizes: Vec<usize> = output_coords.iter().map(Vec::len).collect();
        let out_shapes: Vec<Vec<usize>> = backing
            .chunk_lens()
            .iter()
            .map(|&clen| {
                let mut s = out_axis_sizes.clone();
                s[out_axis] = clen;
                s
            })
            .collect();

        let mapped = backing.map(out_axis, out_shapes, f)?;
        Self::from_chunked(mapped, output_dims, output_coords)
    }
}

fn check_labels(shape: &[usize], dims: &[String], coords: &[Vec<Coord>]) -> Result<(), ArrayError> {
    if dims.len() != shape.len() || coords.len() != shape.len() {
        return Err(ArrayError {
            axis: "array".to_string(),
            message: format!(
                "rank {} does not match {} dims / {} coord vectors",
                shape.len(),
                dims.len(),
                coords.len()
            ),
        });
    }
    for (i, dim) in dims.iter().enumerate() {
        if coords[i].len() != shape[i] {
            return Err(ArrayError {
                axis: dim.clone(),
                message: format!(
                    "axis length {} does not match {} coordinates",
                    shape[i],
                    coords[i].len()
                ),
            });
        }
    }
    Ok(())
}

/// Builds numeric coordinates `0.0, 1.0, ..` for an axis of the given length.
pub fn range_coords(len: usize) -> Vec<Coord> {
    (0..len).map(|i| Coord::Num(i as f64)).collect()
}

/// Convenience constructor for an eager array from shape and flat values in
/// row-major order.
///
/// # Errors
///
/// Returns an [`ArrayError`] if the value count does not match the shape, or
/// the labels are inconsistent.
pub fn from_values(
    shape: &[usize],
    values: Vec<f64>,
    dims: Vec<String>,
    coords: Vec<Vec<Coord>>,
) -> Result<LabeledArray, ArrayError> {
    let data = ArrayD::from_shape_vec(IxDyn(shape), values).map_err(|e| ArrayError {
        axis: "array".to_string(),
        message: e.to_string(),
    })?;
    LabeledArray::new(data, dims, coords)
}
