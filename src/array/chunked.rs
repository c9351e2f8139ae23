//! Lazily evaluated chunked array backing.
//!
//! Data is split into blocks along a single axis; each block is produced on
//! demand by a thunk, so a pipeline of per-block transforms can be planned
//! and later evaluated without ever holding the full array in memory.

use std::fmt;
use std::sync::Arc;

use ndarray::{ArrayD, Axis};

use crate::array::ArrayError;

/// Produces one block of data on demand.
pub type ChunkThunk = Arc<dyn Fn() -> ArrayD<f64> + Send + Sync>;

/// Chunked storage: an ordered list of block thunks along one axis, with
/// every block's shape declared up front so downstream transforms can be
/// planned without forcing evaluation.
#[derive(Clone)]
pub struct ChunkedBacking {
    axis: usize,
    chunk_shapes: Vec<Vec<usize>>,
    thunks: Vec<ChunkThunk>,
}

impl fmt::Debug for ChunkedBacking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedBacking")
            .field("axis", &self.axis)
            .field("chunks", &self.chunk_shapes.len())
            .field("shape", &self.shape())
            .finish()
    }
}

impl ChunkedBacking {
    /// Creates a backing from declared chunk shapes and matching thunks.
    ///
    /// # Errors
    ///
    /// Returns an [`ArrayError`] if there are no chunks, the shape and thunk
    /// counts differ, or the chunk shapes disagree on any axis other than
    /// the chunk axis.
    pub fn new(
        axis: usize,
        chunk_shapes: Vec<Vec<usize>>,
        thunks: Vec<ChunkThunk>,
    ) -> Result<Self, ArrayError> {
        if chunk_shapes.is_empty() {
            return Err(ArrayError {
                axis: "chunks".to_string(),
                message: "at least one chunk is required".to_string(),
            });
        }
        if chunk_shapes.len() != thunks.len() {
            return Err(ArrayError {
                axis: "chunks".to_string(),
                message: format!(
                    "{} chunk shapes but {} thunks",
                    chunk_shapes.len(),
                    thunks.len()
                ),
            });
        }
        let first = &chunk_shapes[0];
        if axis >= first.len() {
            return Err(ArrayError {
                axis: "chunks".to_string(),
                message: format!("chunk axis {axis} out of range for rank {}", first.len()),
            });
        }
        for shape in &chunk_shapes[1..] {
            let consistent = shape.len() == first.len()
                && shape
                    .iter()
                    .zip(first.iter())
                    .enumerate()
                    .all(|(i, (a, b))| i == axis || a == b);
            if !consistent {
                return Err(ArrayError {
                    axis: "chunks".to_string(),
                    message: "chunk shapes disagree outside the chunk axis".to_string(),
                });
            }
        }
        Ok(Self {
            axis,
            chunk_shapes,
            thunks,
        })
    }

    /// Wraps in-memory blocks into a backing (each thunk clones its block).
    ///
    /// # Errors
    ///
    /// Returns an [`ArrayError`] under the same conditions as
    /// [`ChunkedBacking::new`].
    pub fn from_arrays(axis: usize, blocks: Vec<ArrayD<f64>>) -> Result<Self, ArrayError> {
        let chunk_shapes = blocks.iter().map(|b| b.shape().to_vec()).collect();
        let thunks = blocks
            .into_iter()
            .map(|b| {
                let thunk: ChunkThunk = Arc::new(move || b.clone());
                thunk
            })
            .collect();
        Self::new(axis, chunk_shapes, thunks)
    }

    /// The chunked axis position.
    pub fn axis(&self) -> usize {
        self.axis
    }

    /// Per-chunk extents along the chunk axis.
    pub fn chunk_lens(&self) -> Vec<usize> {
        self.chunk_shapes.iter().map(|s| s[self.axis]).collect()
    }

    /// Combined shape of all chunks.
    pub fn shape(&self) -> Vec<usize> {
        let mut shape = self.chunk_shapes[0].clone();
        shape[self.axis] = self.chunk_lens().iter().sum();
        shape
    }

    /// Plans a per-block transform without evaluating any chunk.
    ///
    /// `out_axis` is the chunk axis position in the transformed blocks and
    /// `out_shapes` their declared shapes (one per input chunk). Evaluation
    /// of the returned backing runs the original thunk and `f` per block.
    ///
    /// # Errors
    ///
    /// Returns an [`ArrayError`] if the declared output shapes are
    /// inconsistent.
    pub fn map<F>(
        &self,
        out_axis: usize,
        out_shapes: Vec<Vec<usize>>,
        f: F,
    ) -> Result<Self, ArrayError>
    where
        F: Fn(ArrayD<f64>) -> ArrayD<f64> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let thunks = self
            .thunks
            .iter()
            .map(|thunk| {
                let thunk = Arc::clone(thunk);
                let f = Arc::clone(&f);
                let wrapped: ChunkThunk = Arc::new(move || f(thunk()));
                wrapped
            })
            .collect();
        Self::new(out_axis, out_shapes, thunks)
    }

    /// Evaluates chunks one at a time, verifying each against its declared
    /// shape.
    ///
    /// Lets reductions consume the array block-by-block without ever holding
    /// more than one materialized chunk.
    pub fn evaluated(&self) -> impl Iterator<Item = Result<ArrayD<f64>, ArrayError>> + '_ {
        self.thunks
            .iter()
            .zip(&self.chunk_shapes)
            .map(|(thunk, declared)| {
                let block = thunk();
                if block.shape() != declared.as_slice() {
                    return Err(ArrayError {
                        axis: "chunks".to_string(),
                        message: format!(
                            "chunk evaluated to shape {:?}, declared {:?}",
                            block.shape(),
                            declared
                        ),
                    });
                }
                Ok(block)
            })
    }

    /// Evaluates every chunk in order and concatenates along the chunk axis.
    ///
    /// # Errors
    ///
    /// Returns an [`ArrayError`] if any chunk evaluates to a shape different
    /// from its declared shape, or the blocks cannot be concatenated.
    pub fn compute(&self) -> Result<ArrayD<f64>, ArrayError> {
        let mut blocks = Vec::with_capacity(self.thunks.len());
        for block in self.evaluated() {
            blocks.push(block?);
        }
        let views: Vec<_> = blocks.iter().map(ArrayD::view).collect();
        ndarray::concatenate(Axis(self.axis), &views).map_err(|e| ArrayError {
            axis: "chunks".to_string(),
            message: e.to_string(),
        })
    }
}
