//! Fixed-width `(index, value)` encodings.
//!
//! An [`EncodedFeatures`] holds one row per example and one column per slot.
//! Every row of a dataset shares the same layout: numerical slots first, then
//! categorical slots, then the identity slots when enabled.

use factorprep_core::{FeatureIdx, PrepError, Result};
use ndarray::{Array2, ArrayView1, Axis};

/// Row-aligned global indices and values.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFeatures {
    indices: Array2<FeatureIdx>,
    values: Array2<f32>,
}

impl EncodedFeatures {
    /// Pairs an index array with a value array of the same shape.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the shapes differ.
    pub fn new(indices: Array2<FeatureIdx>, values: Array2<f32>) -> Result<Self> {
        if indices.dim() != values.dim() {
            return Err(PrepError::config(format!(
                "index shape {:?} does not match value shape {:?}",
                indices.dim(),
                values.dim()
            )));
        }
        Ok(Self { indices, values })
    }

    /// Returns the number of examples.
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.indices.nrows()
    }

    /// Returns the number of slots per example.
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.indices.ncols()
    }

    /// Returns the global index array.
    #[inline]
    pub fn indices(&self) -> &Array2<FeatureIdx> {
        &self.indices
    }

    /// Returns the value array.
    #[inline]
    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    /// Returns row `k` as `(indices, values)`.
    ///
    /// # Panics
    ///
    /// Panics if `k` is out of bounds.
    pub fn row(&self, k: usize) -> (ArrayView1<'_, FeatureIdx>, ArrayView1<'_, f32>) {
        (self.indices.row(k), self.values.row(k))
    }

    /// Returns a copy restricted to the given columns, in the given order.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a column is out of range.
    pub fn select_columns(&self, cols: &[usize]) -> Result<Self> {
        if let Some(&bad) = cols.iter().find(|&&c| c >= self.n_cols()) {
            return Err(PrepError::config(format!(
                "column {bad} out of range for width {}",
                self.n_cols()
            )));
        }
        Ok(Self {
            indices: self.indices.select(Axis(1), cols),
            values: self.values.select(Axis(1), cols),
        })
    }

    /// Consumes the encoding and returns `(indices, values)`.
    pub fn into_parts(self) -> (Array2<FeatureIdx>, Array2<f32>) {
        (self.indices, self.values)
    }
}
