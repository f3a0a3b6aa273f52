//! Row-aligned training batches.
//!
//! A [`TrainingBatch`] is the sampler's output: for each positive interaction,
//! one positive row followed by `num_neg` negative rows. Every array in the
//! batch has one entry per row, and row `k` of each array always describes
//! the same synthetic example, before and after shuffling.
//!
//! # Example
//!
//! ```
//! use factorprep_data::batch::labels;
//!
//! let labels = labels(2, 2);
//! assert_eq!(labels.to_vec(), vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
//! ```

use std::ops::Range;

use factorprep_core::{FeatureIdx, ItemId, PrepError, Result, UserId};
use ndarray::{s, Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;

/// Labels for `n_positive` groups of one positive and `num_neg` negatives.
///
/// `1.0` at every index that is a multiple of `num_neg + 1`, `0.0` elsewhere.
pub fn labels(n_positive: usize, num_neg: usize) -> Array1<f32> {
    let group = num_neg + 1;
    Array1::from_shape_fn(n_positive * group, |k| if k % group == 0 { 1.0 } else { 0.0 })
}

/// A batch of positive and negative training rows.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingBatch {
    users: Array1<UserId>,
    items: Array1<ItemId>,
    sparse: Array2<FeatureIdx>,
    dense: Option<Array2<f32>>,
    labels: Array1<f32>,
}

impl TrainingBatch {
    /// Creates a batch, checking that every array has the same row count.
    pub fn new(
        users: Array1<UserId>,
        items: Array1<ItemId>,
        sparse: Array2<FeatureIdx>,
        dense: Option<Array2<f32>>,
        labels: Array1<f32>,
    ) -> Result<Self> {
        let rows = labels.len();
        let mut counts = vec![
            ("user", users.len()),
            ("item", items.len()),
            ("sparse", sparse.nrows()),
        ];
        if let Some(d) = &dense {
            counts.push(("dense", d.nrows()));
        }
        for (column, actual) in counts {
            if actual != rows {
                return Err(PrepError::LengthMismatch {
                    column: column.to_string(),
                    expected: rows,
                    actual,
                });
            }
        }

        Ok(Self {
            users,
            items,
            sparse,
            dense,
            labels,
        })
    }

    /// Number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns `true` if the batch has no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// User of each row.
    #[inline]
    pub fn users(&self) -> &Array1<UserId> {
        &self.users
    }

    /// Item of each row; the positive item or a sampled negative.
    #[inline]
    pub fn items(&self) -> &Array1<ItemId> {
        &self.items
    }

    /// Sparse global indices, one row per example.
    #[inline]
    pub fn sparse(&self) -> &Array2<FeatureIdx> {
        &self.sparse
    }

    /// Dense values, if they were requested.
    #[inline]
    pub fn dense(&self) -> Option<&Array2<f32>> {
        self.dense.as_ref()
    }

    /// `1.0` for positive rows, `0.0` for negative rows.
    #[inline]
    pub fn labels(&self) -> &Array1<f32> {
        &self.labels
    }

    /// Reorders every array by the same permutation: new row `k` is old row `perm[k]`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `perm` is not a permutation of
    /// `0..len`.
    pub fn permute(&mut self, perm: &[usize]) -> Result<()> {
        let n = self.len();
        if perm.len() != n {
            return Err(PrepError::config(format!(
                "permutation has {} entries, batch has {n} rows",
                perm.len()
            )));
        }
        let mut seen = vec![false; n];
        for &p in perm {
            if p >= n || std::mem::replace(&mut seen[p], true) {
                return Err(PrepError::config(format!("{p} breaks the permutation")));
            }
        }
        self.apply_perm(perm);
        Ok(())
    }

    /// Shuffles all rows with one random permutation and returns it.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<usize> {
        let mut perm: Vec<usize> = (0..self.len()).collect();
        perm.shuffle(rng);
        self.apply_perm(&perm);
        perm
    }

    /// `perm` must be a permutation of `0..len`.
    fn apply_perm(&mut self, perm: &[usize]) {
        self.users = self.users.select(Axis(0), perm);
        self.items = self.items.select(Axis(0), perm);
        self.sparse = self.sparse.select(Axis(0), perm);
        self.dense = self.dense.as_ref().map(|d| d.select(Axis(0), perm));
        self.labels = self.labels.select(Axis(0), perm);
    }

    /// Copies the rows in `range`.
    ///
    /// # Panics
    ///
    /// Panics if `range` exceeds the batch.
    pub fn slice(&self, range: Range<usize>) -> Self {
        let (a, b) = (range.start, range.end);
        Self {
            users: self.users.slice(s![a..b]).to_owned(),
            items: self.items.slice(s![a..b]).to_owned(),
            sparse: self.sparse.slice(s![a..b, ..]).to_owned(),
            dense: self.dense.as_ref().map(|d| d.slice(s![a..b, ..]).to_owned()),
            labels: self.labels.slice(s![a..b]).to_owned(),
        }
    }

    /// Iterates consecutive mini-batches of at most `batch_size` rows.
    ///
    /// A `batch_size` of zero is treated as one.
    pub fn mini_batches(&self, batch_size: usize) -> MiniBatches<'_> {
        MiniBatches {
            batch: self,
            batch_size: batch_size.max(1),
            pos: 0,
        }
    }

    /// Consumes the batch and returns `(users, items, sparse, dense, labels)`.
    #[allow(clippy::type_complexity)]
    pub fn into_parts(
        self,
    ) -> (
        Array1<UserId>,
        Array1<ItemId>,
        Array2<FeatureIdx>,
        Option<Array2<f32>>,
        Array1<f32>,
    ) {
        (self.users, self.items, self.sparse, self.dense, self.labels)
    }
}

/// Iterator over consecutive mini-batches of a [`TrainingBatch`].
#[derive(Debug)]
pub struct MiniBatches<'a> {
    batch: &'a TrainingBatch,
    batch_size: usize,
    pos: usize,
}

impl Iterator for MiniBatches<'_> {
    type Item = TrainingBatch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.batch.len() {
            return None;
        }
        let end = (self.pos + self.batch_size).min(self.batch.len());
        let out = self.batch.slice(self.pos..end);
        self.pos = end;
        Some(out)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.batch.len() - self.pos;
        let n = remaining.div_ceil(self.batch_size);
        (n, Some(n))
    }
}

impl ExactSizeIterator for MiniBatches<'_> {}
