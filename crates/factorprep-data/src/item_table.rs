//! Per-item attribute rows.
//!
//! When an interaction's item is swapped for a sampled negative, the item-side
//! columns have to be swapped too. An [`ItemFeatureTable`] holds, for every
//! item identifier, the item-side sparse indices and dense values.

use factorprep_core::{FeatureIdx, ItemId, PrepError, Result};
use ndarray::{Array2, ArrayView1};

use crate::dataset::InteractionDataset;

/// Item-side attribute rows indexed by item identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFeatureTable {
    sparse: Array2<FeatureIdx>,
    dense: Option<Array2<f32>>,
}

impl ItemFeatureTable {
    /// Wraps caller-built tables; row `i` belongs to item `i`.
    pub fn new(sparse: Array2<FeatureIdx>, dense: Option<Array2<f32>>) -> Result<Self> {
        if let Some(d) = &dense {
            if d.nrows() != sparse.nrows() {
                return Err(PrepError::LengthMismatch {
                    column: "item dense".to_string(),
                    expected: sparse.nrows(),
                    actual: d.nrows(),
                });
            }
        }
        Ok(Self { sparse, dense })
    }

    /// Collects the item-side columns of every item in `dataset`.
    ///
    /// When an item occurs in several rows, its last row wins. Items that
    /// never occur get `oov` in every sparse column and `0.0` in every dense
    /// column.
    ///
    /// # Examples
    ///
    /// ```
    /// use factorprep_core::ColumnSplit;
    /// use factorprep_data::dataset::InteractionDataset;
    /// use factorprep_data::item_table::ItemFeatureTable;
    /// use ndarray::array;
    ///
    /// let split = ColumnSplit::new(vec![0], vec![1]).unwrap();
    /// let dataset =
    ///     InteractionDataset::new(vec![0, 1], vec![2, 0], array![[5u32, 8], [6, 7]], split, 2, 3)
    ///         .unwrap();
    /// let table = ItemFeatureTable::from_dataset(&dataset, 9);
    ///
    /// assert_eq!(table.sparse_row(0).to_vec(), vec![7]);
    /// assert_eq!(table.sparse_row(1).to_vec(), vec![9]);
    /// assert_eq!(table.sparse_row(2).to_vec(), vec![8]);
    /// ```
    pub fn from_dataset(dataset: &InteractionDataset, oov: FeatureIdx) -> Self {
        let n_items = dataset.n_items();
        let item_cols = dataset.sparse_split().item_cols();
        let mut sparse = Array2::from_elem((n_items, item_cols.len()), oov);
        for (r, &item) in dataset.items().iter().enumerate() {
            let src = dataset.sparse().row(r);
            for (dst, &c) in sparse.row_mut(item as usize).iter_mut().zip(item_cols) {
                *dst = src[c];
            }
        }

        let dense = dataset.dense().map(|block| {
            let item_cols = block.split().item_cols();
            let mut dense = Array2::zeros((n_items, item_cols.len()));
            for (r, &item) in dataset.items().iter().enumerate() {
                let src = block.values().row(r);
                for (dst, &c) in dense.row_mut(item as usize).iter_mut().zip(item_cols) {
                    *dst = src[c];
                }
            }
            dense
        });

        Self { sparse, dense }
    }

    /// Number of items the table covers.
    #[inline]
    pub fn n_items(&self) -> usize {
        self.sparse.nrows()
    }

    /// Item-side sparse width.
    #[inline]
    pub fn sparse_width(&self) -> usize {
        self.sparse.ncols()
    }

    /// Item-side dense width, if the table has a dense part.
    #[inline]
    pub fn dense_width(&self) -> Option<usize> {
        self.dense.as_ref().map(|d| d.ncols())
    }

    /// Item-side sparse indices of `item`.
    ///
    /// # Panics
    ///
    /// Panics if `item` is outside the table.
    #[inline]
    pub fn sparse_row(&self, item: ItemId) -> ArrayView1<'_, FeatureIdx> {
        self.sparse.row(item as usize)
    }

    /// Item-side dense values of `item`, if the table has a dense part.
    #[inline]
    pub fn dense_row(&self, item: ItemId) -> Option<ArrayView1<'_, f32>> {
        self.dense.as_ref().map(|d| d.row(item as usize))
    }
}
