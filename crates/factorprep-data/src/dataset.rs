//! Positive interactions with their attribute blocks.
//!
//! An [`InteractionDataset`] is what the negative sampler expands: one row per
//! observed `(user, item)` pair, a sparse block of global indices, and an
//! optional dense block of values. Each block carries a [`ColumnSplit`]
//! saying which of its columns describe the user and which the item.

use factorprep_core::{
    check_item, check_user, ColumnSplit, FeatureIdx, ItemId, PrepError, Result, UserId,
};
use ndarray::{Array2, ArrayView1, Axis};

use crate::encoded::EncodedFeatures;
use crate::indexer::{FeatureIndex, IdentityColumns, IDENTITY_SLOTS};

/// A dense attribute block and its user/item split.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseBlock {
    values: Array2<f32>,
    split: ColumnSplit,
}

impl DenseBlock {
    /// Returns the values.
    #[inline]
    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    /// Returns the column split.
    #[inline]
    pub fn split(&self) -> &ColumnSplit {
        &self.split
    }
}

/// Positive interactions and their aligned attribute blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionDataset {
    users: Vec<UserId>,
    items: Vec<ItemId>,
    sparse: Array2<FeatureIdx>,
    sparse_split: ColumnSplit,
    dense: Option<DenseBlock>,
    n_users: usize,
    n_items: usize,
}

impl InteractionDataset {
    /// Creates a dataset from identifiers and a sparse block.
    ///
    /// # Errors
    ///
    /// Misaligned row counts, a split that does not match the block width, or
    /// an identifier outside `[0, n_users)` / `[0, n_items)`.
    pub fn new(
        users: Vec<UserId>,
        items: Vec<ItemId>,
        sparse: Array2<FeatureIdx>,
        sparse_split: ColumnSplit,
        n_users: usize,
        n_items: usize,
    ) -> Result<Self> {
        check_rows("item", users.len(), items.len())?;
        check_rows("sparse", users.len(), sparse.nrows())?;
        check_width("sparse", &sparse_split, sparse.ncols())?;
        for &u in &users {
            check_user(u, n_users)?;
        }
        for &i in &items {
            check_item(i, n_items)?;
        }

        Ok(Self {
            users,
            items,
            sparse,
            sparse_split,
            dense: None,
            n_users,
            n_items,
        })
    }

    /// Attaches a dense block.
    pub fn with_dense(mut self, values: Array2<f32>, split: ColumnSplit) -> Result<Self> {
        check_rows("dense", self.users.len(), values.nrows())?;
        check_width("dense", &split, values.ncols())?;
        self.dense = Some(DenseBlock { values, split });
        Ok(self)
    }

    /// Builds a dataset from a fitted encoding.
    ///
    /// Categorical slots form the sparse block and numerical slots the dense
    /// block. Columns named in `item_columns` are item-side, every other
    /// column user-side. Identity slots are not copied: the raw identifiers
    /// travel alongside the blocks instead.
    ///
    /// # Errors
    ///
    /// An unknown name in `item_columns`, an encoding whose width does not
    /// match `index`, or any error of [`InteractionDataset::new`].
    pub fn from_encoded(
        index: &FeatureIndex,
        encoded: &EncodedFeatures,
        ids: &IdentityColumns,
        item_columns: &[&str],
        n_users: usize,
        n_items: usize,
    ) -> Result<Self> {
        if encoded.n_cols() != index.n_cols() {
            return Err(PrepError::config(format!(
                "encoding has {} columns, index expects {}",
                encoded.n_cols(),
                index.n_cols()
            )));
        }
        for name in item_columns {
            let known = index
                .slots()
                .iter()
                .any(|s| s.name() == *name && !IDENTITY_SLOTS.contains(name));
            if !known {
                return Err(PrepError::config(format!("unknown item column '{name}'")));
            }
        }

        let n_num = index.numerical_columns().len();
        let n_cat = index.vocabularies().len();
        let is_item = |name: &str| item_columns.iter().any(|c| *c == name);

        let cat_names = index.vocabularies().iter().map(|v| v.column());
        let sparse_split = split_by(cat_names, is_item)?;
        let sparse_cols: Vec<usize> = (n_num..n_num + n_cat).collect();
        let sparse = encoded.indices().select(Axis(1), &sparse_cols);

        let dataset = Self::new(
            ids.users().to_vec(),
            ids.items().to_vec(),
            sparse,
            sparse_split,
            n_users,
            n_items,
        )?;

        if n_num == 0 {
            return Ok(dataset);
        }
        let num_names = index.numerical_columns().iter().map(String::as_str);
        let dense_split = split_by(num_names, is_item)?;
        let dense_cols: Vec<usize> = (0..n_num).collect();
        let dense = encoded.values().select(Axis(1), &dense_cols);
        dataset.with_dense(dense, dense_split)
    }

    /// Number of interactions.
    #[inline]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns `true` if there are no interactions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// User of each interaction.
    #[inline]
    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    /// Item of each interaction.
    #[inline]
    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    /// The sparse block.
    #[inline]
    pub fn sparse(&self) -> &Array2<FeatureIdx> {
        &self.sparse
    }

    /// The sparse block's column split.
    #[inline]
    pub fn sparse_split(&self) -> &ColumnSplit {
        &self.sparse_split
    }

    /// The dense block, if any.
    #[inline]
    pub fn dense(&self) -> Option<&DenseBlock> {
        self.dense.as_ref()
    }

    /// Number of known users.
    #[inline]
    pub fn n_users(&self) -> usize {
        self.n_users
    }

    /// Number of known items.
    #[inline]
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Row `r` of the sparse block.
    #[inline]
    pub fn sparse_row(&self, r: usize) -> ArrayView1<'_, FeatureIdx> {
        self.sparse.row(r)
    }
}

/// Partitions named columns into user-side and item-side positions.
fn split_by<'a>(
    names: impl Iterator<Item = &'a str>,
    is_item: impl Fn(&str) -> bool,
) -> Result<ColumnSplit> {
    let mut user_cols = Vec::new();
    let mut item_cols = Vec::new();
    for (pos, name) in names.enumerate() {
        if is_item(name) {
            item_cols.push(pos);
        } else {
            user_cols.push(pos);
        }
    }
    ColumnSplit::new(user_cols, item_cols)
}

fn check_rows(column: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(PrepError::LengthMismatch {
            column: column.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

fn check_width(block: &str, split: &ColumnSplit, width: usize) -> Result<()> {
    if split.width() != width {
        return Err(PrepError::InvalidColumnSplit {
            message: format!(
                "{block} split covers {} columns, block has {width}",
                split.width()
            ),
        });
    }
    Ok(())
}
