//! Feature abstractions for factorprep.
//!
//! # Overview
//!
//! - [`FeatureKind`]: Whether a slot is numerical or categorical.
//! - [`CategoryValue`]: A raw categorical value, totally ordered.
//! - [`FeatureSlot`]: Where a fitted column lives in the global index space.
//! - [`ColumnSplit`]: A partition of an attribute block into user-side and
//!   item-side columns, and the reindexing that undoes it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};
use crate::ids::FeatureIdx;

/// The kind of a feature slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    /// One global index per column; the value is the raw number.
    Numerical,
    /// One global index per distinct value; the value is always `1.0`.
    Categorical,
}

/// A raw categorical value.
///
/// Values compare by their natural ordering: every `Int` sorts before every
/// `Str`, integers numerically, strings lexicographically. Vocabularies are
/// assigned in this order, which makes fitting reproducible.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CategoryValue {
    /// An integer category, e.g. an age bucket or an occupation code.
    Int(i64),
    /// A string category, e.g. a genre.
    Str(String),
}

impl From<i64> for CategoryValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for CategoryValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<&str> for CategoryValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for CategoryValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl fmt::Display for CategoryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
        }
    }
}

/// A fitted feature slot.
///
/// Numerical slots have width 1. Categorical slots are as wide as the number
/// of distinct values seen during fit, which may be zero.
///
/// # Examples
///
/// ```
/// use factorprep_core::feature::{FeatureKind, FeatureSlot};
///
/// let slot = FeatureSlot::new("genre", FeatureKind::Categorical, 3, 4);
/// assert_eq!(slot.offset(), 3);
/// assert_eq!(slot.end(), 7);
/// assert!(slot.contains(6));
/// assert!(!slot.contains(7));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSlot {
    name: String,
    kind: FeatureKind,
    offset: FeatureIdx,
    width: usize,
}

impl FeatureSlot {
    /// Creates a new slot descriptor.
    pub fn new(name: impl Into<String>, kind: FeatureKind, offset: FeatureIdx, width: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            offset,
            width,
        }
    }

    /// Returns the column name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the slot kind.
    #[inline]
    pub fn kind(&self) -> FeatureKind {
        self.kind
    }

    /// Returns the first global index of the slot.
    #[inline]
    pub fn offset(&self) -> FeatureIdx {
        self.offset
    }

    /// Returns the number of global indices the slot occupies.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the end of the slot's block (exclusive).
    #[inline]
    pub fn end(&self) -> usize {
        self.offset as usize + self.width
    }

    /// Returns `true` if `idx` falls inside the slot's block.
    #[inline]
    pub fn contains(&self, idx: FeatureIdx) -> bool {
        idx >= self.offset && (idx as usize) < self.end()
    }
}

/// A partition of an attribute block into user-side and item-side columns.
///
/// `user_cols` and `item_cols` hold original column positions. Together they
/// must be a permutation of `0..n`. Rows assembled as `user ++ item` are put
/// back into original order by gathering with [`ColumnSplit::reindex`], which
/// is `argsort(user_cols ++ item_cols)`.
///
/// # Examples
///
/// ```
/// use factorprep_core::feature::ColumnSplit;
///
/// let split = ColumnSplit::new(vec![0, 3], vec![1, 2]).unwrap();
/// assert_eq!(split.reindex(), &[0, 2, 3, 1]);
///
/// let mut row = [0u32; 4];
/// split.merge_into(&[10, 13], &[11, 12], &mut row);
/// assert_eq!(row, [10, 11, 12, 13]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSplit {
    user_cols: Vec<usize>,
    item_cols: Vec<usize>,
    reindex: Vec<usize>,
}

impl ColumnSplit {
    /// Creates a split, validating that it covers every column exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`PrepError::InvalidColumnSplit`] if a position repeats or the
    /// positions are not contiguous from zero.
    pub fn new(user_cols: Vec<usize>, item_cols: Vec<usize>) -> Result<Self> {
        let n = user_cols.len() + item_cols.len();
        let mut seen = vec![false; n];
        for &col in user_cols.iter().chain(item_cols.iter()) {
            if col >= n {
                return Err(PrepError::InvalidColumnSplit {
                    message: format!("column {col} outside block of width {n}"),
                });
            }
            if seen[col] {
                return Err(PrepError::InvalidColumnSplit {
                    message: format!("column {col} assigned twice"),
                });
            }
            seen[col] = true;
        }

        let orig: Vec<usize> = user_cols.iter().chain(item_cols.iter()).copied().collect();
        let mut reindex: Vec<usize> = (0..n).collect();
        reindex.sort_by_key(|&p| orig[p]);

        Ok(Self {
            user_cols,
            item_cols,
            reindex,
        })
    }

    /// A split with every column on the user side.
    pub fn all_user(n: usize) -> Self {
        Self {
            user_cols: (0..n).collect(),
            item_cols: Vec::new(),
            reindex: (0..n).collect(),
        }
    }

    /// Returns the user-side column positions.
    #[inline]
    pub fn user_cols(&self) -> &[usize] {
        &self.user_cols
    }

    /// Returns the item-side column positions.
    #[inline]
    pub fn item_cols(&self) -> &[usize] {
        &self.item_cols
    }

    /// Returns the total number of columns in the block.
    #[inline]
    pub fn width(&self) -> usize {
        self.reindex.len()
    }

    /// Returns `argsort(user_cols ++ item_cols)`.
    #[inline]
    pub fn reindex(&self) -> &[usize] {
        &self.reindex
    }

    /// Writes one reconciled row from its user-side and item-side halves.
    ///
    /// # Panics
    ///
    /// Panics if the slice lengths disagree with the split.
    pub fn merge_into<T: Copy>(&self, user_row: &[T], item_row: &[T], out: &mut [T]) {
        assert_eq!(user_row.len(), self.user_cols.len(), "user row width");
        assert_eq!(item_row.len(), self.item_cols.len(), "item row width");
        assert_eq!(out.len(), self.width(), "output row width");

        let n_user = user_row.len();
        for (dst, &src) in out.iter_mut().zip(self.reindex.iter()) {
            *dst = if src < n_user {
                user_row[src]
            } else {
                item_row[src - n_user]
            };
        }
    }
}
