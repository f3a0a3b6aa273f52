//! Per-column vocabularies for categorical slots.
//!
//! A [`Vocabulary`] assigns each distinct value of one training column a
//! unique global index. Values are numbered in ascending order starting at
//! the column's block offset, so fitting the same column twice yields the
//! same mapping. Once built the vocabulary never changes size.
//!
//! # Example
//!
//! ```
//! use factorprep_core::CategoryValue;
//! use factorprep_data::vocabulary::{Lookup, Vocabulary};
//!
//! let column: Vec<CategoryValue> = ["b", "a", "b"].into_iter().map(Into::into).collect();
//! let vocab = Vocabulary::fit("genre", &column, 10).unwrap();
//!
//! assert_eq!(vocab.len(), 2);
//! assert_eq!(vocab.lookup(&"a".into()), Lookup::Found(10));
//! assert_eq!(vocab.lookup(&"b".into()), Lookup::Found(11));
//! assert_eq!(vocab.lookup(&"z".into()), Lookup::NotFound);
//! assert_eq!(vocab.resolve(&"z".into(), 99), 99);
//! ```

use std::collections::BTreeSet;

use factorprep_core::{to_feature_idx, CategoryValue, FeatureIdx, PrepError, Result};
use serde::{Deserialize, Serialize};

/// Result of looking a raw value up in a [`Vocabulary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// The value was seen during fit and owns this global index.
    Found(FeatureIdx),
    /// The value was not seen during fit.
    NotFound,
}

impl Lookup {
    /// Returns the found index, or `oov` for an unseen value.
    #[inline]
    pub fn unwrap_or_oov(self, oov: FeatureIdx) -> FeatureIdx {
        match self {
            Lookup::Found(idx) => idx,
            Lookup::NotFound => oov,
        }
    }

    /// Returns `true` for [`Lookup::Found`].
    #[inline]
    pub fn is_found(self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

/// Frozen mapping from one categorical column's raw values to global indices.
///
/// Values are kept sorted; the index of the value at position `p` is
/// `offset + p`, so the block `[offset, offset + len)` is covered exactly once.
///
/// Deserialization re-checks that the values are strictly ascending and that
/// the block fits the index type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawVocabulary")]
pub struct Vocabulary {
    column: String,
    offset: FeatureIdx,
    values: Vec<CategoryValue>,
}

/// Unchecked serde form of [`Vocabulary`].
#[derive(Deserialize)]
struct RawVocabulary {
    column: String,
    offset: FeatureIdx,
    values: Vec<CategoryValue>,
}

impl TryFrom<RawVocabulary> for Vocabulary {
    type Error = PrepError;

    fn try_from(raw: RawVocabulary) -> Result<Self> {
        if let Some(pair) = raw.values.windows(2).find(|w| w[0] >= w[1]) {
            return Err(PrepError::config(format!(
                "vocabulary '{}' is not strictly ascending at {} -> {}",
                raw.column, pair[0], pair[1]
            )));
        }
        to_feature_idx(raw.offset as usize + raw.values.len())?;
        Ok(Self {
            column: raw.column,
            offset: raw.offset,
            values: raw.values,
        })
    }
}

impl Vocabulary {
    /// Builds the vocabulary of `values`, numbering from `offset`.
    ///
    /// An empty column yields an empty vocabulary.
    ///
    /// # Errors
    ///
    /// Returns [`PrepError::IndexOverflow`] if the block runs past the index
    /// type.
    ///
    /// [`PrepError::IndexOverflow`]: factorprep_core::PrepError::IndexOverflow
    pub fn fit(column: impl Into<String>, values: &[CategoryValue], offset: FeatureIdx) -> Result<Self> {
        let distinct: BTreeSet<&CategoryValue> = values.iter().collect();
        to_feature_idx(offset as usize + distinct.len())?;

        Ok(Self {
            column: column.into(),
            offset,
            values: distinct.into_iter().cloned().collect(),
        })
    }

    /// Returns the column this vocabulary was fitted on.
    #[inline]
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Returns the first index of the block.
    #[inline]
    pub fn offset(&self) -> FeatureIdx {
        self.offset
    }

    /// Returns the number of distinct values, which is the block width.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the training column had no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Looks up a raw value.
    pub fn lookup(&self, value: &CategoryValue) -> Lookup {
        match self.values.binary_search(value) {
            Ok(pos) => Lookup::Found(self.offset + pos as FeatureIdx),
            Err(_) => Lookup::NotFound,
        }
    }

    /// Looks up a raw value, falling back to `oov` when unseen.
    #[inline]
    pub fn resolve(&self, value: &CategoryValue, oov: FeatureIdx) -> FeatureIdx {
        self.lookup(value).unwrap_or_oov(oov)
    }

    /// Iterates `(value, index)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (&CategoryValue, FeatureIdx)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(pos, v)| (v, self.offset + pos as FeatureIdx))
    }
}
