//! Feature indexing into one shared global index space.
//!
//! The [`FeatureIndexer`] fits a [`FeatureIndex`] from training columns and
//! encodes them; the frozen [`FeatureIndex`] then encodes new data with the
//! same layout.
//!
//! # Index space layout
//!
//! Blocks are assigned in a fixed order:
//!
//! 1. one index per numerical column,
//! 2. one block per categorical column, as wide as its distinct values,
//! 3. optionally a user-identity block (`n_users` wide),
//! 4. then an item-identity block (`n_items` wide).
//!
//! The running total after all blocks is `feature_size`, which is also the
//! index given to categorical values never seen during fit.
//!
//! # Example
//!
//! ```
//! use factorprep_core::IndexerConfig;
//! use factorprep_data::indexer::{FeatureColumns, FeatureIndexer};
//!
//! let train = FeatureColumns::new(3)
//!     .numerical("age", vec![0.1, 0.5, 0.9])
//!     .categorical("genre", ["drama", "comedy", "drama"]);
//!
//! let indexer = FeatureIndexer::new(IndexerConfig::new()).unwrap();
//! let (index, encoded) = indexer.fit(&train, None).unwrap();
//! assert_eq!(index.feature_size(), 3);
//! assert_eq!(encoded.indices().row(0).to_vec(), vec![0, 2]);
//!
//! let test = FeatureColumns::new(1)
//!     .numerical("age", vec![0.3])
//!     .categorical("genre", ["horror"]);
//! let encoded = index.transform(&test, None).unwrap();
//! assert_eq!(encoded.indices().row(0).to_vec(), vec![0, 3]);
//! ```

use std::collections::HashSet;

use factorprep_core::{
    check_item, check_user, to_feature_idx, CategoryValue, FeatureIdx, FeatureKind, FeatureSlot,
    IndexerConfig, ItemId, PrepError, Result, UserId,
};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::encoded::EncodedFeatures;
use crate::vocabulary::{Lookup, Vocabulary};

/// Slot names of the user and item identity blocks.
pub(crate) const IDENTITY_SLOTS: [&str; 2] = ["user", "item"];

/// Named raw columns with a declared row count.
///
/// Numerical and categorical columns are kept in declaration order within
/// their group; that order fixes the slot order of the encoding.
#[derive(Debug, Clone, Default)]
pub struct FeatureColumns {
    n_rows: usize,
    numerical: Vec<(String, Vec<f32>)>,
    categorical: Vec<(String, Vec<CategoryValue>)>,
}

impl FeatureColumns {
    /// Creates an empty column set declaring `n_rows` examples.
    pub fn new(n_rows: usize) -> Self {
        Self {
            n_rows,
            ..Default::default()
        }
    }

    /// Appends a numerical column.
    pub fn numerical(mut self, name: impl Into<String>, values: Vec<f32>) -> Self {
        self.numerical.push((name.into(), values));
        self
    }

    /// Appends a categorical column.
    pub fn categorical<V, I>(mut self, name: impl Into<String>, values: I) -> Self
    where
        V: Into<CategoryValue>,
        I: IntoIterator<Item = V>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.categorical.push((name.into(), values));
        self
    }

    /// Returns the declared number of examples.
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Returns the numerical column names in order.
    pub fn numerical_names(&self) -> Vec<String> {
        self.numerical.iter().map(|(n, _)| n.clone()).collect()
    }

    /// Returns the categorical column names in order.
    pub fn categorical_names(&self) -> Vec<String> {
        self.categorical.iter().map(|(n, _)| n.clone()).collect()
    }

    /// Checks lengths against the declared row count and rejects repeated
    /// names and the names reserved for the identity blocks.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        let lengths = self
            .numerical
            .iter()
            .map(|(n, v)| (n, v.len()))
            .chain(self.categorical.iter().map(|(n, v)| (n, v.len())));

        for (name, len) in lengths {
            if IDENTITY_SLOTS.contains(&name.as_str()) {
                return Err(PrepError::config(format!(
                    "column name '{name}' is reserved for identity blocks"
                )));
            }
            if !names.insert(name.as_str()) {
                return Err(PrepError::DuplicateColumn { name: name.clone() });
            }
            if len != self.n_rows {
                return Err(PrepError::LengthMismatch {
                    column: name.clone(),
                    expected: self.n_rows,
                    actual: len,
                });
            }
        }
        Ok(())
    }
}

/// Per-example user and item identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityColumns {
    users: Vec<UserId>,
    items: Vec<ItemId>,
}

impl IdentityColumns {
    /// Pairs user and item identifier columns.
    pub fn new(users: Vec<UserId>, items: Vec<ItemId>) -> Self {
        Self { users, items }
    }

    /// Returns the user identifiers.
    #[inline]
    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    /// Returns the item identifiers.
    #[inline]
    pub fn items(&self) -> &[ItemId] {
        &self.items
    }
}

/// Offsets of the identity blocks, frozen at fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityBlocks {
    /// First index of the user block.
    pub user_offset: FeatureIdx,
    /// Width of the user block.
    pub n_users: usize,
    /// First index of the item block.
    pub item_offset: FeatureIdx,
    /// Width of the item block.
    pub n_items: usize,
}

/// Fits a [`FeatureIndex`] from training columns.
#[derive(Debug, Clone)]
pub struct FeatureIndexer {
    config: IndexerConfig,
}

impl FeatureIndexer {
    /// Creates an indexer, validating the configuration.
    pub fn new(config: IndexerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the configuration.
    #[inline]
    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Builds the index space from `columns` and encodes them.
    ///
    /// `identity` must be supplied exactly when identity blocks are enabled.
    ///
    /// # Errors
    ///
    /// Any column whose length differs from the declared row count, a repeated
    /// column name, missing or unexpected identifiers, or an identifier out of
    /// the configured range.
    pub fn fit(
        &self,
        columns: &FeatureColumns,
        identity: Option<&IdentityColumns>,
    ) -> Result<(FeatureIndex, EncodedFeatures)> {
        columns.validate()?;

        let mut builder = IndexBuilder::default();
        for (name, _) in &columns.numerical {
            builder.push_numerical(name)?;
        }
        for (name, values) in &columns.categorical {
            builder.push_categorical(name, values)?;
        }
        let index = builder.finish(&self.config)?;

        let encoded = index.transform(columns, identity)?;
        info!(
            feature_size = index.feature_size,
            rows = columns.n_rows(),
            numerical = index.numerical.len(),
            categorical = index.vocabularies.len(),
            identity = index.identity.is_some(),
            "fitted feature index"
        );
        Ok((index, encoded))
    }
}

/// Sequential allocator of global index blocks.
///
/// Owns the running total for the duration of one fit and is consumed by
/// [`IndexBuilder::finish`].
#[derive(Debug, Default)]
struct IndexBuilder {
    total: usize,
    numerical: Vec<String>,
    vocabularies: Vec<Vocabulary>,
    slots: Vec<FeatureSlot>,
}

impl IndexBuilder {
    fn push_numerical(&mut self, name: &str) -> Result<()> {
        let offset = to_feature_idx(self.total)?;
        self.slots
            .push(FeatureSlot::new(name, FeatureKind::Numerical, offset, 1));
        self.numerical.push(name.to_string());
        self.advance(1)
    }

    fn push_categorical(&mut self, name: &str, values: &[CategoryValue]) -> Result<()> {
        let offset = to_feature_idx(self.total)?;
        let vocab = Vocabulary::fit(name, values, offset)?;
        let width = vocab.len();
        self.slots
            .push(FeatureSlot::new(name, FeatureKind::Categorical, offset, width));
        self.vocabularies.push(vocab);
        self.advance(width)
    }

    fn advance(&mut self, width: usize) -> Result<()> {
        self.total = self
            .total
            .checked_add(width)
            .ok_or(PrepError::IndexOverflow { total: usize::MAX })?;
        to_feature_idx(self.total)?;
        Ok(())
    }

    fn finish(mut self, config: &IndexerConfig) -> Result<FeatureIndex> {
        let total_count = to_feature_idx(self.total)?;

        let identity = if config.include_user_item {
            let user_offset = to_feature_idx(self.total)?;
            self.slots.push(FeatureSlot::new(
                IDENTITY_SLOTS[0],
                FeatureKind::Categorical,
                user_offset,
                config.n_users,
            ));
            self.advance(config.n_users)?;

            let item_offset = to_feature_idx(self.total)?;
            self.slots.push(FeatureSlot::new(
                IDENTITY_SLOTS[1],
                FeatureKind::Categorical,
                item_offset,
                config.n_items,
            ));
            self.advance(config.n_items)?;

            Some(IdentityBlocks {
                user_offset,
                n_users: config.n_users,
                item_offset,
                n_items: config.n_items,
            })
        } else {
            None
        };

        Ok(FeatureIndex {
            numerical: self.numerical,
            vocabularies: self.vocabularies,
            slots: self.slots,
            total_count,
            identity,
            feature_size: to_feature_idx(self.total)?,
        })
    }
}

/// The frozen index space produced by [`FeatureIndexer::fit`].
///
/// Immutable after fit. It derives serde so that callers can persist it
/// between processes in the format of their choice; deserialization checks
/// that the slots tile `[0, feature_size)` in fit order and agree with the
/// vocabularies and identity blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFeatureIndex")]
pub struct FeatureIndex {
    numerical: Vec<String>,
    vocabularies: Vec<Vocabulary>,
    slots: Vec<FeatureSlot>,
    total_count: FeatureIdx,
    identity: Option<IdentityBlocks>,
    feature_size: FeatureIdx,
}

/// Unchecked serde form of [`FeatureIndex`].
#[derive(Deserialize)]
struct RawFeatureIndex {
    numerical: Vec<String>,
    vocabularies: Vec<Vocabulary>,
    slots: Vec<FeatureSlot>,
    total_count: FeatureIdx,
    identity: Option<IdentityBlocks>,
    feature_size: FeatureIdx,
}

impl TryFrom<RawFeatureIndex> for FeatureIndex {
    type Error = PrepError;

    fn try_from(raw: RawFeatureIndex) -> Result<Self> {
        let index = Self {
            numerical: raw.numerical,
            vocabularies: raw.vocabularies,
            slots: raw.slots,
            total_count: raw.total_count,
            identity: raw.identity,
            feature_size: raw.feature_size,
        };
        index.check_layout()?;
        Ok(index)
    }
}

impl FeatureIndex {
    /// Size of the index space; also the OOV sentinel.
    #[inline]
    pub fn feature_size(&self) -> FeatureIdx {
        self.feature_size
    }

    /// Index assigned to categorical values unseen during fit.
    #[inline]
    pub fn oov_index(&self) -> FeatureIdx {
        self.feature_size
    }

    /// Running total after the numerical and categorical blocks.
    #[inline]
    pub fn total_count(&self) -> FeatureIdx {
        self.total_count
    }

    /// Identity block offsets, if identity blocks are enabled.
    #[inline]
    pub fn identity(&self) -> Option<&IdentityBlocks> {
        self.identity.as_ref()
    }

    /// All slots in encoding order, identity slots included.
    #[inline]
    pub fn slots(&self) -> &[FeatureSlot] {
        &self.slots
    }

    /// Number of columns of every encoded row.
    pub fn n_cols(&self) -> usize {
        let identity_cols = if self.identity.is_some() { 2 } else { 0 };
        self.numerical.len() + self.vocabularies.len() + identity_cols
    }

    /// Numerical column names in fit order.
    #[inline]
    pub fn numerical_columns(&self) -> &[String] {
        &self.numerical
    }

    /// Vocabularies in fit order.
    #[inline]
    pub fn vocabularies(&self) -> &[Vocabulary] {
        &self.vocabularies
    }

    /// Returns the vocabulary fitted for `column`.
    pub fn vocabulary(&self, column: &str) -> Option<&Vocabulary> {
        self.vocabularies.iter().find(|v| v.column() == column)
    }

    /// First index of the user-identity block, if identity blocks are enabled.
    #[inline]
    pub fn user_offset(&self) -> Option<FeatureIdx> {
        self.identity.as_ref().map(|b| b.user_offset)
    }

    /// First index of the item-identity block, if identity blocks are enabled.
    #[inline]
    pub fn item_offset(&self) -> Option<FeatureIdx> {
        self.identity.as_ref().map(|b| b.item_offset)
    }

    /// Maps a raw user identifier into the user block.
    pub fn user_index(&self, user: UserId) -> Result<FeatureIdx> {
        let blocks = self.identity.as_ref().ok_or(PrepError::UnexpectedIdentity)?;
        check_user(user, blocks.n_users)?;
        Ok(blocks.user_offset + user)
    }

    /// Maps a raw item identifier into the item block.
    pub fn item_index(&self, item: ItemId) -> Result<FeatureIdx> {
        let blocks = self.identity.as_ref().ok_or(PrepError::UnexpectedIdentity)?;
        check_item(item, blocks.n_items)?;
        Ok(blocks.item_offset + item)
    }

    /// Encodes new columns with the frozen layout.
    ///
    /// Column names must match fit exactly, in the same order. Categorical
    /// values unseen during fit resolve to [`FeatureIndex::oov_index`].
    ///
    /// # Errors
    ///
    /// Column-set or order mismatch, length mismatch, missing or unexpected
    /// identifiers, identifier out of range.
    pub fn transform(
        &self,
        columns: &FeatureColumns,
        identity: Option<&IdentityColumns>,
    ) -> Result<EncodedFeatures> {
        columns.validate()?;
        self.check_columns(columns)?;
        let identity = self.check_identity(columns.n_rows(), identity)?;

        let n_rows = columns.n_rows();
        let n_cols = self.n_cols();
        let mut indices = vec![0 as FeatureIdx; n_rows * n_cols];
        let mut values = vec![0f32; n_rows * n_cols];
        let mut col = 0;

        for (offset, (_, column)) in self.numerical_offsets().zip(&columns.numerical) {
            for (r, &v) in column.iter().enumerate() {
                indices[r * n_cols + col] = offset;
                values[r * n_cols + col] = v;
            }
            col += 1;
        }

        let oov = self.oov_index();
        let mut oov_hits = 0usize;
        for (vocab, (_, column)) in self.vocabularies.iter().zip(&columns.categorical) {
            for (r, v) in column.iter().enumerate() {
                let idx = match vocab.lookup(v) {
                    Lookup::Found(idx) => idx,
                    Lookup::NotFound => {
                        oov_hits += 1;
                        oov
                    }
                };
                indices[r * n_cols + col] = idx;
                values[r * n_cols + col] = 1.0;
            }
            col += 1;
        }

        if let (Some(blocks), Some(ids)) = (&self.identity, identity) {
            for r in 0..n_rows {
                indices[r * n_cols + col] = blocks.user_offset + ids.users[r];
                values[r * n_cols + col] = 1.0;
                indices[r * n_cols + col + 1] = blocks.item_offset + ids.items[r];
                values[r * n_cols + col + 1] = 1.0;
            }
        }

        debug!(rows = n_rows, cols = n_cols, oov_hits, "encoded feature columns");

        let indices = Array2::from_shape_vec((n_rows, n_cols), indices)
            .map_err(|e| PrepError::config(e.to_string()))?;
        let values = Array2::from_shape_vec((n_rows, n_cols), values)
            .map_err(|e| PrepError::config(e.to_string()))?;
        EncodedFeatures::new(indices, values)
    }

    /// Checks that the slots describe exactly the blocks fit would produce.
    fn check_layout(&self) -> Result<()> {
        let mut expected: Vec<(&str, FeatureKind, usize)> = Vec::with_capacity(self.slots.len());
        expected.extend(self.numerical.iter().map(|n| (n.as_str(), FeatureKind::Numerical, 1)));
        expected.extend(
            self.vocabularies
                .iter()
                .map(|v| (v.column(), FeatureKind::Categorical, v.len())),
        );
        let n_feature_slots = expected.len();
        if let Some(blocks) = &self.identity {
            expected.push((IDENTITY_SLOTS[0], FeatureKind::Categorical, blocks.n_users));
            expected.push((IDENTITY_SLOTS[1], FeatureKind::Categorical, blocks.n_items));
        }
        if expected.len() != self.slots.len() {
            return Err(PrepError::config(format!(
                "index has {} slots, its columns need {}",
                self.slots.len(),
                expected.len()
            )));
        }

        let mut total = 0usize;
        for (pos, (slot, (name, kind, width))) in self.slots.iter().zip(expected).enumerate() {
            if slot.name() != name || slot.kind() != kind || slot.width() != width {
                return Err(PrepError::config(format!(
                    "slot {pos} is {:?} '{}' of width {}, expected {kind:?} '{name}' of width {width}",
                    slot.kind(),
                    slot.name(),
                    slot.width()
                )));
            }
            if slot.offset() as usize != total {
                return Err(PrepError::config(format!(
                    "slot '{name}' starts at {}, expected {total}",
                    slot.offset()
                )));
            }
            if pos == n_feature_slots && self.total_count as usize != total {
                return Err(PrepError::config(format!(
                    "total_count is {}, categorical blocks end at {total}",
                    self.total_count
                )));
            }
            total += width;
        }
        if self.slots.len() == n_feature_slots && self.total_count as usize != total {
            return Err(PrepError::config(format!(
                "total_count is {}, categorical blocks end at {total}",
                self.total_count
            )));
        }

        let vocab_slots = &self.slots[self.numerical.len()..n_feature_slots];
        for (vocab, slot) in self.vocabularies.iter().zip(vocab_slots) {
            if vocab.offset() != slot.offset() {
                return Err(PrepError::config(format!(
                    "vocabulary '{}' starts at {}, its slot at {}",
                    vocab.column(),
                    vocab.offset(),
                    slot.offset()
                )));
            }
        }
        if let Some(blocks) = &self.identity {
            let (user, item) = (&self.slots[n_feature_slots], &self.slots[n_feature_slots + 1]);
            if blocks.user_offset != user.offset() || blocks.item_offset != item.offset() {
                return Err(PrepError::config(
                    "identity offsets disagree with the identity slots",
                ));
            }
        }

        if self.feature_size as usize != total {
            return Err(PrepError::config(format!(
                "feature_size is {}, slots cover {total}",
                self.feature_size
            )));
        }
        to_feature_idx(total)?;
        Ok(())
    }

    fn numerical_offsets(&self) -> impl Iterator<Item = FeatureIdx> + '_ {
        self.slots
            .iter()
            .filter(|s| s.kind() == FeatureKind::Numerical)
            .map(FeatureSlot::offset)
    }

    fn check_columns(&self, columns: &FeatureColumns) -> Result<()> {
        let numerical = columns.numerical_names();
        if numerical != self.numerical {
            return Err(PrepError::ColumnMismatch {
                kind: FeatureKind::Numerical,
                expected: self.numerical.clone(),
                actual: numerical,
            });
        }

        let categorical = columns.categorical_names();
        let fitted: Vec<String> = self
            .vocabularies
            .iter()
            .map(|v| v.column().to_string())
            .collect();
        if categorical != fitted {
            return Err(PrepError::ColumnMismatch {
                kind: FeatureKind::Categorical,
                expected: fitted,
                actual: categorical,
            });
        }
        Ok(())
    }

    fn check_identity<'a>(
        &self,
        n_rows: usize,
        identity: Option<&'a IdentityColumns>,
    ) -> Result<Option<&'a IdentityColumns>> {
        match (&self.identity, identity) {
            (None, None) => Ok(None),
            (None, Some(_)) => Err(PrepError::UnexpectedIdentity),
            (Some(_), None) => Err(PrepError::MissingIdentity),
            (Some(blocks), Some(ids)) => {
                for (column, len) in [("user", ids.users.len()), ("item", ids.items.len())] {
                    if len != n_rows {
                        return Err(PrepError::LengthMismatch {
                            column: column.to_string(),
                            expected: n_rows,
                            actual: len,
                        });
                    }
                }
                for &u in &ids.users {
                    check_user(u, blocks.n_users)?;
                }
                for &i in &ids.items {
                    check_item(i, blocks.n_items)?;
                }
                Ok(Some(ids))
            }
        }
    }
}
