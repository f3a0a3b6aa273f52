//! Feature indexing and negative sampling for factorization recommenders.
//!
//! This crate turns raw tabular interaction data into the inputs a
//! factorization-machine style model trains on: every feature value becomes
//! an integer in one global index space, and every observed interaction is
//! expanded into one positive and several sampled negative rows.
//!
//! # Overview
//!
//! The pipeline runs in three stages:
//!
//! 1. [`FeatureIndexer::fit`] assigns global indices to numerical slots,
//!    categorical values and optional identity blocks, and freezes them in a
//!    [`FeatureIndex`]. [`FeatureIndex::transform`] encodes later data with the
//!    same layout; unseen categorical values map to the OOV sentinel.
//! 2. [`InteractionDataset`] splits the encoding into user-side and item-side
//!    columns, [`ItemFeatureTable`] collects per-item attribute rows, and
//!    [`ConsumedRegistry`] records what each user has already consumed.
//! 3. [`FeatureNegativeSampler`] draws negatives and assembles a row-aligned
//!    [`TrainingBatch`]; [`PairwiseSampler`] produces ranking triples instead.
//!
//! ```
//! use factorprep_core::{IndexerConfig, SamplerConfig};
//! use factorprep_data::prelude::*;
//!
//! let columns = FeatureColumns::new(4)
//!     .numerical("price", vec![1.0, 2.5, 0.5, 3.0])
//!     .categorical("city", ["paris", "oslo", "paris", "rome"])
//!     .categorical("genre", ["jazz", "rock", "rock", "pop"]);
//! let ids = IdentityColumns::new(vec![0, 0, 1, 1], vec![0, 1, 2, 3]);
//!
//! let (index, encoded) = FeatureIndexer::new(IndexerConfig::new())?.fit(&columns, None)?;
//! assert_eq!(index.feature_size(), 7);
//!
//! let dataset = InteractionDataset::from_encoded(&index, &encoded, &ids, &["genre", "price"], 2, 5)?;
//! let table = ItemFeatureTable::from_dataset(&dataset, index.oov_index());
//! let consumed = ConsumedRegistry::from_interactions(dataset.users(), dataset.items())?;
//!
//! let config = SamplerConfig::builder(2).seed(1).build()?;
//! let batch = FeatureNegativeSampler::new(&dataset, &table, &consumed, config)?.sample()?;
//! assert_eq!(batch.len(), 12);
//! assert_eq!(batch.labels().sum(), 4.0);
//! # Ok::<(), factorprep_core::PrepError>(())
//! ```
//!
//! # Modules
//!
//! - [`vocabulary`] - Per-column value-to-index maps with explicit OOV lookup
//! - [`indexer`] - Fit and transform over the global index space
//! - [`encoded`] - Row-aligned index and value arrays
//! - [`consumed`] - Per-user consumed item sets
//! - [`dataset`] - Positive interactions with user/item column splits
//! - [`item_table`] - Per-item attribute rows
//! - [`negative_sampling`] - Rejection sampling and training batch assembly
//! - [`pairwise`] - `(user, positive, negative)` triples
//! - [`batch`] - Training batches, labels and mini-batch iteration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod consumed;
pub mod dataset;
pub mod encoded;
pub mod indexer;
pub mod item_table;
pub mod negative_sampling;
pub mod pairwise;
pub mod vocabulary;

pub use batch::{labels, MiniBatches, TrainingBatch};
pub use consumed::ConsumedRegistry;
pub use dataset::{DenseBlock, InteractionDataset};
pub use encoded::EncodedFeatures;
pub use indexer::{FeatureColumns, FeatureIndex, FeatureIndexer, IdentityBlocks, IdentityColumns};
pub use item_table::ItemFeatureTable;
pub use negative_sampling::{FeatureNegativeSampler, UniformNegativeSampler};
pub use pairwise::{PairwiseBatch, PairwiseSampler};
pub use vocabulary::{Lookup, Vocabulary};

/// Prelude module for convenient imports.
///
/// ```
/// use factorprep_data::prelude::*;
///
/// let registry = ConsumedRegistry::new();
/// assert!(registry.is_empty());
/// ```
pub mod prelude {
    pub use crate::batch::TrainingBatch;
    pub use crate::consumed::ConsumedRegistry;
    pub use crate::dataset::InteractionDataset;
    pub use crate::indexer::{FeatureColumns, FeatureIndex, FeatureIndexer, IdentityColumns};
    pub use crate::item_table::ItemFeatureTable;
    pub use crate::negative_sampling::{FeatureNegativeSampler, UniformNegativeSampler};
    pub use crate::pairwise::PairwiseSampler;
    pub use crate::vocabulary::Lookup;
}
