//! Core types, errors, and configuration for factorprep.
//!
//! This crate provides the types shared by the feature indexer and the
//! negative sampler:
//!
//! - **Identifiers**: Global feature indices and dense user/item identifiers.
//! - **Feature abstractions**: Slot kinds, raw categorical values, fitted slot
//!   descriptors, and user/item column splits.
//! - **Configuration types**: Indexer and sampler configs with validation.
//! - **Error types**: Configuration errors with detailed context.
//!
//! # Example
//!
//! ```
//! use factorprep_core::feature::{ColumnSplit, FeatureKind, FeatureSlot};
//! use factorprep_core::params::SamplerConfig;
//!
//! let slot = FeatureSlot::new("age", FeatureKind::Numerical, 0, 1);
//! assert_eq!(slot.width(), 1);
//!
//! let split = ColumnSplit::new(vec![1], vec![0]).unwrap();
//! assert_eq!(split.reindex(), &[1, 0]);
//!
//! assert!(SamplerConfig::new(0).validate().is_err());
//! ```

pub mod error;
pub mod feature;
pub mod ids;
pub mod params;

pub use error::{PrepError, Result};
pub use feature::{CategoryValue, ColumnSplit, FeatureKind, FeatureSlot};
pub use ids::{check_item, check_user, to_feature_idx, FeatureIdx, ItemId, UserId};
pub use params::{ExhaustionPolicy, IndexerConfig, SamplerConfig, SamplerConfigBuilder};
