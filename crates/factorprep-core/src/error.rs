//! Error types for the factorprep core library.
//!
//! Every variant here is a configuration error: the inputs handed to the
//! indexer or the sampler are inconsistent with each other or with the frozen
//! index space. None of them are retried; they propagate straight to the
//! caller. An unseen categorical value at transform time is *not* an error and
//! has no variant here.

use thiserror::Error;

use crate::feature::FeatureKind;
use crate::ids::{ItemId, UserId};

/// The main error type for factorprep operations.
#[derive(Debug, Error)]
pub enum PrepError {
    /// A column does not have the declared number of rows.
    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        /// The offending column.
        column: String,
        /// The declared row count.
        expected: usize,
        /// The row count actually supplied.
        actual: usize,
    },

    /// The column names or their order differ from what was seen at fit time.
    #[error("{kind:?} columns {actual:?} do not match fitted columns {expected:?}")]
    ColumnMismatch {
        /// Which group of columns mismatched.
        kind: FeatureKind,
        /// Column names in fit order.
        expected: Vec<String>,
        /// Column names supplied.
        actual: Vec<String>,
    },

    /// The same column name was declared twice.
    #[error("Duplicate column: {name}")]
    DuplicateColumn {
        /// The repeated name.
        name: String,
    },

    /// Identity blocks are enabled but no user/item identifiers were supplied.
    #[error("User and item identifiers are required when identity blocks are enabled")]
    MissingIdentity,

    /// Identifiers were supplied but identity blocks are disabled.
    #[error("User and item identifiers were supplied but identity blocks are disabled")]
    UnexpectedIdentity,

    /// A user identifier is outside `[0, n_users)`.
    #[error("User {user} out of range (n_users: {n_users})")]
    UserOutOfRange {
        /// The offending identifier.
        user: UserId,
        /// Number of known users.
        n_users: usize,
    },

    /// An item identifier is outside `[0, n_items)`.
    #[error("Item {item} out of range (n_items: {n_items})")]
    ItemOutOfRange {
        /// The offending identifier.
        item: ItemId,
        /// Number of known items.
        n_items: usize,
    },

    /// The number of negatives per positive must be at least one.
    #[error("num_neg must be at least 1, got {num_neg}")]
    InvalidNumNeg {
        /// The rejected value.
        num_neg: usize,
    },

    /// A user/item column split is not a permutation of the block's columns.
    #[error("Invalid column split: {message}")]
    InvalidColumnSplit {
        /// A description of the problem.
        message: String,
    },

    /// Bounded rejection sampling gave up under [`ExhaustionPolicy::Error`].
    ///
    /// [`ExhaustionPolicy::Error`]: crate::params::ExhaustionPolicy::Error
    #[error("No negative item found for user {user} after {attempts} attempts")]
    SamplingExhausted {
        /// The user being sampled for.
        user: UserId,
        /// Number of rejected draws.
        attempts: usize,
    },

    /// The user has consumed every item, so no negative can exist.
    #[error("User {user} has consumed all {n_items} items; no negative can be drawn")]
    SaturatedUser {
        /// The saturated user.
        user: UserId,
        /// Size of the item space.
        n_items: usize,
    },

    /// The global index space no longer fits the index type.
    #[error("Global feature index space overflowed at {total}")]
    IndexOverflow {
        /// The running total that could not be represented.
        total: usize,
    },

    /// Error during configuration parsing or validation.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// A description of the configuration error.
        message: String,
    },
}

impl PrepError {
    /// Shorthand for a [`PrepError::ConfigError`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}

/// A specialized Result type for factorprep operations.
pub type Result<T> = std::result::Result<T, PrepError>;
