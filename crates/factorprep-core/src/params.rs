//! Configuration types for indexing and sampling.
//!
//! # Overview
//!
//! - [`IndexerConfig`]: Whether identity blocks are appended, and their widths.
//! - [`SamplerConfig`]: Negative-sampling options.
//! - [`ExhaustionPolicy`]: What bounded rejection sampling does when it gives up.
//!
//! Both configs are plain serde structs with a consuming builder whose
//! `build()` validates before returning.

use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};

/// Configuration for the feature indexer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Whether to append a user-identity block and an item-identity block.
    pub include_user_item: bool,

    /// Width of the user-identity block.
    pub n_users: usize,

    /// Width of the item-identity block.
    pub n_items: usize,
}

impl IndexerConfig {
    /// Creates a configuration with identity blocks disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with identity blocks for `n_users` and `n_items`.
    ///
    /// # Examples
    ///
    /// ```
    /// use factorprep_core::params::IndexerConfig;
    ///
    /// let config = IndexerConfig::with_identity(10, 20);
    /// assert!(config.include_user_item);
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn with_identity(n_users: usize, n_items: usize) -> Self {
        Self {
            include_user_item: true,
            n_users,
            n_items,
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.include_user_item && (self.n_users == 0 || self.n_items == 0) {
            return Err(PrepError::config(
                "n_users and n_items must be positive when identity blocks are enabled",
            ));
        }
        Ok(())
    }
}

/// What bounded rejection sampling does after `max_attempts` rejected draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExhaustionPolicy {
    /// Take the next uniform draw even if the user has consumed it.
    AcceptAny,
    /// Draw uniformly from the user's unconsumed items.
    Complement,
    /// Fail with [`PrepError::SamplingExhausted`].
    Error,
}

impl Default for ExhaustionPolicy {
    fn default() -> Self {
        Self::Complement
    }
}

/// Configuration for negative sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Negatives drawn per positive interaction.
    pub num_neg: usize,

    /// Seed for every random draw of one sampling call.
    pub seed: u64,

    /// Whether to produce the dense-value block.
    pub dense: bool,

    /// Whether to apply one global permutation to the output.
    pub shuffle: bool,

    /// Rejections tolerated per negative before the exhaustion policy applies.
    ///
    /// `None` keeps the unbounded rejection loop.
    pub max_attempts: Option<usize>,

    /// Fallback once `max_attempts` is reached.
    pub exhaustion: ExhaustionPolicy,

    /// Whether interaction chunks are sampled on the rayon pool.
    pub parallel: bool,

    /// Interactions per independently seeded chunk.
    pub chunk_size: usize,

    /// Rows per mini-batch returned by the samplers' `sample_batches`.
    pub batch_size: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            num_neg: 1,
            seed: 42,
            dense: true,
            shuffle: true,
            max_attempts: None,
            exhaustion: ExhaustionPolicy::default(),
            parallel: false,
            chunk_size: 4096,
            batch_size: 256,
        }
    }
}

impl SamplerConfig {
    /// Creates a configuration with the given number of negatives.
    pub fn new(num_neg: usize) -> Self {
        Self {
            num_neg,
            ..Default::default()
        }
    }

    /// Creates a builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use factorprep_core::params::{ExhaustionPolicy, SamplerConfig};
    ///
    /// let config = SamplerConfig::builder(4)
    ///     .seed(7)
    ///     .shuffle(false)
    ///     .max_attempts(100, ExhaustionPolicy::Error)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.num_neg, 4);
    /// assert_eq!(config.max_attempts, Some(100));
    /// ```
    pub fn builder(num_neg: usize) -> SamplerConfigBuilder {
        SamplerConfigBuilder::new(num_neg)
    }

    /// Rows produced per positive interaction.
    #[inline]
    pub fn group_size(&self) -> usize {
        self.num_neg + 1
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.num_neg < 1 {
            return Err(PrepError::InvalidNumNeg {
                num_neg: self.num_neg,
            });
        }
        if self.chunk_size == 0 {
            return Err(PrepError::config("chunk_size must be greater than 0"));
        }
        if self.batch_size == 0 {
            return Err(PrepError::config("batch_size must be greater than 0"));
        }
        if self.max_attempts == Some(0) {
            return Err(PrepError::config("max_attempts must be greater than 0"));
        }
        Ok(())
    }
}

/// Builder for [`SamplerConfig`].
#[derive(Debug, Clone)]
pub struct SamplerConfigBuilder {
    config: SamplerConfig,
}

impl SamplerConfigBuilder {
    /// Creates a new builder.
    pub fn new(num_neg: usize) -> Self {
        Self {
            config: SamplerConfig::new(num_neg),
        }
    }

    /// Sets the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Sets whether the dense block is produced.
    pub fn dense(mut self, dense: bool) -> Self {
        self.config.dense = dense;
        self
    }

    /// Sets whether output is shuffled.
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.config.shuffle = shuffle;
        self
    }

    /// Bounds rejection sampling and sets the fallback.
    pub fn max_attempts(mut self, max_attempts: usize, policy: ExhaustionPolicy) -> Self {
        self.config.max_attempts = Some(max_attempts);
        self.config.exhaustion = policy;
        self
    }

    /// Enables or disables rayon sampling.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Sets the interactions per seeded chunk.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size;
        self
    }

    /// Sets the mini-batch size.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Builds the configuration, validating it first.
    pub fn build(self) -> Result<SamplerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
