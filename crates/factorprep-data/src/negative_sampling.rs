//! Negative sampling for implicit-feedback training data.
//!
//! Every observed `(user, item)` interaction is a positive example. For each
//! one, the sampler draws `num_neg` items the user has not consumed and emits
//! them as negatives, carrying the user's attribute columns across and
//! swapping in the sampled item's attribute columns.
//!
//! # Sampling Strategies
//!
//! - [`UniformNegativeSampler`]: Rejection sampling of item identifiers, uniform
//!   over `[0, n_items)`, against a user's consumed set
//! - [`FeatureNegativeSampler`]: Full training batches with attribute rows
//!
//! # Determinism
//!
//! Interactions are processed in chunks of `chunk_size`. Each chunk draws from
//! its own [`StdRng`] seeded from `(seed, chunk index)`, so the same seed gives
//! the same batch whether chunks run serially or on the rayon pool.
//!
//! # Example
//!
//! ```
//! use factorprep_core::{ColumnSplit, SamplerConfig};
//! use factorprep_data::consumed::ConsumedRegistry;
//! use factorprep_data::dataset::InteractionDataset;
//! use factorprep_data::item_table::ItemFeatureTable;
//! use factorprep_data::negative_sampling::FeatureNegativeSampler;
//! use ndarray::array;
//!
//! let split = ColumnSplit::new(vec![0], vec![1]).unwrap();
//! let dataset = InteractionDataset::new(
//!     vec![0, 1],
//!     vec![0, 2],
//!     array![[0u32, 2], [1, 4]],
//!     split,
//!     2,
//!     4,
//! )
//! .unwrap();
//! let consumed = ConsumedRegistry::from_interactions(dataset.users(), dataset.items()).unwrap();
//! let table = ItemFeatureTable::from_dataset(&dataset, 6);
//!
//! let config = SamplerConfig::builder(2).dense(false).shuffle(false).build().unwrap();
//! let batch = FeatureNegativeSampler::new(&dataset, &table, &consumed, config)
//!     .unwrap()
//!     .sample()
//!     .unwrap();
//!
//! assert_eq!(batch.len(), 6);
//! assert_eq!(batch.labels().to_vec(), vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
//! ```

use std::ops::Range;
use std::time::Instant;

use factorprep_core::{
    ColumnSplit, ExhaustionPolicy, ItemId, PrepError, Result, SamplerConfig, UserId,
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::batch::{labels, TrainingBatch};
use crate::consumed::ConsumedRegistry;
use crate::dataset::InteractionDataset;
use crate::item_table::ItemFeatureTable;

/// Consecutive rejections after which an unbounded loop checks for saturation.
const SATURATION_PROBE: usize = 1024;

/// Mixed into the seed of the shuffle permutation.
const SHUFFLE_SALT: u64 = 0x5DEE_CE66_D1CE_4E5B;

/// SplitMix64 finalizer.
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Seed of chunk `chunk` for a sampling call seeded with `seed`.
///
/// The seed is mixed before the chunk number goes in, so neighboring seeds
/// do not share chunk streams.
pub(crate) fn chunk_seed(seed: u64, chunk: usize) -> u64 {
    splitmix64(splitmix64(seed) ^ chunk as u64)
}

/// Seed of the shuffle permutation for a sampling call seeded with `seed`.
pub(crate) fn shuffle_seed(seed: u64) -> u64 {
    seed ^ SHUFFLE_SALT
}

/// Runs `f` for every interaction index in `0..n`, chunk by chunk.
///
/// Results come back in interaction order regardless of `config.parallel`.
pub(crate) fn sample_chunked<T, F>(n: usize, config: &SamplerConfig, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize, &mut StdRng) -> Result<T> + Sync,
{
    let chunks: Vec<Range<usize>> = (0..n)
        .step_by(config.chunk_size)
        .map(|start| start..(start + config.chunk_size).min(n))
        .collect();

    let run = |(c, range): (usize, &Range<usize>)| -> Result<Vec<T>> {
        let mut rng = StdRng::seed_from_u64(chunk_seed(config.seed, c));
        range.clone().map(|r| f(r, &mut rng)).collect()
    };

    let parts: Vec<Vec<T>> = if config.parallel {
        chunks.par_iter().enumerate().map(&run).collect::<Result<_>>()?
    } else {
        chunks.iter().enumerate().map(&run).collect::<Result<_>>()?
    };
    Ok(parts.into_iter().flatten().collect())
}

/// Rejection sampler of unconsumed items.
///
/// Draws are uniform over `[0, n_items)`; a draw the user has consumed is
/// rejected and redrawn. Without a bound the loop runs until it finds an
/// unconsumed item, except that a user who has consumed every item is
/// reported as [`PrepError::SaturatedUser`]. With a bound, the
/// [`ExhaustionPolicy`] decides what happens after `max_attempts` rejections.
#[derive(Debug, Clone, Copy)]
pub struct UniformNegativeSampler<'a> {
    consumed: &'a ConsumedRegistry,
    n_items: usize,
    max_attempts: Option<usize>,
    exhaustion: ExhaustionPolicy,
}

impl<'a> UniformNegativeSampler<'a> {
    /// Creates an unbounded sampler over `n_items` items.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `n_items` is zero or exceeds the
    /// identifier range.
    pub fn new(consumed: &'a ConsumedRegistry, n_items: usize) -> Result<Self> {
        if n_items == 0 || n_items > ItemId::MAX as usize {
            return Err(PrepError::config(format!(
                "n_items must be in 1..={}, got {n_items}",
                ItemId::MAX
            )));
        }
        Ok(Self {
            consumed,
            n_items,
            max_attempts: None,
            exhaustion: ExhaustionPolicy::default(),
        })
    }

    /// Creates a sampler using the bound and policy in `config`.
    pub fn from_config(
        consumed: &'a ConsumedRegistry,
        n_items: usize,
        config: &SamplerConfig,
    ) -> Result<Self> {
        let sampler = Self::new(consumed, n_items)?;
        Ok(match config.max_attempts {
            Some(max) => sampler.with_max_attempts(max, config.exhaustion),
            None => sampler,
        })
    }

    /// Bounds rejection at `max_attempts` per draw (at least one).
    pub fn with_max_attempts(mut self, max_attempts: usize, policy: ExhaustionPolicy) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self.exhaustion = policy;
        self
    }

    /// Number of items sampled from.
    #[inline]
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Draws one negative item for `user`.
    pub fn draw<R: Rng + ?Sized>(&self, user: UserId, rng: &mut R) -> Result<ItemId> {
        self.draw_counted(user, rng).map(|(item, _)| item)
    }

    /// Draws `k` negative items for `user`, independently and with replacement.
    ///
    /// # Examples
    ///
    /// ```
    /// use factorprep_data::consumed::ConsumedRegistry;
    /// use factorprep_data::negative_sampling::UniformNegativeSampler;
    /// use rand::rngs::StdRng;
    /// use rand::SeedableRng;
    ///
    /// let consumed = ConsumedRegistry::from_interactions(&[0, 0], &[0, 1]).unwrap();
    /// let sampler = UniformNegativeSampler::new(&consumed, 3).unwrap();
    /// let mut rng = StdRng::seed_from_u64(0);
    ///
    /// assert_eq!(sampler.sample_for(0, 4, &mut rng).unwrap(), vec![2, 2, 2, 2]);
    /// ```
    pub fn sample_for<R: Rng + ?Sized>(
        &self,
        user: UserId,
        k: usize,
        rng: &mut R,
    ) -> Result<Vec<ItemId>> {
        self.sample_counted(user, k, rng).map(|(items, _)| items)
    }

    /// Like [`sample_for`](Self::sample_for), also returning the rejection count.
    pub(crate) fn sample_counted<R: Rng + ?Sized>(
        &self,
        user: UserId,
        k: usize,
        rng: &mut R,
    ) -> Result<(Vec<ItemId>, usize)> {
        let mut items = Vec::with_capacity(k);
        let mut rejections = 0;
        for _ in 0..k {
            let (item, rejected) = self.draw_counted(user, rng)?;
            items.push(item);
            rejections += rejected;
        }
        Ok((items, rejections))
    }

    fn draw_counted<R: Rng + ?Sized>(&self, user: UserId, rng: &mut R) -> Result<(ItemId, usize)> {
        let mut rejections = 0;
        loop {
            let candidate = self.uniform(rng);
            if !self.consumed.contains(user, candidate) {
                return Ok((candidate, rejections));
            }
            rejections += 1;

            match self.max_attempts {
                Some(max) if rejections >= max => {
                    return self.exhausted(user, rejections, rng).map(|i| (i, rejections));
                }
                None if rejections % SATURATION_PROBE == 0 => {
                    if self.consumed.unconsumed_count(user, self.n_items) == 0 {
                        return Err(PrepError::SaturatedUser {
                            user,
                            n_items: self.n_items,
                        });
                    }
                }
                _ => {}
            }
        }
    }

    fn exhausted<R: Rng + ?Sized>(&self, user: UserId, attempts: usize, rng: &mut R) -> Result<ItemId> {
        warn!(
            user,
            attempts,
            policy = ?self.exhaustion,
            "Rejection sampling exhausted"
        );
        match self.exhaustion {
            ExhaustionPolicy::AcceptAny => Ok(self.uniform(rng)),
            ExhaustionPolicy::Complement => self
                .consumed
                .complement(user, self.n_items)
                .choose(rng)
                .copied()
                .ok_or(PrepError::SaturatedUser {
                    user,
                    n_items: self.n_items,
                }),
            ExhaustionPolicy::Error => Err(PrepError::SamplingExhausted { user, attempts }),
        }
    }

    #[inline]
    fn uniform<R: Rng + ?Sized>(&self, rng: &mut R) -> ItemId {
        rng.gen_range(0..self.n_items) as ItemId
    }
}

/// Expands positive interactions into labelled training batches.
///
/// Row `k * (num_neg + 1)` of the unshuffled output is the `k`-th positive
/// interaction; the next `num_neg` rows are its negatives. Every row keeps the
/// column order of the dataset's blocks.
#[derive(Debug)]
pub struct FeatureNegativeSampler<'a> {
    dataset: &'a InteractionDataset,
    items: &'a ItemFeatureTable,
    consumed: &'a ConsumedRegistry,
    config: SamplerConfig,
}

impl<'a> FeatureNegativeSampler<'a> {
    /// Creates a sampler.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid, if the item table does not
    /// cover the dataset's items or does not match its item-side widths, or if
    /// dense output is requested without dense blocks.
    pub fn new(
        dataset: &'a InteractionDataset,
        items: &'a ItemFeatureTable,
        consumed: &'a ConsumedRegistry,
        config: SamplerConfig,
    ) -> Result<Self> {
        config.validate()?;
        if items.n_items() != dataset.n_items() {
            return Err(PrepError::LengthMismatch {
                column: "item table".to_string(),
                expected: dataset.n_items(),
                actual: items.n_items(),
            });
        }
        check_item_width("sparse", dataset.sparse_split(), items.sparse_width())?;
        if config.dense {
            match (dataset.dense(), items.dense_width()) {
                (Some(block), Some(width)) => check_item_width("dense", block.split(), width)?,
                _ => {
                    return Err(PrepError::config(
                        "dense output requested but the dataset or item table has no dense block",
                    ))
                }
            }
        }

        Ok(Self {
            dataset,
            items,
            consumed,
            config,
        })
    }

    /// Returns the configuration.
    #[inline]
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Draws negatives for every interaction and assembles the batch.
    pub fn sample(&self) -> Result<TrainingBatch> {
        let start = Instant::now();
        let n = self.dataset.len();
        let num_neg = self.config.num_neg;
        let group = self.config.group_size();

        let uniform =
            UniformNegativeSampler::from_config(self.consumed, self.dataset.n_items(), &self.config)?;
        let users = self.dataset.users();
        let drawn = sample_chunked(n, &self.config, |r, rng| {
            uniform.sample_counted(users[r], num_neg, rng)
        })?;

        let mut items = Vec::with_capacity(n * group);
        let mut rejections = 0;
        for (&positive, (negatives, rejected)) in self.dataset.items().iter().zip(drawn) {
            items.push(positive);
            items.extend(negatives);
            rejections += rejected;
        }

        let sparse = assemble(
            self.dataset.sparse().view(),
            self.dataset.sparse_split(),
            &items,
            group,
            |i| self.items.sparse_row(i),
        )?;
        let dense = match (self.config.dense, self.dataset.dense()) {
            (true, Some(block)) => Some(assemble(
                block.values().view(),
                block.split(),
                &items,
                group,
                |i| self.items.dense_row(i).unwrap_or_else(|| ArrayView1::from(&[])),
            )?),
            _ => None,
        };

        let batch_users: Array1<UserId> = users
            .iter()
            .flat_map(|&u| std::iter::repeat(u).take(group))
            .collect();
        let mut batch =
            TrainingBatch::new(batch_users, Array1::from(items), sparse, dense, labels(n, num_neg))?;

        if self.config.shuffle {
            let mut rng = StdRng::seed_from_u64(shuffle_seed(self.config.seed));
            batch.shuffle(&mut rng);
        }

        debug!(
            interactions = n,
            rows = batch.len(),
            rejections,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Sampled negatives"
        );
        Ok(batch)
    }

    /// Samples once and splits the rows into mini-batches of
    /// `config.batch_size`; only the last one may be shorter.
    pub fn sample_batches(&self) -> Result<Vec<TrainingBatch>> {
        let batch = self.sample()?;
        Ok(batch.mini_batches(self.config.batch_size).collect())
    }
}

fn check_item_width(block: &str, split: &ColumnSplit, table_width: usize) -> Result<()> {
    if split.item_cols().len() != table_width {
        return Err(PrepError::InvalidColumnSplit {
            message: format!(
                "{block} split has {} item columns, item table has {table_width}",
                split.item_cols().len()
            ),
        });
    }
    Ok(())
}

/// Builds one output row per entry of `items`: the user-side columns of
/// interaction `k / group` merged with the item-side columns of `items[k]`.
fn assemble<'t, T, G>(
    source: ArrayView2<'_, T>,
    split: &ColumnSplit,
    items: &[ItemId],
    group: usize,
    item_row: G,
) -> Result<Array2<T>>
where
    T: Copy + Default + 't,
    G: Fn(ItemId) -> ArrayView1<'t, T>,
{
    let width = split.width();
    let mut flat = vec![T::default(); items.len() * width];
    let mut user_buf: Vec<T> = Vec::with_capacity(split.user_cols().len());
    let mut item_buf: Vec<T> = Vec::with_capacity(split.item_cols().len());

    for (r, (group_items, group_out)) in items
        .chunks(group)
        .zip(flat.chunks_mut(group * width.max(1)))
        .enumerate()
    {
        let src = source.row(r);
        user_buf.clear();
        user_buf.extend(split.user_cols().iter().map(|&c| src[c]));

        for (&item, out) in group_items.iter().zip(group_out.chunks_mut(width.max(1))) {
            item_buf.clear();
            item_buf.extend(item_row(item).iter().copied());
            split.merge_into(&user_buf, &item_buf, &mut out[..width]);
        }
    }

    Array2::from_shape_vec((items.len(), width), flat)
        .map_err(|e| PrepError::config(format!("assembled block has the wrong shape: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::collections::HashSet;

    /// Four interactions over 2 users and 6 items.
    ///
    /// Sparse columns: [user_tag, item_genre, user_age_bucket, item_brand], so
    /// user and item columns interleave. Item columns encode `10 * item + c`.
    fn fixture() -> (InteractionDataset, ItemFeatureTable, ConsumedRegistry) {
        let users = vec![0, 0, 1, 1];
        let items = vec![0, 1, 2, 3];
        let sparse = array![
            [100u32, 0, 200, 1],
            [100, 10, 200, 11],
            [101, 20, 201, 21],
            [101, 30, 201, 31],
        ];
        let split = ColumnSplit::new(vec![0, 2], vec![1, 3]).unwrap();
        let dataset = InteractionDataset::new(users, items, sparse, split, 2, 6)
            .unwrap()
            .with_dense(
                array![[0.5f32, 0.0], [0.5, 1.0], [0.7, 2.0], [0.7, 3.0]],
                ColumnSplit::new(vec![0], vec![1]).unwrap(),
            )
            .unwrap();

        let table = ItemFeatureTable::new(
            Array2::from_shape_fn((6, 2), |(i, c)| (10 * i + c) as u32),
            Some(Array2::from_shape_fn((6, 1), |(i, _)| i as f32)),
        )
        .unwrap();
        let consumed =
            ConsumedRegistry::from_interactions(dataset.users(), dataset.items()).unwrap();
        (dataset, table, consumed)
    }

    fn config(num_neg: usize) -> SamplerConfig {
        SamplerConfig::builder(num_neg)
            .seed(11)
            .shuffle(false)
            .build()
            .unwrap()
    }

    #[test]
    fn test_twelve_rows_and_labels() {
        let (dataset, table, consumed) = fixture();
        let batch = FeatureNegativeSampler::new(&dataset, &table, &consumed, config(2))
            .unwrap()
            .sample()
            .unwrap();

        assert_eq!(batch.len(), 12);
        assert_eq!(
            batch.labels().to_vec(),
            vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0]
        );
        assert_eq!(batch.sparse().dim(), (12, 4));
        assert_eq!(batch.dense().unwrap().dim(), (12, 2));
    }

    #[test]
    fn test_negatives_avoid_consumed_items() {
        let (dataset, table, consumed) = fixture();
        let batch = FeatureNegativeSampler::new(&dataset, &table, &consumed, config(3))
            .unwrap()
            .sample()
            .unwrap();

        for k in 0..batch.len() {
            let user = batch.users()[k];
            let item = batch.items()[k];
            if batch.labels()[k] == 0.0 {
                assert!(!consumed.contains(user, item), "row {k}: {user} consumed {item}");
            } else {
                assert_eq!(item, dataset.items()[k / 4]);
            }
        }
    }

    #[test]
    fn test_column_order_is_preserved() {
        let (dataset, table, consumed) = fixture();
        let batch = FeatureNegativeSampler::new(&dataset, &table, &consumed, config(2))
            .unwrap()
            .sample()
            .unwrap();

        for k in 0..batch.len() {
            let item = batch.items()[k];
            let row = batch.sparse().row(k);
            let source = dataset.sparse_row(k / 3);
            assert_eq!(row[0], source[0]);
            assert_eq!(row[2], source[2]);
            assert_eq!(row[1], 10 * item);
            assert_eq!(row[3], 10 * item + 1);

            let dense = batch.dense().unwrap().row(k);
            assert_eq!(dense[1], item as f32);
        }
        // Positive rows reproduce the dataset rows exactly.
        for r in 0..dataset.len() {
            assert_eq!(batch.sparse().row(r * 3), dataset.sparse_row(r));
        }
    }

    #[test]
    fn test_shuffle_applies_one_permutation() {
        let (dataset, table, consumed) = fixture();
        let plain = FeatureNegativeSampler::new(&dataset, &table, &consumed, config(2))
            .unwrap()
            .sample()
            .unwrap();

        let mut cfg = config(2);
        cfg.shuffle = true;
        let shuffled = FeatureNegativeSampler::new(&dataset, &table, &consumed, cfg)
            .unwrap()
            .sample()
            .unwrap();

        let mut rng = StdRng::seed_from_u64(shuffle_seed(11));
        let mut expected = plain.clone();
        let perm = expected.shuffle(&mut rng);
        assert_eq!(shuffled, expected);

        for (k, &p) in perm.iter().enumerate() {
            assert_eq!(shuffled.sparse().row(k), plain.sparse().row(p));
            assert_eq!(shuffled.dense().unwrap().row(k), plain.dense().unwrap().row(p));
            assert_eq!(shuffled.labels()[k], plain.labels()[p]);
        }
    }

    #[test]
    fn test_parallel_matches_serial() {
        let (dataset, table, consumed) = fixture();
        let serial = SamplerConfig::builder(3).seed(5).chunk_size(1).build().unwrap();
        let parallel = SamplerConfig::builder(3)
            .seed(5)
            .chunk_size(1)
            .parallel(true)
            .build()
            .unwrap();

        let a = FeatureNegativeSampler::new(&dataset, &table, &consumed, serial)
            .unwrap()
            .sample()
            .unwrap();
        let b = FeatureNegativeSampler::new(&dataset, &table, &consumed, parallel)
            .unwrap()
            .sample()
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_same_seed_same_batch() {
        let (dataset, table, consumed) = fixture();
        let sample = |seed| {
            let cfg = SamplerConfig::builder(2).seed(seed).build().unwrap();
            FeatureNegativeSampler::new(&dataset, &table, &consumed, cfg)
                .unwrap()
                .sample()
                .unwrap()
        };
        assert_eq!(sample(9), sample(9));
    }

    #[test]
    fn test_zero_negatives_rejected() {
        let (dataset, table, consumed) = fixture();
        let mut cfg = config(1);
        cfg.num_neg = 0;
        let err = FeatureNegativeSampler::new(&dataset, &table, &consumed, cfg).unwrap_err();
        assert!(matches!(err, PrepError::InvalidNumNeg { num_neg: 0 }));
    }

    #[test]
    fn test_dense_without_dense_block_rejected() {
        let (dataset, _, consumed) = fixture();
        let table = ItemFeatureTable::new(Array2::zeros((6, 2)), None).unwrap();
        let err = FeatureNegativeSampler::new(&dataset, &table, &consumed, config(1)).unwrap_err();
        assert!(matches!(err, PrepError::ConfigError { .. }));

        let mut cfg = config(1);
        cfg.dense = false;
        let batch = FeatureNegativeSampler::new(&dataset, &table, &consumed, cfg)
            .unwrap()
            .sample()
            .unwrap();
        assert!(batch.dense().is_none());
    }

    #[test]
    fn test_table_width_mismatch_rejected() {
        let (dataset, _, consumed) = fixture();
        let table = ItemFeatureTable::new(Array2::zeros((6, 3)), None).unwrap();
        let err = FeatureNegativeSampler::new(&dataset, &table, &consumed, config(1)).unwrap_err();
        assert!(matches!(err, PrepError::InvalidColumnSplit { .. }));
    }

    #[test]
    fn test_empty_dataset() {
        let dataset = InteractionDataset::new(
            vec![],
            vec![],
            Array2::zeros((0, 1)),
            ColumnSplit::new(vec![], vec![0]).unwrap(),
            1,
            3,
        )
        .unwrap();
        let table = ItemFeatureTable::new(Array2::zeros((3, 1)), None).unwrap();
        let consumed = ConsumedRegistry::new();
        let mut cfg = config(2);
        cfg.dense = false;
        let batch = FeatureNegativeSampler::new(&dataset, &table, &consumed, cfg)
            .unwrap()
            .sample()
            .unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_saturated_user_reported() {
        let consumed: ConsumedRegistry = (0..4).map(|i| (7, i)).collect();
        let sampler = UniformNegativeSampler::new(&consumed, 4).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let err = sampler.draw(7, &mut rng).unwrap_err();
        assert!(matches!(err, PrepError::SaturatedUser { user: 7, n_items: 4 }));
    }

    #[test]
    fn test_exhaustion_error_policy() {
        let consumed: ConsumedRegistry = (0..4).map(|i| (1, i)).collect();
        let sampler = UniformNegativeSampler::new(&consumed, 4)
            .unwrap()
            .with_max_attempts(8, ExhaustionPolicy::Error);
        let mut rng = StdRng::seed_from_u64(0);
        let err = sampler.draw(1, &mut rng).unwrap_err();
        assert!(matches!(err, PrepError::SamplingExhausted { user: 1, attempts: 8 }));
    }

    #[test]
    fn test_exhaustion_accept_any_policy() {
        let consumed: ConsumedRegistry = (0..4).map(|i| (1, i)).collect();
        let sampler = UniformNegativeSampler::new(&consumed, 4)
            .unwrap()
            .with_max_attempts(2, ExhaustionPolicy::AcceptAny);
        let mut rng = StdRng::seed_from_u64(0);
        let item = sampler.draw(1, &mut rng).unwrap();
        assert!(consumed.contains(1, item));

        // Only item 99 is unconsumed; after one rejection any item is taken.
        let consumed: ConsumedRegistry = (0..99).map(|i| (3, i)).collect();
        let sampler = UniformNegativeSampler::new(&consumed, 100)
            .unwrap()
            .with_max_attempts(1, ExhaustionPolicy::AcceptAny);
        let drawn = sampler.sample_for(3, 20, &mut rng).unwrap();
        assert!(drawn.iter().all(|&i| i < 100));
        assert!(drawn.iter().any(|&i| consumed.contains(3, i)));
    }

    fn bounded(policy: ExhaustionPolicy) -> SamplerConfig {
        SamplerConfig::builder(2)
            .seed(11)
            .shuffle(false)
            .max_attempts(4, policy)
            .build()
            .unwrap()
    }

    #[test]
    fn test_bounded_config_on_saturated_user() {
        let (dataset, table, _) = fixture();
        // User 0 has consumed all six items.
        let consumed: ConsumedRegistry = (0..6)
            .map(|i| (0, i))
            .chain([(1, 2), (1, 3)])
            .collect();
        let sample = |policy| {
            FeatureNegativeSampler::new(&dataset, &table, &consumed, bounded(policy))
                .unwrap()
                .sample()
        };

        assert!(matches!(
            sample(ExhaustionPolicy::Error).unwrap_err(),
            PrepError::SamplingExhausted { user: 0, attempts: 4 }
        ));
        assert!(matches!(
            sample(ExhaustionPolicy::Complement).unwrap_err(),
            PrepError::SaturatedUser { user: 0, n_items: 6 }
        ));

        let batch = sample(ExhaustionPolicy::AcceptAny).unwrap();
        assert_eq!(batch.len(), 12);
        assert_eq!(batch.labels().sum(), 4.0);
        for k in 0..6 {
            assert_eq!(batch.users()[k], 0);
            assert!(consumed.contains(0, batch.items()[k]));
        }
    }

    #[test]
    fn test_bounded_complement_never_emits_consumed() {
        let (dataset, table, consumed) = fixture();
        let mut config = bounded(ExhaustionPolicy::Complement);
        config.max_attempts = Some(1);
        let batch = FeatureNegativeSampler::new(&dataset, &table, &consumed, config)
            .unwrap()
            .sample()
            .unwrap();
        for k in (0..batch.len()).filter(|k| k % 3 != 0) {
            assert!(!consumed.contains(batch.users()[k], batch.items()[k]));
        }
    }

    #[test]
    fn test_sample_batches_use_configured_size() {
        let (dataset, table, consumed) = fixture();
        let config = SamplerConfig::builder(2).seed(11).batch_size(5).build().unwrap();
        let sampler = FeatureNegativeSampler::new(&dataset, &table, &consumed, config).unwrap();

        let parts = sampler.sample_batches().unwrap();
        let sizes: Vec<_> = parts.iter().map(TrainingBatch::len).collect();
        assert_eq!(sizes, vec![5, 5, 2]);

        let whole = sampler.sample().unwrap();
        let rejoined: Vec<_> = parts.iter().flat_map(|b| b.items().to_vec()).collect();
        assert_eq!(rejoined, whole.items().to_vec());
        assert_eq!(parts[2].sparse().row(1), whole.sparse().row(11));
    }

    #[test]
    fn test_exhaustion_complement_policy() {
        // Only item 99 of 100 is unconsumed; one attempt almost always misses.
        let consumed: ConsumedRegistry = (0..99).map(|i| (3, i)).collect();
        let sampler = UniformNegativeSampler::new(&consumed, 100)
            .unwrap()
            .with_max_attempts(1, ExhaustionPolicy::Complement);
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..20 {
            assert_eq!(sampler.draw(3, &mut rng).unwrap(), 99);
        }

        let full: ConsumedRegistry = (0..3).map(|i| (3, i)).collect();
        let sampler = UniformNegativeSampler::new(&full, 3)
            .unwrap()
            .with_max_attempts(1, ExhaustionPolicy::Complement);
        assert!(matches!(
            sampler.draw(3, &mut rng).unwrap_err(),
            PrepError::SaturatedUser { .. }
        ));
    }

    #[test]
    fn test_sample_for_avoids_consumed() {
        let consumed: ConsumedRegistry = [(0, 1), (0, 3), (0, 5)].into_iter().collect();
        let sampler = UniformNegativeSampler::new(&consumed, 6).unwrap();
        let mut rng = StdRng::seed_from_u64(21);
        let drawn: HashSet<_> = sampler.sample_for(0, 200, &mut rng).unwrap().into_iter().collect();
        assert_eq!(drawn, HashSet::from([0, 2, 4]));
    }

    #[test]
    fn test_zero_items_rejected() {
        let consumed = ConsumedRegistry::new();
        assert!(UniformNegativeSampler::new(&consumed, 0).is_err());
    }

    #[test]
    fn test_chunk_seeds_differ() {
        assert_ne!(chunk_seed(1, 0), chunk_seed(1, 1));
        assert_ne!(chunk_seed(1, 0), chunk_seed(2, 0));
        assert_ne!(chunk_seed(0, 1), chunk_seed(1, 0));
        for seed in 0..64u64 {
            for chunk in 0..64usize {
                assert_ne!(chunk_seed(seed, chunk + 1), chunk_seed(seed + 1, chunk));
            }
        }
    }

    #[test]
    fn test_adjacent_seeds_draw_independently() {
        let draws = |seed: u64| {
            let config = SamplerConfig::builder(1)
                .seed(seed)
                .chunk_size(1)
                .build()
                .unwrap();
            sample_chunked(2, &config, |_, rng| {
                Ok((0..8).map(|_| rng.gen_range(0..1000u32)).collect::<Vec<_>>())
            })
            .unwrap()
        };
        let (under_zero, under_one) = (draws(0), draws(1));
        assert_ne!(under_zero[1], under_one[0]);
        assert_ne!(under_zero[0], under_zero[1]);
    }
}
