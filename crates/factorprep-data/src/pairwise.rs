//! Pairwise `(user, positive, negative)` triples for ranking losses.
//!
//! Each observed interaction yields `num_neg` triples, one per sampled
//! negative, in interaction order. Draws share the chunked seeding of
//! [`FeatureNegativeSampler`](crate::negative_sampling::FeatureNegativeSampler),
//! so a given seed produces the same triples serially or in parallel.

use std::time::Instant;

use factorprep_core::{check_item, check_user, ItemId, PrepError, Result, SamplerConfig, UserId};
use ndarray::{s, Array1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::consumed::ConsumedRegistry;
use crate::negative_sampling::{sample_chunked, shuffle_seed, UniformNegativeSampler};

/// Row-aligned pairwise triples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairwiseBatch {
    users: Array1<UserId>,
    items_pos: Array1<ItemId>,
    items_neg: Array1<ItemId>,
}

impl PairwiseBatch {
    /// Number of triples.
    #[inline]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns `true` if there are no triples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// User of each triple.
    #[inline]
    pub fn users(&self) -> &Array1<UserId> {
        &self.users
    }

    /// Observed item of each triple.
    #[inline]
    pub fn items_pos(&self) -> &Array1<ItemId> {
        &self.items_pos
    }

    /// Sampled negative of each triple.
    #[inline]
    pub fn items_neg(&self) -> &Array1<ItemId> {
        &self.items_neg
    }

    /// Iterates consecutive mini-batches of at most `batch_size` triples.
    pub fn mini_batches(&self, batch_size: usize) -> impl Iterator<Item = PairwiseBatch> + '_ {
        let batch_size = batch_size.max(1);
        (0..self.len()).step_by(batch_size).map(move |start| {
            let end = (start + batch_size).min(self.len());
            PairwiseBatch {
                users: self.users.slice(s![start..end]).to_owned(),
                items_pos: self.items_pos.slice(s![start..end]).to_owned(),
                items_neg: self.items_neg.slice(s![start..end]).to_owned(),
            }
        })
    }

    fn permute(&mut self, perm: &[usize]) {
        self.users = self.users.select(Axis(0), perm);
        self.items_pos = self.items_pos.select(Axis(0), perm);
        self.items_neg = self.items_neg.select(Axis(0), perm);
    }
}

/// Samples pairwise triples from positive interactions.
#[derive(Debug)]
pub struct PairwiseSampler<'a> {
    users: &'a [UserId],
    items: &'a [ItemId],
    consumed: &'a ConsumedRegistry,
    n_items: usize,
    config: SamplerConfig,
}

impl<'a> PairwiseSampler<'a> {
    /// Creates a sampler over parallel `users` / `items` columns.
    ///
    /// # Errors
    ///
    /// An invalid `config`, columns of different lengths, or an item outside
    /// `[0, n_items)`.
    pub fn new(
        users: &'a [UserId],
        items: &'a [ItemId],
        consumed: &'a ConsumedRegistry,
        n_users: usize,
        n_items: usize,
        config: SamplerConfig,
    ) -> Result<Self> {
        config.validate()?;
        if users.len() != items.len() {
            return Err(PrepError::LengthMismatch {
                column: "item".to_string(),
                expected: users.len(),
                actual: items.len(),
            });
        }
        for (&u, &i) in users.iter().zip(items) {
            check_user(u, n_users)?;
            check_item(i, n_items)?;
        }

        Ok(Self {
            users,
            items,
            consumed,
            n_items,
            config,
        })
    }

    /// Draws `num_neg` negatives per interaction.
    ///
    /// # Examples
    ///
    /// ```
    /// use factorprep_core::SamplerConfig;
    /// use factorprep_data::consumed::ConsumedRegistry;
    /// use factorprep_data::pairwise::PairwiseSampler;
    ///
    /// let users = [0, 0, 1];
    /// let items = [0, 1, 2];
    /// let consumed = ConsumedRegistry::from_interactions(&users, &items).unwrap();
    /// let config = SamplerConfig::builder(2).shuffle(false).build().unwrap();
    ///
    /// let triples = PairwiseSampler::new(&users, &items, &consumed, 2, 3, config)
    ///     .unwrap()
    ///     .sample()
    ///     .unwrap();
    /// assert_eq!(triples.len(), 6);
    /// assert!(triples.items_neg().iter().take(4).all(|&n| n == 2));
    /// assert!(triples.items_neg().iter().skip(4).all(|&n| n < 2));
    /// ```
    pub fn sample(&self) -> Result<PairwiseBatch> {
        let start = Instant::now();
        let num_neg = self.config.num_neg;
        let uniform = UniformNegativeSampler::from_config(self.consumed, self.n_items, &self.config)?;
        let users = self.users;
        let drawn = sample_chunked(users.len(), &self.config, |r, rng| {
            uniform.sample_counted(users[r], num_neg, rng)
        })?;

        let total = users.len() * num_neg;
        let mut batch_users = Vec::with_capacity(total);
        let mut items_pos = Vec::with_capacity(total);
        let mut items_neg = Vec::with_capacity(total);
        let mut rejections = 0;
        for ((&u, &pos), (negatives, rejected)) in users.iter().zip(self.items).zip(drawn) {
            for neg in negatives {
                batch_users.push(u);
                items_pos.push(pos);
                items_neg.push(neg);
            }
            rejections += rejected;
        }

        let mut batch = PairwiseBatch {
            users: Array1::from(batch_users),
            items_pos: Array1::from(items_pos),
            items_neg: Array1::from(items_neg),
        };
        if self.config.shuffle {
            let mut perm: Vec<usize> = (0..batch.len()).collect();
            perm.shuffle(&mut StdRng::seed_from_u64(shuffle_seed(self.config.seed)));
            batch.permute(&perm);
        }

        debug!(
            interactions = users.len(),
            triples = batch.len(),
            rejections,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Sampled pairwise triples"
        );
        Ok(batch)
    }

    /// Samples once and splits the triples into mini-batches of
    /// `config.batch_size`.
    pub fn sample_batches(&self) -> Result<Vec<PairwiseBatch>> {
        let batch = self.sample()?;
        Ok(batch.mini_batches(self.config.batch_size).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(num_neg: usize, shuffle: bool) -> SamplerConfig {
        SamplerConfig::builder(num_neg)
            .seed(3)
            .shuffle(shuffle)
            .build()
            .unwrap()
    }

    #[test]
    fn test_triples_per_interaction() {
        let users = [0, 1, 1, 2];
        let items = [4, 0, 1, 9];
        let consumed = ConsumedRegistry::from_interactions(&users, &items).unwrap();
        let batch = PairwiseSampler::new(&users, &items, &consumed, 3, 10, config(3, false))
            .unwrap()
            .sample()
            .unwrap();

        assert_eq!(batch.len(), 12);
        for k in 0..batch.len() {
            let r = k / 3;
            assert_eq!(batch.users()[k], users[r]);
            assert_eq!(batch.items_pos()[k], items[r]);
            assert!(!consumed.contains(users[r], batch.items_neg()[k]));
        }
    }

    #[test]
    fn test_shuffle_keeps_triples_intact() {
        let users = [0, 1, 2, 3];
        let items = [0, 1, 2, 3];
        let consumed = ConsumedRegistry::from_interactions(&users, &items).unwrap();
        let plain = PairwiseSampler::new(&users, &items, &consumed, 4, 8, config(2, false))
            .unwrap()
            .sample()
            .unwrap();
        let shuffled = PairwiseSampler::new(&users, &items, &consumed, 4, 8, config(2, true))
            .unwrap()
            .sample()
            .unwrap();

        let key = |b: &PairwiseBatch| {
            let mut rows: Vec<_> = (0..b.len())
                .map(|k| (b.users()[k], b.items_pos()[k], b.items_neg()[k]))
                .collect();
            rows.sort_unstable();
            rows
        };
        assert_eq!(key(&plain), key(&shuffled));
        for k in 0..shuffled.len() {
            assert_eq!(shuffled.users()[k], shuffled.items_pos()[k]);
        }
    }

    #[test]
    fn test_mini_batches_cover_all_triples() {
        let users = [0, 0, 1];
        let items = [0, 1, 2];
        let consumed = ConsumedRegistry::from_interactions(&users, &items).unwrap();
        let batch = PairwiseSampler::new(&users, &items, &consumed, 2, 5, config(3, true))
            .unwrap()
            .sample()
            .unwrap();

        let sizes: Vec<_> = batch.mini_batches(4).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![4, 4, 1]);
    }

    #[test]
    fn test_sample_batches_use_configured_size() {
        let users = [0, 0, 1];
        let items = [0, 1, 2];
        let consumed = ConsumedRegistry::from_interactions(&users, &items).unwrap();
        let config = SamplerConfig::builder(3).seed(3).batch_size(4).build().unwrap();
        let sampler = PairwiseSampler::new(&users, &items, &consumed, 2, 5, config).unwrap();

        let parts = sampler.sample_batches().unwrap();
        let sizes: Vec<_> = parts.iter().map(PairwiseBatch::len).collect();
        assert_eq!(sizes, vec![4, 4, 1]);

        let whole = sampler.sample().unwrap();
        let rejoined: Vec<_> = parts.iter().flat_map(|b| b.items_neg().to_vec()).collect();
        assert_eq!(rejoined, whole.items_neg().to_vec());
    }

    #[test]
    fn test_rejects_out_of_range_item() {
        let consumed = ConsumedRegistry::new();
        let err = PairwiseSampler::new(&[0], &[5], &consumed, 1, 5, config(1, false)).unwrap_err();
        assert!(matches!(err, PrepError::ItemOutOfRange { item: 5, .. }));
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let consumed = ConsumedRegistry::new();
        let err = PairwiseSampler::new(&[0, 1], &[0], &consumed, 2, 5, config(1, false)).unwrap_err();
        assert!(matches!(err, PrepError::LengthMismatch { .. }));
    }
}
