//! Per-user consumed item sets.
//!
//! A [`ConsumedRegistry`] records which items each user already interacted
//! with. The sampler only ever reads it; negatives are drawn from outside a
//! user's set.

use std::collections::{HashMap, HashSet};

use factorprep_core::{ItemId, PrepError, Result, UserId};

/// Read-only map from user to consumed items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumedRegistry {
    sets: HashMap<UserId, HashSet<ItemId>>,
}

impl ConsumedRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps caller-supplied sets.
    pub fn from_sets(sets: HashMap<UserId, HashSet<ItemId>>) -> Self {
        Self { sets }
    }

    /// Builds the registry from parallel user and item columns.
    ///
    /// # Errors
    ///
    /// Returns [`PrepError::LengthMismatch`] if the columns differ in length.
    ///
    /// # Examples
    ///
    /// ```
    /// use factorprep_data::consumed::ConsumedRegistry;
    ///
    /// let registry = ConsumedRegistry::from_interactions(&[0, 0, 1], &[3, 4, 3]).unwrap();
    /// assert!(registry.contains(0, 4));
    /// assert!(!registry.contains(1, 4));
    /// assert_eq!(registry.unconsumed_count(0, 5), 3);
    /// ```
    pub fn from_interactions(users: &[UserId], items: &[ItemId]) -> Result<Self> {
        if users.len() != items.len() {
            return Err(PrepError::LengthMismatch {
                column: "item".to_string(),
                expected: users.len(),
                actual: items.len(),
            });
        }
        Ok(users.iter().copied().zip(items.iter().copied()).collect())
    }

    /// Returns the consumed set of `user`, if any.
    #[inline]
    pub fn consumed(&self, user: UserId) -> Option<&HashSet<ItemId>> {
        self.sets.get(&user)
    }

    /// Returns `true` if `user` has consumed `item`.
    #[inline]
    pub fn contains(&self, user: UserId, item: ItemId) -> bool {
        self.sets.get(&user).is_some_and(|s| s.contains(&item))
    }

    /// Number of users with at least one consumed item.
    #[inline]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Returns `true` if no user has consumed anything.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Number of items in `[0, n_items)` that `user` has not consumed.
    pub fn unconsumed_count(&self, user: UserId, n_items: usize) -> usize {
        let consumed = self
            .sets
            .get(&user)
            .map(|s| s.iter().filter(|&&i| (i as usize) < n_items).count())
            .unwrap_or(0);
        n_items - consumed
    }

    /// Items in `[0, n_items)` that `user` has not consumed, ascending.
    pub fn complement(&self, user: UserId, n_items: usize) -> Vec<ItemId> {
        (0..n_items as ItemId)
            .filter(|&i| !self.contains(user, i))
            .collect()
    }
}

impl FromIterator<(UserId, ItemId)> for ConsumedRegistry {
    fn from_iter<I: IntoIterator<Item = (UserId, ItemId)>>(iter: I) -> Self {
        let mut sets: HashMap<UserId, HashSet<ItemId>> = HashMap::new();
        for (user, item) in iter {
            sets.entry(user).or_default().insert(item);
        }
        Self { sets }
    }
}
