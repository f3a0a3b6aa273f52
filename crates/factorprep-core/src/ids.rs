//! Identifier types for the global feature index space.
//!
//! Raw user and item identifiers are dense integers in `[0, n_users)` and
//! `[0, n_items)`. Global feature indices are positions in the shared
//! `[0, feature_size]` range, where `feature_size` itself is the
//! out-of-vocabulary sentinel.

use crate::error::{PrepError, Result};

/// A position in the global feature index space.
pub type FeatureIdx = u32;

/// A dense user identifier.
pub type UserId = u32;

/// A dense item identifier.
pub type ItemId = u32;

/// Largest running total the index space can hold.
///
/// The total itself doubles as the OOV sentinel, so it must be representable.
pub const MAX_FEATURE_SIZE: usize = FeatureIdx::MAX as usize;

/// Narrows a running total into a [`FeatureIdx`].
///
/// # Errors
///
/// Returns [`PrepError::IndexOverflow`] if `total` does not fit.
///
/// # Examples
///
/// ```
/// use factorprep_core::ids::to_feature_idx;
///
/// assert_eq!(to_feature_idx(17).unwrap(), 17);
/// assert!(to_feature_idx(usize::MAX).is_err());
/// ```
#[inline]
pub fn to_feature_idx(total: usize) -> Result<FeatureIdx> {
    if total > MAX_FEATURE_SIZE {
        return Err(PrepError::IndexOverflow { total });
    }
    Ok(total as FeatureIdx)
}

/// Checks that a user identifier lies in `[0, n_users)`.
#[inline]
pub fn check_user(user: UserId, n_users: usize) -> Result<()> {
    if (user as usize) < n_users {
        Ok(())
    } else {
        Err(PrepError::UserOutOfRange { user, n_users })
    }
}

/// Checks that an item identifier lies in `[0, n_items)`.
#[inline]
pub fn check_item(item: ItemId, n_items: usize) -> Result<()> {
    if (item as usize) < n_items {
        Ok(())
    } else {
        Err(PrepError::ItemOutOfRange { item, n_items })
    }
}
