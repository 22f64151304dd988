use crate::algorithms::confidence::to_confidence_entry;
use crate::error::{AlsError, Result};
use crate::models::{ConfidenceEntry, FactorSide, Observation};
use std::collections::HashSet;
use std::iter::Peekable;
use std::slice;
use tracing::debug;

/// Per-user and per-item adjacency lists of positive interactions.
///
/// Every (user, item) pair appears at most once on each side. `by_user[u]` is
/// sorted by item index and `by_item[i]` by user index.
#[derive(Debug, Clone)]
pub struct InteractionIndex {
    num_users: usize,
    num_items: usize,
    by_user: Vec<Vec<(u32, f64)>>,
    by_item: Vec<Vec<(u32, f64)>>,
    nnz: usize,
}

impl InteractionIndex {
    /// Builds the index in one pass over the observations.
    ///
    /// Non-positive observations are dropped, duplicate pairs have their raw
    /// strengths summed before the confidence model is applied. Any index
    /// outside `[0, num_users) x [0, num_items)` or any non-finite strength
    /// fails the whole build. Both bounds must fit the `u32` index space.
    pub fn build<I>(num_users: usize, num_items: usize, observations: I, alpha: f64) -> Result<Self>
    where
        I: IntoIterator<Item = Observation>,
    {
        if !alpha.is_finite() || alpha <= 0.0 {
            return Err(AlsError::InvalidConfig(format!(
                "alpha must be a positive finite number, got {}",
                alpha
            )));
        }
        if u32::try_from(num_users).is_err() || u32::try_from(num_items).is_err() {
            return Err(AlsError::InvalidConfig(format!(
                "dimensions {}x{} exceed the u32 index space",
                num_users, num_items
            )));
        }

        let mut positive = Vec::new();
        let mut dropped = 0usize;
        for observation in observations {
            if observation.user_id as usize >= num_users || observation.item_id as usize >= num_items {
                return Err(AlsError::InvalidIndex {
                    user: observation.user_id,
                    item: observation.item_id,
                    num_users,
                    num_items,
                });
            }
            if !observation.strength.is_finite() {
                return Err(AlsError::InvalidStrength {
                    user: observation.user_id,
                    item: observation.item_id,
                    strength: observation.strength,
                });
            }
            if observation.strength > 0.0 {
                positive.push((observation.user_id, observation.item_id, observation.strength));
            } else {
                dropped += 1;
            }
        }

        positive.sort_unstable_by_key(|&(user, item, _)| (user, item));

        let mut merged: Vec<(u32, u32, f64)> = Vec::with_capacity(positive.len());
        for (user, item, strength) in positive {
            match merged.last_mut() {
                Some(last) if last.0 == user && last.1 == item => last.2 += strength,
                _ => merged.push((user, item, strength)),
            }
        }

        let entries: Vec<ConfidenceEntry> = merged
            .into_iter()
            .filter_map(|(user, item, strength)| to_confidence_entry(&Observation::new(user, item, strength), alpha))
            .collect();

        let mut by_user = vec![Vec::new(); num_users];
        let mut by_item = vec![Vec::new(); num_items];
        for entry in &entries {
            by_user[entry.user_id as usize].push((entry.item_id, entry.confidence));
            by_item[entry.item_id as usize].push((entry.user_id, entry.confidence));
        }

        debug!(
            "Built interaction index: {} users, {} items, {} pairs ({} observations dropped)",
            num_users,
            num_items,
            entries.len(),
            dropped
        );

        Ok(Self {
            num_users,
            num_items,
            by_user,
            by_item,
            nnz: entries.len(),
        })
    }

    /// Like [`InteractionIndex::build`], with the dense bounds taken as
    /// `max index + 1` over the observations.
    pub fn from_observations(observations: &[Observation], alpha: f64) -> Result<Self> {
        let (num_users, num_items) = infer_dimensions(observations);
        Self::build(num_users, num_items, observations.iter().copied(), alpha)
    }

    pub fn num_users(&self) -> usize {
        self.num_users
    }

    pub fn num_items(&self) -> usize {
        self.num_items
    }

    /// Number of distinct (user, item) pairs stored.
    pub fn nnz(&self) -> usize {
        self.nnz
    }

    pub fn by_user(&self) -> &[Vec<(u32, f64)>] {
        &self.by_user
    }

    pub fn by_item(&self) -> &[Vec<(u32, f64)>] {
        &self.by_item
    }

    pub fn items_for_user(&self, user_id: u32) -> Result<&[(u32, f64)]> {
        self.by_user
            .get(user_id as usize)
            .map(Vec::as_slice)
            .ok_or(AlsError::OutOfRange {
                side: FactorSide::User,
                index: user_id,
                bound: self.num_users,
            })
    }

    pub fn users_for_item(&self, item_id: u32) -> Result<&[(u32, f64)]> {
        self.by_item
            .get(item_id as usize)
            .map(Vec::as_slice)
            .ok_or(AlsError::OutOfRange {
                side: FactorSide::Item,
                index: item_id,
                bound: self.num_items,
            })
    }

    pub fn has_interaction(&self, user_id: u32, item_id: u32) -> bool {
        self.by_user
            .get(user_id as usize)
            .map(|items| items.binary_search_by_key(&item_id, |&(item, _)| item).is_ok())
            .unwrap_or(false)
    }

    pub fn seen_items(&self, user_id: u32) -> Result<HashSet<u32>> {
        Ok(self.items_for_user(user_id)?.iter().map(|&(item, _)| item).collect())
    }

    /// Items the user never interacted with, ascending. Walks the user's
    /// sorted list alongside the item range instead of probing a set.
    pub fn unseen_items(&self, user_id: u32) -> Result<UnseenItems<'_>> {
        Ok(UnseenItems {
            next: 0,
            // bounded by `build`
            end: self.num_items as u32,
            seen: self.items_for_user(user_id)?.iter().peekable(),
        })
    }
}

pub struct UnseenItems<'a> {
    next: u32,
    end: u32,
    seen: Peekable<slice::Iter<'a, (u32, f64)>>,
}

impl<'a> Iterator for UnseenItems<'a> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        while self.next < self.end {
            let candidate = self.next;
            self.next += 1;

            while matches!(self.seen.peek(), Some(&&(item, _)) if item < candidate) {
                self.seen.next();
            }
            match self.seen.peek() {
                Some(&&(item, _)) if item == candidate => continue,
                _ => return Some(candidate),
            }
        }
        None
    }
}

/// Smallest dense bounds that contain every observation.
pub fn infer_dimensions(observations: &[Observation]) -> (usize, usize) {
    observations.iter().fold((0, 0), |(users, items), observation| {
        (
            users.max(observation.user_id as usize + 1),
            items.max(observation.item_id as usize + 1),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observations(triples: &[(u32, u32, f64)]) -> Vec<Observation> {
        triples.iter().map(|&t| Observation::from(t)).collect()
    }

    #[test]
    fn test_build_is_symmetric() {
        let obs = observations(&[(0, 0, 1.0), (0, 1, 2.0), (1, 1, 1.0), (2, 2, 3.0)]);
        let index = InteractionIndex::build(3, 4, obs, 1.0).unwrap();

        assert_eq!(index.nnz(), 4);
        assert_eq!(index.items_for_user(0).unwrap(), &[(0, 2.0), (1, 3.0)]);
        assert_eq!(index.users_for_item(1).unwrap(), &[(0, 3.0), (1, 2.0)]);
        assert!(index.users_for_item(3).unwrap().is_empty());
    }

    #[test]
    fn test_duplicates_sum_raw_strength() {
        let obs = observations(&[(0, 2, 1.0), (0, 2, 2.5), (0, 2, 0.5)]);
        let index = InteractionIndex::build(1, 3, obs, 2.0).unwrap();

        assert_eq!(index.nnz(), 1);
        assert_eq!(index.items_for_user(0).unwrap(), &[(2, 1.0 + 2.0 * 4.0)]);
        assert_eq!(index.users_for_item(2).unwrap(), &[(0, 9.0)]);
    }

    #[test]
    fn test_non_positive_observations_are_not_stored() {
        let obs = observations(&[(0, 0, 0.0), (1, 1, -3.0), (1, 0, 1.0)]);
        let index = InteractionIndex::build(2, 2, obs, 1.0).unwrap();

        assert_eq!(index.nnz(), 1);
        assert!(index.items_for_user(0).unwrap().is_empty());
        assert!(!index.has_interaction(1, 1));
        assert!(index.has_interaction(1, 0));
    }

    #[test]
    fn test_out_of_bounds_index_is_rejected() {
        let err = InteractionIndex::build(2, 2, observations(&[(2, 0, 1.0)]), 1.0).unwrap_err();
        assert!(matches!(err, AlsError::InvalidIndex { user: 2, item: 0, .. }));

        // bounds are checked even for observations that would be dropped
        let err = InteractionIndex::build(2, 2, observations(&[(0, 5, 0.0)]), 1.0).unwrap_err();
        assert!(matches!(err, AlsError::InvalidIndex { item: 5, .. }));
    }

    #[test]
    fn test_non_finite_strength_is_rejected() {
        for strength in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let err = InteractionIndex::build(2, 2, observations(&[(1, 0, strength)]), 1.0).unwrap_err();
            assert!(matches!(err, AlsError::InvalidStrength { user: 1, item: 0, .. }));
        }
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_bounds_beyond_u32_are_rejected() {
        let too_many = u32::MAX as usize + 1;
        let err = InteractionIndex::build(1, too_many, Vec::new(), 1.0).unwrap_err();
        assert!(matches!(err, AlsError::InvalidConfig(_)));
        let err = InteractionIndex::build(too_many, 1, Vec::new(), 1.0).unwrap_err();
        assert!(matches!(err, AlsError::InvalidConfig(_)));
    }

    #[test]
    fn test_non_positive_alpha_is_rejected() {
        let err = InteractionIndex::build(1, 1, Vec::new(), 0.0).unwrap_err();
        assert!(matches!(err, AlsError::InvalidConfig(_)));
    }

    #[test]
    fn test_unseen_items_is_set_difference() {
        let obs = observations(&[(0, 1, 1.0), (0, 3, 1.0), (0, 4, 1.0), (1, 0, 1.0)]);
        let index = InteractionIndex::build(3, 6, obs, 1.0).unwrap();

        assert_eq!(index.unseen_items(0).unwrap().collect::<Vec<_>>(), vec![0, 2, 5]);
        assert_eq!(index.unseen_items(1).unwrap().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        assert_eq!(index.unseen_items(2).unwrap().count(), 6);
        assert!(index.unseen_items(3).is_err());
    }

    #[test]
    fn test_infer_dimensions() {
        let obs = observations(&[(4, 0, 1.0), (0, 9, 1.0)]);
        assert_eq!(infer_dimensions(&obs), (5, 10));
        assert_eq!(infer_dimensions(&[]), (0, 0));
    }
}
