use crate::algorithms::als::Factorization;
use crate::algorithms::interactions::InteractionIndex;
use crate::error::{AlsError, Result};
use crate::models::{FactorSide, ModelSnapshot, ScoredItem};
use crate::utils::top_k_scored;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use std::collections::HashSet;

/// Read-only query surface over trained factor matrices.
#[derive(Debug, Clone)]
pub struct RecommendationEngine {
    user_factors: Array2<f64>,
    item_factors: Array2<f64>,
}

impl RecommendationEngine {
    pub fn new(user_factors: Array2<f64>, item_factors: Array2<f64>) -> Result<Self> {
        if user_factors.ncols() != item_factors.ncols() {
            return Err(AlsError::DimensionMismatch {
                user_rank: user_factors.ncols(),
                item_rank: item_factors.ncols(),
            });
        }
        Ok(Self {
            user_factors,
            item_factors,
        })
    }

    pub fn from_factorization(factorization: Factorization) -> Self {
        let (user_factors, item_factors, _) = factorization.into_parts();
        Self {
            user_factors,
            item_factors,
        }
    }

    pub fn from_snapshot(snapshot: ModelSnapshot) -> Result<Self> {
        Self::new(snapshot.user_factors, snapshot.item_factors)
    }

    pub fn num_users(&self) -> usize {
        self.user_factors.nrows()
    }

    pub fn num_items(&self) -> usize {
        self.item_factors.nrows()
    }

    pub fn rank(&self) -> usize {
        self.user_factors.ncols()
    }

    pub fn user_factors(&self) -> ArrayView2<'_, f64> {
        self.user_factors.view()
    }

    pub fn item_factors(&self) -> ArrayView2<'_, f64> {
        self.item_factors.view()
    }

    fn user_row(&self, user_id: u32) -> Result<ArrayView1<'_, f64>> {
        if user_id as usize >= self.num_users() {
            return Err(AlsError::OutOfRange {
                side: FactorSide::User,
                index: user_id,
                bound: self.num_users(),
            });
        }
        Ok(self.user_factors.row(user_id as usize))
    }

    fn item_row(&self, item_id: u32) -> Result<ArrayView1<'_, f64>> {
        if item_id as usize >= self.num_items() {
            return Err(AlsError::OutOfRange {
                side: FactorSide::Item,
                index: item_id,
                bound: self.num_items(),
            });
        }
        Ok(self.item_factors.row(item_id as usize))
    }

    /// Scores of every item for one user, `Y x_u`.
    fn score_all(&self, user_id: u32) -> Result<Array1<f64>> {
        Ok(self.item_factors.dot(&self.user_row(user_id)?))
    }

    pub fn predict(&self, user_id: u32, item_id: u32) -> Result<f64> {
        let user = self.user_row(user_id)?;
        let item = self.item_row(item_id)?;
        Ok(user.dot(&item))
    }

    /// Scores each candidate in iteration order. Fails on the first candidate
    /// outside the item range.
    pub fn predict_all<I>(&self, user_id: u32, candidates: I) -> Result<Vec<ScoredItem>>
    where
        I: IntoIterator<Item = u32>,
    {
        let user = self.user_row(user_id)?;
        candidates
            .into_iter()
            .map(|item_id| {
                Ok(ScoredItem {
                    item_id,
                    score: user.dot(&self.item_row(item_id)?),
                })
            })
            .collect()
    }

    /// The `k` best items outside `exclude`, by descending score with ties on
    /// ascending item index. Returns fewer than `k` when fewer remain.
    pub fn top_k(&self, user_id: u32, k: usize, exclude: &HashSet<u32>) -> Result<Vec<ScoredItem>> {
        let scores = self.score_all(user_id)?;
        let candidates = scores
            .iter()
            .enumerate()
            .map(|(item, &score)| ScoredItem {
                item_id: item as u32,
                score,
            })
            .filter(|scored| !exclude.contains(&scored.item_id))
            .collect();
        Ok(top_k_scored(candidates, k))
    }

    /// [`RecommendationEngine::top_k`] with the user's own interactions
    /// excluded, walking the index's set difference directly.
    pub fn top_k_unseen(&self, user_id: u32, k: usize, index: &InteractionIndex) -> Result<Vec<ScoredItem>> {
        self.ensure_compatible(index)?;
        let scores = self.score_all(user_id)?;
        let candidates = index
            .unseen_items(user_id)?
            .map(|item_id| ScoredItem {
                item_id,
                score: scores[item_id as usize],
            })
            .collect();
        Ok(top_k_scored(candidates, k))
    }

    /// `top_k_unseen` for many users in parallel; results follow input order.
    pub fn recommend_batch(&self, user_ids: &[u32], k: usize, index: &InteractionIndex) -> Result<Vec<Vec<ScoredItem>>> {
        user_ids
            .par_iter()
            .map(|&user_id| self.top_k_unseen(user_id, k, index))
            .collect()
    }

    /// Items closest to `item_id` by cosine similarity of their factors.
    pub fn similar_items(&self, item_id: u32, k: usize) -> Result<Vec<ScoredItem>> {
        let target = self.item_row(item_id)?;
        let target_norm = target.dot(&target).sqrt();
        let norms = self.item_factors.map_axis(Axis(1), |row| row.dot(&row).sqrt());
        let dots = self.item_factors.dot(&target);

        let candidates = dots
            .iter()
            .zip(norms.iter())
            .enumerate()
            .filter(|&(item, _)| item as u32 != item_id)
            .map(|(item, (&dot, &norm))| {
                let score = if norm == 0.0 || target_norm == 0.0 {
                    0.0
                } else {
                    dot / (norm * target_norm)
                };
                ScoredItem {
                    item_id: item as u32,
                    score,
                }
            })
            .collect();
        Ok(top_k_scored(candidates, k))
    }

    fn ensure_compatible(&self, index: &InteractionIndex) -> Result<()> {
        if index.num_users() != self.num_users() || index.num_items() != self.num_items() {
            return Err(AlsError::ShapeMismatch {
                index_users: index.num_users(),
                index_items: index.num_items(),
                model_users: self.num_users(),
                model_items: self.num_items(),
            });
        }
        Ok(())
    }
}
