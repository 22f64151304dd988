use crate::models::ScoredItem;
use std::cmp::Ordering;

pub mod metrics;
pub mod validation;

/// Descending score, then ascending item index.
pub fn ranking_order(a: &ScoredItem, b: &ScoredItem) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.item_id.cmp(&b.item_id))
}

/// Keeps the `k` best entries under [`ranking_order`], sorted. Partial
/// selection first so only the survivors pay for the full sort.
pub fn top_k_scored(mut scored: Vec<ScoredItem>, k: usize) -> Vec<ScoredItem> {
    if k == 0 {
        return Vec::new();
    }
    if scored.len() > k {
        scored.select_nth_unstable_by(k - 1, ranking_order);
        scored.truncate(k);
    }
    scored.sort_unstable_by(ranking_order);
    scored
}
