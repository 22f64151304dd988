use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Ranking quality of held-out interactions, averaged over evaluated users.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationMetrics {
    pub k: usize,
    pub evaluated_users: usize,
    pub precision_at_k: f64,
    pub recall_at_k: f64,
    pub f1_score: f64,
    pub ndcg_at_k: f64,
    pub map_score: f64,
    pub coverage: f64,
}

#[derive(Debug, Clone)]
pub struct MetricsCalculator {
    k: usize,
}

impl MetricsCalculator {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    pub fn calculate_precision_at_k(&self, recommended: &[u32], relevant: &HashSet<u32>) -> f64 {
        if recommended.is_empty() || self.k == 0 {
            return 0.0;
        }

        let hits = recommended
            .iter()
            .take(self.k)
            .filter(|item| relevant.contains(item))
            .count();

        hits as f64 / self.k.min(recommended.len()) as f64
    }

    pub fn calculate_recall_at_k(&self, recommended: &[u32], relevant: &HashSet<u32>) -> f64 {
        if relevant.is_empty() {
            return 0.0;
        }

        let hits = recommended
            .iter()
            .take(self.k)
            .filter(|item| relevant.contains(item))
            .count();

        hits as f64 / relevant.len() as f64
    }

    pub fn calculate_f1_score(&self, precision: f64, recall: f64) -> f64 {
        if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        }
    }

    /// NDCG with graded relevance; items missing from `relevance` count as 0.
    pub fn calculate_ndcg_at_k(&self, recommended: &[u32], relevance: &HashMap<u32, f64>) -> f64 {
        let dcg = self.calculate_dcg(recommended, relevance);
        let idcg = self.calculate_ideal_dcg(relevance);

        if idcg == 0.0 {
            0.0
        } else {
            dcg / idcg
        }
    }

    fn calculate_dcg(&self, recommended: &[u32], relevance: &HashMap<u32, f64>) -> f64 {
        recommended
            .iter()
            .take(self.k)
            .enumerate()
            .map(|(i, item)| relevance.get(item).copied().unwrap_or(0.0) / discount(i))
            .sum()
    }

    fn calculate_ideal_dcg(&self, relevance: &HashMap<u32, f64>) -> f64 {
        let mut scores: Vec<f64> = relevance.values().copied().collect();
        scores.sort_by(|a, b| b.total_cmp(a));

        scores
            .iter()
            .take(self.k)
            .enumerate()
            .map(|(i, &score)| score / discount(i))
            .sum()
    }

    pub fn calculate_average_precision(&self, recommended: &[u32], relevant: &HashSet<u32>) -> f64 {
        if relevant.is_empty() {
            return 0.0;
        }

        let mut hits = 0;
        let mut precision_sum = 0.0;

        for (i, item) in recommended.iter().take(self.k).enumerate() {
            if relevant.contains(item) {
                hits += 1;
                precision_sum += hits as f64 / (i + 1) as f64;
            }
        }

        precision_sum / relevant.len().min(self.k).max(1) as f64
    }

    /// Share of the catalog that appears in at least one recommendation list.
    pub fn calculate_coverage(&self, all_recommended: &[Vec<u32>], num_items: usize) -> f64 {
        if num_items == 0 {
            return 0.0;
        }

        let covered: HashSet<u32> = all_recommended.iter().flatten().copied().collect();
        covered.len() as f64 / num_items as f64
    }

    /// Averages per-user metrics over `(recommended, relevance)` pairs.
    pub fn calculate_all_metrics(
        &self,
        lists: &[(Vec<u32>, HashMap<u32, f64>)],
        num_items: usize,
    ) -> RecommendationMetrics {
        let evaluated_users = lists.len();
        if evaluated_users == 0 {
            return RecommendationMetrics {
                k: self.k,
                ..Default::default()
            };
        }

        let mut precision = 0.0;
        let mut recall = 0.0;
        let mut ndcg = 0.0;
        let mut map = 0.0;

        for (recommended, relevance) in lists {
            let relevant: HashSet<u32> = relevance.keys().copied().collect();
            precision += self.calculate_precision_at_k(recommended, &relevant);
            recall += self.calculate_recall_at_k(recommended, &relevant);
            ndcg += self.calculate_ndcg_at_k(recommended, relevance);
            map += self.calculate_average_precision(recommended, &relevant);
        }

        let n = evaluated_users as f64;
        let precision_at_k = precision / n;
        let recall_at_k = recall / n;
        let recommended: Vec<Vec<u32>> = lists.iter().map(|(r, _)| r.clone()).collect();

        RecommendationMetrics {
            k: self.k,
            evaluated_users,
            precision_at_k,
            recall_at_k,
            f1_score: self.calculate_f1_score(precision_at_k, recall_at_k),
            ndcg_at_k: ndcg / n,
            map_score: map / n,
            coverage: self.calculate_coverage(&recommended, num_items),
        }
    }
}

fn discount(position: usize) -> f64 {
    (position as f64 + 2.0).log2()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[u32]) -> HashSet<u32> {
        items.iter().copied().collect()
    }

    #[test]
    fn test_precision_and_recall() {
        let calculator = MetricsCalculator::new(5);
        let recommended = vec![10, 11, 12];
        let relevant = set(&[10, 12]);

        assert!((calculator.calculate_precision_at_k(&recommended, &relevant) - 2.0 / 3.0).abs() < 1e-12);
        assert!((calculator.calculate_recall_at_k(&recommended, &relevant) - 1.0).abs() < 1e-12);
        assert_eq!(calculator.calculate_recall_at_k(&recommended, &set(&[])), 0.0);
    }

    #[test]
    fn test_ndcg_is_one_for_ideal_order() {
        let calculator = MetricsCalculator::new(3);
        let relevance: HashMap<u32, f64> = [(1, 3.0), (2, 1.0)].into_iter().collect();

        assert!((calculator.calculate_ndcg_at_k(&[1, 2, 9], &relevance) - 1.0).abs() < 1e-12);
        let swapped = calculator.calculate_ndcg_at_k(&[2, 1, 9], &relevance);
        assert!(swapped > 0.0 && swapped < 1.0);
        assert_eq!(calculator.calculate_ndcg_at_k(&[9], &relevance), 0.0);
    }

    #[test]
    fn test_average_precision() {
        let calculator = MetricsCalculator::new(4);
        // hits at positions 1 and 3: (1/1 + 2/3) / 2
        let ap = calculator.calculate_average_precision(&[5, 6, 7, 8], &set(&[5, 7]));
        assert!((ap - (1.0 + 2.0 / 3.0) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_metrics_average_over_users() {
        let calculator = MetricsCalculator::new(2);
        let lists = vec![
            (vec![0, 1], [(0, 1.0)].into_iter().collect()),
            (vec![2, 3], [(1, 1.0)].into_iter().collect()),
        ];

        let metrics = calculator.calculate_all_metrics(&lists, 8);
        assert_eq!(metrics.evaluated_users, 2);
        assert!((metrics.precision_at_k - 0.25).abs() < 1e-12);
        assert!((metrics.recall_at_k - 0.5).abs() < 1e-12);
        assert!((metrics.coverage - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_evaluation() {
        let metrics = MetricsCalculator::new(10).calculate_all_metrics(&[], 5);
        assert_eq!(metrics.evaluated_users, 0);
        assert_eq!(metrics.k, 10);
    }
}
