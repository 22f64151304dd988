use crate::algorithms::initializer::FactorInitializer;
use crate::algorithms::interactions::InteractionIndex;
use crate::config::TrainingConfig;
use crate::error::{AlsError, Result};
use crate::models::FactorSide;
use nalgebra::{DMatrix, DVector};
use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// `F^T F` of the fixed side, computed once per phase and shared read-only by
/// every row solve of that phase.
#[derive(Debug, Clone)]
pub struct GramSnapshot {
    generation: usize,
    matrix: DMatrix<f64>,
}

impl GramSnapshot {
    pub fn compute(generation: usize, factors: ArrayView2<f64>) -> Self {
        let gram = factors.t().dot(&factors);
        let rank = factors.ncols();
        Self {
            generation,
            matrix: DMatrix::from_fn(rank, rank, |i, j| gram[[i, j]]),
        }
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SingularRow {
    pub iteration: usize,
    pub side: FactorSide,
    pub index: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub iterations: usize,
    pub singular_rows: Vec<SingularRow>,
    /// Objective after each outer iteration; empty unless `compute_loss`.
    pub loss_history: Vec<f64>,
    pub elapsed: Duration,
}

/// Output of one training run: X (users x rank) and Y (items x rank).
#[derive(Debug, Clone)]
pub struct Factorization {
    pub user_factors: Array2<f64>,
    pub item_factors: Array2<f64>,
    pub report: TrainingReport,
}

impl Factorization {
    pub fn into_parts(self) -> (Array2<f64>, Array2<f64>, TrainingReport) {
        (self.user_factors, self.item_factors, self.report)
    }
}

/// Implicit-feedback alternating least squares.
///
/// Each outer iteration solves every user row against the frozen item factors,
/// then every item row against the freshly solved user factors. Training stops
/// after exactly `iterations` passes.
#[derive(Debug, Clone)]
pub struct ImplicitAls {
    config: TrainingConfig,
}

impl ImplicitAls {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn fit(&self, index: &InteractionIndex) -> Result<Factorization> {
        match self.config.num_threads {
            Some(num_threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .thread_name(|i| format!("als-worker-{}", i))
                    .build()?;
                Ok(pool.install(|| self.run(index)))
            }
            None => Ok(self.run(index)),
        }
    }

    fn run(&self, index: &InteractionIndex) -> Factorization {
        let config = &self.config;
        let started = Instant::now();

        let (mut user_factors, mut item_factors) = FactorInitializer::new(config.init, config.random_seed)
            .initialize(index.num_users(), index.num_items(), config.rank);

        info!(
            "Training implicit ALS: {} users, {} items, {} pairs, rank={}, iterations={}, alpha={}, lambda={}",
            index.num_users(),
            index.num_items(),
            index.nnz(),
            config.rank,
            config.iterations,
            config.alpha,
            config.lambda
        );

        let mut singular_rows = Vec::new();
        let mut loss_history = Vec::new();

        for iteration in 1..=config.iterations {
            let iteration_started = Instant::now();
            let generation = 2 * (iteration - 1);

            let failed_users = solve_phase(
                FactorSide::User,
                &mut user_factors,
                &item_factors,
                index.by_user(),
                config.lambda,
                generation,
            );
            let failed_items = solve_phase(
                FactorSide::Item,
                &mut item_factors,
                &user_factors,
                index.by_item(),
                config.lambda,
                generation + 1,
            );

            singular_rows.extend(failed_users.into_iter().map(|index| SingularRow {
                iteration,
                side: FactorSide::User,
                index,
            }));
            singular_rows.extend(failed_items.into_iter().map(|index| SingularRow {
                iteration,
                side: FactorSide::Item,
                index,
            }));

            if config.compute_loss {
                let loss = implicit_loss(index, &user_factors, &item_factors, config.lambda);
                loss_history.push(loss);
                info!(
                    "Iteration {}/{} finished in {:?}, loss={:.6}",
                    iteration,
                    config.iterations,
                    iteration_started.elapsed(),
                    loss
                );
            } else {
                info!(
                    "Iteration {}/{} finished in {:?}",
                    iteration,
                    config.iterations,
                    iteration_started.elapsed()
                );
            }
        }

        let report = TrainingReport {
            iterations: config.iterations,
            singular_rows,
            loss_history,
            elapsed: started.elapsed(),
        };

        if !report.singular_rows.is_empty() {
            warn!(
                "{} row solves were singular and defaulted to zero",
                report.singular_rows.len()
            );
        }
        info!("Training completed in {:?}", report.elapsed);

        Factorization {
            user_factors,
            item_factors,
            report,
        }
    }
}

/// Trains factors for `index` under `config`.
pub fn train(index: &InteractionIndex, config: &TrainingConfig) -> Result<Factorization> {
    ImplicitAls::new(config.clone())?.fit(index)
}

/// Recomputes every row of `target` from the frozen `fixed` factors. Rows are
/// written by exactly one task each. Returns the rows whose system was
/// singular, ascending; those rows are left at zero.
fn solve_phase(
    side: FactorSide,
    target: &mut Array2<f64>,
    fixed: &Array2<f64>,
    adjacency: &[Vec<(u32, f64)>],
    lambda: f64,
    generation: usize,
) -> Vec<u32> {
    let gram = GramSnapshot::compute(generation, fixed.view());
    debug!("Solving {} rows against gram generation {}", side, gram.generation());

    let mut failed: Vec<u32> = target
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(adjacency.par_iter())
        .enumerate()
        .filter_map(|(row, (mut out, interactions))| {
            if interactions.is_empty() {
                out.fill(0.0);
                return None;
            }
            match solve_row(&gram, fixed.view(), interactions, lambda) {
                Some(solution) => {
                    out.iter_mut().zip(solution.iter()).for_each(|(dst, &src)| *dst = src);
                    None
                }
                None => {
                    out.fill(0.0);
                    Some(row as u32)
                }
            }
        })
        .collect();

    failed.sort_unstable();
    for &index in &failed {
        warn!("{}; row defaulted to zero", AlsError::SingularSystem { side, index });
    }
    failed
}

/// Solves `(G + F_u^T (C_u - I) F_u + lambda I) x = F_u^T C_u 1` by Cholesky.
/// `None` when the system is not positive definite.
fn solve_row(
    gram: &GramSnapshot,
    fixed: ArrayView2<f64>,
    interactions: &[(u32, f64)],
    lambda: f64,
) -> Option<DVector<f64>> {
    let rank = fixed.ncols();
    let mut a = gram.matrix().clone();
    let mut b = DVector::<f64>::zeros(rank);

    for &(j, confidence) in interactions {
        let f = fixed.row(j as usize);
        for p in 0..rank {
            b[p] += confidence * f[p];
            let scaled = (confidence - 1.0) * f[p];
            for q in 0..rank {
                a[(p, q)] += scaled * f[q];
            }
        }
    }
    for d in 0..rank {
        a[(d, d)] += lambda;
    }

    let solution = a.cholesky()?.solve(&b);
    solution.iter().all(|v| v.is_finite()).then_some(solution)
}

/// Confidence-weighted objective
/// `sum_{u,i} c_ui (p_ui - x_u.y_i)^2 + lambda (|X|^2 + |Y|^2)`, evaluated
/// without touching unobserved pairs individually.
pub fn implicit_loss(index: &InteractionIndex, user_factors: &Array2<f64>, item_factors: &Array2<f64>, lambda: f64) -> f64 {
    let gram = item_factors.t().dot(item_factors);

    let per_user: Vec<f64> = user_factors
        .axis_iter(Axis(0))
        .into_par_iter()
        .zip(index.by_user().par_iter())
        .map(|(x, items)| {
            let unobserved = x.dot(&gram.dot(&x));
            let observed: f64 = items
                .iter()
                .map(|&(item, confidence)| {
                    let score = x.dot(&item_factors.row(item as usize));
                    confidence * (1.0 - score).powi(2) - score * score
                })
                .sum();
            unobserved + observed
        })
        .collect();

    let data_term: f64 = per_user.iter().sum();
    let norm = |m: &Array2<f64>| m.iter().map(|v| v * v).sum::<f64>();
    data_term + lambda * (norm(user_factors) + norm(item_factors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Observation;
    use ndarray::{array, Array1};

    fn sample_index() -> InteractionIndex {
        let observations = vec![
            Observation::new(0, 0, 1.0),
            Observation::new(0, 1, 2.0),
            Observation::new(1, 1, 1.0),
            Observation::new(1, 3, 4.0),
            Observation::new(2, 2, 3.0),
            Observation::new(2, 0, 1.0),
        ];
        InteractionIndex::build(4, 5, observations, 1.0).unwrap()
    }

    fn config() -> TrainingConfig {
        TrainingConfig {
            rank: 3,
            iterations: 8,
            alpha: 1.0,
            lambda: 0.1,
            random_seed: 7,
            ..Default::default()
        }
    }

    #[test]
    fn test_invalid_config_is_rejected_before_training() {
        let bad = TrainingConfig { rank: 0, ..config() };
        assert!(matches!(ImplicitAls::new(bad), Err(AlsError::InvalidConfig(_))));
    }

    #[test]
    fn test_non_finite_init_fails_instead_of_sampling() {
        use crate::algorithms::InitializationMethod;

        let index = sample_index();
        for init in [
            InitializationMethod::Jitter { scale: f64::INFINITY },
            InitializationMethod::Uniform { low: f64::NEG_INFINITY, high: 0.0 },
            InitializationMethod::Normal { mean: 0.0, std_dev: f64::NAN },
        ] {
            let result = train(&index, &TrainingConfig { init, ..config() });
            assert!(matches!(result, Err(AlsError::InvalidConfig(_))), "{:?}", init);
        }
    }

    #[test]
    fn test_rows_without_interactions_are_zero() {
        let factorization = train(&sample_index(), &config()).unwrap();

        assert_eq!(factorization.user_factors.dim(), (4, 3));
        assert_eq!(factorization.item_factors.dim(), (5, 3));
        assert!(factorization.user_factors.row(3).iter().all(|&v| v == 0.0));
        assert!(factorization.item_factors.row(4).iter().all(|&v| v == 0.0));
        assert!(factorization.report.singular_rows.is_empty());
    }

    #[test]
    fn test_training_is_deterministic_across_pools() {
        let index = sample_index();
        let first = train(&index, &config()).unwrap();
        let second = train(&index, &TrainingConfig { num_threads: Some(2), ..config() }).unwrap();

        for (a, b) in first.user_factors.iter().zip(second.user_factors.iter()) {
            assert!((a - b).abs() <= 1e-9 * a.abs().max(1.0));
        }
        for (a, b) in first.item_factors.iter().zip(second.item_factors.iter()) {
            assert!((a - b).abs() <= 1e-9 * a.abs().max(1.0));
        }
    }

    #[test]
    fn test_loss_never_increases() {
        let factorization = train(&sample_index(), &config()).unwrap();
        let history = &factorization.report.loss_history;

        assert_eq!(history.len(), 8);
        for pair in history.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-9 * pair[0].abs().max(1.0), "{:?}", history);
        }
    }

    #[test]
    fn test_loss_is_skipped_when_disabled() {
        let factorization = train(&sample_index(), &TrainingConfig { compute_loss: false, ..config() }).unwrap();
        assert!(factorization.report.loss_history.is_empty());
    }

    #[test]
    fn test_row_solve_matches_dense_normal_equations() {
        let fixed = array![[0.5, -0.2], [0.1, 0.9], [0.3, 0.3], [-0.4, 0.7]];
        let interactions = vec![(1u32, 3.0), (3u32, 1.5)];
        let lambda = 0.25;

        let gram = GramSnapshot::compute(0, fixed.view());
        let x = solve_row(&gram, fixed.view(), &interactions, lambda).unwrap();

        // dense C_u over every item, 1 where unobserved
        let mut confidence = Array1::<f64>::ones(4);
        let mut preference = Array1::<f64>::zeros(4);
        for &(item, c) in &interactions {
            confidence[item as usize] = c;
            preference[item as usize] = 1.0;
        }
        let weighted = &fixed * &confidence.view().insert_axis(Axis(1));
        let a = fixed.t().dot(&weighted) + Array2::<f64>::eye(2) * lambda;
        let b = weighted.t().dot(&preference);

        for p in 0..2 {
            let lhs: f64 = (0..2).map(|q| a[[p, q]] * x[q]).sum();
            assert!((lhs - b[p]).abs() < 1e-10);
        }
    }

    #[test]
    fn test_singular_rows_are_reported_and_zeroed() {
        let mut target = Array2::<f64>::from_elem((2, 2), 5.0);
        let fixed = Array2::<f64>::zeros((3, 2));
        let adjacency = vec![vec![(0u32, 2.0)], vec![]];

        let failed = solve_phase(FactorSide::User, &mut target, &fixed, &adjacency, 0.0, 0);

        assert_eq!(failed, vec![0]);
        assert!(target.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_gram_snapshot_is_symmetric() {
        let factors = array![[1.0, 2.0], [3.0, 4.0], [0.5, -1.0]];
        let gram = GramSnapshot::compute(3, factors.view());

        assert_eq!(gram.generation(), 3);
        assert_eq!(gram.matrix()[(0, 1)], gram.matrix()[(1, 0)]);
        assert_eq!(gram.matrix()[(0, 0)], 1.0 + 9.0 + 0.25);
    }
}
