use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum InitializationMethod {
    /// Uniform in `[0, 1 / sqrt(rank))`.
    #[default]
    ScaledUniform,
    Uniform { low: f64, high: f64 },
    Normal { mean: f64, std_dev: f64 },
    /// Zero plus uniform jitter in `[-scale, scale)`.
    Jitter { scale: f64 },
}

impl InitializationMethod {
    pub fn sample<R: Rng>(&self, rng: &mut R, rank: usize) -> f64 {
        match *self {
            InitializationMethod::ScaledUniform => {
                let high = 1.0 / (rank as f64).sqrt();
                rng.gen_range(0.0..high)
            }
            InitializationMethod::Uniform { low, high } => rng.gen_range(low..high),
            InitializationMethod::Normal { mean, std_dev } => {
                // Box-Muller; 1 - u keeps the log argument in (0, 1]
                let u1: f64 = 1.0 - rng.gen::<f64>();
                let u2: f64 = rng.gen();
                let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
                z0 * std_dev + mean
            }
            InitializationMethod::Jitter { scale } => rng.gen_range(-scale..scale),
        }
    }

    pub fn initialize_matrix<R: Rng>(&self, rng: &mut R, rows: usize, rank: usize) -> Array2<f64> {
        Array2::from_shape_simple_fn((rows, rank), || self.sample(rng, rank))
    }
}

/// Draws both factor matrices from a single seeded stream, X first, so that a
/// given seed always reproduces the same starting point.
pub struct FactorInitializer {
    method: InitializationMethod,
    seed: u64,
}

impl FactorInitializer {
    pub fn new(method: InitializationMethod, seed: u64) -> Self {
        Self { method, seed }
    }

    pub fn initialize(&self, num_users: usize, num_items: usize, rank: usize) -> (Array2<f64>, Array2<f64>) {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let user_factors = self.method.initialize_matrix(&mut rng, num_users, rank);
        let item_factors = self.method.initialize_matrix(&mut rng, num_items, rank);
        (user_factors, item_factors)
    }
}
