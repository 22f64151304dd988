use crate::algorithms::initializer::InitializationMethod;
use crate::error::{AlsError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub training: TrainingConfig,
    pub recommendation: RecommendationConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

/// Hyper-parameters of one training run. `rank` and `lambda` stay fixed
/// for the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub rank: usize,
    pub iterations: usize,
    pub alpha: f64,
    pub lambda: f64,
    pub random_seed: u64,
    pub init: InitializationMethod,
    /// Size of a dedicated worker pool; `None` uses rayon's global pool.
    pub num_threads: Option<usize>,
    pub compute_loss: bool,
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.rank == 0 {
            return Err(AlsError::InvalidConfig("rank must be positive".to_string()));
        }
        if self.iterations == 0 {
            return Err(AlsError::InvalidConfig(
                "iterations must be positive".to_string(),
            ));
        }
        if !self.alpha.is_finite() || self.alpha <= 0.0 {
            return Err(AlsError::InvalidConfig(format!(
                "alpha must be a positive finite number, got {}",
                self.alpha
            )));
        }
        if !self.lambda.is_finite() || self.lambda < 0.0 {
            return Err(AlsError::InvalidConfig(format!(
                "lambda must be a non-negative finite number, got {}",
                self.lambda
            )));
        }
        match self.init {
            InitializationMethod::ScaledUniform => {}
            InitializationMethod::Uniform { low, high } => {
                // the sampler also needs a finite width
                if !(low < high) || !(high - low).is_finite() {
                    return Err(AlsError::InvalidConfig(format!(
                        "uniform init needs finite low < high, got [{}, {})",
                        low, high
                    )));
                }
            }
            InitializationMethod::Normal { mean, std_dev } => {
                if !mean.is_finite() || !std_dev.is_finite() || std_dev < 0.0 {
                    return Err(AlsError::InvalidConfig(format!(
                        "normal init needs a finite mean and non-negative finite std_dev, got mean={} std_dev={}",
                        mean, std_dev
                    )));
                }
            }
            InitializationMethod::Jitter { scale } => {
                if !scale.is_finite() || scale <= 0.0 {
                    return Err(AlsError::InvalidConfig(format!(
                        "jitter scale must be a positive finite number, got {}",
                        scale
                    )));
                }
            }
        }
        if self.num_threads == Some(0) {
            return Err(AlsError::InvalidConfig(
                "num_threads must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    pub default_k: usize,
    pub max_k: usize,
    pub exclude_seen: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub observations_path: String,
    pub delimiter: char,
    pub has_header: bool,
    /// Collapse every positive strength to 1 before indexing.
    pub binarize_strength: bool,
    pub model_path: String,
    /// Dense user bound; inferred as `max user index + 1` when absent.
    pub num_users: Option<usize>,
    pub num_items: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: num_cpus::get(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            rank: 10,
            iterations: 10,
            alpha: 40.0,
            lambda: 0.01,
            random_seed: 42,
            init: InitializationMethod::default(),
            num_threads: None,
            compute_loss: true,
        }
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            default_k: 10,
            max_k: 1000,
            exclude_seen: true,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            observations_path: "data/observations.csv".to_string(),
            delimiter: ',',
            has_header: false,
            binarize_strength: false,
            model_path: "data/model.json".to_string(),
            num_users: None,
            num_items: None,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("IMPLICIT_ALS").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_training_config_is_valid() {
        assert!(TrainingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_hyper_parameters() {
        let cases = [
            TrainingConfig { rank: 0, ..Default::default() },
            TrainingConfig { iterations: 0, ..Default::default() },
            TrainingConfig { alpha: 0.0, ..Default::default() },
            TrainingConfig { alpha: f64::NAN, ..Default::default() },
            TrainingConfig { lambda: -0.5, ..Default::default() },
            TrainingConfig { num_threads: Some(0), ..Default::default() },
            TrainingConfig { init: InitializationMethod::Uniform { low: 1.0, high: 1.0 }, ..Default::default() },
            TrainingConfig { init: InitializationMethod::Uniform { low: f64::NEG_INFINITY, high: 0.0 }, ..Default::default() },
            TrainingConfig { init: InitializationMethod::Uniform { low: -f64::MAX, high: f64::MAX }, ..Default::default() },
            TrainingConfig { init: InitializationMethod::Uniform { low: f64::NAN, high: 1.0 }, ..Default::default() },
            TrainingConfig { init: InitializationMethod::Normal { mean: 0.0, std_dev: f64::NAN }, ..Default::default() },
            TrainingConfig { init: InitializationMethod::Normal { mean: f64::INFINITY, std_dev: 0.1 }, ..Default::default() },
            TrainingConfig { init: InitializationMethod::Normal { mean: 0.0, std_dev: -0.1 }, ..Default::default() },
            TrainingConfig { init: InitializationMethod::Jitter { scale: 0.0 }, ..Default::default() },
            TrainingConfig { init: InitializationMethod::Jitter { scale: f64::INFINITY }, ..Default::default() },
        ];

        for config in cases {
            assert!(
                matches!(config.validate(), Err(AlsError::InvalidConfig(_))),
                "expected InvalidConfig for {:?}",
                config
            );
        }
    }

    #[test]
    fn test_valid_init_methods_pass() {
        let methods = [
            InitializationMethod::ScaledUniform,
            InitializationMethod::Uniform { low: -0.5, high: 0.5 },
            InitializationMethod::Normal { mean: 0.0, std_dev: 0.1 },
            InitializationMethod::Jitter { scale: 1e-3 },
        ];
        for init in methods {
            assert!(TrainingConfig { init, ..Default::default() }.validate().is_ok());
        }
    }

    #[test]
    fn test_zero_lambda_is_allowed() {
        let config = TrainingConfig { lambda: 0.0, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_fills_missing_sections_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[training]\nrank = 4\nalpha = 2.5\n\n[server]\nport = 9000").unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.training.rank, 4);
        assert_eq!(config.training.alpha, 2.5);
        assert_eq!(config.training.iterations, TrainingConfig::default().iterations);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.recommendation.default_k, 10);
    }
}
