pub mod algorithms;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{AlsError, Result};
pub use models::*;

use algorithms::{InteractionIndex, RecommendationEngine};
use services::recommendation::RecommendationService;
use services::training::{binarize, load_observations, load_snapshot};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub recommendation_service: Arc<services::recommendation::RecommendationService>,
}

impl AppState {
    pub fn new(config: Arc<Config>, recommendation_service: RecommendationService) -> Self {
        Self {
            config,
            recommendation_service: Arc::new(recommendation_service),
        }
    }

    /// Loads the trained snapshot and, when the observation file is present,
    /// rebuilds the interaction index used for seen-item exclusion.
    pub fn load(config: Config) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let snapshot = load_snapshot(Path::new(&config.data.model_path))?;
        let alpha = snapshot.config.alpha;
        let engine = RecommendationEngine::from_snapshot(snapshot)?;

        let observations_path = Path::new(&config.data.observations_path);
        let index = if observations_path.exists() {
            let mut observations =
                load_observations(observations_path, config.data.delimiter, config.data.has_header)?;
            if config.data.binarize_strength {
                binarize(&mut observations);
            }
            let index = InteractionIndex::build(engine.num_users(), engine.num_items(), observations, alpha)?;
            info!("Rebuilt interaction index with {} pairs", index.nnz());
            Some(index)
        } else {
            warn!(
                "Observation file {} not found; seen items will not be excluded",
                config.data.observations_path
            );
            None
        };

        let recommendation_service = RecommendationService::new(engine, index, config.clone())?;
        Ok(Self::new(config, recommendation_service))
    }
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
