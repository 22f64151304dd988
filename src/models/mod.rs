use crate::config::TrainingConfig;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One implicit interaction delivered by the ETL collaborator, with indices
/// already densified into `[0, N_u)` and `[0, N_p)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub user_id: u32,
    pub item_id: u32,
    pub strength: f64,
}

/// A stored (user, item) pair. Preference is implicitly 1; only positive
/// observations ever become entries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceEntry {
    pub user_id: u32,
    pub item_id: u32,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorSide {
    User,
    Item,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item_id: u32,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub user_id: u32,
    pub num_recommendations: i64,
    #[serde(default)]
    pub exclude_items: Option<Vec<u32>>,
    #[serde(default)]
    pub exclude_seen: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub user_id: u32,
    pub recommendations: Vec<ScoredItem>,
    pub generated_at: DateTime<Utc>,
}

/// Trained factors plus the configuration that produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub config: TrainingConfig,
    pub user_factors: Array2<f64>,
    pub item_factors: Array2<f64>,
}

impl Observation {
    pub fn new(user_id: u32, item_id: u32, strength: f64) -> Self {
        Self {
            user_id,
            item_id,
            strength,
        }
    }
}

impl From<(u32, u32, f64)> for Observation {
    fn from((user_id, item_id, strength): (u32, u32, f64)) -> Self {
        Self::new(user_id, item_id, strength)
    }
}

impl fmt::Display for FactorSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactorSide::User => write!(f, "user"),
            FactorSide::Item => write!(f, "item"),
        }
    }
}

impl RecommendationRequest {
    pub fn new(user_id: u32, num_recommendations: i64) -> Self {
        Self {
            user_id,
            num_recommendations,
            exclude_items: None,
            exclude_seen: None,
        }
    }

    pub fn with_exclude_items(mut self, items: Vec<u32>) -> Self {
        self.exclude_items = Some(items);
        self
    }

    pub fn with_exclude_seen(mut self, exclude_seen: bool) -> Self {
        self.exclude_seen = Some(exclude_seen);
        self
    }
}

impl ModelSnapshot {
    pub fn new(config: TrainingConfig, user_factors: Array2<f64>, item_factors: Array2<f64>) -> Self {
        let trained_at = Utc::now();
        Self {
            version: format!("v{}", trained_at.timestamp()),
            trained_at,
            config,
            user_factors,
            item_factors,
        }
    }

    pub fn num_users(&self) -> usize {
        self.user_factors.nrows()
    }

    pub fn num_items(&self) -> usize {
        self.item_factors.nrows()
    }
}
