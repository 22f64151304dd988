use crate::algorithms::{InteractionIndex, RecommendationEngine};
use crate::config::Config;
use crate::error::{AlsError, Result};
use crate::models::*;
use crate::utils::validation::validate_k;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Answers score and ranking queries against one trained model. The optional
/// interaction index supplies each user's seen items for exclusion.
pub struct RecommendationService {
    engine: Arc<RecommendationEngine>,
    index: Option<Arc<InteractionIndex>>,
    config: Arc<Config>,
}

impl RecommendationService {
    pub fn new(
        engine: RecommendationEngine,
        index: Option<InteractionIndex>,
        config: Arc<Config>,
    ) -> Result<Self> {
        if let Some(index) = &index {
            if index.num_users() != engine.num_users() || index.num_items() != engine.num_items() {
                return Err(AlsError::ShapeMismatch {
                    index_users: index.num_users(),
                    index_items: index.num_items(),
                    model_users: engine.num_users(),
                    model_items: engine.num_items(),
                });
            }
        }

        Ok(Self {
            engine: Arc::new(engine),
            index: index.map(Arc::new),
            config,
        })
    }

    pub fn engine(&self) -> &RecommendationEngine {
        &self.engine
    }

    pub fn predict(&self, user_id: u32, item_id: u32) -> Result<ScoredItem> {
        Ok(ScoredItem {
            item_id,
            score: self.engine.predict(user_id, item_id)?,
        })
    }

    pub fn predict_all(&self, user_id: u32, item_ids: &[u32]) -> Result<Vec<ScoredItem>> {
        self.engine.predict_all(user_id, item_ids.iter().copied())
    }

    pub fn recommend(&self, request: &RecommendationRequest) -> Result<RecommendationResponse> {
        let k = validate_k(request.num_recommendations, self.config.recommendation.max_k)?;
        let exclude_seen = request
            .exclude_seen
            .unwrap_or(self.config.recommendation.exclude_seen);
        let extra = request.exclude_items.as_deref().unwrap_or(&[]);

        let recommendations = match (exclude_seen, self.index.as_deref()) {
            (true, Some(index)) if extra.is_empty() => {
                self.engine.top_k_unseen(request.user_id, k, index)?
            }
            (true, Some(index)) => {
                let mut exclude = index.seen_items(request.user_id)?;
                exclude.extend(extra.iter().copied());
                self.engine.top_k(request.user_id, k, &exclude)?
            }
            (true, None) => {
                warn!("Seen-item exclusion requested but no interaction index is loaded");
                let exclude: HashSet<u32> = extra.iter().copied().collect();
                self.engine.top_k(request.user_id, k, &exclude)?
            }
            (false, _) => {
                let exclude: HashSet<u32> = extra.iter().copied().collect();
                self.engine.top_k(request.user_id, k, &exclude)?
            }
        };

        debug!(
            "Recommended {} items for user {} (k={}, exclude_seen={})",
            recommendations.len(),
            request.user_id,
            k,
            exclude_seen
        );

        Ok(RecommendationResponse {
            user_id: request.user_id,
            recommendations,
            generated_at: Utc::now(),
        })
    }

    pub fn similar_items(&self, item_id: u32, k: i64) -> Result<Vec<ScoredItem>> {
        let k = validate_k(k, self.config.recommendation.max_k)?;
        self.engine.similar_items(item_id, k)
    }
}
