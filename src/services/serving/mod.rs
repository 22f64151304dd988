use crate::error::AlsError;
use crate::models::{RecommendationRequest, RecommendationResponse, ScoredItem};
use crate::utils::validation::parse_index_list;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    k: Option<i64>,
    exclude: Option<String>,
    exclude_seen: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    k: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    items: Vec<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: "Success".to_string(),
        }
    }

    fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message,
        }
    }
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<AlsError> for ApiError {
    fn from(err: AlsError) -> Self {
        let status = match &err {
            AlsError::OutOfRange { .. } => StatusCode::NOT_FOUND,
            AlsError::InvalidK(_)
            | AlsError::InvalidIndex { .. }
            | AlsError::InvalidStrength { .. }
            | AlsError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if !err.is_client_error() {
            tracing::error!("Query failed: {}", err);
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HashMap<String, String>>> {
    let engine = state.recommendation_service.engine();
    let mut status = HashMap::new();
    status.insert("status".to_string(), "healthy".to_string());
    status.insert("service".to_string(), "implicit-als".to_string());
    status.insert("version".to_string(), env!("CARGO_PKG_VERSION").to_string());
    status.insert("users".to_string(), engine.num_users().to_string());
    status.insert("items".to_string(), engine.num_items().to_string());
    status.insert("rank".to_string(), engine.rank().to_string());

    Json(ApiResponse::success(status))
}

async fn get_score(
    State(state): State<AppState>,
    Path((user_id, item_id)): Path<(u32, u32)>,
) -> ApiResult<ScoredItem> {
    let scored = state.recommendation_service.predict(user_id, item_id)?;
    Ok(Json(ApiResponse::success(scored)))
}

async fn post_scores(
    State(state): State<AppState>,
    Path(user_id): Path<u32>,
    Json(request): Json<ScoreRequest>,
) -> ApiResult<Vec<ScoredItem>> {
    let scored = state
        .recommendation_service
        .predict_all(user_id, &request.items)?;
    Ok(Json(ApiResponse::success(scored)))
}

async fn get_recommendations(
    State(state): State<AppState>,
    Path(user_id): Path<u32>,
    Query(params): Query<RecommendationQuery>,
) -> ApiResult<RecommendationResponse> {
    let exclude_items = params
        .exclude
        .as_deref()
        .map(parse_index_list)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let request = RecommendationRequest {
        user_id,
        num_recommendations: params
            .k
            .unwrap_or(state.config.recommendation.default_k as i64),
        exclude_items,
        exclude_seen: params.exclude_seen,
    };

    let response = state.recommendation_service.recommend(&request)?;
    Ok(Json(ApiResponse::success(response)))
}

async fn get_similar_items(
    State(state): State<AppState>,
    Path(item_id): Path<u32>,
    Query(params): Query<SimilarQuery>,
) -> ApiResult<Vec<ScoredItem>> {
    let k = params
        .k
        .unwrap_or(state.config.recommendation.default_k as i64);
    let similar = state.recommendation_service.similar_items(item_id, k)?;
    Ok(Json(ApiResponse::success(similar)))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/users/:user_id/items/:item_id/score", get(get_score))
        .route("/users/:user_id/scores", post(post_scores))
        .route("/users/:user_id/recommendations", get(get_recommendations))
        .route("/items/:item_id/similar", get(get_similar_items))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
