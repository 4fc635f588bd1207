use crate::handlers::common::{map_service_error, success_response, validate_input};
use crate::{
    errors::{ApiError, ServiceError},
    services::ai::{AiService, RecommendationReply},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const DEFAULT_RECOMMENDATION_LIMIT: usize = 3;
const MAX_RECOMMENDATION_LIMIT: usize = 10;

/// Creates the router for the AI helper endpoints
pub fn ai_routes() -> Router<AppState> {
    Router::new()
        .route("/recommendations", post(recommend_products))
        .route("/products/:id/description", post(generate_description))
        .route("/chat", post(support_chat))
}

fn require_ai(state: &AppState) -> Result<Arc<AiService>, ApiError> {
    state.services.ai.clone().ok_or_else(|| {
        map_service_error(ServiceError::ServiceUnavailable(
            "AI features are not configured".to_string(),
        ))
    })
}

/// Recommend products for a customer based on their purchase history.
/// Consumes only the read-only product and sale projections.
#[utoipa::path(
    post,
    path = "/api/v1/ai/recommendations",
    request_body = RecommendationRequest,
    responses(
        (status = 200, description = "Recommendations generated"),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse),
        (status = 502, description = "Text-generation API failure", body = crate::errors::ErrorResponse),
        (status = 503, description = "AI features not configured", body = crate::errors::ErrorResponse)
    ),
    tag = "AI"
)]
pub async fn recommend_products(
    State(state): State<AppState>,
    Json(payload): Json<RecommendationRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;
    let ai = require_ai(&state)?;

    let limit = payload
        .limit
        .unwrap_or(DEFAULT_RECOMMENDATION_LIMIT)
        .min(MAX_RECOMMENDATION_LIMIT)
        .max(1);

    let customer = state
        .services
        .customers
        .get_customer_by_national_id(&payload.customer_national_id)
        .await
        .map_err(map_service_error)?;

    let history = state
        .services
        .sales
        .customer_purchase_history(customer.id)
        .await
        .map_err(map_service_error)?;

    let catalog = state
        .services
        .products
        .projections()
        .await
        .map_err(map_service_error)?;

    let reply: RecommendationReply = ai
        .recommend_products(&history, &catalog, limit)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(reply))
}

/// Generate marketing copy for a product
#[utoipa::path(
    post,
    path = "/api/v1/ai/products/:id/description",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Description generated", body = GeneratedTextResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 502, description = "Text-generation API failure", body = crate::errors::ErrorResponse),
        (status = 503, description = "AI features not configured", body = crate::errors::ErrorResponse)
    ),
    tag = "AI"
)]
pub async fn generate_description(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let ai = require_ai(&state)?;

    let product = state
        .services
        .products
        .get_product(id)
        .await
        .map_err(map_service_error)?;

    let text = ai
        .generate_description(&product.into())
        .await
        .map_err(map_service_error)?;

    Ok(success_response(GeneratedTextResponse { text }))
}

/// Single-turn support chat grounded in the current catalog
#[utoipa::path(
    post,
    path = "/api/v1/ai/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Reply generated", body = GeneratedTextResponse),
        (status = 502, description = "Text-generation API failure", body = crate::errors::ErrorResponse),
        (status = 503, description = "AI features not configured", body = crate::errors::ErrorResponse)
    ),
    tag = "AI"
)]
pub async fn support_chat(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;
    let ai = require_ai(&state)?;

    let catalog = state
        .services
        .products
        .projections()
        .await
        .map_err(map_service_error)?;

    let text = ai
        .support_chat(&payload.message, &catalog)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(GeneratedTextResponse { text }))
}

// Request/Response DTOs

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RecommendationRequest {
    /// Customer natural key whose history seeds the recommendations
    #[validate(length(min = 1, max = 32))]
    pub customer_national_id: String,
    /// How many products to recommend (default 3, max 10)
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GeneratedTextResponse {
    pub text: String,
}
