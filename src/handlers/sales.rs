use crate::handlers::common::{
    created_response, map_service_error, success_response, validate_input, PaginationMeta,
    PaginationParams,
};
use crate::{
    entities::{customer, sale, sale_line},
    errors::ApiError,
    services::sales::{
        CartLine, CommitSaleInput, CommittedSale, CustomerPolicy, SaleHistoryFilter,
    },
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Creates the router for sale endpoints
pub fn sales_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sales))
        .route("/", post(commit_sale))
        .route("/by-number/:number", get(get_sale_by_number))
        .route("/:id", get(get_sale))
}

/// Commit a cart as one atomic sale.
///
/// Stock is verified and decremented, the total recomputed, and a unique
/// date-prefixed sale number allocated, all in one transaction; on any
/// failure nothing is persisted.
#[utoipa::path(
    post,
    path = "/api/v1/sales",
    request_body = CreateSaleRequest,
    responses(
        (status = 201, description = "Sale committed", body = SaleResponse),
        (status = 400, description = "Empty cart or malformed lines", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product or customer not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Sale number conflict, retry by resubmission", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
        (status = 503, description = "Lock contention, retryable", body = crate::errors::ErrorResponse)
    ),
    tag = "Sales"
)]
pub async fn commit_sale(
    State(state): State<AppState>,
    Json(payload): Json<CreateSaleRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    // A caller-supplied total is discarded; the service recomputes it.
    let input = CommitSaleInput {
        customer_key: payload.customer_national_id,
        customer_policy: payload.customer_policy,
        lines: payload
            .lines
            .into_iter()
            .map(|line| CartLine {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect(),
    };

    let committed = state
        .services
        .sales
        .commit_sale(input)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(SaleResponse::from(committed)))
}

/// Get a committed sale with its lines
#[utoipa::path(
    get,
    path = "/api/v1/sales/:id",
    params(("id" = Uuid, Path, description = "Sale ID")),
    responses(
        (status = 200, description = "Sale retrieved", body = SaleResponse),
        (status = 404, description = "Sale not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Sales"
)]
pub async fn get_sale(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let committed = state
        .services
        .sales
        .get_sale(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(SaleResponse::from(committed)))
}

/// Get a committed sale by its human-readable number
#[utoipa::path(
    get,
    path = "/api/v1/sales/by-number/:number",
    params(("number" = String, Path, description = "Sale number, e.g. 20250101-0001")),
    responses(
        (status = 200, description = "Sale retrieved", body = SaleResponse),
        (status = 404, description = "Sale not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Sales"
)]
pub async fn get_sale_by_number(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let committed = state
        .services
        .sales
        .get_sale_by_number(&number)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(SaleResponse::from(committed)))
}

/// Sales history with date/customer filters and the filtered grand total
#[utoipa::path(
    get,
    path = "/api/v1/sales",
    params(SaleHistoryParams),
    responses(
        (status = 200, description = "Sales history retrieved", body = SaleHistoryResponse),
        (status = 400, description = "Invalid query parameters", body = crate::errors::ErrorResponse)
    ),
    tag = "Sales"
)]
pub async fn list_sales(
    State(state): State<AppState>,
    Query(params): Query<SaleHistoryParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let pagination = PaginationParams {
        page: params.page,
        per_page: params.per_page,
    };
    pagination.check()?;

    let filter = SaleHistoryFilter {
        sale_date: params.date,
        customer: params.customer,
    };

    let history = state
        .services
        .sales
        .list_sales(filter, pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;

    let data: Vec<SaleSummaryResponse> = history
        .sales
        .into_iter()
        .map(SaleSummaryResponse::from)
        .collect();

    Ok(success_response(SaleHistoryResponse {
        data,
        pagination: PaginationMeta::new(pagination.page, pagination.per_page, history.total),
        amount_total: history.amount_total,
    }))
}

// Request/Response DTOs

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SaleLineRequest {
    pub product_id: Uuid,
    /// Units requested; must be positive
    #[schema(example = 2)]
    pub quantity: i32,
    /// Price captured for this sale
    #[schema(example = "49.90")]
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "customer_national_id": "12345678-9",
    "customer_policy": "walk_in",
    "lines": [
        {"product_id": "550e8400-e29b-41d4-a716-446655440000", "quantity": 2, "unit_price": "49.90"}
    ]
}))]
pub struct CreateSaleRequest {
    /// Customer natural key
    #[validate(length(min = 1, max = 32))]
    pub customer_national_id: String,
    /// `strict` rejects unknown customers, `walk_in` auto-creates a
    /// placeholder; the caller must choose explicitly
    pub customer_policy: CustomerPolicy,
    pub lines: Vec<SaleLineRequest>,
    /// Ignored when present; the total is always recomputed server-side
    #[serde(default)]
    #[schema(example = "99.80")]
    pub total: Option<Decimal>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SaleHistoryParams {
    /// Exact sale date filter (YYYY-MM-DD)
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Customer natural-key fragment filter
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SaleLineResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    #[schema(example = "49.90")]
    pub unit_price: Decimal,
    #[schema(example = "99.80")]
    pub subtotal: Decimal,
}

impl From<sale_line::Model> for SaleLineResponse {
    fn from(model: sale_line::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            quantity: model.quantity,
            unit_price: model.unit_price,
            subtotal: model.subtotal,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SaleResponse {
    pub id: Uuid,
    #[schema(example = "20250101-0001")]
    pub number: String,
    pub sale_date: NaiveDate,
    pub customer_id: Uuid,
    #[schema(example = "99.80")]
    pub total: Decimal,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub lines: Vec<SaleLineResponse>,
}

impl From<CommittedSale> for SaleResponse {
    fn from(committed: CommittedSale) -> Self {
        Self {
            id: committed.sale.id,
            number: committed.sale.number,
            sale_date: committed.sale.sale_date,
            customer_id: committed.sale.customer_id,
            total: committed.sale.total,
            created_at: committed.sale.created_at,
            lines: committed
                .lines
                .into_iter()
                .map(SaleLineResponse::from)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SaleSummaryResponse {
    pub id: Uuid,
    pub number: String,
    pub sale_date: NaiveDate,
    pub customer_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_national_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    pub total: Decimal,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<(sale::Model, Option<customer::Model>)> for SaleSummaryResponse {
    fn from((sale, customer): (sale::Model, Option<customer::Model>)) -> Self {
        Self {
            id: sale.id,
            number: sale.number,
            sale_date: sale.sale_date,
            customer_id: sale.customer_id,
            customer_national_id: customer.as_ref().map(|c| c.national_id.clone()),
            customer_name: customer
                .as_ref()
                .map(|c| format!("{} {}", c.first_name, c.last_name)),
            total: sale.total,
            created_at: sale.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SaleHistoryResponse {
    pub data: Vec<SaleSummaryResponse>,
    pub pagination: PaginationMeta,
    /// Grand total over the whole filtered set, not just this page
    #[schema(example = "1249.50")]
    pub amount_total: Decimal,
}
