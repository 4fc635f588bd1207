use crate::handlers::common::{
    created_response, map_service_error, success_response, validate_input, PaginatedResponse,
    PaginationParams,
};
use crate::{
    entities::customer, errors::ApiError, services::customers::CreateCustomerInput, AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for customer endpoints
pub fn customers_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_customers))
        .route("/", post(create_customer))
        .route("/by-national-id/:national_id", get(get_customer_by_national_id))
        .route("/:id", get(get_customer))
}

/// Register a customer
#[utoipa::path(
    post,
    path = "/api/v1/customers",
    request_body = CreateCustomerRequest,
    responses(
        (status = 201, description = "Customer created", body = CustomerResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 409, description = "National ID already registered", body = crate::errors::ErrorResponse)
    ),
    tag = "Customers"
)]
pub async fn create_customer(
    State(state): State<AppState>,
    Json(payload): Json<CreateCustomerRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let input = CreateCustomerInput {
        national_id: payload.national_id,
        first_name: payload.first_name.trim().to_string(),
        last_name: payload.last_name.trim().to_string(),
        email: payload.email,
        city: payload.city,
    };

    let customer = state
        .services
        .customers
        .create_customer(input)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(CustomerResponse::from(customer)))
}

/// Get a customer by ID
#[utoipa::path(
    get,
    path = "/api/v1/customers/:id",
    params(("id" = Uuid, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Customer retrieved", body = CustomerResponse),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Customers"
)]
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let customer = state
        .services
        .customers
        .get_customer(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(CustomerResponse::from(customer)))
}

/// Get a customer by natural key
#[utoipa::path(
    get,
    path = "/api/v1/customers/by-national-id/:national_id",
    params(("national_id" = String, Path, description = "Customer national ID")),
    responses(
        (status = 200, description = "Customer retrieved", body = CustomerResponse),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Customers"
)]
pub async fn get_customer_by_national_id(
    State(state): State<AppState>,
    Path(national_id): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let customer = state
        .services
        .customers
        .get_customer_by_national_id(&national_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(CustomerResponse::from(customer)))
}

/// List customers with pagination
#[utoipa::path(
    get,
    path = "/api/v1/customers",
    params(PaginationParams),
    responses(
        (status = 200, description = "Customers retrieved"),
        (status = 400, description = "Invalid query parameters", body = crate::errors::ErrorResponse)
    ),
    tag = "Customers"
)]
pub async fn list_customers(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    params.check()?;

    let (customers, total) = state
        .services
        .customers
        .list_customers(params.page, params.per_page)
        .await
        .map_err(map_service_error)?;

    let customers: Vec<CustomerResponse> =
        customers.into_iter().map(CustomerResponse::from).collect();

    Ok(success_response(PaginatedResponse::new(
        customers,
        params.page,
        params.per_page,
        total,
    )))
}

// Request/Response DTOs

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "national_id": "12345678-9",
    "first_name": "Ada",
    "last_name": "Lovelace",
    "email": "ada@example.com",
    "city": "Valparaiso"
}))]
pub struct CreateCustomerRequest {
    /// Unique natural key (e.g. national ID string)
    #[validate(length(min = 1, max = 32))]
    #[schema(example = "12345678-9")]
    pub national_id: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[serde(default)]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CustomerResponse {
    pub id: Uuid,
    pub national_id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<customer::Model> for CustomerResponse {
    fn from(model: customer::Model) -> Self {
        Self {
            id: model.id,
            national_id: model.national_id,
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
            city: model.city,
            created_at: model.created_at,
        }
    }
}
