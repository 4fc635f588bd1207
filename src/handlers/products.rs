use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginatedResponse, PaginationParams,
};
use crate::{
    entities::product,
    errors::ApiError,
    services::products::{CreateProductInput, ProductProjection, UpdateProductInput},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{delete, get, post, put},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for product endpoints
pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/", post(create_product))
        .route("/projections", get(list_projections))
        .route("/by-code/:code", get(get_product_by_code))
        .route("/:id", get(get_product))
        .route("/:id", put(update_product))
        .route("/:id", delete(delete_product))
        .route("/:id/restock", post(restock_product))
}

/// Create a new product
#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product code already in use", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let code = payload.code.trim().to_string();
    let name = payload.name.trim().to_string();
    if code.is_empty() {
        return Err(ApiError::ValidationError(
            "Product code cannot be blank".to_string(),
        ));
    }
    if name.is_empty() {
        return Err(ApiError::ValidationError(
            "Product name cannot be blank".to_string(),
        ));
    }

    let input = CreateProductInput {
        code,
        name,
        price: payload.price,
        stock: payload.stock.unwrap_or(0),
    };

    let product = state
        .services
        .products
        .create_product(input)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ProductResponse::from(product)))
}

/// Get a product by ID
#[utoipa::path(
    get,
    path = "/api/v1/products/:id",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product retrieved", body = ProductResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state
        .services
        .products
        .get_product(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ProductResponse::from(product)))
}

/// Get a product by its unique code
#[utoipa::path(
    get,
    path = "/api/v1/products/by-code/:code",
    params(("code" = String, Path, description = "Product code")),
    responses(
        (status = 200, description = "Product retrieved", body = ProductResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state
        .services
        .products
        .get_product_by_code(&code)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ProductResponse::from(product)))
}

/// Update a product
#[utoipa::path(
    put,
    path = "/api/v1/products/:id",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ProductResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let code = payload
        .code
        .map(|value| {
            let value = value.trim().to_string();
            if value.is_empty() {
                Err(ApiError::ValidationError(
                    "Product code cannot be blank".to_string(),
                ))
            } else {
                Ok(value)
            }
        })
        .transpose()?;

    let name = payload
        .name
        .map(|value| {
            let value = value.trim().to_string();
            if value.is_empty() {
                Err(ApiError::ValidationError(
                    "Product name cannot be blank".to_string(),
                ))
            } else {
                Ok(value)
            }
        })
        .transpose()?;

    let input = UpdateProductInput {
        code,
        name,
        price: payload.price,
        stock: payload.stock,
    };

    let product = state
        .services
        .products
        .update_product(id, input)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ProductResponse::from(product)))
}

/// Delete a product. Rejected while recorded sales reference it.
#[utoipa::path(
    delete,
    path = "/api/v1/products/:id",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product referenced by sales", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .products
        .delete_product(id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

/// Receive stock for a product
#[utoipa::path(
    post,
    path = "/api/v1/products/:id/restock",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = RestockRequest,
    responses(
        (status = 200, description = "Stock received", body = ProductResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn restock_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RestockRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state
        .services
        .inventory
        .restock(id, payload.quantity)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ProductResponse::from(product)))
}

/// List all products with pagination
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(PaginationParams),
    responses(
        (status = 200, description = "Products retrieved"),
        (status = 400, description = "Invalid query parameters", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    params.check()?;

    let (products, total) = state
        .services
        .products
        .list_products(params.page, params.per_page)
        .await
        .map_err(map_service_error)?;

    let products: Vec<ProductResponse> = products.into_iter().map(ProductResponse::from).collect();

    Ok(success_response(PaginatedResponse::new(
        products,
        params.page,
        params.per_page,
        total,
    )))
}

/// The read-only catalog projection consumed by cart-building clients and
/// the AI collaborators
#[utoipa::path(
    get,
    path = "/api/v1/products/projections",
    responses((status = 200, description = "Catalog projection retrieved")),
    tag = "Products"
)]
pub async fn list_projections(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let projections: Vec<ProductProjection> = state
        .services
        .products
        .projections()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(projections))
}

// Request/Response DTOs

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "code": "KB-0042",
    "name": "Mechanical Keyboard",
    "price": "49.90",
    "stock": 25
}))]
pub struct CreateProductRequest {
    /// Unique human-readable product code
    #[validate(length(min = 1, max = 50))]
    #[schema(example = "KB-0042")]
    pub code: String,
    /// Product display name
    #[validate(length(min = 1, max = 255))]
    #[schema(example = "Mechanical Keyboard")]
    pub name: String,
    /// Unit price
    #[schema(example = "49.90")]
    pub price: Decimal,
    /// Initial stock level
    #[serde(default)]
    #[schema(example = 25)]
    pub stock: Option<i32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 50))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub stock: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RestockRequest {
    /// Units to add to the current stock
    #[schema(example = 10)]
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    #[schema(example = "49.90")]
    pub price: Decimal,
    pub stock: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<product::Model> for ProductResponse {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            name: model.name,
            price: model.price,
            stock: model.stock,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
