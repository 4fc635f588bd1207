use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Retail API",
        version = "0.1.0",
        description = "Retail sales backend: product catalog, customer records, and atomic \
                       sale commits with stock deduction, plus AI-assisted storefront helpers."
    ),
    paths(
        handlers::products::list_products,
        handlers::products::create_product,
        handlers::products::get_product,
        handlers::products::get_product_by_code,
        handlers::products::update_product,
        handlers::products::delete_product,
        handlers::products::restock_product,
        handlers::products::list_projections,
        handlers::customers::list_customers,
        handlers::customers::create_customer,
        handlers::customers::get_customer,
        handlers::customers::get_customer_by_national_id,
        handlers::sales::list_sales,
        handlers::sales::commit_sale,
        handlers::sales::get_sale,
        handlers::sales::get_sale_by_number,
        handlers::ai::recommend_products,
        handlers::ai::generate_description,
        handlers::ai::support_chat,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        handlers::products::CreateProductRequest,
        handlers::products::UpdateProductRequest,
        handlers::products::RestockRequest,
        handlers::products::ProductResponse,
        handlers::customers::CreateCustomerRequest,
        handlers::customers::CustomerResponse,
        handlers::sales::SaleLineRequest,
        handlers::sales::CreateSaleRequest,
        handlers::sales::SaleLineResponse,
        handlers::sales::SaleResponse,
        handlers::sales::SaleSummaryResponse,
        handlers::sales::SaleHistoryResponse,
        handlers::ai::RecommendationRequest,
        handlers::ai::ChatRequest,
        handlers::ai::GeneratedTextResponse,
    )),
    tags(
        (name = "Products", description = "Product catalog and stock"),
        (name = "Customers", description = "Customer registry"),
        (name = "Sales", description = "Atomic sale commits and history"),
        (name = "AI", description = "LLM-backed storefront helpers")
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at `/docs`, serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
