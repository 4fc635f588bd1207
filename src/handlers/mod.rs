pub mod ai;
pub mod common;
pub mod customers;
pub mod products;
pub mod sales;

// Re-export route builders
pub use ai::ai_routes;
pub use customers::customers_routes;
pub use products::products_routes;
pub use sales::sales_routes;
