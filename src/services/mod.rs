pub mod ai;
pub mod customers;
pub mod inventory;
pub mod products;
pub mod sales;

use crate::events::EventSender;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Aggregate of the application services shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub products: Arc<products::ProductCatalogService>,
    pub customers: Arc<customers::CustomerService>,
    pub inventory: Arc<inventory::InventoryService>,
    pub sales: Arc<sales::SaleService>,
    /// Present only when an AI API key is configured
    pub ai: Option<Arc<ai::AiService>>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        ai_config: Option<ai::AiConfig>,
    ) -> Result<Self, crate::errors::ServiceError> {
        let inventory = Arc::new(inventory::InventoryService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let sales = Arc::new(sales::SaleService::new(
            db.clone(),
            inventory.clone(),
            event_sender.clone(),
        ));
        let products = Arc::new(products::ProductCatalogService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let customers = Arc::new(customers::CustomerService::new(db, event_sender));

        let ai = match ai_config {
            Some(config) => Some(Arc::new(ai::AiService::new(config)?)),
            None => None,
        };

        Ok(Self {
            products,
            customers,
            inventory,
            sales,
            ai,
        })
    }
}
