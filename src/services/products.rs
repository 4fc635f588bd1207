use crate::{
    entities::{
        product::{self, Entity as Product},
        sale_line::{self, Entity as SaleLine},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CreateProductInput {
    pub code: String,
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProductInput {
    pub code: Option<String>,
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
}

/// Read model consumed by cart-building clients and by the AI collaborators
/// (recommendation, description generation, chatbot). Strictly read-only:
/// stock mutations only ever happen through the inventory ledger.
#[derive(Debug, Clone, Serialize)]
pub struct ProductProjection {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
}

impl From<product::Model> for ProductProjection {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            name: model.name,
            price: model.price,
            stock: model.stock,
        }
    }
}

/// Product catalog service.
#[derive(Clone)]
pub struct ProductCatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl ProductCatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Create a new product with its initial stock level.
    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        if input.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "price must not be negative".to_string(),
            ));
        }
        if input.stock < 0 {
            return Err(ServiceError::ValidationError(
                "stock must not be negative".to_string(),
            ));
        }
        self.ensure_unique_code(&input.code, None).await?;

        let product_id = Uuid::new_v4();
        let product = product::ActiveModel {
            id: Set(product_id),
            code: Set(input.code),
            name: Set(input.name),
            price: Set(input.price),
            stock: Set(input.stock),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };

        let product = product
            .insert(&*self.db)
            .await
            .map_err(ServiceError::from_db)?;

        self.event_sender
            .send_or_log(Event::ProductCreated(product_id))
            .await;

        info!("Created product: {}", product_id);
        Ok(product)
    }

    /// Update an existing product.
    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        if let Some(ref code) = input.code {
            self.ensure_unique_code(code, Some(product_id)).await?;
        }
        if let Some(price) = input.price {
            if price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "price must not be negative".to_string(),
                ));
            }
        }
        if let Some(stock) = input.stock {
            if stock < 0 {
                return Err(ServiceError::ValidationError(
                    "stock must not be negative".to_string(),
                ));
            }
        }

        let product = self.get_product(product_id).await?;
        let mut active: product::ActiveModel = product.into();

        if let Some(code) = input.code {
            active.code = Set(code);
        }
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(stock) = input.stock {
            active.stock = Set(stock);
        }
        active.updated_at = Set(Some(Utc::now()));

        let product = active
            .update(&*self.db)
            .await
            .map_err(ServiceError::from_db)?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;

        info!("Updated product: {}", product_id);
        Ok(product)
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    #[instrument(skip(self))]
    pub async fn get_product_by_code(&self, code: &str) -> Result<product::Model, ServiceError> {
        Product::find()
            .filter(product::Column::Code.eq(code))
            .one(&*self.db)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product with code {} not found", code))
            })
    }

    /// List products ordered by name, paginated.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let paginator = Product::find()
            .order_by_asc(product::Column::Name)
            .paginate(&*self.db, per_page);

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::from_db)?;
        let products = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::from_db)?;

        Ok((products, total))
    }

    /// The full catalog as the read-only projection.
    #[instrument(skip(self))]
    pub async fn projections(&self) -> Result<Vec<ProductProjection>, ServiceError> {
        let products = Product::find()
            .order_by_asc(product::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::from_db)?;

        Ok(products.into_iter().map(ProductProjection::from).collect())
    }

    /// Delete a product. Rejected while any recorded sale line references it;
    /// sales are immutable, so the reference can never go away.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let product = self.get_product(product_id).await?;

        let referencing_lines = SaleLine::find()
            .filter(sale_line::Column::ProductId.eq(product_id))
            .count(&*self.db)
            .await
            .map_err(ServiceError::from_db)?;

        if referencing_lines > 0 {
            return Err(ServiceError::Conflict(format!(
                "Product {} is referenced by {} sale line(s) and cannot be deleted",
                product.code, referencing_lines
            )));
        }

        product
            .delete(&*self.db)
            .await
            .map_err(ServiceError::from_db)?;

        self.event_sender
            .send_or_log(Event::ProductDeleted(product_id))
            .await;

        info!("Deleted product: {}", product_id);
        Ok(())
    }

    async fn ensure_unique_code(
        &self,
        code: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut query = Product::find().filter(product::Column::Code.eq(code));
        if let Some(product_id) = exclude {
            query = query.filter(product::Column::Id.ne(product_id));
        }

        let existing = query.count(&*self.db).await.map_err(ServiceError::from_db)?;
        if existing > 0 {
            return Err(ServiceError::Conflict(format!(
                "Product code {} is already in use",
                code
            )));
        }
        Ok(())
    }
}
