use crate::{
    entities::product::{self, Entity as Product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend,
    EntityTrait, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Inventory ledger: the single source of truth for product stock.
///
/// The primitives `lock_and_get` / `decrement` / `release` are scoped to an
/// enclosing database transaction so that the quantity check and the stock
/// write always observe one consistent snapshot per product, across
/// concurrent sale commits and across backend processes.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Acquires an exclusive row lock on the product for the duration of the
    /// enclosing transaction and returns the current stock/price snapshot.
    ///
    /// This is the only blocking point of a sale commit: two transactions
    /// touching the same product serialize here, the second observing the
    /// first's decrement once committed. `FOR UPDATE` is only emitted on
    /// Postgres; SQLite has no row locks and serializes writers at the
    /// connection level instead.
    pub async fn lock_and_get(
        &self,
        txn: &DatabaseTransaction,
        product_id: Uuid,
    ) -> Result<product::Model, ServiceError> {
        let mut query = Product::find_by_id(product_id);
        if txn.get_database_backend() == DbBackend::Postgres {
            query = query.lock_exclusive();
        }

        query
            .one(txn)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    /// Reduces the product's stock by `quantity` inside the transaction.
    ///
    /// Must be called after `lock_and_get` within the same transaction. The
    /// row is re-read through the transaction, so earlier decrements of the
    /// same commit are visible and duplicate cart lines deplete one balance.
    /// Fails with `InsufficientStock` when the quantity exceeds what is left.
    pub async fn decrement(
        &self,
        txn: &DatabaseTransaction,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<product::Model, ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(txn)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if quantity > product.stock {
            return Err(ServiceError::InsufficientStock {
                product: product.name,
                requested: quantity,
                available: product.stock,
            });
        }

        let remaining = product.stock - quantity;
        let mut active: product::ActiveModel = product.into();
        active.stock = Set(remaining);
        active.updated_at = Set(Some(Utc::now()));

        active.update(txn).await.map_err(ServiceError::from_db)
    }

    /// Adds stock back inside the transaction (receiving deliveries,
    /// compensating flows). The inverse of `decrement`.
    pub async fn release(
        &self,
        txn: &DatabaseTransaction,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<product::Model, ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(txn)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let new_stock = product.stock + quantity;
        let mut active: product::ActiveModel = product.into();
        active.stock = Set(new_stock);
        active.updated_at = Set(Some(Utc::now()));

        active.update(txn).await.map_err(ServiceError::from_db)
    }

    /// Current stock level, read outside any transaction.
    #[instrument(skip(self))]
    pub async fn get_stock(&self, product_id: Uuid) -> Result<i32, ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        Ok(product.stock)
    }

    /// Receives `quantity` units into stock as its own short transaction.
    #[instrument(skip(self))]
    pub async fn restock(
        &self,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<product::Model, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "restock quantity must be positive".to_string(),
            ));
        }

        let txn = self.db.begin().await.map_err(ServiceError::from_db)?;
        let result = async {
            self.lock_and_get(&txn, product_id).await?;
            self.release(&txn, product_id, quantity).await
        }
        .await;

        match result {
            Ok(product) => {
                txn.commit().await.map_err(ServiceError::from_db)?;
                self.event_sender
                    .send_or_log(Event::ProductRestocked {
                        product_id,
                        quantity,
                        new_stock: product.stock,
                    })
                    .await;
                info!(%product_id, quantity, new_stock = product.stock, "Restocked product");
                Ok(product)
            }
            Err(err) => {
                let _ = txn.rollback().await;
                Err(err)
            }
        }
    }
}
