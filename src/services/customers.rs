use crate::{
    entities::customer::{self, Entity as Customer},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CreateCustomerInput {
    pub national_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub city: Option<String>,
}

/// Customer registry service.
#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CustomerService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Register a customer. The natural key must be unused.
    #[instrument(skip(self, input), fields(national_id = %input.national_id))]
    pub async fn create_customer(
        &self,
        input: CreateCustomerInput,
    ) -> Result<customer::Model, ServiceError> {
        let national_id = input.national_id.trim().to_string();
        if national_id.is_empty() {
            return Err(ServiceError::ValidationError(
                "national_id must not be empty".to_string(),
            ));
        }

        let existing = Customer::find()
            .filter(customer::Column::NationalId.eq(national_id.as_str()))
            .count(&*self.db)
            .await
            .map_err(ServiceError::from_db)?;
        if existing > 0 {
            return Err(ServiceError::Conflict(format!(
                "Customer {} is already registered",
                national_id
            )));
        }

        let customer_id = Uuid::new_v4();
        let model = customer::ActiveModel {
            id: Set(customer_id),
            national_id: Set(national_id),
            first_name: Set(input.first_name),
            last_name: Set(input.last_name),
            email: Set(input.email),
            city: Set(input.city),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };

        let created = model
            .insert(&*self.db)
            .await
            .map_err(ServiceError::from_db)?;

        self.event_sender
            .send_or_log(Event::CustomerCreated(customer_id))
            .await;

        info!("Created customer: {}", customer_id);
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_customer(&self, customer_id: Uuid) -> Result<customer::Model, ServiceError> {
        Customer::find_by_id(customer_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", customer_id)))
    }

    #[instrument(skip(self))]
    pub async fn get_customer_by_national_id(
        &self,
        national_id: &str,
    ) -> Result<customer::Model, ServiceError> {
        Customer::find()
            .filter(customer::Column::NationalId.eq(national_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", national_id)))
    }

    /// List customers ordered by name, paginated.
    #[instrument(skip(self))]
    pub async fn list_customers(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<customer::Model>, u64), ServiceError> {
        let paginator = Customer::find()
            .order_by_asc(customer::Column::LastName)
            .order_by_asc(customer::Column::FirstName)
            .paginate(&*self.db, per_page);

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::from_db)?;
        let customers = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::from_db)?;

        Ok((customers, total))
    }
}
