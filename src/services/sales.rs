use crate::{
    entities::{
        customer::{self, Entity as Customer},
        product::Entity as Product,
        sale::{self, Entity as Sale},
        sale_line::{self, Entity as SaleLine},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::inventory::InventoryService,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, JoinType,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{hash_map::Entry, HashMap};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Candidate numbers probed before falling back to a timestamp suffix.
const SALE_NUMBER_MAX_ATTEMPTS: u64 = 10;

/// How an unknown customer key is handled at commit time. The two flows are
/// selected explicitly by the caller and never silently mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CustomerPolicy {
    /// Staff point-of-sale flow: the customer must already be registered
    Strict,
    /// No-login flow: auto-create a placeholder customer record
    WalkIn,
}

/// One not-yet-committed cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i32,
    /// Price captured at sale time; never re-read from the catalog later
    pub unit_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct CommitSaleInput {
    /// Customer natural key (national ID string)
    pub customer_key: String,
    pub customer_policy: CustomerPolicy,
    pub lines: Vec<CartLine>,
}

/// A committed sale with its line items.
#[derive(Debug, Clone, Serialize)]
pub struct CommittedSale {
    pub sale: sale::Model,
    pub lines: Vec<sale_line::Model>,
}

/// Filters for the sales history listing.
#[derive(Debug, Clone, Default)]
pub struct SaleHistoryFilter {
    pub sale_date: Option<NaiveDate>,
    /// Substring match on the customer natural key
    pub customer: Option<String>,
}

/// One page of sales history plus the grand total over the whole filtered set.
#[derive(Debug)]
pub struct SaleHistoryPage {
    pub sales: Vec<(sale::Model, Option<customer::Model>)>,
    pub total: u64,
    pub amount_total: Decimal,
}

/// One prior purchase of a customer, used as read-only context by the AI
/// recommendation collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseHistoryEntry {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub sale_date: NaiveDate,
}

/// Sale transaction orchestrator: turns a cart into a committed sale or
/// rejects it atomically. All persistence happens in one database
/// transaction; any failure leaves no sale, no lines and no stock change.
#[derive(Clone)]
pub struct SaleService {
    db: Arc<DatabaseConnection>,
    inventory: Arc<InventoryService>,
    event_sender: Arc<EventSender>,
}

impl SaleService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        inventory: Arc<InventoryService>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            inventory,
            event_sender,
        }
    }

    /// Commits a cart as one atomic sale.
    ///
    /// Within the transaction: the customer key is resolved per policy, each
    /// line locks its product row and is checked against the stock remaining
    /// after prior lines of the same cart, the total is recomputed from the
    /// lines, a date-prefixed sale number is allocated, and the sale, its
    /// lines and the stock deltas are persisted together.
    #[instrument(skip(self, input), fields(customer_key = %input.customer_key, line_count = input.lines.len()))]
    pub async fn commit_sale(&self, input: CommitSaleInput) -> Result<CommittedSale, ServiceError> {
        validate_cart(&input.lines)?;

        let txn = self.db.begin().await.map_err(ServiceError::from_db)?;

        match self.commit_sale_in_txn(&txn, &input).await {
            Ok((committed, events)) => {
                txn.commit().await.map_err(ServiceError::from_db)?;

                for event in events {
                    self.event_sender.send_or_log(event).await;
                }
                info!(
                    number = %committed.sale.number,
                    total = %committed.sale.total,
                    "Committed sale"
                );
                Ok(committed)
            }
            Err(err) => {
                let _ = txn.rollback().await;
                Err(err)
            }
        }
    }

    async fn commit_sale_in_txn(
        &self,
        txn: &DatabaseTransaction,
        input: &CommitSaleInput,
    ) -> Result<(CommittedSale, Vec<Event>), ServiceError> {
        let mut events = Vec::new();

        let customer = self
            .resolve_customer(txn, &input.customer_key, input.customer_policy, &mut events)
            .await?;

        // Check every line against the locked stock remaining after prior
        // lines of this cart: duplicate product ids are independent lines
        // accumulating demand against one locked balance.
        let mut remaining: HashMap<Uuid, (String, i32)> = HashMap::new();
        for line in &input.lines {
            let state = match remaining.entry(line.product_id) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let product = self.inventory.lock_and_get(txn, line.product_id).await?;
                    entry.insert((product.name, product.stock))
                }
            };

            if line.quantity > state.1 {
                return Err(ServiceError::InsufficientStock {
                    product: state.0.clone(),
                    requested: line.quantity,
                    available: state.1,
                });
            }
            state.1 -= line.quantity;
        }

        // Caller-supplied totals are never trusted; recompute from the lines.
        let total = compute_total(&input.lines);

        let now = Utc::now();
        let sale_date = now.date_naive();
        let number = self.generate_sale_number(txn, sale_date).await?;

        let sale_id = Uuid::new_v4();
        let sale = sale::ActiveModel {
            id: Set(sale_id),
            number: Set(number),
            sale_date: Set(sale_date),
            customer_id: Set(customer.id),
            total: Set(total),
            created_at: Set(now),
        };
        // The unique index on the number column is the final guard against
        // generation races; a violation aborts the commit as a conflict.
        let sale = sale.insert(txn).await.map_err(ServiceError::from_db)?;

        let mut lines = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            let row = sale_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                sale_id: Set(sale_id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                subtotal: Set(Decimal::from(line.quantity) * line.unit_price),
                created_at: Set(now),
            };
            lines.push(row.insert(txn).await.map_err(ServiceError::from_db)?);
        }

        // Apply the stock deltas last, against the same locked rows. The
        // ledger re-checks per call, so this can only fail if the validation
        // pass above was wrong, and then the whole transaction rolls back.
        for line in &input.lines {
            let updated = self
                .inventory
                .decrement(txn, line.product_id, line.quantity)
                .await?;
            events.push(Event::StockDecremented {
                product_id: line.product_id,
                quantity: line.quantity,
                remaining: updated.stock,
            });
        }

        events.push(Event::SaleCommitted {
            sale_id,
            number: sale.number.clone(),
            customer_id: customer.id,
            total,
        });

        Ok((CommittedSale { sale, lines }, events))
    }

    async fn resolve_customer(
        &self,
        txn: &DatabaseTransaction,
        customer_key: &str,
        policy: CustomerPolicy,
        events: &mut Vec<Event>,
    ) -> Result<customer::Model, ServiceError> {
        let key = customer_key.trim();
        if key.is_empty() {
            return Err(ServiceError::ValidationError(
                "customer key must not be empty".to_string(),
            ));
        }

        let existing = Customer::find()
            .filter(customer::Column::NationalId.eq(key))
            .one(txn)
            .await
            .map_err(ServiceError::from_db)?;

        match (existing, policy) {
            (Some(found), _) => Ok(found),
            (None, CustomerPolicy::Strict) => Err(ServiceError::NotFound(format!(
                "Customer {} not found",
                key
            ))),
            (None, CustomerPolicy::WalkIn) => {
                let now = Utc::now();
                let placeholder = customer::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    national_id: Set(key.to_string()),
                    first_name: Set("Walk-in".to_string()),
                    last_name: Set("Customer".to_string()),
                    email: Set(None),
                    city: Set(None),
                    created_at: Set(now),
                    updated_at: Set(None),
                };
                let created = placeholder.insert(txn).await.map_err(ServiceError::from_db)?;
                events.push(Event::WalkInCustomerCreated {
                    customer_id: created.id,
                    national_id: created.national_id.clone(),
                });
                Ok(created)
            }
        }
    }

    /// Allocates a `YYYYMMDD-NNNN` number: NNNN is a zero-padded 1-based
    /// sequence over the sales already recorded for `sale_date`. Up to
    /// `SALE_NUMBER_MAX_ATTEMPTS` candidates are probed for existence before
    /// falling back to a timestamp suffix.
    async fn generate_sale_number(
        &self,
        txn: &DatabaseTransaction,
        sale_date: NaiveDate,
    ) -> Result<String, ServiceError> {
        let today_count = Sale::find()
            .filter(sale::Column::SaleDate.eq(sale_date))
            .count(txn)
            .await
            .map_err(ServiceError::from_db)?;

        for attempt in 0..SALE_NUMBER_MAX_ATTEMPTS {
            let candidate = format_sale_number(sale_date, today_count + attempt + 1);
            let taken = Sale::find()
                .filter(sale::Column::Number.eq(candidate.as_str()))
                .count(txn)
                .await
                .map_err(ServiceError::from_db)?
                > 0;
            if !taken {
                return Ok(candidate);
            }
        }

        Ok(format!(
            "{}-{}",
            sale_date.format("%Y%m%d"),
            Utc::now().timestamp()
        ))
    }

    /// A committed sale with its line items. Sales are immutable, so repeated
    /// reads always return identical content.
    #[instrument(skip(self))]
    pub async fn get_sale(&self, sale_id: Uuid) -> Result<CommittedSale, ServiceError> {
        let sale = Sale::find_by_id(sale_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Sale {} not found", sale_id)))?;

        let lines = sale
            .find_related(SaleLine)
            .all(&*self.db)
            .await
            .map_err(ServiceError::from_db)?;

        Ok(CommittedSale { sale, lines })
    }

    #[instrument(skip(self))]
    pub async fn get_sale_by_number(&self, number: &str) -> Result<CommittedSale, ServiceError> {
        let sale = Sale::find()
            .filter(sale::Column::Number.eq(number))
            .one(&*self.db)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Sale {} not found", number)))?;

        let lines = sale
            .find_related(SaleLine)
            .all(&*self.db)
            .await
            .map_err(ServiceError::from_db)?;

        Ok(CommittedSale { sale, lines })
    }

    /// Sales history: newest first, optionally filtered by exact date and by
    /// customer natural-key fragment, with the grand total over the whole
    /// filtered set.
    #[instrument(skip(self))]
    pub async fn list_sales(
        &self,
        filter: SaleHistoryFilter,
        page: u64,
        per_page: u64,
    ) -> Result<SaleHistoryPage, ServiceError> {
        let mut query = Sale::find()
            .find_also_related(Customer)
            .order_by_desc(sale::Column::SaleDate)
            .order_by_desc(sale::Column::CreatedAt);

        if let Some(date) = filter.sale_date {
            query = query.filter(sale::Column::SaleDate.eq(date));
        }
        if let Some(fragment) = &filter.customer {
            query = query.filter(customer::Column::NationalId.contains(fragment.as_str()));
        }

        let paginator = query.paginate(&*self.db, per_page);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::from_db)?;
        let sales = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::from_db)?;

        use sea_orm::sea_query::Expr;

        let mut sum_query = Sale::find()
            .select_only()
            .column_as(Expr::col((Sale, sale::Column::Total)).sum(), "amount_total");
        if let Some(date) = filter.sale_date {
            sum_query = sum_query.filter(sale::Column::SaleDate.eq(date));
        }
        if let Some(fragment) = &filter.customer {
            sum_query = sum_query
                .join(JoinType::InnerJoin, sale::Relation::Customer.def())
                .filter(customer::Column::NationalId.contains(fragment.as_str()));
        }
        let amount_total = sum_query
            .into_tuple::<Option<Decimal>>()
            .one(&*self.db)
            .await
            .map_err(ServiceError::from_db)?
            .flatten()
            .unwrap_or(Decimal::ZERO);

        Ok(SaleHistoryPage {
            sales,
            total,
            amount_total,
        })
    }

    /// Prior purchases of one customer, newest first. Read-only projection
    /// consumed by the AI recommendation collaborator.
    #[instrument(skip(self))]
    pub async fn customer_purchase_history(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<PurchaseHistoryEntry>, ServiceError> {
        let sales = Sale::find()
            .filter(sale::Column::CustomerId.eq(customer_id))
            .order_by_desc(sale::Column::SaleDate)
            .all(&*self.db)
            .await
            .map_err(ServiceError::from_db)?;

        let mut history = Vec::new();
        for sale in sales {
            let lines = sale
                .find_related(SaleLine)
                .find_also_related(Product)
                .all(&*self.db)
                .await
                .map_err(ServiceError::from_db)?;

            for (line, product) in lines {
                history.push(PurchaseHistoryEntry {
                    product_id: line.product_id,
                    product_name: product
                        .map(|p| p.name)
                        .unwrap_or_else(|| "unknown".to_string()),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    sale_date: sale.sale_date,
                });
            }
        }

        Ok(history)
    }
}

/// Rejects empty carts and malformed lines before any transaction is opened.
fn validate_cart(lines: &[CartLine]) -> Result<(), ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::EmptyCart);
    }
    for (index, line) in lines.iter().enumerate() {
        if line.quantity <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "line {}: quantity must be positive",
                index + 1
            )));
        }
        if line.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "line {}: unit price must not be negative",
                index + 1
            )));
        }
    }
    Ok(())
}

/// Exact fixed-point cart total; no floating-point accumulation.
fn compute_total(lines: &[CartLine]) -> Decimal {
    lines
        .iter()
        .map(|line| Decimal::from(line.quantity) * line.unit_price)
        .sum()
}

fn format_sale_number(sale_date: NaiveDate, sequence: u64) -> String {
    format!("{}-{:04}", sale_date.format("%Y%m%d"), sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn line(quantity: i32, unit_price: Decimal) -> CartLine {
        CartLine {
            product_id: Uuid::new_v4(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn sale_number_format() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(format_sale_number(date, 1), "20250101-0001");
        assert_eq!(format_sale_number(date, 42), "20250101-0042");
        // The sequence keeps growing past four digits rather than wrapping
        assert_eq!(format_sale_number(date, 10_000), "20250101-10000");
    }

    #[test]
    fn empty_cart_is_rejected() {
        assert!(matches!(validate_cart(&[]), Err(ServiceError::EmptyCart)));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let lines = vec![line(0, dec!(10.00))];
        assert!(matches!(
            validate_cart(&lines),
            Err(ServiceError::ValidationError(_))
        ));

        let lines = vec![line(1, dec!(10.00)), line(-3, dec!(5.00))];
        assert!(matches!(
            validate_cart(&lines),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn negative_price_is_rejected() {
        let lines = vec![line(1, dec!(-0.01))];
        assert!(matches!(
            validate_cart(&lines),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn total_is_exact_for_cent_prices() {
        // 3 x 19.99 would drift with binary floats; Decimal stays exact
        let lines = vec![line(3, dec!(19.99)), line(2, dec!(0.05))];
        assert_eq!(compute_total(&lines), dec!(60.07));
    }

    proptest! {
        #[test]
        fn total_equals_sum_of_subtotals(
            carts in prop::collection::vec((1i32..=1_000, 0i64..=10_000_000), 1..20)
        ) {
            let lines: Vec<CartLine> = carts
                .iter()
                .map(|(quantity, cents)| line(*quantity, Decimal::new(*cents, 2)))
                .collect();

            // Independent reference computation in integer cents
            let expected_cents: i128 = carts
                .iter()
                .map(|(quantity, cents)| *quantity as i128 * *cents as i128)
                .sum();

            prop_assert_eq!(
                compute_total(&lines),
                Decimal::from_i128_with_scale(expected_cents, 2)
            );
        }
    }
}
