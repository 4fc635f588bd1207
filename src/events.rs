use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed.
    /// Event delivery is best-effort; committed state is never rolled back
    /// because a notification could not be queued.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event delivery failed: {}", e);
        }
    }
}

/// Events emitted by the services after durable state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Catalog events
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),
    ProductRestocked {
        product_id: Uuid,
        quantity: i32,
        new_stock: i32,
    },

    // Customer events
    CustomerCreated(Uuid),
    /// Placeholder customer auto-created by a walk-in sale
    WalkInCustomerCreated {
        customer_id: Uuid,
        national_id: String,
    },

    // Sale events
    SaleCommitted {
        sale_id: Uuid,
        number: String,
        customer_id: Uuid,
        total: Decimal,
    },
    StockDecremented {
        product_id: Uuid,
        quantity: i32,
        remaining: i32,
    },
}

/// Drains the event channel and logs each event. Side-effecting consumers
/// (webhooks, projections) would hang off this loop.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::SaleCommitted {
                sale_id,
                number,
                total,
                ..
            } => {
                info!(%sale_id, %number, %total, "Sale committed");
            }
            Event::StockDecremented {
                product_id,
                quantity,
                remaining,
            } => {
                info!(%product_id, quantity, remaining, "Stock decremented");
            }
            other => {
                info!("Received event: {:?}", other);
            }
        }
    }

    info!("Event processing loop stopped");
}
