use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::platform_listing::ListingStatus;
use crate::entities::purchase_order::PurchaseOrderStatus;
use crate::services::transaction_workflow::{TransactionAction, TransactionStatus};

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

    /// Sends an event after a commit. The work is already durable, so a
    /// closed channel is only logged.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "event dropped");
            counter!("storekeep_events.dropped", 1);
        }
    }
}

/// Domain events emitted after a successful commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    InventoryAdjusted {
        store_id: Uuid,
        inventory_id: Uuid,
        adjustment_id: Uuid,
        reference_number: String,
        quantity_before: i32,
        quantity_after: i32,
        adjustment_type: String,
    },
    LowStock {
        store_id: Uuid,
        inventory_id: Uuid,
        available: i32,
        reorder_point: i32,
    },

    TransactionCreated {
        store_id: Uuid,
        transaction_id: Uuid,
    },
    TransactionStatusChanged {
        store_id: Uuid,
        transaction_id: Uuid,
        action: TransactionAction,
        from: TransactionStatus,
        to: TransactionStatus,
    },
    TransactionPaid {
        store_id: Uuid,
        transaction_id: Uuid,
        amount: Decimal,
    },
    ShippingLabelCreated {
        store_id: Uuid,
        transaction_id: Uuid,
        tracking_number: String,
    },

    PurchaseOrderCreated {
        store_id: Uuid,
        purchase_order_id: Uuid,
    },
    PurchaseOrderStatusChanged {
        store_id: Uuid,
        purchase_order_id: Uuid,
        from: PurchaseOrderStatus,
        to: PurchaseOrderStatus,
    },
    PurchaseOrderReceived {
        store_id: Uuid,
        purchase_order_id: Uuid,
        receipt_id: Uuid,
        units: i32,
    },

    CategoryTreeChanged {
        store_id: Uuid,
    },
    SkuGenerated {
        store_id: Uuid,
        category_id: Uuid,
        sku: String,
    },

    ListingStatusChanged {
        store_id: Uuid,
        listing_id: Uuid,
        from: ListingStatus,
        to: ListingStatus,
    },
    ListingSyncFailed {
        store_id: Uuid,
        listing_id: Uuid,
        error: String,
    },

    Generic {
        message: String,
        timestamp: DateTime<Utc>,
        metadata: serde_json::Value,
    },
}

impl Event {
    /// Create a generic event with string data
    pub fn with_data(data: String) -> Self {
        Event::Generic {
            message: data,
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Short name used as a metrics label.
    pub fn name(&self) -> &'static str {
        match self {
            Event::InventoryAdjusted { .. } => "inventory_adjusted",
            Event::LowStock { .. } => "low_stock",
            Event::TransactionCreated { .. } => "transaction_created",
            Event::TransactionStatusChanged { .. } => "transaction_status_changed",
            Event::TransactionPaid { .. } => "transaction_paid",
            Event::ShippingLabelCreated { .. } => "shipping_label_created",
            Event::PurchaseOrderCreated { .. } => "purchase_order_created",
            Event::PurchaseOrderStatusChanged { .. } => "purchase_order_status_changed",
            Event::PurchaseOrderReceived { .. } => "purchase_order_received",
            Event::CategoryTreeChanged { .. } => "category_tree_changed",
            Event::SkuGenerated { .. } => "sku_generated",
            Event::ListingStatusChanged { .. } => "listing_status_changed",
            Event::ListingSyncFailed { .. } => "listing_sync_failed",
            Event::Generic { .. } => "generic",
        }
    }
}

/// Creates the bounded event channel.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Drains the event channel and logs each event until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        counter!("storekeep_events.processed", 1, "event" => event.name());

        match &event {
            Event::InventoryAdjusted {
                inventory_id,
                reference_number,
                quantity_before,
                quantity_after,
                adjustment_type,
                ..
            } => {
                info!(
                    %inventory_id,
                    reference = %reference_number,
                    before = quantity_before,
                    after = quantity_after,
                    kind = %adjustment_type,
                    "inventory adjusted"
                );
            }
            Event::LowStock {
                inventory_id,
                available,
                reorder_point,
                ..
            } => {
                warn!(%inventory_id, available, reorder_point, "inventory at or below reorder point");
            }
            Event::TransactionStatusChanged {
                transaction_id,
                action,
                from,
                to,
                ..
            } => {
                info!(%transaction_id, %action, %from, %to, "transaction status changed");
            }
            Event::PurchaseOrderReceived {
                purchase_order_id,
                receipt_id,
                units,
                ..
            } => {
                info!(%purchase_order_id, %receipt_id, units, "purchase order received");
            }
            Event::ListingSyncFailed {
                listing_id, error, ..
            } => {
                warn!(%listing_id, %error, "listing sync failed");
            }
            other => {
                info!(event = other.name(), "Received event: {:?}", other);
            }
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (sender, mut rx) = channel(4);
        sender
            .send(Event::CategoryTreeChanged {
                store_id: Uuid::nil(),
            })
            .await
            .unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "category_tree_changed");
    }

    #[tokio::test]
    async fn send_or_log_survives_closed_channel() {
        let (sender, rx) = channel(1);
        drop(rx);
        sender.send_or_log(Event::with_data("late".into())).await;
        assert!(sender.send(Event::with_data("late".into())).await.is_err());
    }
}
