use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the stock engine after a transaction commits.
///
/// Consumers are in-process only; delivery failure never fails the
/// originating operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    PartIssued {
        parts_used_id: i64,
        repair_request_id: i64,
        inventory_item_id: i64,
        warehouse_id: i64,
        quantity: i32,
        new_quantity: i32,
        approval_required: bool,
        transaction_id: Uuid,
    },
    /// The urgent-issue override fired and the level went negative.
    NegativeStockIssued {
        inventory_item_id: i64,
        warehouse_id: i64,
        new_quantity: i32,
    },
    StockAdjusted {
        inventory_item_id: i64,
        warehouse_id: i64,
        delta: i32,
        new_quantity: i32,
        reason: String,
    },
    StockAlertRaised {
        inventory_item_id: i64,
        warehouse_id: i64,
        alert_type: String,
        severity: String,
    },
    TransferCreated {
        transfer_id: i64,
        transfer_number: String,
    },
    TransferStatusChanged {
        transfer_id: i64,
        old_status: String,
        new_status: String,
    },
    TransferDeleted {
        transfer_id: i64,
    },
    ApprovalRequested {
        approval_id: i64,
        parts_used_id: i64,
        priority: String,
        approver_role: String,
    },
    ApprovalDecided {
        approval_id: i64,
        parts_used_id: i64,
        approved: bool,
        timestamp: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Drains the event channel, logging each event. Runs for the lifetime
/// of the process; spawned once from main.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::NegativeStockIssued {
                inventory_item_id,
                warehouse_id,
                new_quantity,
            } => {
                warn!(
                    item = inventory_item_id,
                    warehouse = warehouse_id,
                    quantity = new_quantity,
                    "urgent issue drove stock negative; corrective adjustment required"
                );
            }
            other => info!(event = ?other, "stock event"),
        }
    }
    info!("event channel closed; processor exiting");
}
