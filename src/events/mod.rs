use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Events emitted by the inventory workflow. Every event is sent only after
/// the corresponding database effects have committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    InventorySessionStarted {
        session_id: Uuid,
        cost_center_id: Uuid,
        items_snapshotted: u64,
    },
    InventoryCountRecorded {
        session_id: Uuid,
        item_id: Uuid,
        counted_quantity: Decimal,
    },
    InventorySessionCompleted {
        session_id: Uuid,
        cost_center_id: Uuid,
        precision: f64,
        adjustments: u64,
    },
}

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
}

/// Drains the event channel and logs each event. Runs until every sender is
/// dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::InventorySessionStarted {
                session_id,
                cost_center_id,
                items_snapshotted,
            } => {
                info!(
                    %session_id,
                    %cost_center_id,
                    items_snapshotted,
                    "inventory session started"
                );
            }
            Event::InventoryCountRecorded {
                session_id,
                item_id,
                counted_quantity,
            } => {
                info!(%session_id, %item_id, %counted_quantity, "inventory count recorded");
            }
            Event::InventorySessionCompleted {
                session_id,
                cost_center_id,
                precision,
                adjustments,
            } => {
                info!(
                    %session_id,
                    %cost_center_id,
                    precision,
                    adjustments,
                    "inventory session completed"
                );
            }
        }
    }
}
