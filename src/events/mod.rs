use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

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

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Movement ledger events
    MovementRecorded {
        movement_id: i64,
        material_id: i32,
        depot_id: i32,
        movement_type: String,
        quantity: i64,
        destination_depot_id: Option<i32>,
        resulting_quantity: i64,
        minimum_threshold: i64,
    },
    MovementCancelled {
        movement_id: i64,
        material_id: i32,
        depot_id: i32,
        movement_type: String,
        quantity: i64,
    },
    MovementMetadataUpdated(i64),
    MovementDeleted(i64),

    // Stock events
    StockThresholdChanged {
        material_id: i32,
        depot_id: i32,
        minimum_threshold: i64,
    },

    // Reference data events
    MaterialCreated(i32),
    MaterialUpdated(i32),
    MaterialDeleted(i32),
    DepotCreated(i32),
    DepotUpdated(i32),
    DepotDeleted(i32),
}

/// Consumes events off the channel until all senders are dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        info!("Received event: {:?}", event);

        match event {
            Event::MovementRecorded {
                movement_id,
                material_id,
                depot_id,
                movement_type,
                quantity,
                destination_depot_id,
                resulting_quantity,
                minimum_threshold,
            } => {
                info!(
                    "Movement {} recorded: {} x{} for material {} in depot {}, destination={:?}",
                    movement_id, movement_type, quantity, material_id, depot_id,
                    destination_depot_id
                );
                if let Err(e) = handle_movement_recorded(
                    movement_id,
                    material_id,
                    depot_id,
                    resulting_quantity,
                    minimum_threshold,
                )
                .await
                {
                    error!(
                        "Failed to handle movement recorded event: movement_id={}, error={}",
                        movement_id, e
                    );
                }
            }
            Event::MovementCancelled {
                movement_id,
                material_id,
                depot_id,
                movement_type,
                quantity,
            } => {
                info!(
                    "Movement {} cancelled: {} x{} reversed for material {} in depot {}",
                    movement_id, movement_type, quantity, material_id, depot_id
                );
            }
            Event::MovementMetadataUpdated(movement_id) => {
                info!("Movement {} metadata updated", movement_id);
            }
            Event::MovementDeleted(movement_id) => {
                warn!(
                    "Movement {} deleted without stock reversal; ledger and stock now diverge for its pair",
                    movement_id
                );
            }
            Event::StockThresholdChanged {
                material_id,
                depot_id,
                minimum_threshold,
            } => {
                info!(
                    "Rupture threshold for material {} in depot {} set to {}",
                    material_id, depot_id, minimum_threshold
                );
            }
            Event::MaterialCreated(id) => info!("Material {} created", id),
            Event::MaterialUpdated(id) => info!("Material {} updated", id),
            Event::MaterialDeleted(id) => info!("Material {} deleted", id),
            Event::DepotCreated(id) => info!("Depot {} created", id),
            Event::DepotUpdated(id) => info!("Depot {} updated", id),
            Event::DepotDeleted(id) => info!("Depot {} deleted", id),
        }
    }

    info!("Event processing loop stopped");
}

async fn handle_movement_recorded(
    movement_id: i64,
    material_id: i32,
    depot_id: i32,
    resulting_quantity: i64,
    minimum_threshold: i64,
) -> Result<(), String> {
    info!(
        "Post-processing movement {}: material {} in depot {} now at {}",
        movement_id, material_id, depot_id, resulting_quantity
    );

    if resulting_quantity <= minimum_threshold {
        warn!(
            "Stock rupture: material {} in depot {} is at {} (threshold {})",
            material_id, depot_id, resulting_quantity, minimum_threshold
        );
        // Replenishment planning hooks in here once procurement lands
    }

    Ok(())
}
