pub mod common;
pub mod depots;
pub mod materials;
pub mod movements;
pub mod reports;
pub mod stock;

use std::sync::Arc;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::depots::DepotService;
use crate::services::materials::MaterialService;
use crate::services::movements::MovementService;
use crate::services::reports::ReportService;
use crate::services::stock::StockService;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub materials: Arc<MaterialService>,
    pub depots: Arc<DepotService>,
    pub stock: Arc<StockService>,
    pub movements: Arc<MovementService>,
    pub reports: Arc<ReportService>,
}

impl AppServices {
    /// Build the service container over one shared connection pool.
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            materials: Arc::new(MaterialService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            depots: Arc::new(DepotService::new(db_pool.clone(), event_sender.clone())),
            stock: Arc::new(StockService::new(db_pool.clone(), event_sender.clone())),
            movements: Arc::new(MovementService::new(db_pool.clone(), event_sender)),
            reports: Arc::new(ReportService::new(db_pool)),
        }
    }
}
