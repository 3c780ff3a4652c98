use crate::{
    db::DbPool,
    entities::{
        depot::{self, Entity as Depot},
        stock_level::{self, Entity as StockLevel},
        stock_movement::{self, Entity as StockMovement},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Request/Response types for the depot reference service
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateDepotRequest {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    pub address: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateDepotRequest {
    #[validate(length(min = 1, max = 255, message = "Name must not be empty"))]
    pub name: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DepotResponse {
    pub id: i32,
    pub name: String,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DepotListResponse {
    pub depots: Vec<DepotResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Returns whether a depot id exists in the reference table.
pub(crate) async fn depot_exists<C: ConnectionTrait>(
    db: &C,
    depot_id: i32,
) -> Result<bool, ServiceError> {
    let count = Depot::find_by_id(depot_id)
        .count(db)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(count > 0)
}

/// Service managing the depot reference table
#[derive(Clone)]
pub struct DepotService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl DepotService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a new depot
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_depot(
        &self,
        request: CreateDepotRequest,
    ) -> Result<DepotResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;

        let active_model = depot::ActiveModel {
            name: Set(request.name),
            address: Set(request.address),
            ..Default::default()
        };

        let model = active_model.insert(db).await.map_err(|e| {
            error!(error = %e, "Failed to create depot");
            ServiceError::db_error(e)
        })?;

        info!(depot_id = model.id, name = %model.name, "Depot created");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::DepotCreated(model.id)).await {
                warn!(error = %e, depot_id = model.id, "Failed to send depot created event");
            }
        }

        Ok(self.model_to_response(model))
    }

    /// Retrieves a depot by id
    #[instrument(skip(self), fields(depot_id = depot_id))]
    pub async fn get_depot(&self, depot_id: i32) -> Result<Option<DepotResponse>, ServiceError> {
        let db = &*self.db_pool;

        let depot = Depot::find_by_id(depot_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(depot.map(|model| self.model_to_response(model)))
    }

    /// Lists depots with pagination, ordered by name
    #[instrument(skip(self))]
    pub async fn list_depots(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<DepotListResponse, ServiceError> {
        let db = &*self.db_pool;

        let paginator = Depot::find()
            .order_by_asc(depot::Column::Name)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count depots");
            ServiceError::db_error(e)
        })?;

        let depots = paginator.fetch_page(page.saturating_sub(1)).await.map_err(|e| {
            error!(error = %e, page = page, per_page = per_page, "Failed to fetch depots page");
            ServiceError::db_error(e)
        })?;

        Ok(DepotListResponse {
            depots: depots
                .into_iter()
                .map(|model| self.model_to_response(model))
                .collect(),
            total,
            page,
            per_page,
        })
    }

    /// Updates a depot's name or address. Absent fields stay unchanged.
    #[instrument(skip(self, request), fields(depot_id = depot_id))]
    pub async fn update_depot(
        &self,
        depot_id: i32,
        request: UpdateDepotRequest,
    ) -> Result<DepotResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;

        let existing = Depot::find_by_id(depot_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Depot {} not found", depot_id)))?;

        let mut active_model: depot::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active_model.name = Set(name);
        }
        if let Some(address) = request.address {
            active_model.address = Set(Some(address));
        }

        let model = active_model.update(db).await.map_err(|e| {
            error!(error = %e, depot_id = depot_id, "Failed to update depot");
            ServiceError::db_error(e)
        })?;

        info!(depot_id = model.id, "Depot updated");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::DepotUpdated(model.id)).await {
                warn!(error = %e, depot_id = model.id, "Failed to send depot updated event");
            }
        }

        Ok(self.model_to_response(model))
    }

    /// Deletes a depot that is not referenced by any stock entry or movement,
    /// either as source or as transfer destination.
    #[instrument(skip(self), fields(depot_id = depot_id))]
    pub async fn delete_depot(&self, depot_id: i32) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let exists = depot_exists(db, depot_id).await?;
        if !exists {
            return Err(ServiceError::NotFound(format!(
                "Depot {} not found",
                depot_id
            )));
        }

        let stock_refs = StockLevel::find()
            .filter(stock_level::Column::DepotId.eq(depot_id))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        if stock_refs > 0 {
            return Err(ServiceError::Conflict(format!(
                "Depot {} still has stock entries",
                depot_id
            )));
        }

        let movement_refs = StockMovement::find()
            .filter(
                Condition::any()
                    .add(stock_movement::Column::DepotId.eq(depot_id))
                    .add(stock_movement::Column::DestinationDepotId.eq(depot_id)),
            )
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        if movement_refs > 0 {
            return Err(ServiceError::Conflict(format!(
                "Depot {} is referenced by movement history",
                depot_id
            )));
        }

        let result = Depot::delete_by_id(depot_id)
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Depot {} not found",
                depot_id
            )));
        }

        info!(depot_id = depot_id, "Depot deleted");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::DepotDeleted(depot_id)).await {
                warn!(error = %e, depot_id = depot_id, "Failed to send depot deleted event");
            }
        }

        Ok(())
    }

    fn model_to_response(&self, model: depot::Model) -> DepotResponse {
        DepotResponse {
            id: model.id,
            name: model.name,
            address: model.address,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
