use crate::{
    db::DbPool,
    entities::{
        stock_level,
        stock_movement::{self, Entity as StockMovement, MovementKind, MovementType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        depots::depot_exists,
        materials::material_exists,
        stock::{adjust, get_or_create},
    },
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

/// Input for recording a movement. The kind is already parsed, so an inbound
/// movement carrying a destination depot cannot reach this service.
#[derive(Debug, Clone)]
pub struct CreateMovementInput {
    pub material_id: i32,
    pub depot_id: i32,
    pub kind: MovementKind,
    pub reference_document: Option<String>,
    pub comment: Option<String>,
    pub actor: Option<String>,
}

/// Amendable movement fields. Everything else on a movement is immutable
/// after creation; the HTTP boundary rejects unknown fields outright.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateMovementMetadata {
    pub reference_document: Option<String>,
    pub comment: Option<String>,
    pub actor: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MovementResponse {
    pub id: i64,
    pub material_id: i32,
    pub depot_id: i32,
    pub movement_type: String,
    pub quantity: i64,
    pub destination_depot_id: Option<i32>,
    pub reference_document: Option<String>,
    pub comment: Option<String>,
    pub actor: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MovementListResponse {
    pub movements: Vec<MovementResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Ledger query filters; all optional, combined with AND.
#[derive(Debug, Clone, Default)]
pub struct MovementFilters {
    pub material_id: Option<i32>,
    pub depot_id: Option<i32>,
    pub movement_type: Option<MovementType>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// Orchestrates movement recording, cancellation, and the ledger read
/// surface. Every stock mutation runs inside one database transaction; the
/// stock table and the ledger can never disagree after a committed call.
#[derive(Clone)]
pub struct MovementService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl MovementService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Records a movement and applies its stock effect atomically.
    ///
    /// Validation happens before the transaction opens: a rejected request
    /// has no side effects at all. Inside the transaction an exit or the
    /// debit half of a transfer fails with `InsufficientStock` when the
    /// source cannot cover the quantity, rolling everything back.
    #[instrument(skip(self, input), fields(
        material_id = input.material_id,
        depot_id = input.depot_id,
        kind = input.kind.describe(),
        quantity = input.kind.quantity()
    ))]
    pub async fn create(&self, input: CreateMovementInput) -> Result<MovementResponse, ServiceError> {
        if input.kind.quantity() <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be a positive integer".to_string(),
            ));
        }
        if let MovementKind::Transfer {
            destination_depot_id,
            ..
        } = input.kind
        {
            if destination_depot_id == input.depot_id {
                return Err(ServiceError::Conflict(
                    "Transfer destination must differ from the source depot".to_string(),
                ));
            }
        }

        let db = &*self.db_pool;

        if !material_exists(db, input.material_id).await? {
            return Err(ServiceError::NotFound(format!(
                "Material {} not found",
                input.material_id
            )));
        }
        if !depot_exists(db, input.depot_id).await? {
            return Err(ServiceError::NotFound(format!(
                "Depot {} not found",
                input.depot_id
            )));
        }
        if let Some(destination_depot_id) = input.kind.destination_depot_id() {
            if !depot_exists(db, destination_depot_id).await? {
                return Err(ServiceError::NotFound(format!(
                    "Destination depot {} not found",
                    destination_depot_id
                )));
            }
        }

        let material_id = input.material_id;
        let depot_id = input.depot_id;
        let kind = input.kind;
        let CreateMovementInput {
            reference_document,
            comment,
            actor,
            ..
        } = input;

        let (movement, source_entry) = db
            .transaction::<_, (stock_movement::Model, stock_level::Model), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        get_or_create(txn, material_id, depot_id).await?;

                        let source_entry = match kind {
                            MovementKind::Entry { quantity } => {
                                adjust(txn, material_id, depot_id, quantity).await?
                            }
                            MovementKind::Exit { quantity } => {
                                adjust(txn, material_id, depot_id, -quantity).await?
                            }
                            MovementKind::Transfer {
                                quantity,
                                destination_depot_id,
                            } => {
                                let source =
                                    adjust(txn, material_id, depot_id, -quantity).await?;
                                get_or_create(txn, material_id, destination_depot_id).await?;
                                adjust(txn, material_id, destination_depot_id, quantity).await?;
                                source
                            }
                        };

                        let row = stock_movement::ActiveModel {
                            material_id: Set(material_id),
                            depot_id: Set(depot_id),
                            movement_type: Set(kind.movement_type().as_str().to_string()),
                            quantity: Set(kind.quantity()),
                            destination_depot_id: Set(kind.destination_depot_id()),
                            reference_document: Set(reference_document),
                            comment: Set(comment),
                            actor: Set(actor),
                            ..Default::default()
                        };
                        let movement = row.insert(txn).await.map_err(ServiceError::db_error)?;

                        Ok((movement, source_entry))
                    })
                },
            )
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        info!(
            movement_id = movement.id,
            material_id = movement.material_id,
            depot_id = movement.depot_id,
            movement_type = %movement.movement_type,
            quantity = movement.quantity,
            "Movement recorded"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::MovementRecorded {
                    movement_id: movement.id,
                    material_id: movement.material_id,
                    depot_id: movement.depot_id,
                    movement_type: movement.movement_type.clone(),
                    quantity: movement.quantity,
                    destination_depot_id: movement.destination_depot_id,
                    resulting_quantity: source_entry.quantity,
                    minimum_threshold: source_entry.minimum_threshold,
                })
                .await
            {
                warn!(error = %e, movement_id = movement.id, "Failed to send movement recorded event");
            }
        }

        Ok(self.model_to_response(movement))
    }

    /// Cancels a movement by applying the exact inverse of its stock effect
    /// and removing the ledger row, all in one transaction.
    ///
    /// Cancelling an older entry whose stock later movements already consumed
    /// fails with `InsufficientStock` and leaves both the ledger and the
    /// stock untouched. Only the most recent movement on a pair is
    /// unconditionally safe to cancel.
    #[instrument(skip(self), fields(movement_id = movement_id))]
    pub async fn cancel(&self, movement_id: i64) -> Result<MovementResponse, ServiceError> {
        let db = &*self.db_pool;

        // Fast NotFound before opening a transaction.
        if StockMovement::find_by_id(movement_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .is_none()
        {
            return Err(ServiceError::NotFound(format!(
                "Movement {} not found",
                movement_id
            )));
        }

        let removed = db
            .transaction::<_, stock_movement::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    // Re-read inside the transaction so a concurrent cancel
                    // cannot reverse the same movement twice.
                    let current = StockMovement::find_by_id(movement_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Movement {} not found",
                                movement_id
                            ))
                        })?;

                    let kind = current.kind().ok_or_else(|| {
                        ServiceError::InternalError(format!(
                            "Movement {} carries an inconsistent type/destination combination",
                            movement_id
                        ))
                    })?;

                    let material_id = current.material_id;
                    let depot_id = current.depot_id;

                    get_or_create(txn, material_id, depot_id).await?;
                    match kind {
                        MovementKind::Entry { quantity } => {
                            adjust(txn, material_id, depot_id, -quantity).await?;
                        }
                        MovementKind::Exit { quantity } => {
                            adjust(txn, material_id, depot_id, quantity).await?;
                        }
                        MovementKind::Transfer {
                            quantity,
                            destination_depot_id,
                        } => {
                            adjust(txn, material_id, depot_id, quantity).await?;
                            get_or_create(txn, material_id, destination_depot_id).await?;
                            adjust(txn, material_id, destination_depot_id, -quantity).await?;
                        }
                    }

                    let result = StockMovement::delete_by_id(movement_id)
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    if result.rows_affected == 0 {
                        return Err(ServiceError::NotFound(format!(
                            "Movement {} was already removed",
                            movement_id
                        )));
                    }

                    Ok(current)
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        info!(
            movement_id = removed.id,
            material_id = removed.material_id,
            depot_id = removed.depot_id,
            movement_type = %removed.movement_type,
            quantity = removed.quantity,
            "Movement cancelled and stock effect reversed"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::MovementCancelled {
                    movement_id: removed.id,
                    material_id: removed.material_id,
                    depot_id: removed.depot_id,
                    movement_type: removed.movement_type.clone(),
                    quantity: removed.quantity,
                })
                .await
            {
                warn!(error = %e, movement_id = removed.id, "Failed to send movement cancelled event");
            }
        }

        Ok(self.model_to_response(removed))
    }

    /// Amends the metadata fields of a movement. Quantity, type, and depot
    /// ids are not part of the update type and therefore cannot change.
    #[instrument(skip(self, update), fields(movement_id = movement_id))]
    pub async fn update_metadata(
        &self,
        movement_id: i64,
        update: UpdateMovementMetadata,
    ) -> Result<MovementResponse, ServiceError> {
        let db = &*self.db_pool;

        let movement = StockMovement::find_by_id(movement_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Movement {} not found", movement_id))
            })?;

        if update.reference_document.is_none()
            && update.comment.is_none()
            && update.actor.is_none()
        {
            return Ok(self.model_to_response(movement));
        }

        let mut active_model: stock_movement::ActiveModel = movement.into();
        if let Some(reference_document) = update.reference_document {
            active_model.reference_document = Set(Some(reference_document));
        }
        if let Some(comment) = update.comment {
            active_model.comment = Set(Some(comment));
        }
        if let Some(actor) = update.actor {
            active_model.actor = Set(Some(actor));
        }

        let updated = active_model
            .update(db)
            .await
            .map_err(ServiceError::db_error)?;

        info!(movement_id = updated.id, "Movement metadata updated");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::MovementMetadataUpdated(updated.id))
                .await
            {
                warn!(error = %e, movement_id = updated.id, "Failed to send metadata updated event");
            }
        }

        Ok(self.model_to_response(updated))
    }

    /// Removes a ledger row WITHOUT reversing its stock effect.
    ///
    /// Operator-only escape hatch: after this call the stock table and the
    /// ledger no longer agree for the touched pair. Normal flows cancel
    /// instead.
    #[instrument(skip(self), fields(movement_id = movement_id))]
    pub async fn delete_without_reversal(&self, movement_id: i64) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let movement = StockMovement::find_by_id(movement_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Movement {} not found", movement_id))
            })?;

        let result = StockMovement::delete_by_id(movement_id)
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Movement {} not found",
                movement_id
            )));
        }

        warn!(
            movement_id = movement.id,
            material_id = movement.material_id,
            depot_id = movement.depot_id,
            movement_type = %movement.movement_type,
            quantity = movement.quantity,
            "Movement deleted without stock reversal, ledger and stock now diverge for this pair"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::MovementDeleted(movement_id)).await {
                warn!(error = %e, movement_id = movement_id, "Failed to send movement deleted event");
            }
        }

        Ok(())
    }

    /// Retrieves a movement by id
    #[instrument(skip(self), fields(movement_id = movement_id))]
    pub async fn get(&self, movement_id: i64) -> Result<Option<MovementResponse>, ServiceError> {
        let db = &*self.db_pool;

        let movement = StockMovement::find_by_id(movement_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(movement.map(|model| self.model_to_response(model)))
    }

    /// Lists movements matching the filters, newest first.
    #[instrument(skip(self, filters))]
    pub async fn list(
        &self,
        filters: MovementFilters,
        page: u64,
        per_page: u64,
    ) -> Result<MovementListResponse, ServiceError> {
        let db = &*self.db_pool;

        let mut query = StockMovement::find();
        if let Some(material_id) = filters.material_id {
            query = query.filter(stock_movement::Column::MaterialId.eq(material_id));
        }
        if let Some(depot_id) = filters.depot_id {
            query = query.filter(stock_movement::Column::DepotId.eq(depot_id));
        }
        if let Some(movement_type) = filters.movement_type {
            query = query.filter(stock_movement::Column::MovementType.eq(movement_type.as_str()));
        }
        if let Some(since) = filters.since {
            query = query.filter(stock_movement::Column::CreatedAt.gte(since));
        }
        if let Some(until) = filters.until {
            query = query.filter(stock_movement::Column::CreatedAt.lte(until));
        }

        let paginator = query
            .order_by_desc(stock_movement::Column::CreatedAt)
            .order_by_desc(stock_movement::Column::Id)
            .paginate(db, per_page);

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::db_error)?;
        let movements = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok(MovementListResponse {
            movements: movements
                .into_iter()
                .map(|model| self.model_to_response(model))
                .collect(),
            total,
            page,
            per_page,
        })
    }

    fn model_to_response(&self, model: stock_movement::Model) -> MovementResponse {
        MovementResponse {
            id: model.id,
            material_id: model.material_id,
            depot_id: model.depot_id,
            movement_type: model.movement_type,
            quantity: model.quantity,
            destination_depot_id: model.destination_depot_id,
            reference_document: model.reference_document,
            comment: model.comment,
            actor: model.actor,
            created_at: model.created_at,
        }
    }
}
