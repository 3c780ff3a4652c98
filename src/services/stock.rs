use crate::{
    db::DbPool,
    entities::stock_level::{self, Entity as StockLevel},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{depots::depot_exists, materials::material_exists},
};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

/// Upper bound on optimistic retries before an adjustment gives up.
pub(crate) const ADJUST_MAX_RETRIES: u32 = 5;

/// Reads the stock entry for one (material, depot) pair without creating it.
/// An absent pair means quantity 0, threshold 0.
pub(crate) async fn find_entry<C: ConnectionTrait>(
    db: &C,
    material_id: i32,
    depot_id: i32,
) -> Result<Option<stock_level::Model>, ServiceError> {
    StockLevel::find()
        .filter(stock_level::Column::MaterialId.eq(material_id))
        .filter(stock_level::Column::DepotId.eq(depot_id))
        .one(db)
        .await
        .map_err(ServiceError::db_error)
}

/// Returns the stock entry for the pair, inserting a zero-quantity row if
/// none exists yet. The insert uses ON CONFLICT DO NOTHING on the unique
/// (material_id, depot_id) index, so two first movements racing on the same
/// pair both end up reading the single surviving row.
pub(crate) async fn get_or_create<C: ConnectionTrait>(
    db: &C,
    material_id: i32,
    depot_id: i32,
) -> Result<stock_level::Model, ServiceError> {
    if let Some(entry) = find_entry(db, material_id, depot_id).await? {
        return Ok(entry);
    }

    let now = Utc::now();
    let row = stock_level::ActiveModel {
        material_id: Set(material_id),
        depot_id: Set(depot_id),
        quantity: Set(0),
        minimum_threshold: Set(0),
        version: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    StockLevel::insert(row)
        .on_conflict(
            OnConflict::columns([
                stock_level::Column::MaterialId,
                stock_level::Column::DepotId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(db)
        .await
        .map_err(ServiceError::db_error)?;

    find_entry(db, material_id, depot_id).await?.ok_or_else(|| {
        ServiceError::InternalError(format!(
            "Stock entry for material {} at depot {} missing right after insert",
            material_id, depot_id
        ))
    })
}

/// Applies `delta` to the pair's quantity, enforcing that the result never
/// goes negative.
///
/// The write is conditioned on the entry's version counter, so two concurrent
/// adjustments can never both apply against the same stale read: the loser
/// sees zero rows affected, re-reads the row and retries with fresh values.
/// Exhausting the retry budget aborts with a retriable `TransactionError`.
/// Only callable inside a transaction owned by the movement service.
pub(crate) async fn adjust(
    txn: &DatabaseTransaction,
    material_id: i32,
    depot_id: i32,
    delta: i64,
) -> Result<stock_level::Model, ServiceError> {
    for attempt in 1..=ADJUST_MAX_RETRIES {
        let entry = find_entry(txn, material_id, depot_id).await?.ok_or_else(|| {
            ServiceError::InternalError(format!(
                "No stock entry for material {} at depot {}",
                material_id, depot_id
            ))
        })?;

        let next_quantity = entry.quantity + delta;
        if next_quantity < 0 {
            return Err(ServiceError::InsufficientStock(format!(
                "Stock for material {} at depot {} is {}, cannot remove {}",
                material_id, depot_id, entry.quantity, -delta
            )));
        }

        let now = Utc::now();
        let result = StockLevel::update_many()
            .col_expr(stock_level::Column::Quantity, Expr::value(next_quantity))
            .col_expr(stock_level::Column::Version, Expr::value(entry.version + 1))
            .col_expr(stock_level::Column::UpdatedAt, Expr::value(now))
            .filter(stock_level::Column::Id.eq(entry.id))
            .filter(stock_level::Column::Version.eq(entry.version))
            .exec(txn)
            .await
            .map_err(ServiceError::db_error)?;

        if result.rows_affected == 1 {
            return Ok(stock_level::Model {
                quantity: next_quantity,
                version: entry.version + 1,
                updated_at: now,
                ..entry
            });
        }

        debug!(
            material_id = material_id,
            depot_id = depot_id,
            attempt = attempt,
            "Stock entry version moved underneath the adjustment, retrying"
        );
    }

    Err(ServiceError::TransactionError(format!(
        "Stock entry for material {} at depot {} kept changing, gave up after {} attempts",
        material_id, depot_id, ADJUST_MAX_RETRIES
    )))
}

/// Response types for the stock read surface
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StockLevelResponse {
    pub material_id: i32,
    pub depot_id: i32,
    pub quantity: i64,
    pub minimum_threshold: i64,
    /// True when the quantity has fallen to or below the minimum threshold.
    pub is_rupture: bool,
    pub version: i32,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StockLevelListResponse {
    pub levels: Vec<StockLevelResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Read-side service over stock entries. All quantity mutations go through
/// the movement service; this surface only reads snapshots and maintains the
/// rupture threshold.
#[derive(Clone)]
pub struct StockService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl StockService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Returns the stock snapshot for one (material, depot) pair. A pair
    /// no movement has touched yet reads as quantity 0 / threshold 0 without
    /// creating a row.
    #[instrument(skip(self), fields(material_id = material_id, depot_id = depot_id))]
    pub async fn get_level(
        &self,
        material_id: i32,
        depot_id: i32,
    ) -> Result<StockLevelResponse, ServiceError> {
        let db = &*self.db_pool;

        if !material_exists(db, material_id).await? {
            return Err(ServiceError::NotFound(format!(
                "Material {} not found",
                material_id
            )));
        }
        if !depot_exists(db, depot_id).await? {
            return Err(ServiceError::NotFound(format!(
                "Depot {} not found",
                depot_id
            )));
        }

        match find_entry(db, material_id, depot_id).await? {
            Some(entry) => Ok(model_to_response(entry)),
            None => Ok(StockLevelResponse {
                material_id,
                depot_id,
                quantity: 0,
                minimum_threshold: 0,
                is_rupture: true,
                version: 0,
                updated_at: None,
            }),
        }
    }

    /// Lists stock entries, optionally narrowed to one material or depot.
    #[instrument(skip(self))]
    pub async fn list_levels(
        &self,
        material_id: Option<i32>,
        depot_id: Option<i32>,
        page: u64,
        per_page: u64,
    ) -> Result<StockLevelListResponse, ServiceError> {
        let db = &*self.db_pool;

        let mut query = StockLevel::find();
        if let Some(material_id) = material_id {
            query = query.filter(stock_level::Column::MaterialId.eq(material_id));
        }
        if let Some(depot_id) = depot_id {
            query = query.filter(stock_level::Column::DepotId.eq(depot_id));
        }

        let paginator = query
            .order_by_asc(stock_level::Column::MaterialId)
            .order_by_asc(stock_level::Column::DepotId)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count stock entries");
            ServiceError::db_error(e)
        })?;

        let levels = paginator.fetch_page(page.saturating_sub(1)).await.map_err(|e| {
            error!(error = %e, page = page, per_page = per_page, "Failed to fetch stock page");
            ServiceError::db_error(e)
        })?;

        Ok(StockLevelListResponse {
            levels: levels.into_iter().map(model_to_response).collect(),
            total,
            page,
            per_page,
        })
    }

    /// Lists entries whose quantity sits at or below their minimum threshold.
    #[instrument(skip(self))]
    pub async fn list_ruptures(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<StockLevelListResponse, ServiceError> {
        let db = &*self.db_pool;

        let paginator = StockLevel::find()
            .filter(
                Expr::col(stock_level::Column::Quantity)
                    .lte(Expr::col(stock_level::Column::MinimumThreshold)),
            )
            .order_by_asc(stock_level::Column::MaterialId)
            .order_by_asc(stock_level::Column::DepotId)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count rupture entries");
            ServiceError::db_error(e)
        })?;

        let levels = paginator.fetch_page(page.saturating_sub(1)).await.map_err(|e| {
            error!(error = %e, page = page, per_page = per_page, "Failed to fetch rupture page");
            ServiceError::db_error(e)
        })?;

        Ok(StockLevelListResponse {
            levels: levels.into_iter().map(model_to_response).collect(),
            total,
            page,
            per_page,
        })
    }

    /// Sets the rupture threshold for a pair, creating the zero-quantity
    /// entry when absent. Never touches `quantity`; quantity writes go
    /// exclusively through the version-checked adjustment path.
    #[instrument(skip(self), fields(material_id = material_id, depot_id = depot_id))]
    pub async fn set_threshold(
        &self,
        material_id: i32,
        depot_id: i32,
        minimum_threshold: i64,
    ) -> Result<StockLevelResponse, ServiceError> {
        if minimum_threshold < 0 {
            return Err(ServiceError::ValidationError(
                "Minimum threshold must not be negative".to_string(),
            ));
        }

        let db = &*self.db_pool;

        if !material_exists(db, material_id).await? {
            return Err(ServiceError::NotFound(format!(
                "Material {} not found",
                material_id
            )));
        }
        if !depot_exists(db, depot_id).await? {
            return Err(ServiceError::NotFound(format!(
                "Depot {} not found",
                depot_id
            )));
        }

        let entry = get_or_create(db, material_id, depot_id).await?;

        let mut active_model: stock_level::ActiveModel = entry.into();
        active_model.minimum_threshold = Set(minimum_threshold);

        let updated = active_model.update(db).await.map_err(|e| {
            error!(error = %e, material_id = material_id, depot_id = depot_id, "Failed to update threshold");
            ServiceError::db_error(e)
        })?;

        info!(
            material_id = material_id,
            depot_id = depot_id,
            minimum_threshold = minimum_threshold,
            "Stock threshold updated"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::StockThresholdChanged {
                    material_id,
                    depot_id,
                    minimum_threshold,
                })
                .await
            {
                warn!(error = %e, material_id = material_id, depot_id = depot_id, "Failed to send threshold changed event");
            }
        }

        Ok(model_to_response(updated))
    }
}

fn model_to_response(model: stock_level::Model) -> StockLevelResponse {
    StockLevelResponse {
        material_id: model.material_id,
        depot_id: model.depot_id,
        quantity: model.quantity,
        minimum_threshold: model.minimum_threshold,
        is_rupture: model.is_rupture(),
        version: model.version,
        updated_at: Some(model.updated_at),
    }
}
