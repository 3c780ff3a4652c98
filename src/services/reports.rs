use crate::{
    db::DbPool,
    entities::stock_movement::{self, Entity as StockMovement},
    errors::ServiceError,
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::{Alias, Expr};
use sea_orm::{ColumnTrait, EntityTrait, FromQueryResult, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(Debug, FromQueryResult)]
struct MovementTypeRow {
    movement_type: String,
    movement_count: i64,
    total_quantity: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MovementTypeSummary {
    pub movement_type: String,
    pub movement_count: i64,
    pub total_quantity: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MovementSummaryResponse {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub total_movements: i64,
    pub by_type: Vec<MovementTypeSummary>,
}

/// Read-only aggregation over the movement ledger. Snapshot and rupture
/// reads live on the stock service; per-material and per-depot history is
/// the movement service's filtered listing.
#[derive(Clone)]
pub struct ReportService {
    db_pool: Arc<DbPool>,
}

impl ReportService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Counts movements and sums quantities per movement type, optionally
    /// restricted to a time window.
    #[instrument(skip(self))]
    pub async fn movement_summary(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<MovementSummaryResponse, ServiceError> {
        let db = &*self.db_pool;

        let mut query = StockMovement::find()
            .select_only()
            .column(stock_movement::Column::MovementType)
            .column_as(
                Expr::col(stock_movement::Column::Id).count(),
                "movement_count",
            )
            .column_as(
                Expr::col(stock_movement::Column::Quantity)
                    .sum()
                    .cast_as(Alias::new("BIGINT")),
                "total_quantity",
            )
            .group_by(stock_movement::Column::MovementType)
            .order_by_asc(stock_movement::Column::MovementType);

        if let Some(since) = since {
            query = query.filter(stock_movement::Column::CreatedAt.gte(since));
        }
        if let Some(until) = until {
            query = query.filter(stock_movement::Column::CreatedAt.lte(until));
        }

        let rows = query
            .into_model::<MovementTypeRow>()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(summarize(rows, since, until))
    }

    /// Movement summary over the last `days` days.
    #[instrument(skip(self))]
    pub async fn recent_activity(&self, days: u32) -> Result<MovementSummaryResponse, ServiceError> {
        if days == 0 {
            return Err(ServiceError::ValidationError(
                "Window must cover at least one day".to_string(),
            ));
        }

        let since = Utc::now() - Duration::days(i64::from(days));
        self.movement_summary(Some(since), None).await
    }
}

fn summarize(
    rows: Vec<MovementTypeRow>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
) -> MovementSummaryResponse {
    let by_type: Vec<MovementTypeSummary> = rows
        .into_iter()
        .map(|row| MovementTypeSummary {
            movement_type: row.movement_type,
            movement_count: row.movement_count,
            total_quantity: row.total_quantity.unwrap_or(0),
        })
        .collect();
    let total_movements = by_type.iter().map(|entry| entry.movement_count).sum();

    MovementSummaryResponse {
        since,
        until,
        total_movements,
        by_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::DatabaseConnection;

    #[test]
    fn summarize_totals_across_types() {
        let rows = vec![
            MovementTypeRow {
                movement_type: "ENTREE".to_string(),
                movement_count: 3,
                total_quantity: Some(120),
            },
            MovementTypeRow {
                movement_type: "SORTIE".to_string(),
                movement_count: 2,
                total_quantity: Some(45),
            },
        ];

        let summary = summarize(rows, None, None);
        assert_eq!(summary.total_movements, 5);
        assert_eq!(summary.by_type.len(), 2);
        assert_eq!(summary.by_type[0].total_quantity, 120);
    }

    #[test]
    fn summarize_handles_empty_ledger() {
        let summary = summarize(Vec::new(), None, None);
        assert_eq!(summary.total_movements, 0);
        assert!(summary.by_type.is_empty());
    }

    #[tokio::test]
    async fn recent_activity_rejects_zero_day_window() {
        let service = ReportService::new(Arc::new(DatabaseConnection::Disconnected));
        let result = service.recent_activity(0).await;
        assert!(matches!(result, Err(ServiceError::ValidationError(_))));
    }
}
