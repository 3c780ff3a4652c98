use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::errors::{ErrorResponse, ServiceError};
use crate::services::reports::MovementSummaryResponse;
use crate::{ApiResponse, AppState};

/// Optional time window for the movement summary.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SummaryQuery {
    /// Count movements created at or after this instant (RFC 3339)
    pub since: Option<DateTime<Utc>>,
    /// Count movements created at or before this instant (RFC 3339)
    pub until: Option<DateTime<Utc>>,
}

/// Trailing window size for recent activity.
#[derive(Debug, Deserialize, IntoParams)]
pub struct RecentQuery {
    /// Number of trailing days to cover, at least 1
    #[serde(default = "default_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    7
}

/// Movement counts and quantity totals per type
#[utoipa::path(
    get,
    path = "/api/v1/reports/movements/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Summary computed", body = ApiResponse<MovementSummaryResponse>),
        (status = 400, description = "Invalid window parameters", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "reports"
)]
pub async fn movement_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<ApiResponse<MovementSummaryResponse>>, ServiceError> {
    let summary = state
        .services
        .reports
        .movement_summary(query.since, query.until)
        .await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// Movement activity over the last N days
#[utoipa::path(
    get,
    path = "/api/v1/reports/movements/recent",
    params(RecentQuery),
    responses(
        (status = 200, description = "Recent activity computed", body = ApiResponse<MovementSummaryResponse>),
        (status = 400, description = "Window must cover at least one day", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "reports"
)]
pub async fn recent_activity(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<ApiResponse<MovementSummaryResponse>>, ServiceError> {
    let summary = state.services.reports.recent_activity(query.days).await?;
    Ok(Json(ApiResponse::success(summary)))
}

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/movements/summary", get(movement_summary))
        .route("/movements/recent", get(recent_activity))
}
