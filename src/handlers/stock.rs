use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::errors::{ErrorResponse, ServiceError};
use crate::handlers::common::{validate_input, JsonBody, PaginationParams};
use crate::services::stock::StockLevelResponse;
use crate::{ApiResponse, AppState, PaginatedResponse};

/// Stock listing filters.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct StockQuery {
    /// Only entries for this material
    pub material_id: Option<i32>,
    /// Only entries at this depot
    pub depot_id: Option<i32>,
}

/// New minimum threshold for one (material, depot) pair.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct SetThresholdRequest {
    #[validate(range(min = 0, message = "Minimum threshold must not be negative"))]
    pub minimum_threshold: i64,
}

/// List stock entries
#[utoipa::path(
    get,
    path = "/api/v1/stock",
    params(StockQuery, PaginationParams),
    responses(
        (status = 200, description = "Stock entries retrieved", body = ApiResponse<PaginatedResponse<StockLevelResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "stock"
)]
pub async fn list_stock(
    State(state): State<AppState>,
    Query(query): Query<StockQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<StockLevelResponse>>>, ServiceError> {
    let params = params.normalize(
        state.config.api_default_page_size,
        state.config.api_max_page_size,
    );
    let result = state
        .services
        .stock
        .list_levels(query.material_id, query.depot_id, params.page, params.per_page)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        result.levels,
        result.total,
        result.page,
        result.per_page,
    ))))
}

/// List ruptures
///
/// Every stock entry whose quantity has fallen to or below its minimum
/// threshold.
#[utoipa::path(
    get,
    path = "/api/v1/stock/ruptures",
    params(PaginationParams),
    responses(
        (status = 200, description = "Rupture entries retrieved", body = ApiResponse<PaginatedResponse<StockLevelResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "stock"
)]
pub async fn list_ruptures(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<StockLevelResponse>>>, ServiceError> {
    let params = params.normalize(
        state.config.api_default_page_size,
        state.config.api_max_page_size,
    );
    let result = state
        .services
        .stock
        .list_ruptures(params.page, params.per_page)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        result.levels,
        result.total,
        result.page,
        result.per_page,
    ))))
}

/// Get the stock snapshot for one (material, depot) pair
///
/// A pair no movement has touched yet reads as quantity 0 with threshold 0;
/// asking never creates a row.
#[utoipa::path(
    get,
    path = "/api/v1/stock/{material_id}/{depot_id}",
    params(
        ("material_id" = i32, Path, description = "Material id"),
        ("depot_id" = i32, Path, description = "Depot id"),
    ),
    responses(
        (status = 200, description = "Stock snapshot", body = ApiResponse<StockLevelResponse>),
        (status = 404, description = "Material or depot not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "stock"
)]
pub async fn get_stock_level(
    State(state): State<AppState>,
    Path((material_id, depot_id)): Path<(i32, i32)>,
) -> Result<Json<ApiResponse<StockLevelResponse>>, ServiceError> {
    let level = state.services.stock.get_level(material_id, depot_id).await?;
    Ok(Json(ApiResponse::success(level)))
}

/// Set the rupture threshold for one (material, depot) pair
#[utoipa::path(
    put,
    path = "/api/v1/stock/{material_id}/{depot_id}/threshold",
    params(
        ("material_id" = i32, Path, description = "Material id"),
        ("depot_id" = i32, Path, description = "Depot id"),
    ),
    request_body = SetThresholdRequest,
    responses(
        (status = 200, description = "Threshold updated", body = ApiResponse<StockLevelResponse>),
        (status = 400, description = "Negative threshold", body = ErrorResponse),
        (status = 404, description = "Material or depot not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "stock"
)]
pub async fn set_threshold(
    State(state): State<AppState>,
    Path((material_id, depot_id)): Path<(i32, i32)>,
    JsonBody(payload): JsonBody<SetThresholdRequest>,
) -> Result<Json<ApiResponse<StockLevelResponse>>, ServiceError> {
    validate_input(&payload)?;
    let level = state
        .services
        .stock
        .set_threshold(material_id, depot_id, payload.minimum_threshold)
        .await?;
    Ok(Json(ApiResponse::success(level)))
}

pub fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_stock))
        .route("/ruptures", get(list_ruptures))
        .route("/:material_id/:depot_id", get(get_stock_level))
        .route("/:material_id/:depot_id/threshold", put(set_threshold))
}
