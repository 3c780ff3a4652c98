use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::errors::{ErrorResponse, ServiceError};
use crate::handlers::common::{validate_input, JsonBody, PaginationParams};
use crate::services::depots::{CreateDepotRequest, DepotResponse, UpdateDepotRequest};
use crate::{ApiResponse, AppState, PaginatedResponse};

/// Create a new depot
#[utoipa::path(
    post,
    path = "/api/v1/depots",
    request_body = CreateDepotRequest,
    responses(
        (status = 201, description = "Depot created", body = ApiResponse<DepotResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "depots"
)]
pub async fn create_depot(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateDepotRequest>,
) -> Result<(StatusCode, Json<ApiResponse<DepotResponse>>), ServiceError> {
    validate_input(&payload)?;
    let depot = state.services.depots.create_depot(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(depot))))
}

/// Get a depot by id
#[utoipa::path(
    get,
    path = "/api/v1/depots/{id}",
    params(("id" = i32, Path, description = "Depot id")),
    responses(
        (status = 200, description = "Depot found", body = ApiResponse<DepotResponse>),
        (status = 404, description = "Depot not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "depots"
)]
pub async fn get_depot(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<DepotResponse>>, ServiceError> {
    let depot = state
        .services
        .depots
        .get_depot(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Depot {} not found", id)))?;
    Ok(Json(ApiResponse::success(depot)))
}

/// List depots with pagination
#[utoipa::path(
    get,
    path = "/api/v1/depots",
    params(PaginationParams),
    responses(
        (status = 200, description = "Depots retrieved", body = ApiResponse<PaginatedResponse<DepotResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "depots"
)]
pub async fn list_depots(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<DepotResponse>>>, ServiceError> {
    let params = params.normalize(
        state.config.api_default_page_size,
        state.config.api_max_page_size,
    );
    let result = state
        .services
        .depots
        .list_depots(params.page, params.per_page)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        result.depots,
        result.total,
        result.page,
        result.per_page,
    ))))
}

/// Update a depot
#[utoipa::path(
    put,
    path = "/api/v1/depots/{id}",
    params(("id" = i32, Path, description = "Depot id")),
    request_body = UpdateDepotRequest,
    responses(
        (status = 200, description = "Depot updated", body = ApiResponse<DepotResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 404, description = "Depot not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "depots"
)]
pub async fn update_depot(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    JsonBody(payload): JsonBody<UpdateDepotRequest>,
) -> Result<Json<ApiResponse<DepotResponse>>, ServiceError> {
    validate_input(&payload)?;
    let depot = state.services.depots.update_depot(id, payload).await?;
    Ok(Json(ApiResponse::success(depot)))
}

/// Delete a depot
#[utoipa::path(
    delete,
    path = "/api/v1/depots/{id}",
    params(("id" = i32, Path, description = "Depot id")),
    responses(
        (status = 204, description = "Depot deleted"),
        (status = 404, description = "Depot not found", body = ErrorResponse),
        (status = 409, description = "Depot still referenced by stock or movements", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "depots"
)]
pub async fn delete_depot(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    state.services.depots.delete_depot(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn depot_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_depots).post(create_depot))
        .route(
            "/:id",
            get(get_depot).put(update_depot).delete(delete_depot),
        )
}
