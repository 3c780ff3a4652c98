use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::errors::{ErrorResponse, ServiceError};
use crate::handlers::common::{validate_input, JsonBody, PaginationParams};
use crate::services::materials::{CreateMaterialRequest, MaterialResponse, UpdateMaterialRequest};
use crate::{ApiResponse, AppState, PaginatedResponse};

/// Create a new material
#[utoipa::path(
    post,
    path = "/api/v1/materials",
    request_body = CreateMaterialRequest,
    responses(
        (status = 201, description = "Material created", body = ApiResponse<MaterialResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 409, description = "Material code already in use", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "materials"
)]
pub async fn create_material(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateMaterialRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MaterialResponse>>), ServiceError> {
    validate_input(&payload)?;
    let material = state.services.materials.create_material(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(material))))
}

/// Get a material by id
#[utoipa::path(
    get,
    path = "/api/v1/materials/{id}",
    params(("id" = i32, Path, description = "Material id")),
    responses(
        (status = 200, description = "Material found", body = ApiResponse<MaterialResponse>),
        (status = 404, description = "Material not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "materials"
)]
pub async fn get_material(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MaterialResponse>>, ServiceError> {
    let material = state
        .services
        .materials
        .get_material(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Material {} not found", id)))?;
    Ok(Json(ApiResponse::success(material)))
}

/// List materials with pagination
#[utoipa::path(
    get,
    path = "/api/v1/materials",
    params(PaginationParams),
    responses(
        (status = 200, description = "Materials retrieved", body = ApiResponse<PaginatedResponse<MaterialResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "materials"
)]
pub async fn list_materials(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<MaterialResponse>>>, ServiceError> {
    let params = params.normalize(
        state.config.api_default_page_size,
        state.config.api_max_page_size,
    );
    let result = state
        .services
        .materials
        .list_materials(params.page, params.per_page)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        result.materials,
        result.total,
        result.page,
        result.per_page,
    ))))
}

/// Update a material
#[utoipa::path(
    put,
    path = "/api/v1/materials/{id}",
    params(("id" = i32, Path, description = "Material id")),
    request_body = UpdateMaterialRequest,
    responses(
        (status = 200, description = "Material updated", body = ApiResponse<MaterialResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 404, description = "Material not found", body = ErrorResponse),
        (status = 409, description = "Material code already in use", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "materials"
)]
pub async fn update_material(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    JsonBody(payload): JsonBody<UpdateMaterialRequest>,
) -> Result<Json<ApiResponse<MaterialResponse>>, ServiceError> {
    validate_input(&payload)?;
    let material = state.services.materials.update_material(id, payload).await?;
    Ok(Json(ApiResponse::success(material)))
}

/// Delete a material
#[utoipa::path(
    delete,
    path = "/api/v1/materials/{id}",
    params(("id" = i32, Path, description = "Material id")),
    responses(
        (status = 204, description = "Material deleted"),
        (status = 404, description = "Material not found", body = ErrorResponse),
        (status = 409, description = "Material still referenced by stock or movements", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "materials"
)]
pub async fn delete_material(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    state.services.materials.delete_material(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn material_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_materials).post(create_material))
        .route(
            "/:id",
            get(get_material).put(update_material).delete(delete_material),
        )
}
