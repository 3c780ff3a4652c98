use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::entities::stock_movement::{MovementKind, MovementType};
use crate::errors::{ErrorResponse, ServiceError};
use crate::handlers::common::{validate_input, JsonBody, PaginationParams};
use crate::services::movements::{
    CreateMovementInput, MovementFilters, MovementResponse, UpdateMovementMetadata,
};
use crate::{ApiResponse, AppState, PaginatedResponse};

/// Wire shape for recording a movement. A transfer is an outbound movement
/// that names a destination depot.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateMovementRequest {
    pub material_id: i32,
    pub depot_id: i32,
    /// "ENTREE" or "SORTIE"
    #[schema(example = "SORTIE")]
    pub movement_type: String,
    #[validate(range(min = 1, message = "Quantity must be a positive integer"))]
    pub quantity: i64,
    /// Destination depot that turns an outbound movement into a transfer
    pub destination_depot_id: Option<i32>,
    #[validate(length(max = 255))]
    pub reference_document: Option<String>,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
    #[validate(length(max = 255))]
    pub actor: Option<String>,
}

impl CreateMovementRequest {
    /// Parses the raw wire fields into a typed movement kind. An ENTREE
    /// carrying a destination depot has no kind and is rejected here, before
    /// anything touches the database.
    fn kind(&self) -> Result<MovementKind, ServiceError> {
        if MovementType::from_str(&self.movement_type).is_none() {
            return Err(ServiceError::ValidationError(format!(
                "Unknown movement type '{}', expected ENTREE or SORTIE",
                self.movement_type
            )));
        }
        MovementKind::from_parts(&self.movement_type, self.quantity, self.destination_depot_id)
            .ok_or_else(|| {
                ServiceError::ValidationError(
                    "An ENTREE cannot carry a destination depot".to_string(),
                )
            })
    }
}

/// Ledger listing filters, combined with AND when several are present.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct MovementQuery {
    /// Only movements of this material
    pub material_id: Option<i32>,
    /// Only movements touching this source depot
    pub depot_id: Option<i32>,
    /// "ENTREE" or "SORTIE"
    pub movement_type: Option<String>,
    /// Only movements created at or after this instant (RFC 3339)
    pub since: Option<DateTime<Utc>>,
    /// Only movements created at or before this instant (RFC 3339)
    pub until: Option<DateTime<Utc>>,
}

impl MovementQuery {
    fn into_filters(self) -> Result<MovementFilters, ServiceError> {
        let movement_type = match self.movement_type.as_deref() {
            Some(raw) => Some(MovementType::from_str(raw).ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Unknown movement type '{}', expected ENTREE or SORTIE",
                    raw
                ))
            })?),
            None => None,
        };
        Ok(MovementFilters {
            material_id: self.material_id,
            depot_id: self.depot_id,
            movement_type,
            since: self.since,
            until: self.until,
        })
    }
}

/// Record a stock movement
#[utoipa::path(
    post,
    path = "/api/v1/movements",
    request_body = CreateMovementRequest,
    responses(
        (status = 201, description = "Movement recorded and stock adjusted", body = ApiResponse<MovementResponse>),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 404, description = "Material or depot not found", body = ErrorResponse),
        (status = 409, description = "Transfer destination equals the source depot", body = ErrorResponse),
        (status = 422, description = "Insufficient stock for an outbound movement", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
        (status = 503, description = "Transaction could not complete, safe to retry", body = ErrorResponse),
    ),
    tag = "movements"
)]
pub async fn create_movement(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateMovementRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MovementResponse>>), ServiceError> {
    validate_input(&payload)?;
    let kind = payload.kind()?;
    let input = CreateMovementInput {
        material_id: payload.material_id,
        depot_id: payload.depot_id,
        kind,
        reference_document: payload.reference_document,
        comment: payload.comment,
        actor: payload.actor,
    };
    let movement = state.services.movements.create(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(movement))))
}

/// Get a movement by id
#[utoipa::path(
    get,
    path = "/api/v1/movements/{id}",
    params(("id" = i64, Path, description = "Movement id")),
    responses(
        (status = 200, description = "Movement found", body = ApiResponse<MovementResponse>),
        (status = 404, description = "Movement not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "movements"
)]
pub async fn get_movement(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<MovementResponse>>, ServiceError> {
    let movement = state
        .services
        .movements
        .get(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Movement {} not found", id)))?;
    Ok(Json(ApiResponse::success(movement)))
}

/// List movements with filters and pagination
#[utoipa::path(
    get,
    path = "/api/v1/movements",
    params(MovementQuery, PaginationParams),
    responses(
        (status = 200, description = "Movements retrieved", body = ApiResponse<PaginatedResponse<MovementResponse>>),
        (status = 400, description = "Invalid filter parameters", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "movements"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    Query(query): Query<MovementQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<MovementResponse>>>, ServiceError> {
    let filters = query.into_filters()?;
    let params = params.normalize(
        state.config.api_default_page_size,
        state.config.api_max_page_size,
    );
    let result = state
        .services
        .movements
        .list(filters, params.page, params.per_page)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        result.movements,
        result.total,
        result.page,
        result.per_page,
    ))))
}

/// Cancel a movement
///
/// Reverses the movement's stock effect exactly and removes the ledger row,
/// all within one transaction. The response carries the removed movement.
#[utoipa::path(
    post,
    path = "/api/v1/movements/{id}/cancel",
    params(("id" = i64, Path, description = "Movement id")),
    responses(
        (status = 200, description = "Movement reversed and removed", body = ApiResponse<MovementResponse>),
        (status = 404, description = "Movement not found", body = ErrorResponse),
        (status = 422, description = "Reversal would drive stock negative", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
        (status = 503, description = "Transaction could not complete, safe to retry", body = ErrorResponse),
    ),
    tag = "movements"
)]
pub async fn cancel_movement(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<MovementResponse>>, ServiceError> {
    let movement = state.services.movements.cancel(id).await?;
    Ok(Json(ApiResponse::success(movement)))
}

/// Update a movement's metadata
///
/// Only the reference document, comment, and actor can change after a
/// movement is recorded. Any other field in the payload is rejected.
#[utoipa::path(
    put,
    path = "/api/v1/movements/{id}",
    params(("id" = i64, Path, description = "Movement id")),
    request_body = UpdateMovementMetadata,
    responses(
        (status = 200, description = "Metadata updated, stock untouched", body = ApiResponse<MovementResponse>),
        (status = 400, description = "Payload contains non-metadata fields", body = ErrorResponse),
        (status = 404, description = "Movement not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "movements"
)]
pub async fn update_movement_metadata(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonBody(payload): JsonBody<UpdateMovementMetadata>,
) -> Result<Json<ApiResponse<MovementResponse>>, ServiceError> {
    let movement = state.services.movements.update_metadata(id, payload).await?;
    Ok(Json(ApiResponse::success(movement)))
}

/// Delete a movement row without reversing its stock effect
///
/// Administrative escape hatch: the ledger and the stock table will disagree
/// for this material and depot afterwards. Cancel is the operation that keeps
/// them consistent.
#[utoipa::path(
    delete,
    path = "/api/v1/movements/{id}",
    params(("id" = i64, Path, description = "Movement id")),
    responses(
        (status = 204, description = "Movement row deleted, stock left as-is"),
        (status = 404, description = "Movement not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "movements"
)]
pub async fn delete_movement(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ServiceError> {
    state.services.movements.delete_without_reversal(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn movement_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_movements).post(create_movement))
        .route(
            "/:id",
            get(get_movement)
                .put(update_movement_metadata)
                .delete(delete_movement),
        )
        .route("/:id/cancel", post(cancel_movement))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> CreateMovementRequest {
        CreateMovementRequest {
            material_id: 1,
            depot_id: 1,
            movement_type: "ENTREE".to_string(),
            quantity: 10,
            destination_depot_id: None,
            reference_document: None,
            comment: None,
            actor: None,
        }
    }

    #[test]
    fn entree_with_destination_is_rejected_at_the_boundary() {
        let request = CreateMovementRequest {
            destination_depot_id: Some(2),
            ..base_request()
        };
        let err = request.kind().unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[test]
    fn unknown_movement_type_is_rejected() {
        let request = CreateMovementRequest {
            movement_type: "RETOUR".to_string(),
            ..base_request()
        };
        let err = request.kind().unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[test]
    fn sortie_with_destination_parses_as_transfer() {
        let request = CreateMovementRequest {
            movement_type: "SORTIE".to_string(),
            destination_depot_id: Some(4),
            ..base_request()
        };
        assert_eq!(
            request.kind().ok(),
            Some(MovementKind::Transfer {
                quantity: 10,
                destination_depot_id: 4
            })
        );
    }

    #[test]
    fn unknown_filter_type_is_rejected() {
        let query = MovementQuery {
            movement_type: Some("retour".to_string()),
            ..MovementQuery::default()
        };
        assert!(query.into_filters().is_err());
    }
}
