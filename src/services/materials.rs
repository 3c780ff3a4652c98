use crate::{
    db::DbPool,
    entities::{
        material::{self, Entity as Material},
        stock_level::{self, Entity as StockLevel},
        stock_movement::{self, Entity as StockMovement},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Request/Response types for the material reference service
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateMaterialRequest {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 64, message = "Code is required"))]
    pub code: String,
    pub category: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateMaterialRequest {
    #[validate(length(min = 1, max = 255, message = "Name must not be empty"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 64, message = "Code must not be empty"))]
    pub code: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MaterialResponse {
    pub id: i32,
    pub name: String,
    pub code: String,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MaterialListResponse {
    pub materials: Vec<MaterialResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Returns whether a material id exists in the reference table.
///
/// Movement validation calls this before opening a transaction; material ids
/// on movements are foreign keys by convention, not by DB constraint, so the
/// existence check lives here.
pub(crate) async fn material_exists<C: ConnectionTrait>(
    db: &C,
    material_id: i32,
) -> Result<bool, ServiceError> {
    let count = Material::find_by_id(material_id)
        .count(db)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(count > 0)
}

/// Service managing the material reference table
#[derive(Clone)]
pub struct MaterialService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl MaterialService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a new material
    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn create_material(
        &self,
        request: CreateMaterialRequest,
    ) -> Result<MaterialResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;

        let duplicates = Material::find()
            .filter(material::Column::Code.eq(&request.code))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        if duplicates > 0 {
            return Err(ServiceError::Conflict(format!(
                "Material code {} is already in use",
                request.code
            )));
        }

        let active_model = material::ActiveModel {
            name: Set(request.name),
            code: Set(request.code),
            category: Set(request.category),
            ..Default::default()
        };

        let model = active_model.insert(db).await.map_err(|e| {
            error!(error = %e, "Failed to create material");
            ServiceError::db_error(e)
        })?;

        info!(material_id = model.id, code = %model.code, "Material created");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::MaterialCreated(model.id)).await {
                warn!(error = %e, material_id = model.id, "Failed to send material created event");
            }
        }

        Ok(self.model_to_response(model))
    }

    /// Retrieves a material by id
    #[instrument(skip(self), fields(material_id = material_id))]
    pub async fn get_material(
        &self,
        material_id: i32,
    ) -> Result<Option<MaterialResponse>, ServiceError> {
        let db = &*self.db_pool;

        let material = Material::find_by_id(material_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(material.map(|model| self.model_to_response(model)))
    }

    /// Lists materials with pagination, ordered by code
    #[instrument(skip(self))]
    pub async fn list_materials(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<MaterialListResponse, ServiceError> {
        let db = &*self.db_pool;

        let paginator = Material::find()
            .order_by_asc(material::Column::Code)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count materials");
            ServiceError::db_error(e)
        })?;

        let materials = paginator.fetch_page(page.saturating_sub(1)).await.map_err(|e| {
            error!(error = %e, page = page, per_page = per_page, "Failed to fetch materials page");
            ServiceError::db_error(e)
        })?;

        Ok(MaterialListResponse {
            materials: materials
                .into_iter()
                .map(|model| self.model_to_response(model))
                .collect(),
            total,
            page,
            per_page,
        })
    }

    /// Updates a material's name, code, or category. Absent fields stay
    /// unchanged.
    #[instrument(skip(self, request), fields(material_id = material_id))]
    pub async fn update_material(
        &self,
        material_id: i32,
        request: UpdateMaterialRequest,
    ) -> Result<MaterialResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;

        let existing = Material::find_by_id(material_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Material {} not found", material_id))
            })?;

        if let Some(code) = &request.code {
            if code != &existing.code {
                let duplicates = Material::find()
                    .filter(material::Column::Code.eq(code))
                    .filter(material::Column::Id.ne(material_id))
                    .count(db)
                    .await
                    .map_err(ServiceError::db_error)?;
                if duplicates > 0 {
                    return Err(ServiceError::Conflict(format!(
                        "Material code {} is already in use",
                        code
                    )));
                }
            }
        }

        let mut active_model: material::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active_model.name = Set(name);
        }
        if let Some(code) = request.code {
            active_model.code = Set(code);
        }
        if let Some(category) = request.category {
            active_model.category = Set(Some(category));
        }

        let model = active_model.update(db).await.map_err(|e| {
            error!(error = %e, material_id = material_id, "Failed to update material");
            ServiceError::db_error(e)
        })?;

        info!(material_id = model.id, "Material updated");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::MaterialUpdated(model.id)).await {
                warn!(error = %e, material_id = model.id, "Failed to send material updated event");
            }
        }

        Ok(self.model_to_response(model))
    }

    /// Deletes a material that is not referenced by any stock entry or
    /// movement. References block deletion with a conflict since removing the
    /// material would orphan ledger history.
    #[instrument(skip(self), fields(material_id = material_id))]
    pub async fn delete_material(&self, material_id: i32) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let exists = material_exists(db, material_id).await?;
        if !exists {
            return Err(ServiceError::NotFound(format!(
                "Material {} not found",
                material_id
            )));
        }

        let stock_refs = StockLevel::find()
            .filter(stock_level::Column::MaterialId.eq(material_id))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        if stock_refs > 0 {
            return Err(ServiceError::Conflict(format!(
                "Material {} still has stock entries",
                material_id
            )));
        }

        let movement_refs = StockMovement::find()
            .filter(stock_movement::Column::MaterialId.eq(material_id))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        if movement_refs > 0 {
            return Err(ServiceError::Conflict(format!(
                "Material {} is referenced by movement history",
                material_id
            )));
        }

        let result = Material::delete_by_id(material_id)
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Material {} not found",
                material_id
            )));
        }

        info!(material_id = material_id, "Material deleted");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::MaterialDeleted(material_id)).await {
                warn!(error = %e, material_id = material_id, "Failed to send material deleted event");
            }
        }

        Ok(())
    }

    fn model_to_response(&self, model: material::Model) -> MaterialResponse {
        MaterialResponse {
            id: model.id,
            name: model.name,
            code: model.code,
            category: model.category,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
