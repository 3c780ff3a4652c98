use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "FleetStock API",
        description = r#"
# FleetStock Stock Management API

Backend for fleet equipment stock: materials, depots, and a transactional
movement ledger. Every recorded movement adjusts stock and appends a ledger
row inside one transaction; cancelling a movement reverses its exact stock
effect and removes the row the same way.

## Movements

- **ENTREE**: quantity arrives at a depot
- **SORTIE**: quantity leaves a depot
- **Transfer**: a SORTIE carrying a destination depot, moving quantity
  between two depots atomically

## Error Handling

Errors share one response shape with a stable machine-readable `code`:

```json
{
  "error": "Unprocessable Entity",
  "code": "insufficient_stock",
  "message": "Stock for material 12 at depot 3 is 30, cannot remove 60",
  "details": null,
  "timestamp": "2024-01-01T00:00:00Z"
}
```

A `503` with code `transaction_error` is transient and safe to retry.

## Pagination

List endpoints accept `page` (default 1) and `per_page` (default 20).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "materials", description = "Material reference data"),
        (name = "depots", description = "Depot reference data"),
        (name = "stock", description = "Stock snapshots and rupture listing"),
        (name = "movements", description = "Movement ledger: record, cancel, amend"),
        (name = "reports", description = "Read-only reporting over the ledger")
    ),
    paths(
        // Materials
        crate::handlers::materials::create_material,
        crate::handlers::materials::get_material,
        crate::handlers::materials::list_materials,
        crate::handlers::materials::update_material,
        crate::handlers::materials::delete_material,

        // Depots
        crate::handlers::depots::create_depot,
        crate::handlers::depots::get_depot,
        crate::handlers::depots::list_depots,
        crate::handlers::depots::update_depot,
        crate::handlers::depots::delete_depot,

        // Stock
        crate::handlers::stock::list_stock,
        crate::handlers::stock::list_ruptures,
        crate::handlers::stock::get_stock_level,
        crate::handlers::stock::set_threshold,

        // Movements
        crate::handlers::movements::create_movement,
        crate::handlers::movements::get_movement,
        crate::handlers::movements::list_movements,
        crate::handlers::movements::cancel_movement,
        crate::handlers::movements::update_movement_metadata,
        crate::handlers::movements::delete_movement,

        // Reports
        crate::handlers::reports::movement_summary,
        crate::handlers::reports::recent_activity,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,

            // Reference data types
            crate::services::materials::CreateMaterialRequest,
            crate::services::materials::UpdateMaterialRequest,
            crate::services::materials::MaterialResponse,
            crate::services::depots::CreateDepotRequest,
            crate::services::depots::UpdateDepotRequest,
            crate::services::depots::DepotResponse,

            // Stock types
            crate::services::stock::StockLevelResponse,
            crate::handlers::stock::SetThresholdRequest,

            // Movement types
            crate::handlers::movements::CreateMovementRequest,
            crate::services::movements::UpdateMovementMetadata,
            crate::services::movements::MovementResponse,

            // Report types
            crate::services::reports::MovementTypeSummary,
            crate::services::reports::MovementSummaryResponse,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_ledger_paths() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("FleetStock API"));
        assert!(json.contains("/api/v1/movements"));
        assert!(json.contains("/api/v1/stock/ruptures"));
        assert!(json.contains("/api/v1/reports/movements/summary"));
    }
}
