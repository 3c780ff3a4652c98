mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{body_json, seed_depot, seed_material, TestApp};

#[tokio::test]
async fn recording_a_movement_returns_the_ledger_row() {
    let app = TestApp::new().await;
    let material = seed_material(&app, "Brake pads", "BRK-001").await;
    let depot = seed_depot(&app, "Depot A").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/movements",
            Some(json!({
                "material_id": material,
                "depot_id": depot,
                "movement_type": "ENTREE",
                "quantity": 50,
                "reference_document": "BL-2024-001"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["movement_type"], json!("ENTREE"));
    assert_eq!(body["data"]["quantity"], json!(50));
    assert_eq!(body["data"]["reference_document"], json!("BL-2024-001"));

    // The stock snapshot reflects the entry
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/stock/{}/{}", material, depot),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["quantity"], json!(50));
}

#[tokio::test]
async fn malformed_movements_never_reach_the_ledger() {
    let app = TestApp::new().await;
    let material = seed_material(&app, "Oil filter", "OIL-010").await;
    let depot = seed_depot(&app, "Depot A").await;
    let other = seed_depot(&app, "Depot B").await;

    // ENTREE with a destination depot is unrepresentable
    let response = app
        .request(
            Method::POST,
            "/api/v1/movements",
            Some(json!({
                "material_id": material,
                "depot_id": depot,
                "movement_type": "ENTREE",
                "quantity": 5,
                "destination_depot_id": other
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], json!("validation_error"));

    // Unknown movement type
    let response = app
        .request(
            Method::POST,
            "/api/v1/movements",
            Some(json!({
                "material_id": material,
                "depot_id": depot,
                "movement_type": "RETOUR",
                "quantity": 5
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Zero quantity
    let response = app
        .request(
            Method::POST,
            "/api/v1/movements",
            Some(json!({
                "material_id": material,
                "depot_id": depot,
                "movement_type": "ENTREE",
                "quantity": 0
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Transfer onto the source depot
    let response = app
        .request(
            Method::POST,
            "/api/v1/movements",
            Some(json!({
                "material_id": material,
                "depot_id": depot,
                "movement_type": "SORTIE",
                "quantity": 5,
                "destination_depot_id": depot
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Nothing was recorded
    let response = app.request(Method::GET, "/api/v1/movements", None).await;
    let body = body_json(response).await;
    assert_eq!(body["data"]["total"], json!(0));
}

#[tokio::test]
async fn drawing_more_than_available_is_unprocessable() {
    let app = TestApp::new().await;
    let material = seed_material(&app, "Coolant", "CLT-001").await;
    let depot = seed_depot(&app, "Depot A").await;

    app.request(
        Method::POST,
        "/api/v1/movements",
        Some(json!({
            "material_id": material,
            "depot_id": depot,
            "movement_type": "ENTREE",
            "quantity": 30
        })),
    )
    .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/movements",
            Some(json!({
                "material_id": material,
                "depot_id": depot,
                "movement_type": "SORTIE",
                "quantity": 60
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["code"], json!("insufficient_stock"));

    // Stock is untouched
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/stock/{}/{}", material, depot),
            None,
        )
        .await;
    let body = body_json(response).await;
    assert_eq!(body["data"]["quantity"], json!(30));
}

#[tokio::test]
async fn cancel_endpoint_reverses_and_removes() {
    let app = TestApp::new().await;
    let material = seed_material(&app, "Tyres", "TYR-205").await;
    let depot_a = seed_depot(&app, "Depot A").await;
    let depot_b = seed_depot(&app, "Depot B").await;

    app.request(
        Method::POST,
        "/api/v1/movements",
        Some(json!({
            "material_id": material,
            "depot_id": depot_a,
            "movement_type": "ENTREE",
            "quantity": 50
        })),
    )
    .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/movements",
            Some(json!({
                "material_id": material,
                "depot_id": depot_a,
                "movement_type": "SORTIE",
                "quantity": 20,
                "destination_depot_id": depot_b
            })),
        )
        .await;
    let body = body_json(response).await;
    let transfer_id = body["data"]["id"].as_i64().expect("movement id");

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/movements/{}/cancel", transfer_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["id"], json!(transfer_id));

    // Both depots restored
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/stock/{}/{}", material, depot_a),
            None,
        )
        .await;
    let body = body_json(response).await;
    assert_eq!(body["data"]["quantity"], json!(50));

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/stock/{}/{}", material, depot_b),
            None,
        )
        .await;
    let body = body_json(response).await;
    assert_eq!(body["data"]["quantity"], json!(0));

    // The row is gone, so cancelling again is a 404
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/movements/{}/cancel", transfer_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["code"], json!("not_found"));
}

#[tokio::test]
async fn metadata_updates_reject_unknown_fields() {
    let app = TestApp::new().await;
    let material = seed_material(&app, "Wiper blades", "WPR-001").await;
    let depot = seed_depot(&app, "Depot A").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/movements",
            Some(json!({
                "material_id": material,
                "depot_id": depot,
                "movement_type": "ENTREE",
                "quantity": 10
            })),
        )
        .await;
    let body = body_json(response).await;
    let movement_id = body["data"]["id"].as_i64().expect("movement id");

    // Smuggling a quantity change through the metadata endpoint fails
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/movements/{}", movement_id),
            Some(json!({ "comment": "recount", "quantity": 999 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // A pure metadata amendment goes through
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/movements/{}", movement_id),
            Some(json!({ "comment": "recount", "actor": "jdupont" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["comment"], json!("recount"));
    assert_eq!(body["data"]["actor"], json!("jdupont"));
    assert_eq!(body["data"]["quantity"], json!(10));
}

#[tokio::test]
async fn raw_delete_returns_no_content_and_keeps_stock() {
    let app = TestApp::new().await;
    let material = seed_material(&app, "Bulbs", "BLB-012").await;
    let depot = seed_depot(&app, "Depot A").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/movements",
            Some(json!({
                "material_id": material,
                "depot_id": depot,
                "movement_type": "ENTREE",
                "quantity": 10
            })),
        )
        .await;
    let body = body_json(response).await;
    let movement_id = body["data"]["id"].as_i64().expect("movement id");

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/movements/{}", movement_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/movements/{}", movement_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/stock/{}/{}", material, depot),
            None,
        )
        .await;
    let body = body_json(response).await;
    assert_eq!(body["data"]["quantity"], json!(10));
}

#[tokio::test]
async fn ruptures_and_reports_read_surfaces() {
    let app = TestApp::new().await;
    let material = seed_material(&app, "Gloves", "GLV-001").await;
    let depot = seed_depot(&app, "Depot A").await;

    app.request(
        Method::POST,
        "/api/v1/movements",
        Some(json!({
            "material_id": material,
            "depot_id": depot,
            "movement_type": "ENTREE",
            "quantity": 8
        })),
    )
    .await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/stock/{}/{}/threshold", material, depot),
            Some(json!({ "minimum_threshold": 10 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // 8 <= 10: the pair is in rupture
    let response = app
        .request(Method::GET, "/api/v1/stock/ruptures", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["total"], json!(1));
    assert_eq!(body["data"]["items"][0]["material_id"], json!(material));
    assert_eq!(body["data"]["items"][0]["is_rupture"], json!(true));

    let response = app
        .request(Method::GET, "/api/v1/reports/movements/summary", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["total_movements"], json!(1));
    assert_eq!(body["data"]["by_type"][0]["movement_type"], json!("ENTREE"));
    assert_eq!(body["data"]["by_type"][0]["total_quantity"], json!(8));

    let response = app
        .request(Method::GET, "/api/v1/reports/movements/recent?days=3", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["total_movements"], json!(1));

    // Zero-day windows are rejected
    let response = app
        .request(Method::GET, "/api/v1/reports/movements/recent?days=0", None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reference_data_crud_over_http() {
    let app = TestApp::new().await;

    let material = seed_material(&app, "Air filter", "AIR-001").await;

    // Duplicate code is a conflict
    let response = app
        .request(
            Method::POST,
            "/api/v1/materials",
            Some(json!({ "name": "Other filter", "code": "AIR-001" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Empty name fails validation
    let response = app
        .request(
            Method::POST,
            "/api/v1/materials",
            Some(json!({ "name": "", "code": "AIR-002" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/materials/{}", material),
            Some(json!({ "category": "filtration" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["category"], json!("filtration"));

    let response = app
        .request(Method::GET, "/api/v1/materials?page=1&per_page=10", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["total"], json!(1));

    // Unreferenced material can be deleted, then vanishes
    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/materials/{}", material),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/materials/{}", material),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_status_endpoints_respond() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["checks"]["database"], json!("healthy"));

    let response = app.request(Method::GET, "/api/v1/status", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["service"], json!("fleetstock-api"));
}
