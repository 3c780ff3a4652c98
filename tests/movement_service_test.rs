use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use tempfile::TempDir;
use tokio::sync::mpsc;

use fleetstock_api::{
    config::AppConfig,
    db,
    entities::stock_movement::MovementKind,
    errors::ServiceError,
    events::{process_events, EventSender},
    services::{
        depots::{CreateDepotRequest, DepotService},
        materials::{CreateMaterialRequest, MaterialService},
        movements::{
            CreateMovementInput, MovementFilters, MovementService, UpdateMovementMetadata,
        },
        reports::ReportService,
        stock::StockService,
    },
};

struct Harness {
    materials: MaterialService,
    depots: DepotService,
    stock: StockService,
    movements: MovementService,
    reports: ReportService,
    _db_dir: TempDir,
}

async fn setup() -> Harness {
    let db_dir = tempfile::tempdir().expect("create temp dir for test database");
    let db_path = db_dir.path().join("service_test.db");

    let mut cfg = AppConfig::new(
        format!("sqlite://{}?mode=rwc", db_path.display()),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    cfg.db_max_connections = 1;
    cfg.db_min_connections = 1;

    let pool = db::establish_connection_from_app_config(&cfg)
        .await
        .expect("failed to create test database");
    db::run_migrations(&pool)
        .await
        .expect("failed to run migrations");
    let db_arc = Arc::new(pool);

    let (tx, rx) = mpsc::channel(100);
    let sender = Arc::new(EventSender::new(tx));
    tokio::spawn(process_events(rx));

    Harness {
        materials: MaterialService::new(db_arc.clone(), Some(sender.clone())),
        depots: DepotService::new(db_arc.clone(), Some(sender.clone())),
        stock: StockService::new(db_arc.clone(), Some(sender.clone())),
        movements: MovementService::new(db_arc.clone(), Some(sender)),
        reports: ReportService::new(db_arc),
        _db_dir: db_dir,
    }
}

/// Creates one material and two depots, returning (material, depot_a, depot_b).
async fn seed_refs(h: &Harness) -> (i32, i32, i32) {
    let material = h
        .materials
        .create_material(CreateMaterialRequest {
            name: "Brake pads".to_string(),
            code: "BRK-001".to_string(),
            category: Some("brakes".to_string()),
        })
        .await
        .expect("create material");

    let depot_a = h
        .depots
        .create_depot(CreateDepotRequest {
            name: "Depot A".to_string(),
            address: None,
        })
        .await
        .expect("create depot A");

    let depot_b = h
        .depots
        .create_depot(CreateDepotRequest {
            name: "Depot B".to_string(),
            address: Some("12 Yard Road".to_string()),
        })
        .await
        .expect("create depot B");

    (material.id, depot_a.id, depot_b.id)
}

fn entry(material_id: i32, depot_id: i32, quantity: i64) -> CreateMovementInput {
    CreateMovementInput {
        material_id,
        depot_id,
        kind: MovementKind::Entry { quantity },
        reference_document: None,
        comment: None,
        actor: None,
    }
}

fn exit(material_id: i32, depot_id: i32, quantity: i64) -> CreateMovementInput {
    CreateMovementInput {
        material_id,
        depot_id,
        kind: MovementKind::Exit { quantity },
        reference_document: None,
        comment: None,
        actor: None,
    }
}

fn transfer(
    material_id: i32,
    depot_id: i32,
    destination_depot_id: i32,
    quantity: i64,
) -> CreateMovementInput {
    CreateMovementInput {
        material_id,
        depot_id,
        kind: MovementKind::Transfer {
            quantity,
            destination_depot_id,
        },
        reference_document: None,
        comment: None,
        actor: None,
    }
}

#[tokio::test]
async fn entry_transfer_cancel_round_trip() {
    let h = setup().await;
    let (material, depot_a, depot_b) = seed_refs(&h).await;

    // 50 units arrive at A
    h.movements
        .create(entry(material, depot_a, 50))
        .await
        .expect("record entry");
    let level_a = h.stock.get_level(material, depot_a).await.expect("level A");
    assert_eq!(level_a.quantity, 50);

    // 20 move from A to B
    let moved = h
        .movements
        .create(transfer(material, depot_a, depot_b, 20))
        .await
        .expect("record transfer");
    assert_eq!(moved.movement_type, "SORTIE");
    assert_eq!(moved.destination_depot_id, Some(depot_b));

    let level_a = h.stock.get_level(material, depot_a).await.expect("level A");
    let level_b = h.stock.get_level(material, depot_b).await.expect("level B");
    assert_eq!(level_a.quantity, 30);
    assert_eq!(level_b.quantity, 20);

    // Cancelling the transfer restores both depots and removes the row
    let removed = h.movements.cancel(moved.id).await.expect("cancel transfer");
    assert_eq!(removed.id, moved.id);

    let level_a = h.stock.get_level(material, depot_a).await.expect("level A");
    let level_b = h.stock.get_level(material, depot_b).await.expect("level B");
    assert_eq!(level_a.quantity, 50);
    assert_eq!(level_b.quantity, 0);
    assert!(h
        .movements
        .get(moved.id)
        .await
        .expect("lookup cancelled movement")
        .is_none());

    // Drawing more than the depot holds is rejected and changes nothing
    let err = h
        .movements
        .create(exit(material, depot_a, 60))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));
    let level_a = h.stock.get_level(material, depot_a).await.expect("level A");
    assert_eq!(level_a.quantity, 50);
}

#[tokio::test]
async fn reading_an_untouched_pair_never_creates_a_row() {
    let h = setup().await;
    let (material, depot_a, _depot_b) = seed_refs(&h).await;

    let level = h.stock.get_level(material, depot_a).await.expect("level");
    assert_eq!(level.quantity, 0);
    assert_eq!(level.minimum_threshold, 0);
    assert_eq!(level.version, 0);
    assert!(level.updated_at.is_none());

    let listed = h
        .stock
        .list_levels(None, None, 1, 20)
        .await
        .expect("list levels");
    assert_eq!(listed.total, 0, "a read must not materialize a stock row");
}

#[tokio::test]
async fn movements_for_unknown_references_are_rejected_before_any_write() {
    let h = setup().await;
    let (material, depot_a, depot_b) = seed_refs(&h).await;

    let err = h
        .movements
        .create(entry(material + 999, depot_a, 5))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    let err = h
        .movements
        .create(exit(material, depot_a + 999, 5))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    let err = h
        .movements
        .create(transfer(material, depot_a, depot_b + 999, 5))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    // Transfer onto itself never makes sense
    let err = h
        .movements
        .create(transfer(material, depot_a, depot_a, 5))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    let listed = h
        .movements
        .list(MovementFilters::default(), 1, 20)
        .await
        .expect("list movements");
    assert_eq!(listed.total, 0);
}

#[tokio::test]
async fn failed_transfer_rolls_back_everything() {
    let h = setup().await;
    let (material, depot_a, depot_b) = seed_refs(&h).await;

    h.movements
        .create(entry(material, depot_a, 10))
        .await
        .expect("seed stock");

    let err = h
        .movements
        .create(transfer(material, depot_a, depot_b, 25))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    // Source untouched, destination never materialized, ledger has only the seed
    let level_a = h.stock.get_level(material, depot_a).await.expect("level A");
    assert_eq!(level_a.quantity, 10);
    let listed = h
        .stock
        .list_levels(None, None, 1, 20)
        .await
        .expect("list levels");
    assert_eq!(listed.total, 1);
    let ledger = h
        .movements
        .list(MovementFilters::default(), 1, 20)
        .await
        .expect("list movements");
    assert_eq!(ledger.total, 1);
}

#[tokio::test]
async fn cancelling_an_older_movement_fails_when_stock_is_already_consumed() {
    let h = setup().await;
    let (material, depot_a, _depot_b) = seed_refs(&h).await;

    let first = h
        .movements
        .create(entry(material, depot_a, 50))
        .await
        .expect("first entry");
    h.movements
        .create(exit(material, depot_a, 45))
        .await
        .expect("draw down");

    // Reversing the 50-unit entry would leave the depot at -45
    let err = h.movements.cancel(first.id).await.unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    // Nothing changed: both rows still on the ledger, stock still 5
    assert!(h
        .movements
        .get(first.id)
        .await
        .expect("lookup first entry")
        .is_some());
    let level = h.stock.get_level(material, depot_a).await.expect("level");
    assert_eq!(level.quantity, 5);
}

#[tokio::test]
async fn cancelling_twice_reports_not_found() {
    let h = setup().await;
    let (material, depot_a, _depot_b) = seed_refs(&h).await;

    let movement = h
        .movements
        .create(entry(material, depot_a, 10))
        .await
        .expect("entry");
    h.movements.cancel(movement.id).await.expect("first cancel");

    let err = h.movements.cancel(movement.id).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn metadata_update_amends_notes_and_leaves_stock_alone() {
    let h = setup().await;
    let (material, depot_a, _depot_b) = seed_refs(&h).await;

    let movement = h
        .movements
        .create(CreateMovementInput {
            reference_document: Some("BL-123".to_string()),
            ..entry(material, depot_a, 40)
        })
        .await
        .expect("entry");

    let updated = h
        .movements
        .update_metadata(
            movement.id,
            UpdateMovementMetadata {
                comment: Some("counted during night shift".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("update metadata");

    assert_eq!(updated.comment.as_deref(), Some("counted during night shift"));
    assert_eq!(updated.reference_document.as_deref(), Some("BL-123"));
    assert_eq!(updated.quantity, 40, "metadata update must not touch quantity");

    let level = h.stock.get_level(material, depot_a).await.expect("level");
    assert_eq!(level.quantity, 40);
}

#[tokio::test]
async fn raw_delete_leaves_stock_untouched() {
    let h = setup().await;
    let (material, depot_a, _depot_b) = seed_refs(&h).await;

    let movement = h
        .movements
        .create(entry(material, depot_a, 15))
        .await
        .expect("entry");

    h.movements
        .delete_without_reversal(movement.id)
        .await
        .expect("raw delete");

    assert!(h
        .movements
        .get(movement.id)
        .await
        .expect("lookup deleted movement")
        .is_none());
    let level = h.stock.get_level(material, depot_a).await.expect("level");
    assert_eq!(level.quantity, 15, "raw delete must not reverse stock");
}

#[tokio::test]
async fn thresholds_drive_the_rupture_listing() {
    let h = setup().await;
    let (material, depot_a, depot_b) = seed_refs(&h).await;

    h.movements
        .create(entry(material, depot_a, 30))
        .await
        .expect("entry A");
    h.movements
        .create(entry(material, depot_b, 30))
        .await
        .expect("entry B");

    h.stock
        .set_threshold(material, depot_a, 25)
        .await
        .expect("set threshold A");

    // 30 > 25: healthy
    let ruptures = h.stock.list_ruptures(1, 20).await.expect("ruptures");
    assert_eq!(ruptures.total, 0);

    // Draw down to exactly the threshold: quantity <= threshold is a rupture
    h.movements
        .create(exit(material, depot_a, 5))
        .await
        .expect("draw down");
    let ruptures = h.stock.list_ruptures(1, 20).await.expect("ruptures");
    assert_eq!(ruptures.total, 1);
    assert_eq!(ruptures.levels[0].depot_id, depot_a);
    assert!(ruptures.levels[0].is_rupture);

    // Raising stock above the threshold clears the rupture
    h.movements
        .create(entry(material, depot_a, 1))
        .await
        .expect("top up");
    let ruptures = h.stock.list_ruptures(1, 20).await.expect("ruptures");
    assert_eq!(ruptures.total, 0);
}

#[tokio::test]
async fn setting_a_threshold_does_not_invent_stock() {
    let h = setup().await;
    let (material, depot_a, _depot_b) = seed_refs(&h).await;

    let level = h
        .stock
        .set_threshold(material, depot_a, 12)
        .await
        .expect("set threshold");
    assert_eq!(level.quantity, 0);
    assert_eq!(level.minimum_threshold, 12);

    let err = h.stock.set_threshold(material, depot_a, -1).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn ledger_queries_filter_by_type_window_and_pair() {
    let h = setup().await;
    let (material, depot_a, depot_b) = seed_refs(&h).await;

    h.movements
        .create(entry(material, depot_a, 100))
        .await
        .expect("entry");
    h.movements
        .create(exit(material, depot_a, 10))
        .await
        .expect("exit");
    let last = h
        .movements
        .create(transfer(material, depot_a, depot_b, 20))
        .await
        .expect("transfer");

    // Newest first
    let all = h
        .movements
        .list(MovementFilters::default(), 1, 20)
        .await
        .expect("list all");
    assert_eq!(all.total, 3);
    assert_eq!(all.movements[0].id, last.id);

    // Transfers are SORTIE rows, so the type filter sees two of them
    let sorties = h
        .movements
        .list(
            MovementFilters {
                movement_type: fleetstock_api::entities::stock_movement::MovementType::from_str(
                    "SORTIE",
                ),
                ..Default::default()
            },
            1,
            20,
        )
        .await
        .expect("list sorties");
    assert_eq!(sorties.total, 2);

    // A window entirely in the future matches nothing
    let tomorrow = Utc::now() + Duration::days(1);
    let future = h
        .movements
        .list(
            MovementFilters {
                since: Some(tomorrow),
                ..Default::default()
            },
            1,
            20,
        )
        .await
        .expect("list future");
    assert_eq!(future.total, 0);

    // Depot filter sees only movements whose source is depot B
    let depot_b_moves = h
        .movements
        .list(
            MovementFilters {
                depot_id: Some(depot_b),
                ..Default::default()
            },
            1,
            20,
        )
        .await
        .expect("list depot B");
    assert_eq!(depot_b_moves.total, 0, "transfers are recorded on the source depot");
}

#[tokio::test]
async fn summary_counts_and_sums_by_type() {
    let h = setup().await;
    let (material, depot_a, depot_b) = seed_refs(&h).await;

    h.movements
        .create(entry(material, depot_a, 100))
        .await
        .expect("entry");
    h.movements
        .create(entry(material, depot_b, 50))
        .await
        .expect("entry");
    h.movements
        .create(exit(material, depot_a, 30))
        .await
        .expect("exit");

    let summary = h
        .reports
        .movement_summary(None, None)
        .await
        .expect("summary");
    assert_eq!(summary.total_movements, 3);

    let entree = summary
        .by_type
        .iter()
        .find(|row| row.movement_type == "ENTREE")
        .expect("entree row");
    assert_eq!(entree.movement_count, 2);
    assert_eq!(entree.total_quantity, 150);

    let sortie = summary
        .by_type
        .iter()
        .find(|row| row.movement_type == "SORTIE")
        .expect("sortie row");
    assert_eq!(sortie.movement_count, 1);
    assert_eq!(sortie.total_quantity, 30);

    // Recent activity over a day covers everything just written
    let recent = h.reports.recent_activity(1).await.expect("recent");
    assert_eq!(recent.total_movements, 3);
    assert!(recent.since.is_some());

    // A window that ended yesterday sees nothing
    let yesterday = Utc::now() - Duration::days(1);
    let stale = h
        .reports
        .movement_summary(None, Some(yesterday))
        .await
        .expect("stale summary");
    assert_eq!(stale.total_movements, 0);
    assert!(stale.by_type.is_empty());
}

#[tokio::test]
async fn deleting_referenced_reference_data_is_a_conflict() {
    let h = setup().await;
    let (material, depot_a, depot_b) = seed_refs(&h).await;

    h.movements
        .create(entry(material, depot_a, 5))
        .await
        .expect("entry");

    let err = h.materials.delete_material(material).await.unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
    let err = h.depots.delete_depot(depot_a).await.unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    // Depot B is untouched and can go
    h.depots.delete_depot(depot_b).await.expect("delete depot B");
}
