mod common;

use archen_api::entities::product_stock;
use archen_api::entities::production_job::JobStatus;
use archen_api::flow::Section;
use rust_decimal_macros::dec;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel};

use common::*;

/// Drives a realistic ledger: part production feeding a product job.
/// Returns (product, panel, foam, job_id).
async fn seed_ledger(app: &TestApp) -> (uuid::Uuid, uuid::Uuid, uuid::Uuid, uuid::Uuid) {
    let model = create_test_model(&app.db, "L90").await;
    let product = create_test_product(&app.db, &model, "armchair").await;
    let panel = create_test_part(&app.db, &model, "side panel", 0, 0).await;
    let foam = create_test_material(&app.db, "foam", dec!(50), "kg").await;
    add_bom_component(&app.db, &product, &panel, 2).await;
    add_bom_material(&app.db, &product, &foam, dec!(2.5)).await;

    // Part stock is built through the ledger so a rebuild can reproduce it.
    app.jobs
        .submit_movement(part_movement(panel.id, Section::Cutting, 20, 0))
        .await
        .expect("cutting movement should succeed");
    app.jobs
        .submit_movement(part_movement(panel.id, Section::CncTools, 10, 0))
        .await
        .expect("cnc movement should succeed");

    let job = app
        .jobs
        .create_job(job_payload("J-100", product.id, &["assembly", "painting"]))
        .await
        .expect("job creation should succeed");
    app.jobs
        .submit_movement(job_movement("J-100", Section::Assembly))
        .await
        .expect("assembly movement should succeed");
    app.jobs
        .submit_movement(job_movement("J-100", Section::Painting))
        .await
        .expect("painting movement should succeed");

    (product.id, panel.id, foam.id, job.id)
}

#[tokio::test]
async fn migrations_apply_on_sqlite() {
    let app = spawn_app().await;
    archen_api::db::check_connection(app.db.as_ref())
        .await
        .expect("schema should be usable after migrations");

    // materials carries the widest decimal columns in the schema; prove a
    // high-precision quantity survives a round trip.
    let glue = create_test_material(&app.db, "glue", dec!(123456789012.1234), "kg").await;
    assert_eq!(
        material_by_id(&app.db, glue.id).await.quantity,
        dec!(123456789012.1234)
    );
}

#[tokio::test]
async fn rebuild_restores_counters_from_the_ledger() {
    let app = spawn_app().await;
    let (product_id, panel_id, foam_id, job_id) = seed_ledger(&app).await;

    // Expected state after the four movements.
    let panel = part_by_id(&app.db, panel_id).await;
    assert_eq!(panel.stock_cut, 10);
    assert_eq!(panel.stock_cnc_tools, 8);
    assert_eq!(material_by_id(&app.db, foam_id).await.quantity, dec!(47.5));
    assert_eq!(product_bucket(&app.db, product_id, Section::Painting).await, 1);

    // Tamper with the counters out-of-band.
    let mut am = panel.into_active_model();
    am.stock_cut = Set(999);
    am.update(app.db.as_ref()).await.expect("tamper part stock");
    let stock = product_stock::Entity::find()
        .one(app.db.as_ref())
        .await
        .expect("query stock row")
        .expect("stock row exists");
    let mut am = stock.into_active_model();
    am.set_bucket(Section::Painting, 42);
    am.update(app.db.as_ref()).await.expect("tamper product bucket");

    let replayed = app
        .maintenance
        .rebuild_stocks()
        .await
        .expect("rebuild should succeed");
    assert_eq!(replayed, 4);

    let panel = part_by_id(&app.db, panel_id).await;
    assert_eq!(panel.stock_cut, 10);
    assert_eq!(panel.stock_cnc_tools, 8);
    assert_eq!(product_bucket(&app.db, product_id, Section::Assembly).await, 0);
    assert_eq!(product_bucket(&app.db, product_id, Section::Painting).await, 1);
    // Material quantities are not log-sourced; the rebuild leaves them alone.
    assert_eq!(material_by_id(&app.db, foam_id).await.quantity, dec!(47.5));

    let job = job_by_id(&app.db, job_id).await;
    assert_eq!(job.current_section.as_deref(), Some("painting"));
    assert_eq!(job.status(), JobStatus::Completed);

    // A second rebuild over the same ledger lands on the same counters.
    app.maintenance
        .rebuild_stocks()
        .await
        .expect("second rebuild should succeed");
    let panel = part_by_id(&app.db, panel_id).await;
    assert_eq!(panel.stock_cut, 10);
    assert_eq!(panel.stock_cnc_tools, 8);
    assert_eq!(product_bucket(&app.db, product_id, Section::Painting).await, 1);
    assert_eq!(material_by_id(&app.db, foam_id).await.quantity, dec!(47.5));
}

#[tokio::test]
async fn purge_logs_keeps_counters() {
    let app = spawn_app().await;
    let (product_id, panel_id, foam_id, _job_id) = seed_ledger(&app).await;
    assert_eq!(count_logs(&app.db).await, 4);

    let removed = app.maintenance.purge_logs().await.expect("purge should succeed");
    assert_eq!(removed, 4);
    assert_eq!(count_logs(&app.db).await, 0);

    // Counters survive a plain purge.
    let panel = part_by_id(&app.db, panel_id).await;
    assert_eq!(panel.stock_cut, 10);
    assert_eq!(panel.stock_cnc_tools, 8);
    assert_eq!(material_by_id(&app.db, foam_id).await.quantity, dec!(47.5));
    assert_eq!(product_bucket(&app.db, product_id, Section::Painting).await, 1);
}

#[tokio::test]
async fn purge_logs_and_zero_resets_everything() {
    let app = spawn_app().await;
    let (product_id, panel_id, foam_id, _job_id) = seed_ledger(&app).await;

    let removed = app
        .maintenance
        .purge_logs_and_zero()
        .await
        .expect("purge-and-zero should succeed");
    assert_eq!(removed, 4);
    assert_eq!(count_logs(&app.db).await, 0);

    let panel = part_by_id(&app.db, panel_id).await;
    assert_eq!(panel.stock_cut, 0);
    assert_eq!(panel.stock_cnc_tools, 0);
    assert_eq!(material_by_id(&app.db, foam_id).await.quantity, dec!(0));
    assert_eq!(product_bucket(&app.db, product_id, Section::Painting).await, 0);
    assert_eq!(product_bucket(&app.db, product_id, Section::Assembly).await, 0);
}
