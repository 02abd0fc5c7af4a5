mod common;

use archen_api::entities::product_stock;
use archen_api::entities::production_job::{JobLabel, JobStatus};
use archen_api::errors::ServiceError;
use archen_api::flow::Section;
use rust_decimal_macros::dec;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel};

use common::*;

#[tokio::test]
async fn deleting_a_job_reverts_every_inventory_effect() {
    let app = spawn_app().await;
    let model = create_test_model(&app.db, "L90").await;
    let product = create_test_product(&app.db, &model, "armchair").await;
    let panel = create_test_part(&app.db, &model, "side panel", 0, 10).await;
    let foam = create_test_material(&app.db, "foam", dec!(50), "kg").await;
    add_bom_component(&app.db, &product, &panel, 2).await;
    add_bom_material(&app.db, &product, &foam, dec!(2.5)).await;

    let job = app
        .jobs
        .create_job(job_payload(
            "J-100",
            product.id,
            &["assembly", "painting", "packaging"],
        ))
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

    let (logs_deleted, jobs_deleted) = app
        .jobs
        .delete_job_completely(job.id)
        .await
        .expect("deletion should succeed");
    assert_eq!(logs_deleted, 2);
    assert_eq!(jobs_deleted, 1);

    // Back to the pre-job state: BOM restored, buckets empty, rows gone.
    assert_eq!(part_by_id(&app.db, panel.id).await.stock_cnc_tools, 10);
    assert_eq!(material_by_id(&app.db, foam.id).await.quantity, dec!(50));
    assert_eq!(product_bucket(&app.db, product.id, Section::Assembly).await, 0);
    assert_eq!(product_bucket(&app.db, product.id, Section::Painting).await, 0);
    assert!(find_job_by_number(&app.db, "J-100").await.is_none());
    assert_eq!(count_logs(&app.db).await, 0);
}

#[tokio::test]
async fn rollback_aborts_when_product_counters_disagree_with_the_ledger() {
    let app = spawn_app().await;
    let model = create_test_model(&app.db, "L90").await;
    let product = create_test_product(&app.db, &model, "armchair").await;
    let panel = create_test_part(&app.db, &model, "side panel", 0, 10).await;
    add_bom_component(&app.db, &product, &panel, 2).await;

    let job = app
        .jobs
        .create_job(job_payload(
            "J-150",
            product.id,
            &["assembly", "painting", "packaging"],
        ))
        .await
        .expect("job creation should succeed");
    app.jobs
        .submit_movement(job_movement("J-150", Section::Assembly))
        .await
        .expect("assembly movement should succeed");
    app.jobs
        .submit_movement(job_movement("J-150", Section::Painting))
        .await
        .expect("painting movement should succeed");

    // Empty the bucket the last log credited, out-of-band.
    let stock = product_stock::Entity::find()
        .one(app.db.as_ref())
        .await
        .expect("query stock row")
        .expect("stock row exists");
    let mut am = stock.into_active_model();
    am.set_bucket(Section::Painting, 0);
    am.update(app.db.as_ref()).await.expect("tamper painting bucket");

    // A negative write would corrupt the ledger; the deletion must abort.
    let err = app.jobs.delete_job_completely(job.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InternalError(_)));

    // Nothing was half-rolled-back: logs, job, and the untouched assembly
    // bucket are all still in place.
    assert_eq!(count_job_logs(&app.db, job.id).await, 2);
    assert!(find_job_by_number(&app.db, "J-150").await.is_some());
    assert_eq!(product_bucket(&app.db, product.id, Section::Assembly).await, 0);
}

#[tokio::test]
async fn rollback_aborts_when_part_counters_disagree_with_the_ledger() {
    let app = spawn_app().await;
    let model = create_test_model(&app.db, "L90").await;
    let part = create_test_part(&app.db, &model, "side panel", 0, 0).await;

    let mut input = part_movement(part.id, Section::Cutting, 10, 0);
    input.job_number = Some("J-160".to_string());
    app.jobs
        .submit_movement(input)
        .await
        .expect("cutting movement should succeed");
    let mut input = part_movement(part.id, Section::CncTools, 5, 0);
    input.job_number = Some("J-160".to_string());
    app.jobs
        .submit_movement(input)
        .await
        .expect("cnc movement should succeed");

    // Drain the CNC buffer out-of-band, then try to unwind the lot.
    let mut am = part_by_id(&app.db, part.id).await.into_active_model();
    am.stock_cnc_tools = Set(0);
    am.update(app.db.as_ref()).await.expect("tamper cnc stock");

    let job = find_job_by_number(&app.db, "J-160")
        .await
        .expect("part job exists");
    let err = app.jobs.delete_job_completely(job.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InternalError(_)));
    assert_eq!(count_job_logs(&app.db, job.id).await, 2);
}

#[tokio::test]
async fn deleting_an_unknown_job_is_not_found() {
    let app = spawn_app().await;
    let err = app
        .jobs
        .delete_job_completely(uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn rewind_rolls_back_the_abandoned_slice() {
    let app = spawn_app().await;
    let model = create_test_model(&app.db, "L90").await;
    let product = create_test_product(&app.db, &model, "armchair").await;
    let panel = create_test_part(&app.db, &model, "side panel", 0, 10).await;
    add_bom_component(&app.db, &product, &panel, 2).await;

    let job = app
        .jobs
        .create_job(job_payload(
            "J-200",
            product.id,
            &["assembly", "painting", "packaging"],
        ))
        .await
        .expect("job creation should succeed");
    app.jobs
        .submit_movement(job_movement("J-200", Section::Assembly))
        .await
        .expect("assembly movement should succeed");
    app.jobs
        .submit_movement(job_movement("J-200", Section::Painting))
        .await
        .expect("painting movement should succeed");

    // Rewind so painting becomes the next expected section again.
    let outcome = app.jobs.rewind(job.id, 1).await.expect("rewind should succeed");
    assert_eq!(outcome.logs_removed, 1);
    assert_eq!(outcome.new_current_section, Some(Section::Assembly));

    assert_eq!(product_bucket(&app.db, product.id, Section::Assembly).await, 1);
    assert_eq!(product_bucket(&app.db, product.id, Section::Painting).await, 0);
    assert_eq!(count_job_logs(&app.db, job.id).await, 1);
    let job_row = job_by_id(&app.db, job.id).await;
    assert_eq!(job_row.current_section.as_deref(), Some("assembly"));

    // The rewound section can be logged again.
    app.jobs
        .submit_movement(job_movement("J-200", Section::Painting))
        .await
        .expect("painting should be loggable again after rewind");
    assert_eq!(product_bucket(&app.db, product.id, Section::Painting).await, 1);
}

#[tokio::test]
async fn duplicate_job_numbers_conflict() {
    let app = spawn_app().await;
    let model = create_test_model(&app.db, "L90").await;
    let product = create_test_product(&app.db, &model, "armchair").await;

    app.jobs
        .create_job(job_payload("J-300", product.id, &["assembly"]))
        .await
        .expect("first creation should succeed");
    let err = app
        .jobs
        .create_job(job_payload("J-300", product.id, &["assembly"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn deposit_label_banks_one_unit_in_the_single_allowed_bucket() {
    let app = spawn_app().await;
    let model = create_test_model(&app.db, "L90").await;
    let product = create_test_product(&app.db, &model, "armchair").await;

    let mut payload = job_payload("J-400", product.id, &["painting"]);
    payload.job_label = Some(JobLabel::Deposit);
    let job = app.jobs.create_job(payload).await.expect("deposit job creation");

    assert_eq!(product_bucket(&app.db, product.id, Section::Painting).await, 1);
    assert_eq!(job.status(), JobStatus::InProgress);
    assert_eq!(job.label(), JobLabel::Deposit);
    assert!(job.finished_at.is_some());
}

#[tokio::test]
async fn scrapped_label_debits_the_bucket_before_last() {
    let app = spawn_app().await;
    let model = create_test_model(&app.db, "L90").await;
    let product = create_test_product(&app.db, &model, "armchair").await;

    let stock = seed_product_stock(&app.db, product.id).await;
    let mut am = stock.into_active_model();
    am.set_bucket(Section::Painting, 3);
    am.update(app.db.as_ref()).await.expect("seed painting bucket");

    let mut payload = job_payload(
        "J-500",
        product.id,
        &["assembly", "painting", "packaging"],
    );
    payload.job_label = Some(JobLabel::Scrapped);
    let job = app.jobs.create_job(payload).await.expect("scrapped job creation");

    assert_eq!(product_bucket(&app.db, product.id, Section::Painting).await, 2);
    assert_eq!(job.status(), JobStatus::Scrapped);
    assert!(job.finished_at.is_some());
}

#[tokio::test]
async fn completed_label_lands_the_unit_in_packaging() {
    let app = spawn_app().await;
    let model = create_test_model(&app.db, "L90").await;
    let product = create_test_product(&app.db, &model, "armchair").await;

    let stock = seed_product_stock(&app.db, product.id).await;
    let mut am = stock.into_active_model();
    am.set_bucket(Section::Painting, 2);
    am.update(app.db.as_ref()).await.expect("seed painting bucket");

    let mut payload = job_payload("J-600", product.id, &["assembly", "painting"]);
    payload.job_label = Some(JobLabel::Completed);
    let job = app.jobs.create_job(payload).await.expect("completed job creation");

    assert_eq!(product_bucket(&app.db, product.id, Section::Packaging).await, 1);
    assert_eq!(product_bucket(&app.db, product.id, Section::Painting).await, 1);
    assert_eq!(job.status(), JobStatus::Completed);
}

#[tokio::test]
async fn default_job_round_trip() {
    let app = spawn_app().await;
    let model = create_test_model(&app.db, "L90").await;
    let product = create_test_product(&app.db, &model, "armchair").await;
    let job = app
        .jobs
        .create_job(job_payload("J-700", product.id, &["assembly"]))
        .await
        .expect("job creation should succeed");

    assert!(app.jobs.default_job().await.expect("read default").is_none());

    app.jobs
        .set_default_job(Some(job.id))
        .await
        .expect("set default");
    let current = app.jobs.default_job().await.expect("read default");
    assert_eq!(current.map(|j| j.id), Some(job.id));

    // Pointing at a missing job is rejected.
    let err = app
        .jobs
        .set_default_job(Some(uuid::Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    // Clearing removes the setting.
    app.jobs.set_default_job(None).await.expect("clear default");
    assert!(app.jobs.default_job().await.expect("read default").is_none());

    // A stale reference reads as no default.
    app.jobs
        .set_default_job(Some(job.id))
        .await
        .expect("set default again");
    app.jobs
        .delete_job_completely(job.id)
        .await
        .expect("delete default job");
    assert!(app.jobs.default_job().await.expect("read default").is_none());
}
