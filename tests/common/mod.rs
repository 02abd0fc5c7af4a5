#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use tokio::sync::mpsc;
use uuid::Uuid;

use archen_api::db::{self, DbConfig, DbPool};
use archen_api::entities::{
    material, part, product, product_component, product_material, product_model, product_stock,
    production_job, production_log,
};
use archen_api::events::{Event, EventSender};
use archen_api::flow::Section;
use archen_api::services::jobs::{JobService, NewJob, NewMovement};
use archen_api::services::maintenance::MaintenanceService;
use archen_api::services::reports::ReportService;

pub struct TestApp {
    pub db: Arc<DbPool>,
    pub jobs: JobService,
    pub maintenance: MaintenanceService,
    pub reports: ReportService,
    // Keeps the event channel open for the duration of the test.
    pub events: mpsc::Receiver<Event>,
}

/// Fresh in-memory database with migrations applied and services wired up.
/// A single-connection pool keeps the sqlite memory database alive and
/// shared across every query of the test.
pub async fn spawn_app() -> TestApp {
    let cfg = DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        ..Default::default()
    };
    let pool = db::establish_connection_with_config(&cfg)
        .await
        .expect("Failed to create test database pool");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    let db = Arc::new(pool);

    let (tx, rx) = mpsc::channel(100);
    let event_sender = Arc::new(EventSender::new(tx));

    TestApp {
        jobs: JobService::new(db.clone(), event_sender.clone()),
        maintenance: MaintenanceService::new(db.clone(), event_sender.clone()),
        reports: ReportService::new(db.clone()),
        db,
        events: rx,
    }
}

// ---------------------------------------------------------------------------
// Catalog fixtures
// ---------------------------------------------------------------------------

pub async fn create_test_model(db: &DbPool, name: &str) -> product_model::Model {
    product_model::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(None),
    }
    .insert(db)
    .await
    .expect("Failed to insert product model")
}

pub async fn create_test_product(
    db: &DbPool,
    model: &product_model::Model,
    name: &str,
) -> product::Model {
    product::ActiveModel {
        name: Set(name.to_string()),
        product_model_id: Set(model.id),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert product")
}

pub async fn create_test_part(
    db: &DbPool,
    model: &product_model::Model,
    name: &str,
    stock_cut: i32,
    stock_cnc_tools: i32,
) -> part::Model {
    part::ActiveModel {
        name: Set(name.to_string()),
        product_model_id: Set(model.id),
        stock_cut: Set(stock_cut),
        stock_cnc_tools: Set(stock_cnc_tools),
        threshold: Set(0),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert part")
}

pub async fn create_test_material(
    db: &DbPool,
    name: &str,
    quantity: Decimal,
    unit: &str,
) -> material::Model {
    material::ActiveModel {
        name: Set(name.to_string()),
        quantity: Set(quantity),
        unit: Set(Some(unit.to_string())),
        threshold: Set(Decimal::ZERO),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert material")
}

pub async fn add_bom_component(db: &DbPool, product: &product::Model, part: &part::Model, qty: i32) {
    product_component::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        part_id: Set(part.id),
        qty: Set(qty),
    }
    .insert(db)
    .await
    .expect("Failed to insert BOM component");
}

pub async fn add_bom_material(
    db: &DbPool,
    product: &product::Model,
    material: &material::Model,
    qty: Decimal,
) {
    product_material::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        material_id: Set(material.id),
        qty: Set(qty),
    }
    .insert(db)
    .await
    .expect("Failed to insert BOM material");
}

pub async fn seed_product_stock(db: &DbPool, product_id: Uuid) -> product_stock::Model {
    product_stock::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        stock_workpage: Set(0),
        stock_undercoating: Set(0),
        stock_painting: Set(0),
        stock_sewing: Set(0),
        stock_upholstery: Set(0),
        stock_assembly: Set(0),
        stock_packaging: Set(0),
        threshold: Set(0),
        description: Set(None),
    }
    .insert(db)
    .await
    .expect("Failed to insert product stock row")
}

// ---------------------------------------------------------------------------
// Payload builders
// ---------------------------------------------------------------------------

pub fn movement(section: Section) -> NewMovement {
    NewMovement {
        job_number: None,
        product_id: None,
        part_id: None,
        section,
        produced_qty: 0,
        scrap_qty: 0,
        is_scrap: false,
        is_external: false,
        actor: "tester".to_string(),
        role: "supervisor".to_string(),
        note: None,
    }
}

pub fn part_movement(part_id: Uuid, section: Section, produced: i32, scrap: i32) -> NewMovement {
    NewMovement {
        part_id: Some(part_id),
        produced_qty: produced,
        scrap_qty: scrap,
        ..movement(section)
    }
}

pub fn job_movement(job_number: &str, section: Section) -> NewMovement {
    NewMovement {
        job_number: Some(job_number.to_string()),
        produced_qty: 1,
        ..movement(section)
    }
}

pub fn job_payload(job_number: &str, product_id: Uuid, allowed: &[&str]) -> NewJob {
    NewJob {
        job_number: job_number.to_string(),
        product_id: Some(product_id),
        part_id: None,
        job_label: None,
        deposit_account: None,
        allowed_sections: Some(allowed.iter().map(|s| s.to_string()).collect()),
    }
}

// ---------------------------------------------------------------------------
// State readers
// ---------------------------------------------------------------------------

pub async fn part_by_id(db: &DbPool, id: Uuid) -> part::Model {
    part::Entity::find_by_id(id)
        .one(db)
        .await
        .expect("Failed to query part")
        .expect("Part not found")
}

pub async fn material_by_id(db: &DbPool, id: Uuid) -> material::Model {
    material::Entity::find_by_id(id)
        .one(db)
        .await
        .expect("Failed to query material")
        .expect("Material not found")
}

pub async fn job_by_id(db: &DbPool, id: Uuid) -> production_job::Model {
    production_job::Entity::find_by_id(id)
        .one(db)
        .await
        .expect("Failed to query job")
        .expect("Job not found")
}

pub async fn find_job_by_number(db: &DbPool, job_number: &str) -> Option<production_job::Model> {
    production_job::Entity::find()
        .filter(production_job::Column::JobNumber.eq(job_number))
        .one(db)
        .await
        .expect("Failed to query job by number")
}

/// Bucket value for a product-based section; 0 when no stock row exists yet.
pub async fn product_bucket(db: &DbPool, product_id: Uuid, section: Section) -> i32 {
    product_stock::Entity::find()
        .filter(product_stock::Column::ProductId.eq(product_id))
        .one(db)
        .await
        .expect("Failed to query product stock")
        .and_then(|row| row.bucket(section))
        .unwrap_or(0)
}

pub async fn count_logs(db: &DbPool) -> u64 {
    production_log::Entity::find()
        .count(db)
        .await
        .expect("Failed to count logs")
}

pub async fn count_job_logs(db: &DbPool, job_id: Uuid) -> u64 {
    production_log::Entity::find()
        .filter(production_log::Column::JobId.eq(job_id))
        .count(db)
        .await
        .expect("Failed to count job logs")
}
