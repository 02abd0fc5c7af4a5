//! The inventory ledger engine.
//!
//! `apply` performs every stock and job side effect of one production log;
//! `rollback` is its exact mirror given the section that was current when
//! the log was applied. Both run inside a caller-supplied transaction so a
//! log row and its side effects commit or vanish together.
//!
//! Apply dispatch, in order:
//! 1. part-only logs move quantities between the two part buckets,
//! 2. product logs without a job record nothing,
//! 3. external entries only credit the current bucket,
//! 4. deposit jobs move single units between buckets without consuming
//!    the BOM,
//! 5. scrap closes the job, consuming the BOM at assembly or debiting the
//!    previous bucket elsewhere,
//! 6. normal movements debit the previous bucket, consume the BOM at
//!    assembly, credit the current bucket, and close the job on the last
//!    allowed section (packaging always closes).
//!
//! Rollback never touches job status, label, or cursor; job-level fixups
//! are the caller's responsibility.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use sea_orm::{IntoActiveModel, QuerySelect};
use uuid::Uuid;

use crate::entities::{material, part, product, product_stock, production_job, production_log};
use crate::entities::production_job::{JobLabel, JobStatus};
use crate::errors::ServiceError;
use crate::flow::{closes_job, Section};
use crate::services::bom;

/// Result of applying one log.
#[derive(Debug)]
pub struct ApplyOutcome {
    /// Updated job row, when the log touched a job.
    pub job: Option<production_job::Model>,
    /// Whether this movement closed the job.
    pub closed: bool,
}

impl ApplyOutcome {
    fn jobless() -> Self {
        Self {
            job: None,
            closed: false,
        }
    }
}

/// Apply a log's side effects, consuming materials at assembly.
pub async fn apply<C: ConnectionTrait>(
    txn: &C,
    log: &production_log::Model,
) -> Result<ApplyOutcome, ServiceError> {
    apply_with(txn, log, true).await
}

/// Replay variant used by stock rebuilds. Material quantities are not
/// log-sourced, so replaying their consumption would double-debit them.
pub async fn replay<C: ConnectionTrait>(
    txn: &C,
    log: &production_log::Model,
) -> Result<ApplyOutcome, ServiceError> {
    apply_with(txn, log, false).await
}

async fn apply_with<C: ConnectionTrait>(
    txn: &C,
    log: &production_log::Model,
    consume_materials: bool,
) -> Result<ApplyOutcome, ServiceError> {
    let section = log.section().ok_or_else(|| {
        ServiceError::ValidationError(format!("unknown section slug: {}", log.section))
    })?;

    // 1. Part-only logs.
    if let (Some(part_id), None) = (log.part_id, log.product_id) {
        apply_part_log(txn, log, part_id, section).await?;
        return finish_part_job(txn, log, section).await;
    }

    // 2. Product logs record nothing without a job.
    let Some(job_id) = log.job_id else {
        return Ok(ApplyOutcome::jobless());
    };
    let job = find_job(txn, job_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("job {job_id} not found")))?;

    let first_entry = job.current_section().is_none();
    let allowed = job.allowed_sections.0.clone();

    // 3. External entries: credit only, still subject to completion.
    if log.is_external {
        credit_current(txn, log, section).await?;
        let close = closes_job(section, &allowed);
        let mut am = job.clone().into_active_model();
        am.current_section = Set(Some(section.as_str().to_string()));
        am.is_external_entry = Set(true);
        if close {
            close_completed(&mut am, &job);
        }
        let job = am.update(txn).await.map_err(ServiceError::db_error)?;
        return Ok(ApplyOutcome {
            job: Some(job),
            closed: close,
        });
    }

    // 4. Deposit jobs: unit moves between buckets, no BOM consumption.
    if job.label() == JobLabel::Deposit {
        if log.is_scrap {
            if !first_entry {
                debit_previous_product_bucket(txn, log, &job).await?;
            }
            let mut am = job.clone().into_active_model();
            am.current_section = Set(Some(section.as_str().to_string()));
            am.is_external_entry = Set(false);
            close_scrapped(&mut am);
            let job = am.update(txn).await.map_err(ServiceError::db_error)?;
            return Ok(ApplyOutcome {
                job: Some(job),
                closed: true,
            });
        }

        if !first_entry {
            debit_previous_product_bucket(txn, log, &job).await?;
        }
        credit_current(txn, log, section).await?;
        let close = closes_job(section, &allowed);
        let mut am = job.clone().into_active_model();
        am.current_section = Set(Some(section.as_str().to_string()));
        am.is_external_entry = Set(false);
        if close {
            close_completed(&mut am, &job);
        }
        let job = am.update(txn).await.map_err(ServiceError::db_error)?;
        return Ok(ApplyOutcome {
            job: Some(job),
            closed: close,
        });
    }

    // 5. Scrap: close the job, no credit to the current bucket.
    if log.is_scrap {
        if section == Section::Assembly {
            if let Some(product_id) = log.product_id {
                consume_bom(txn, product_id, consume_materials).await?;
            }
        } else if !first_entry {
            debit_previous(txn, log, &job, section).await?;
        }
        let mut am = job.clone().into_active_model();
        am.current_section = Set(Some(section.as_str().to_string()));
        am.is_external_entry = Set(false);
        close_scrapped(&mut am);
        let job = am.update(txn).await.map_err(ServiceError::db_error)?;
        return Ok(ApplyOutcome {
            job: Some(job),
            closed: true,
        });
    }

    // 6. Normal movement.
    if !first_entry {
        debit_previous(txn, log, &job, section).await?;
    }
    if section == Section::Assembly {
        if let Some(product_id) = log.product_id {
            consume_bom(txn, product_id, consume_materials).await?;
        }
    }
    credit_current(txn, log, section).await?;

    let close = log.product_id.is_some() && closes_job(section, &allowed);
    let mut am = job.clone().into_active_model();
    am.current_section = Set(Some(section.as_str().to_string()));
    am.is_external_entry = Set(false);
    if close {
        close_completed(&mut am, &job);
    }
    let job = am.update(txn).await.map_err(ServiceError::db_error)?;
    Ok(ApplyOutcome {
        job: Some(job),
        closed: close,
    })
}

/// Undo the inventory movements of one log. `prev_section` must be the
/// section that was the job's cursor when the log was applied; the caller
/// reconstructs it with a forward fold over the job's ordered logs.
pub async fn rollback<C: ConnectionTrait>(
    txn: &C,
    log: &production_log::Model,
    prev_section: Option<Section>,
) -> Result<(), ServiceError> {
    let Some(section) = log.section() else {
        return Ok(());
    };

    if let (Some(part_id), None) = (log.part_id, log.product_id) {
        return reverse_part_log(txn, log, part_id, section).await;
    }

    let Some(job_id) = log.job_id else {
        return Ok(());
    };
    let Some(job) = find_job(txn, job_id).await? else {
        return Ok(());
    };

    let first_entry = prev_section.is_none();

    if log.is_external {
        debit_bucket_for_rollback(txn, log.product_id, section).await?;
        return Ok(());
    }

    if job.label() == JobLabel::Deposit {
        if log.is_scrap {
            if let Some(prev) = prev_section {
                adjust_product_bucket(txn, log.product_id, prev, 1).await?;
            }
            return Ok(());
        }
        if let Some(prev) = prev_section {
            adjust_product_bucket(txn, log.product_id, prev, 1).await?;
        }
        debit_bucket_for_rollback(txn, log.product_id, section).await?;
        return Ok(());
    }

    if log.is_scrap {
        if section == Section::Assembly {
            if let Some(product_id) = log.product_id {
                restore_bom(txn, product_id).await?;
            }
        } else if !first_entry {
            reverse_debit_previous(txn, log, prev_section, section).await?;
        }
        return Ok(());
    }

    if !first_entry {
        reverse_debit_previous(txn, log, prev_section, section).await?;
    }
    if section == Section::Assembly {
        if let Some(product_id) = log.product_id {
            restore_bom(txn, product_id).await?;
        }
    }
    debit_bucket_for_rollback(txn, log.product_id, section).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Part bucket arithmetic
// ---------------------------------------------------------------------------

async fn apply_part_log<C: ConnectionTrait>(
    txn: &C,
    log: &production_log::Model,
    part_id: Uuid,
    section: Section,
) -> Result<(), ServiceError> {
    let part = find_part(txn, part_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("part {part_id} not found")))?;

    match section {
        Section::Cutting => {
            let projected = part.stock_cut + log.produced_qty - log.scrap_qty;
            if projected < 0 {
                return Err(ServiceError::InsufficientStock(
                    "part stock in cutting would go negative".to_string(),
                ));
            }
            let mut am = part.into_active_model();
            am.stock_cut = Set(projected);
            am.update(txn).await.map_err(ServiceError::db_error)?;
        }
        Section::CncTools => {
            let consumed = log.produced_qty + log.scrap_qty;
            if consumed > part.stock_cut {
                return Err(ServiceError::InsufficientStock(
                    "cutting stock cannot cover the cnc_tools movement".to_string(),
                ));
            }
            let cut = part.stock_cut - consumed;
            let cnc = part.stock_cnc_tools + log.produced_qty;
            let mut am = part.into_active_model();
            am.stock_cut = Set(cut);
            am.stock_cnc_tools = Set(cnc);
            am.update(txn).await.map_err(ServiceError::db_error)?;
        }
        // Part logs only make sense in the two part sections.
        _ => {}
    }
    Ok(())
}

/// Part-job bookkeeping after the bucket move. A cnc_tools log against a
/// part job is its final step and closes it.
async fn finish_part_job<C: ConnectionTrait>(
    txn: &C,
    log: &production_log::Model,
    section: Section,
) -> Result<ApplyOutcome, ServiceError> {
    let Some(job_id) = log.job_id else {
        return Ok(ApplyOutcome::jobless());
    };
    let Some(job) = find_job(txn, job_id).await? else {
        return Ok(ApplyOutcome::jobless());
    };
    if job.part_id.is_none() || job.product_id.is_some() {
        return Ok(ApplyOutcome::jobless());
    }

    let close = section == Section::CncTools;
    let mut am = job.into_active_model();
    am.current_section = Set(Some(section.as_str().to_string()));
    am.is_external_entry = Set(false);
    if close {
        am.status = Set(JobStatus::Completed.to_string());
        am.finished_at = Set(Some(Utc::now()));
    }
    let job = am.update(txn).await.map_err(ServiceError::db_error)?;
    Ok(ApplyOutcome {
        job: Some(job),
        closed: close,
    })
}

async fn reverse_part_log<C: ConnectionTrait>(
    txn: &C,
    log: &production_log::Model,
    part_id: Uuid,
    section: Section,
) -> Result<(), ServiceError> {
    let Some(part) = find_part(txn, part_id).await? else {
        return Ok(());
    };
    match section {
        Section::Cutting => {
            let cut = part.stock_cut - log.produced_qty + log.scrap_qty;
            if cut < 0 {
                return Err(rollback_corruption("cutting", &part.name));
            }
            let mut am = part.into_active_model();
            am.stock_cut = Set(cut);
            am.update(txn).await.map_err(ServiceError::db_error)?;
        }
        Section::CncTools => {
            let cnc = part.stock_cnc_tools - log.produced_qty;
            if cnc < 0 {
                return Err(rollback_corruption("cnc_tools", &part.name));
            }
            let cut = part.stock_cut + log.produced_qty + log.scrap_qty;
            let mut am = part.into_active_model();
            am.stock_cut = Set(cut);
            am.stock_cnc_tools = Set(cnc);
            am.update(txn).await.map_err(ServiceError::db_error)?;
        }
        _ => {}
    }
    Ok(())
}

fn rollback_corruption(bucket: &str, subject: &str) -> ServiceError {
    ServiceError::InternalError(format!(
        "rollback would drive the {bucket} stock of '{subject}' negative; \
         counters no longer match the ledger"
    ))
}

// ---------------------------------------------------------------------------
// Previous-bucket debits and their mirrors
// ---------------------------------------------------------------------------

/// Debit the bucket the unit is leaving. No-op on the first entry (caller
/// checks) and whenever the current log is an assembly movement: assembly
/// consumes the BOM instead, and debiting as well would double-count.
async fn debit_previous<C: ConnectionTrait>(
    txn: &C,
    log: &production_log::Model,
    job: &production_job::Model,
    current_section: Section,
) -> Result<(), ServiceError> {
    let Some(prev) = job.current_section() else {
        return Ok(());
    };
    if current_section == Section::Assembly {
        return Ok(());
    }

    if prev.is_part_based() {
        let Some(part_id) = log.part_id else {
            return Ok(());
        };
        let part = find_part(txn, part_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("part {part_id} not found")))?;
        let (cut, cnc) = match prev {
            Section::Cutting => {
                if part.stock_cut < 1 {
                    return Err(ServiceError::InsufficientStock(
                        "no cutting stock to move from".to_string(),
                    ));
                }
                (part.stock_cut - 1, part.stock_cnc_tools)
            }
            _ => {
                if part.stock_cnc_tools < 1 {
                    return Err(ServiceError::InsufficientStock(
                        "no cnc_tools stock to move from".to_string(),
                    ));
                }
                (part.stock_cut, part.stock_cnc_tools - 1)
            }
        };
        let mut am = part.into_active_model();
        am.stock_cut = Set(cut);
        am.stock_cnc_tools = Set(cnc);
        am.update(txn).await.map_err(ServiceError::db_error)?;
        return Ok(());
    }

    let Some(product_id) = log.product_id else {
        return Ok(());
    };
    debit_bucket_checked(txn, product_id, prev).await
}

/// Deposit variant: only product buckets move, the assembly special case
/// does not apply.
async fn debit_previous_product_bucket<C: ConnectionTrait>(
    txn: &C,
    log: &production_log::Model,
    job: &production_job::Model,
) -> Result<(), ServiceError> {
    let Some(prev) = job.current_section() else {
        return Ok(());
    };
    let Some(product_id) = log.product_id else {
        return Ok(());
    };
    if !prev.is_product_based() {
        return Ok(());
    }
    debit_bucket_checked(txn, product_id, prev).await
}

async fn reverse_debit_previous<C: ConnectionTrait>(
    txn: &C,
    log: &production_log::Model,
    prev_section: Option<Section>,
    current_section: Section,
) -> Result<(), ServiceError> {
    let Some(prev) = prev_section else {
        return Ok(());
    };
    // Assembly logs never debited a previous bucket.
    if current_section == Section::Assembly {
        return Ok(());
    }

    if prev.is_part_based() {
        let Some(part_id) = log.part_id else {
            return Ok(());
        };
        let Some(part) = find_part(txn, part_id).await? else {
            return Ok(());
        };
        let (cut, cnc) = match prev {
            Section::Cutting => (part.stock_cut + 1, part.stock_cnc_tools),
            _ => (part.stock_cut, part.stock_cnc_tools + 1),
        };
        let mut am = part.into_active_model();
        am.stock_cut = Set(cut);
        am.stock_cnc_tools = Set(cnc);
        am.update(txn).await.map_err(ServiceError::db_error)?;
        return Ok(());
    }

    adjust_product_bucket(txn, log.product_id, prev, 1).await
}

// ---------------------------------------------------------------------------
// Product bucket arithmetic
// ---------------------------------------------------------------------------

async fn credit_current<C: ConnectionTrait>(
    txn: &C,
    log: &production_log::Model,
    section: Section,
) -> Result<(), ServiceError> {
    adjust_product_bucket(txn, log.product_id, section, 1).await
}

/// Unchecked bucket adjustment; no-op for part sections or when the log
/// carries no product. Also used by job creation and the maintenance
/// rebuild for their direct bucket fixups.
pub(crate) async fn adjust_product_bucket<C: ConnectionTrait>(
    txn: &C,
    product_id: Option<Uuid>,
    section: Section,
    delta: i32,
) -> Result<(), ServiceError> {
    let Some(product_id) = product_id else {
        return Ok(());
    };
    if !section.is_product_based() {
        return Ok(());
    }
    let stock = stock_row(txn, product_id).await?;
    let current = stock.bucket(section).unwrap_or(0);
    let mut am = stock.into_active_model();
    am.set_bucket(section, current + delta);
    am.update(txn).await.map_err(ServiceError::db_error)?;
    Ok(())
}

/// Rollback-side decrement of the bucket a log credited. An empty bucket
/// here means the counters no longer match the history being rolled back;
/// a silent negative write would corrupt the ledger, so the whole
/// transaction aborts instead.
async fn debit_bucket_for_rollback<C: ConnectionTrait>(
    txn: &C,
    product_id: Option<Uuid>,
    section: Section,
) -> Result<(), ServiceError> {
    let Some(product_id) = product_id else {
        return Ok(());
    };
    if !section.is_product_based() {
        return Ok(());
    }
    let stock = stock_row(txn, product_id).await?;
    let Some(current) = stock.bucket(section) else {
        return Ok(());
    };
    if current < 1 {
        return Err(ServiceError::InternalError(format!(
            "rollback would drive the {} bucket of product {} negative; \
             counters no longer match the ledger",
            section.as_str(),
            product_id
        )));
    }
    let mut am = stock.into_active_model();
    am.set_bucket(section, current - 1);
    am.update(txn).await.map_err(ServiceError::db_error)?;
    Ok(())
}

async fn debit_bucket_checked<C: ConnectionTrait>(
    txn: &C,
    product_id: Uuid,
    section: Section,
) -> Result<(), ServiceError> {
    let stock = stock_row(txn, product_id).await?;
    let Some(current) = stock.bucket(section) else {
        return Ok(());
    };
    if current < 1 {
        return Err(ServiceError::InsufficientStock(format!(
            "no product stock in {} to move from",
            section.as_str()
        )));
    }
    let mut am = stock.into_active_model();
    am.set_bucket(section, current - 1);
    am.update(txn).await.map_err(ServiceError::db_error)?;
    Ok(())
}

/// Get-or-create the per-product stock row.
async fn stock_row<C: ConnectionTrait>(
    txn: &C,
    product_id: Uuid,
) -> Result<product_stock::Model, ServiceError> {
    let backend = txn.get_database_backend();
    let mut query =
        product_stock::Entity::find().filter(product_stock::Column::ProductId.eq(product_id));
    if backend == sea_orm::DbBackend::Postgres {
        query = query.lock_exclusive();
    }
    if let Some(row) = query.one(txn).await.map_err(ServiceError::db_error)? {
        return Ok(row);
    }
    let am = product_stock::ActiveModel {
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
    };
    am.insert(txn).await.map_err(ServiceError::db_error)
}

// ---------------------------------------------------------------------------
// BOM consumption at assembly
// ---------------------------------------------------------------------------

async fn consume_bom<C: ConnectionTrait>(
    txn: &C,
    product_id: Uuid,
    consume_materials: bool,
) -> Result<(), ServiceError> {
    let Some(product) = product::Entity::find_by_id(product_id)
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?
    else {
        return Ok(());
    };

    for line in bom::components_for(txn, &product, &[]).await? {
        if line.part.stock_cnc_tools < line.qty {
            return Err(ServiceError::InsufficientStock(format!(
                "part '{}' has {} in cnc_tools, assembly needs {}",
                line.part.name, line.part.stock_cnc_tools, line.qty
            )));
        }
        let cnc = line.part.stock_cnc_tools - line.qty;
        let mut am = line.part.into_active_model();
        am.stock_cnc_tools = Set(cnc);
        am.update(txn).await.map_err(ServiceError::db_error)?;
    }

    if consume_materials {
        for line in bom::materials_for(txn, product_id).await? {
            if line.material.quantity < line.qty {
                return Err(ServiceError::InsufficientStock(format!(
                    "material '{}' has {}, assembly needs {}",
                    line.material.name, line.material.quantity, line.qty
                )));
            }
            let remaining = line.material.quantity - line.qty;
            let mut am = line.material.into_active_model();
            am.quantity = Set(remaining);
            am.update(txn).await.map_err(ServiceError::db_error)?;
        }
    }
    Ok(())
}

async fn restore_bom<C: ConnectionTrait>(txn: &C, product_id: Uuid) -> Result<(), ServiceError> {
    let Some(product) = product::Entity::find_by_id(product_id)
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?
    else {
        return Ok(());
    };

    for line in bom::components_for(txn, &product, &[]).await? {
        let cnc = line.part.stock_cnc_tools + line.qty;
        let mut am = line.part.into_active_model();
        am.stock_cnc_tools = Set(cnc);
        am.update(txn).await.map_err(ServiceError::db_error)?;
    }
    for line in bom::materials_for(txn, product_id).await? {
        let quantity: Decimal = line.material.quantity + line.qty;
        let mut am = line.material.into_active_model();
        am.quantity = Set(quantity);
        am.update(txn).await.map_err(ServiceError::db_error)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Row lookups
// ---------------------------------------------------------------------------

async fn find_part<C: ConnectionTrait>(
    txn: &C,
    part_id: Uuid,
) -> Result<Option<part::Model>, ServiceError> {
    let mut query = part::Entity::find_by_id(part_id);
    if txn.get_database_backend() == sea_orm::DbBackend::Postgres {
        query = query.lock_exclusive();
    }
    query.one(txn).await.map_err(ServiceError::db_error)
}

async fn find_job<C: ConnectionTrait>(
    txn: &C,
    job_id: Uuid,
) -> Result<Option<production_job::Model>, ServiceError> {
    let mut query = production_job::Entity::find_by_id(job_id);
    if txn.get_database_backend() == sea_orm::DbBackend::Postgres {
        query = query.lock_exclusive();
    }
    query.one(txn).await.map_err(ServiceError::db_error)
}

// ---------------------------------------------------------------------------
// Job closure
// ---------------------------------------------------------------------------

/// Completion mapping: warranty jobs land on repaired, everything else on
/// completed. The label is only ever promoted in_progress → completed.
fn close_completed(am: &mut production_job::ActiveModel, job: &production_job::Model) {
    let status = if job.status() == JobStatus::Warranty {
        JobStatus::Repaired
    } else {
        JobStatus::Completed
    };
    am.status = Set(status.to_string());
    if job.label() == JobLabel::InProgress && status == JobStatus::Completed {
        am.job_label = Set(JobLabel::Completed.to_string());
    }
    am.finished_at = Set(Some(Utc::now()));
}

fn close_scrapped(am: &mut production_job::ActiveModel) {
    am.status = Set(JobStatus::Scrapped.to_string());
    am.job_label = Set(JobLabel::Scrapped.to_string());
    am.finished_at = Set(Some(Utc::now()));
}
