//! Job lifecycle: movement intake, creation, deletion with rollback, and
//! progress rewind.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use sea_orm::{IntoActiveModel, PaginatorTrait, QueryOrder, TransactionTrait};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::app_setting::{self, DEFAULT_JOB_KEY};
use crate::entities::production_job::{JobLabel, JobStatus, SectionList};
use crate::entities::{part, product, product_model, production_job, production_log};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::flow::{self, ordered_allowed_sections, Section};
use crate::services::{bom, ledger, map_txn_err};

/// Movement submission payload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewMovement {
    /// Job reference; the job is created on the fly when the number is new.
    pub job_number: Option<String>,
    pub product_id: Option<Uuid>,
    pub part_id: Option<Uuid>,
    pub section: Section,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub produced_qty: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub scrap_qty: i32,
    #[serde(default)]
    pub is_scrap: bool,
    #[serde(default)]
    pub is_external: bool,
    #[validate(length(min = 1))]
    pub actor: String,
    #[serde(default)]
    pub role: String,
    pub note: Option<String>,
}

/// Job creation payload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewJob {
    #[validate(length(min = 1))]
    pub job_number: String,
    pub product_id: Option<Uuid>,
    pub part_id: Option<Uuid>,
    pub job_label: Option<JobLabel>,
    pub deposit_account: Option<String>,
    /// Explicit section ticks; omitted means "derive from the BOM".
    pub allowed_sections: Option<Vec<String>>,
}

/// Result of a movement submission.
#[derive(Debug)]
pub struct MovementOutcome {
    pub log: production_log::Model,
    pub job: Option<production_job::Model>,
    pub closed: bool,
}

/// Result of a rewind.
#[derive(Debug)]
pub struct RewindOutcome {
    pub logs_removed: u64,
    pub new_current_section: Option<Section>,
}

#[derive(Clone)]
pub struct JobService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl JobService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Record one movement: resolve or create the job, gate the section,
    /// insert the log, and apply its inventory effects, all in one
    /// transaction.
    #[instrument(skip(self, input), fields(job_number = ?input.job_number, section = %input.section))]
    pub async fn submit_movement(
        &self,
        input: NewMovement,
    ) -> Result<MovementOutcome, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if input.is_scrap && input.is_external {
            return Err(ServiceError::ValidationError(
                "a movement cannot be both scrap and external".to_string(),
            ));
        }
        if input.job_number.is_none() && input.part_id.is_none() && input.product_id.is_none() {
            return Err(ServiceError::ValidationError(
                "movement must reference a job, a part, or a product".to_string(),
            ));
        }

        let payload = input.clone();
        let outcome = self
            .db
            .transaction::<_, MovementOutcome, ServiceError>(move |txn| {
                Box::pin(async move {
                    let job = match payload.job_number.as_deref() {
                        Some(number) => Some(resolve_or_create_job(txn, number, &payload).await?),
                        None => None,
                    };

                    let (product_id, part_id) = match &job {
                        Some(job) => (
                            payload.product_id.or(job.product_id),
                            payload.part_id.or(job.part_id),
                        ),
                        None => (payload.product_id, payload.part_id),
                    };

                    if let Some(job) = &job {
                        gate_movement(txn, job, payload.section).await?;
                    }

                    let model_name = snapshot_model_name(txn, product_id, part_id).await?;

                    let log = production_log::ActiveModel {
                        job_id: Set(job.as_ref().map(|j| j.id)),
                        product_id: Set(product_id),
                        part_id: Set(part_id),
                        section: Set(payload.section.as_str().to_string()),
                        produced_qty: Set(payload.produced_qty),
                        scrap_qty: Set(payload.scrap_qty),
                        is_scrap: Set(payload.is_scrap),
                        is_external: Set(payload.is_external),
                        actor: Set(payload.actor.clone()),
                        role: Set(payload.role.clone()),
                        model_name: Set(model_name),
                        note: Set(payload.note.clone()),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::from_log_insert)?;

                    let applied = ledger::apply(txn, &log).await?;
                    Ok(MovementOutcome {
                        log,
                        job: applied.job,
                        closed: applied.closed,
                    })
                })
            })
            .await
            .map_err(map_txn_err)?;

        self.event_sender
            .send_or_log(Event::MovementLogged {
                log_id: outcome.log.id,
                job_id: outcome.log.job_id,
                section: outcome.log.section.clone(),
            })
            .await;
        if outcome.closed {
            if let Some(job) = &outcome.job {
                let event = match job.status() {
                    JobStatus::Scrapped => Event::JobScrapped(job.id),
                    _ => Event::JobCompleted(job.id),
                };
                self.event_sender.send_or_log(event).await;
            }
        }

        Ok(outcome)
    }

    /// Create a job, defaulting its allowed sections from the BOM and
    /// applying the creation-time label side effects for product jobs.
    #[instrument(skip(self, input), fields(job_number = %input.job_number))]
    pub async fn create_job(&self, input: NewJob) -> Result<production_job::Model, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if input.product_id.is_none() && input.part_id.is_none() {
            return Err(ServiceError::ValidationError(
                "job must reference a product or a part".to_string(),
            ));
        }

        let payload = input.clone();
        let job = self
            .db
            .transaction::<_, production_job::Model, ServiceError>(move |txn| {
                Box::pin(async move { create_job_in_txn(txn, &payload).await })
            })
            .await
            .map_err(map_txn_err)?;

        info!(job_id = %job.id, job_number = %job.job_number, "job created");
        self.event_sender.send_or_log(Event::JobCreated(job.id)).await;
        Ok(job)
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<production_job::Model, ServiceError> {
        production_job::Entity::find_by_id(job_id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("job {job_id} not found")))
    }

    pub async fn list_jobs(
        &self,
        status: Option<JobStatus>,
    ) -> Result<Vec<production_job::Model>, ServiceError> {
        let mut query =
            production_job::Entity::find().order_by_desc(production_job::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(production_job::Column::Status.eq(status.to_string()));
        }
        query
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Ordered logs for a job paired with each log's previous-section
    /// context, as the rollback paths need it.
    pub async fn history(
        &self,
        job_id: Uuid,
    ) -> Result<Vec<(production_log::Model, Option<Section>)>, ServiceError> {
        log_history(self.db.as_ref(), job_id).await
    }

    /// Delete a job and all its logs, reverting every inventory effect.
    /// Returns (logs_deleted, jobs_deleted).
    #[instrument(skip(self))]
    pub async fn delete_job_completely(&self, job_id: Uuid) -> Result<(u64, u64), ServiceError> {
        let deleted = self
            .db
            .transaction::<_, u64, ServiceError>(move |txn| {
                Box::pin(async move {
                    let job = production_job::Entity::find_by_id(job_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("job {job_id} not found"))
                        })?;

                    let contexts = log_history(txn, job_id).await?;
                    let count = contexts.len() as u64;
                    for (log, prev_section) in contexts.iter().rev() {
                        ledger::rollback(txn, log, *prev_section).await?;
                        production_log::Entity::delete_by_id(log.id)
                            .exec(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                    }
                    production_job::Entity::delete_by_id(job.id)
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    Ok(count)
                })
            })
            .await
            .map_err(map_txn_err)?;

        info!(%job_id, logs_removed = deleted, "job deleted with rollback");
        self.event_sender
            .send_or_log(Event::JobDeleted {
                job_id,
                logs_removed: deleted,
            })
            .await;
        Ok((deleted, 1))
    }

    /// Rewind a job so its next expected section becomes
    /// `flow[target_cursor]`, rolling back and deleting the logs of the
    /// abandoned slice.
    #[instrument(skip(self))]
    pub async fn rewind(
        &self,
        job_id: Uuid,
        target_cursor: usize,
    ) -> Result<RewindOutcome, ServiceError> {
        let outcome = self
            .db
            .transaction::<_, RewindOutcome, ServiceError>(move |txn| {
                Box::pin(async move {
                    let job = production_job::Entity::find_by_id(job_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("job {job_id} not found"))
                        })?;

                    let has_mdf = match job.product_id {
                        Some(product_id) => bom::product_has_mdf_page(txn, product_id).await?,
                        None => false,
                    };
                    let ordered_flow = job.flow(has_mdf);
                    let current_cursor = progress_cursor(txn, job.id, &ordered_flow).await?;
                    let (removed, new_current) = rewind_job_progress(
                        txn,
                        &job,
                        &ordered_flow,
                        target_cursor,
                        current_cursor,
                    )
                    .await?;

                    let mut am = job.into_active_model();
                    am.current_section =
                        Set(new_current.map(|s| s.as_str().to_string()));
                    am.update(txn).await.map_err(ServiceError::db_error)?;

                    Ok(RewindOutcome {
                        logs_removed: removed,
                        new_current_section: new_current,
                    })
                })
            })
            .await
            .map_err(map_txn_err)?;

        self.event_sender
            .send_or_log(Event::JobRewound {
                job_id,
                logs_removed: outcome.logs_removed,
                new_current_section: outcome
                    .new_current_section
                    .map(|s| s.as_str().to_string()),
            })
            .await;
        Ok(outcome)
    }

    /// Set (or clear) the job pre-selected in the quick work-entry form.
    pub async fn set_default_job(&self, job_id: Option<Uuid>) -> Result<(), ServiceError> {
        let db = self.db.as_ref();
        match job_id {
            Some(job_id) => {
                // Referencing a missing job would leave a dangling setting.
                self.get_job(job_id).await?;
                let existing = app_setting::Entity::find_by_id(DEFAULT_JOB_KEY.to_string())
                    .one(db)
                    .await
                    .map_err(ServiceError::db_error)?;
                match existing {
                    Some(row) => {
                        let mut am = row.into_active_model();
                        am.value = Set(job_id.to_string());
                        am.update(db).await.map_err(ServiceError::db_error)?;
                    }
                    None => {
                        app_setting::ActiveModel {
                            key: Set(DEFAULT_JOB_KEY.to_string()),
                            value: Set(job_id.to_string()),
                        }
                        .insert(db)
                        .await
                        .map_err(ServiceError::db_error)?;
                    }
                }
            }
            None => {
                app_setting::Entity::delete_by_id(DEFAULT_JOB_KEY.to_string())
                    .exec(db)
                    .await
                    .map_err(ServiceError::db_error)?;
            }
        }
        Ok(())
    }

    /// The currently configured default job, if any. A stale reference
    /// (deleted job) reads as no default.
    pub async fn default_job(&self) -> Result<Option<production_job::Model>, ServiceError> {
        let db = self.db.as_ref();
        let Some(setting) = app_setting::Entity::find_by_id(DEFAULT_JOB_KEY.to_string())
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
        else {
            return Ok(None);
        };
        let Ok(job_id) = setting.value.parse::<Uuid>() else {
            return Ok(None);
        };
        production_job::Entity::find_by_id(job_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }
}

// ---------------------------------------------------------------------------
// Movement plumbing
// ---------------------------------------------------------------------------

async fn resolve_or_create_job<C: ConnectionTrait>(
    txn: &C,
    job_number: &str,
    input: &NewMovement,
) -> Result<production_job::Model, ServiceError> {
    let existing = production_job::Entity::find()
        .filter(production_job::Column::JobNumber.eq(job_number))
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?;
    if let Some(job) = existing {
        return Ok(job);
    }

    production_job::ActiveModel {
        job_number: Set(job_number.to_string()),
        product_id: Set(input.product_id),
        part_id: Set(input.part_id),
        ..Default::default()
    }
    .insert(txn)
    .await
    .map_err(ServiceError::db_error)
}

/// Pre-apply gating. The unique (job, section) index remains the last line
/// of defense against concurrent duplicates.
async fn gate_movement<C: ConnectionTrait>(
    txn: &C,
    job: &production_job::Model,
    section: Section,
) -> Result<(), ServiceError> {
    if job.product_id.is_some() && !job.allowed_sections.0.is_empty() {
        let ordered = ordered_allowed_sections(&job.allowed_sections.0);
        let Some(idx) = ordered.iter().position(|s| *s == section) else {
            return Err(ServiceError::InvalidTransition(format!(
                "section {} is not allowed for job {}",
                section.as_str(),
                job.job_number
            )));
        };
        if idx > 0 {
            let prev = ordered[idx - 1];
            if !has_log_for_section(txn, job.id, prev).await? {
                return Err(ServiceError::InvalidTransition(format!(
                    "section {} has no log yet for job {}",
                    prev.as_str(),
                    job.job_number
                )));
            }
        }
    }

    if has_log_for_section(txn, job.id, section).await? {
        return Err(ServiceError::InvalidTransition(
            "a log already exists for this job and section".to_string(),
        ));
    }
    Ok(())
}

async fn has_log_for_section<C: ConnectionTrait>(
    txn: &C,
    job_id: Uuid,
    section: Section,
) -> Result<bool, ServiceError> {
    let count = production_log::Entity::find()
        .filter(production_log::Column::JobId.eq(job_id))
        .filter(production_log::Column::Section.eq(section.as_str()))
        .count(txn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(count > 0)
}

/// Product-model name snapshot stored on each log for audit listings.
async fn snapshot_model_name<C: ConnectionTrait>(
    txn: &C,
    product_id: Option<Uuid>,
    part_id: Option<Uuid>,
) -> Result<String, ServiceError> {
    let model_id = if let Some(product_id) = product_id {
        product::Entity::find_by_id(product_id)
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .map(|p| p.product_model_id)
    } else if let Some(part_id) = part_id {
        part::Entity::find_by_id(part_id)
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .map(|p| p.product_model_id)
    } else {
        None
    };

    let Some(model_id) = model_id else {
        return Ok(String::new());
    };
    Ok(product_model::Entity::find_by_id(model_id)
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?
        .map(|m| m.name)
        .unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

async fn create_job_in_txn<C: ConnectionTrait>(
    txn: &C,
    input: &NewJob,
) -> Result<production_job::Model, ServiceError> {
    if production_job::Entity::find()
        .filter(production_job::Column::JobNumber.eq(input.job_number.as_str()))
        .count(txn)
        .await
        .map_err(ServiceError::db_error)?
        > 0
    {
        return Err(ServiceError::Conflict(format!(
            "job number {} already exists",
            input.job_number
        )));
    }

    let allowed: Vec<String> = match &input.allowed_sections {
        Some(list) => list
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect(),
        None => match input.product_id {
            Some(product_id) => {
                let has_mdf = bom::product_has_mdf_page(txn, product_id).await?;
                flow::default_allowed_sections(has_mdf)
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect()
            }
            None => Vec::new(),
        },
    };

    let label = input.job_label.unwrap_or_default();
    let job = production_job::ActiveModel {
        job_number: Set(input.job_number.clone()),
        product_id: Set(input.product_id),
        part_id: Set(input.part_id),
        job_label: Set(label.to_string()),
        deposit_account: Set(input.deposit_account.clone()),
        allowed_sections: Set(SectionList(allowed.clone())),
        ..Default::default()
    }
    .insert(txn)
    .await
    .map_err(|e| {
        let text = e.to_string().to_lowercase();
        if text.contains("unique") {
            ServiceError::Conflict(format!("job number {} already exists", input.job_number))
        } else {
            ServiceError::DatabaseError(e)
        }
    })?;

    apply_creation_label_effects(txn, job, label, &allowed).await
}

/// Creation-time stock effects for product jobs carrying a closing label.
/// Jobs entered retroactively as deposit/scrapped/completed adjust the
/// buckets once at creation instead of through movement logs.
async fn apply_creation_label_effects<C: ConnectionTrait>(
    txn: &C,
    job: production_job::Model,
    label: JobLabel,
    allowed: &[String],
) -> Result<production_job::Model, ServiceError> {
    let Some(product_id) = job.product_id else {
        return Ok(job);
    };

    let bucket_of = |slug: &str| Section::parse(slug).filter(|s| s.is_product_based());

    match label {
        JobLabel::Deposit if allowed.len() == 1 => {
            let Some(section) = bucket_of(&allowed[0]) else {
                return Ok(job);
            };
            ledger::adjust_product_bucket(txn, Some(product_id), section, 1).await?;
            let mut am = job.into_active_model();
            am.status = Set(JobStatus::InProgress.to_string());
            am.finished_at = Set(Some(Utc::now()));
            am.update(txn).await.map_err(ServiceError::db_error)
        }
        JobLabel::Scrapped if !allowed.is_empty() => {
            let prev_slug = if allowed.len() == 1 {
                &allowed[0]
            } else {
                &allowed[allowed.len() - 2]
            };
            let Some(section) = bucket_of(prev_slug) else {
                return Ok(job);
            };
            ledger::adjust_product_bucket(txn, Some(product_id), section, -1).await?;
            let mut am = job.into_active_model();
            am.status = Set(JobStatus::Scrapped.to_string());
            am.finished_at = Set(Some(Utc::now()));
            am.update(txn).await.map_err(ServiceError::db_error)
        }
        JobLabel::Completed => {
            ledger::adjust_product_bucket(txn, Some(product_id), Section::Packaging, 1).await?;
            if let Some(prev) = allowed.last().and_then(|s| bucket_of(s)) {
                if prev != Section::Packaging {
                    ledger::adjust_product_bucket(txn, Some(product_id), prev, -1).await?;
                }
            }
            let mut am = job.into_active_model();
            am.status = Set(JobStatus::Completed.to_string());
            am.finished_at = Set(Some(Utc::now()));
            am.update(txn).await.map_err(ServiceError::db_error)
        }
        _ => Ok(job),
    }
}

// ---------------------------------------------------------------------------
// History and rewind
// ---------------------------------------------------------------------------

/// Ordered log rows paired with the section that was current when each was
/// applied, reconstructed by a forward fold.
pub async fn log_history<C: ConnectionTrait>(
    conn: &C,
    job_id: Uuid,
) -> Result<Vec<(production_log::Model, Option<Section>)>, ServiceError> {
    let logs = production_log::Entity::find()
        .filter(production_log::Column::JobId.eq(job_id))
        .order_by_asc(production_log::Column::LoggedAt)
        .order_by_asc(production_log::Column::Id)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let mut contexts = Vec::with_capacity(logs.len());
    let mut prev_section: Option<Section> = None;
    for log in logs {
        let section = log.section();
        contexts.push((log, prev_section));
        prev_section = section;
    }
    Ok(contexts)
}

/// The contiguous count of flow sections already logged, i.e. the index of
/// the next expected section.
pub async fn progress_cursor<C: ConnectionTrait>(
    conn: &C,
    job_id: Uuid,
    ordered_flow: &[Section],
) -> Result<usize, ServiceError> {
    let logged: HashSet<String> = production_log::Entity::find()
        .filter(production_log::Column::JobId.eq(job_id))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .map(|log| log.section)
        .collect();

    let mut cursor = 0;
    for section in ordered_flow {
        if logged.contains(section.as_str()) {
            cursor += 1;
        } else {
            break;
        }
    }
    Ok(cursor)
}

/// Roll back the logs of `ordered_flow[target_cursor..current_cursor]`,
/// newest first, and report the section the cursor lands on. The caller
/// persists the new cursor on the job.
pub async fn rewind_job_progress<C: ConnectionTrait>(
    conn: &C,
    job: &production_job::Model,
    ordered_flow: &[Section],
    target_cursor: usize,
    current_cursor: usize,
) -> Result<(u64, Option<Section>), ServiceError> {
    if ordered_flow.is_empty() {
        return Ok((0, job.current_section()));
    }

    let target_cursor = target_cursor.min(ordered_flow.len());
    let current_cursor = current_cursor.clamp(target_cursor, ordered_flow.len());

    let new_current = if target_cursor > 0 {
        Some(ordered_flow[target_cursor - 1])
    } else {
        None
    };

    let mut slice_set: HashSet<Section> = ordered_flow[target_cursor..current_cursor]
        .iter()
        .copied()
        .collect();
    if slice_set.is_empty() {
        return Ok((0, new_current));
    }

    let mut removed = 0u64;
    let contexts = log_history(conn, job.id).await?;
    for (log, prev_section) in contexts.iter().rev() {
        let Some(section) = log.section() else {
            continue;
        };
        if slice_set.contains(&section) {
            ledger::rollback(conn, log, *prev_section).await?;
            production_log::Entity::delete_by_id(log.id)
                .exec(conn)
                .await
                .map_err(ServiceError::db_error)?;
            removed += 1;
            slice_set.remove(&section);
            if slice_set.is_empty() {
                break;
            }
        }
    }

    Ok((removed, new_current))
}
