use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, ConnectionTrait, FromJsonQueryResult};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::flow::{self, FlowInputs, Section};

/// Operational status of a job. `repaired` is reachable only from
/// `warranty` on closure; every other closure lands on `completed` or
/// `scrapped`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    #[default]
    InProgress,
    Completed,
    Scrapped,
    Warranty,
    Repaired,
    Deposit,
}

/// User-chosen tag, same vocabulary as `JobStatus` but deliberately kept as
/// a separate field: a deposit job stays labeled deposit while its status
/// tracks the work; the ledger only ever promotes `in_progress` →
/// `completed` or forces `scrapped`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobLabel {
    #[default]
    InProgress,
    Completed,
    Scrapped,
    Warranty,
    Repaired,
    Deposit,
}

/// JSON-persisted ordered subset of section slugs chosen at job creation.
/// Empty means "use the default BOM-derived flow".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, Default)]
pub struct SectionList(pub Vec<String>);

/// A numbered unit moving through the production process: either one
/// physical product instance or a loose part lot.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "production_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub job_number: String,
    pub product_id: Option<Uuid>,
    pub part_id: Option<Uuid>,
    pub current_section: Option<String>,
    pub status: String,
    pub job_label: String,
    pub deposit_account: Option<String>,
    pub is_external_entry: bool,
    #[sea_orm(column_type = "Json")]
    pub allowed_sections: SectionList,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn status(&self) -> JobStatus {
        self.status.parse().unwrap_or_default()
    }

    pub fn label(&self) -> JobLabel {
        self.job_label.parse().unwrap_or_default()
    }

    pub fn current_section(&self) -> Option<Section> {
        self.current_section.as_deref().and_then(Section::parse)
    }

    /// True until the first movement is logged.
    pub fn is_first_entry(&self) -> bool {
        self.current_section().is_none()
    }

    /// The job's ordered flow. `has_mdf_page` is only consulted when the
    /// allowed-section list is empty (BOM-derived flow).
    pub fn flow(&self, has_mdf_page: bool) -> Vec<Section> {
        flow::flow_for(FlowInputs {
            has_part: self.part_id.is_some(),
            has_product: self.product_id.is_some(),
            allowed_sections: &self.allowed_sections.0,
            has_mdf_page,
        })
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::part::Entity",
        from = "Column::PartId",
        to = "super::part::Column::Id"
    )]
    Part,
    #[sea_orm(has_many = "super::production_log::Entity")]
    Logs,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::part::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Part.def()
    }
}

impl Related<super::production_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Logs.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if insert {
            if let ActiveValue::NotSet = self.id {
                self.id = ActiveValue::Set(Uuid::new_v4());
            }
            if let ActiveValue::NotSet = self.created_at {
                self.created_at = ActiveValue::Set(Utc::now());
            }
            if let ActiveValue::NotSet = self.status {
                self.status = ActiveValue::Set(JobStatus::InProgress.to_string());
            }
            if let ActiveValue::NotSet = self.job_label {
                self.job_label = ActiveValue::Set(JobLabel::InProgress.to_string());
            }
            if let ActiveValue::NotSet = self.allowed_sections {
                self.allowed_sections = ActiveValue::Set(SectionList::default());
            }
            if let ActiveValue::NotSet = self.is_external_entry {
                self.is_external_entry = ActiveValue::Set(false);
            }
        }
        Ok(self)
    }
}
