use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, ConnectionTrait};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::flow::Section;

/// Immutable movement record. Written exactly once, inside the same
/// transaction as its inventory side effects; deleted only during job-level
/// rollback or rewind. The (job_id, section) unique index means a job visits
/// each section at most once; job-less part logs are exempt because NULLs
/// compare distinct.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "production_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub job_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub part_id: Option<Uuid>,
    pub section: String,
    pub produced_qty: i32,
    pub scrap_qty: i32,
    pub is_scrap: bool,
    pub is_external: bool,
    /// Snapshot of the acting user for audit.
    pub actor: String,
    pub role: String,
    /// Product-model name snapshot, free text.
    pub model_name: String,
    pub note: Option<String>,
    pub logged_at: DateTime<Utc>,
}

impl Model {
    pub fn section(&self) -> Option<Section> {
        Section::parse(&self.section)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::production_job::Entity",
        from = "Column::JobId",
        to = "super::production_job::Column::Id"
    )]
    Job,
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
}

impl Related<super::production_job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Job.def()
    }
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
            if let ActiveValue::NotSet = self.logged_at {
                self.logged_at = ActiveValue::Set(Utc::now());
            }
        }
        Ok(self)
    }
}
