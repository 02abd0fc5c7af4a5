use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Key/value application settings. Holds singleton references such as the
/// current default job id, replacing a denormalized per-row boolean flag.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "app_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    pub value: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Setting key for the job pre-selected in the quick work-entry form.
pub const DEFAULT_JOB_KEY: &str = "default_job_id";
