//! Derived reads over the ledger. Nothing here mutates stock.

use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{product, production_log};
use crate::errors::ServiceError;
use crate::flow::Section;
use crate::services::bom;

#[derive(Debug, Serialize)]
pub struct ComponentConsumption {
    pub part_id: Uuid,
    pub name: String,
    pub qty: i64,
}

#[derive(Debug, Serialize)]
pub struct MaterialConsumption {
    pub material_id: Uuid,
    pub name: String,
    pub qty: Decimal,
    pub unit: Option<String>,
}

/// What a job's assembly movements consumed, derived from the BOM.
#[derive(Debug, Serialize)]
pub struct JobConsumption {
    pub job_id: Uuid,
    pub components: Vec<ComponentConsumption>,
    pub materials: Vec<MaterialConsumption>,
}

#[derive(Clone)]
pub struct ReportService {
    db: Arc<DbPool>,
}

impl ReportService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// BOM-derived consumption of a job's non-external assembly logs
    /// (at most one by the per-section uniqueness rule). External assembly
    /// entries never consumed anything and are excluded.
    pub async fn consumption_for_job(&self, job_id: Uuid) -> Result<JobConsumption, ServiceError> {
        let db = self.db.as_ref();

        let logs = production_log::Entity::find()
            .filter(production_log::Column::JobId.eq(job_id))
            .filter(production_log::Column::Section.eq(Section::Assembly.as_str()))
            .filter(production_log::Column::IsExternal.eq(false))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut components: Vec<ComponentConsumption> = Vec::new();
        let mut materials: Vec<MaterialConsumption> = Vec::new();

        for log in &logs {
            let Some(product_id) = log.product_id else {
                continue;
            };
            let Some(product) = product::Entity::find_by_id(product_id)
                .one(db)
                .await
                .map_err(ServiceError::db_error)?
            else {
                continue;
            };

            for line in bom::components_for(db, &product, &[]).await? {
                match components.iter_mut().find(|c| c.part_id == line.part.id) {
                    Some(entry) => entry.qty += line.qty as i64,
                    None => components.push(ComponentConsumption {
                        part_id: line.part.id,
                        name: line.part.name,
                        qty: line.qty as i64,
                    }),
                }
            }
            for line in bom::materials_for(db, product_id).await? {
                match materials
                    .iter_mut()
                    .find(|m| m.material_id == line.material.id)
                {
                    Some(entry) => entry.qty += line.qty,
                    None => materials.push(MaterialConsumption {
                        material_id: line.material.id,
                        name: line.material.name,
                        qty: line.qty,
                        unit: line.material.unit,
                    }),
                }
            }
        }

        Ok(JobConsumption {
            job_id,
            components,
            materials,
        })
    }
}
