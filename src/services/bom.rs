//! BOM resolution for products.
//!
//! The parts BOM usually comes from the normalized `product_components`
//! rows, but movement submissions may carry an ad-hoc component list that
//! overrides the stored BOM for that resolution. The materials BOM has no
//! override path.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::QuerySelect;
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::{material, part, product, product_component, product_material};
use crate::errors::ServiceError;
use crate::flow::contains_mdf_page_material;

/// A parts-BOM line resolved to a concrete part row.
#[derive(Debug, Clone)]
pub struct ResolvedComponent {
    pub part: part::Model,
    pub qty: i32,
}

/// A materials-BOM line resolved to a concrete material row.
#[derive(Debug, Clone)]
pub struct ResolvedMaterial {
    pub material: material::Model,
    pub qty: Decimal,
}

/// Ad-hoc component entry supplied by a caller, overriding the stored BOM.
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentOverride {
    pub part_id: Option<Uuid>,
    #[serde(default)]
    pub part_name: String,
    pub qty: i32,
}

fn lock_on_pg<E: EntityTrait>(conn_backend: sea_orm::DbBackend, query: Select<E>) -> Select<E> {
    if conn_backend == sea_orm::DbBackend::Postgres {
        query.lock_exclusive()
    } else {
        query
    }
}

/// Resolve one override entry to a part row: by id, else by (name, the
/// product's model), else by name alone. Unresolvable entries yield None.
async fn resolve_override_part<C: ConnectionTrait>(
    conn: &C,
    product: &product::Model,
    entry: &ComponentOverride,
) -> Result<Option<part::Model>, ServiceError> {
    let backend = conn.get_database_backend();

    if let Some(id) = entry.part_id {
        return lock_on_pg(backend, part::Entity::find_by_id(id))
            .one(conn)
            .await
            .map_err(ServiceError::db_error);
    }

    let name = entry.part_name.trim();
    if name.is_empty() {
        return Ok(None);
    }

    let scoped = lock_on_pg(
        backend,
        part::Entity::find()
            .filter(part::Column::Name.eq(name))
            .filter(part::Column::ProductModelId.eq(product.product_model_id)),
    )
    .one(conn)
    .await
    .map_err(ServiceError::db_error)?;
    if scoped.is_some() {
        return Ok(scoped);
    }

    lock_on_pg(
        backend,
        part::Entity::find().filter(part::Column::Name.eq(name)),
    )
    .one(conn)
    .await
    .map_err(ServiceError::db_error)
}

/// Parts BOM for a product. When `overrides` is non-empty it wins over the
/// stored rows. Non-positive quantities and dangling references are skipped,
/// never errors: an incomplete BOM consumes what it can name.
pub async fn components_for<C: ConnectionTrait>(
    conn: &C,
    product: &product::Model,
    overrides: &[ComponentOverride],
) -> Result<Vec<ResolvedComponent>, ServiceError> {
    let backend = conn.get_database_backend();

    if !overrides.is_empty() {
        let mut out = Vec::new();
        for entry in overrides {
            if entry.qty <= 0 {
                continue;
            }
            if let Some(part) = resolve_override_part(conn, product, entry).await? {
                out.push(ResolvedComponent {
                    part,
                    qty: entry.qty,
                });
            }
        }
        if !out.is_empty() {
            return Ok(out);
        }
    }

    let rows = product_component::Entity::find()
        .filter(product_component::Column::ProductId.eq(product.id))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let mut out = Vec::new();
    for row in rows {
        if row.qty <= 0 {
            continue;
        }
        let part = lock_on_pg(backend, part::Entity::find_by_id(row.part_id))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?;
        if let Some(part) = part {
            out.push(ResolvedComponent { part, qty: row.qty });
        }
    }
    Ok(out)
}

/// Materials BOM for a product from the stored rows only.
pub async fn materials_for<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<Vec<ResolvedMaterial>, ServiceError> {
    let backend = conn.get_database_backend();

    let rows = product_material::Entity::find()
        .filter(product_material::Column::ProductId.eq(product_id))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let mut out = Vec::new();
    for row in rows {
        if row.qty <= Decimal::ZERO {
            continue;
        }
        let material = lock_on_pg(backend, material::Entity::find_by_id(row.material_id))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?;
        if let Some(material) = material {
            out.push(ResolvedMaterial {
                material,
                qty: row.qty,
            });
        }
    }
    Ok(out)
}

/// Whether the product's materials BOM names an MDF page material.
/// Drives the BOM-derived flow split.
pub async fn product_has_mdf_page<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<bool, ServiceError> {
    let rows = product_material::Entity::find()
        .filter(product_material::Column::ProductId.eq(product_id))
        .find_also_related(material::Entity)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(rows
        .iter()
        .filter_map(|(_, m)| m.as_ref())
        .any(|m| contains_mdf_page_material(&m.name)))
}
