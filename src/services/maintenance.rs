//! Destructive maintenance operations behind the admin screen: purging the
//! movement ledger and rebuilding stock counters from it.

use std::sync::Arc;

use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{QueryOrder, TransactionTrait};
use tracing::{info, instrument, warn};

use crate::db::DbPool;
use crate::entities::{material, part, product_stock, production_job, production_log};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::{ledger, map_txn_err};

#[derive(Clone)]
pub struct MaintenanceService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl MaintenanceService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Delete every movement log, leaving all counters as they are.
    #[instrument(skip(self))]
    pub async fn purge_logs(&self) -> Result<u64, ServiceError> {
        let result = production_log::Entity::delete_many()
            .exec(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        warn!(logs_removed = result.rows_affected, "movement ledger purged");
        self.event_sender
            .send_or_log(Event::LogsPurged {
                logs_removed: result.rows_affected,
                counters_zeroed: false,
            })
            .await;
        Ok(result.rows_affected)
    }

    /// Delete every movement log and zero the part buckets, all seven
    /// product buckets, and material quantities.
    #[instrument(skip(self))]
    pub async fn purge_logs_and_zero(&self) -> Result<u64, ServiceError> {
        let removed = self
            .db
            .transaction::<_, u64, ServiceError>(|txn| {
                Box::pin(async move {
                    let result = production_log::Entity::delete_many()
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    zero_part_buckets(txn).await?;
                    zero_product_buckets(txn).await?;
                    material::Entity::update_many()
                        .col_expr(material::Column::Quantity, Expr::value(Decimal::ZERO))
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    Ok(result.rows_affected)
                })
            })
            .await
            .map_err(map_txn_err)?;

        warn!(logs_removed = removed, "ledger purged and counters zeroed");
        self.event_sender
            .send_or_log(Event::LogsPurged {
                logs_removed: removed,
                counters_zeroed: true,
            })
            .await;
        Ok(removed)
    }

    /// Zero every log-driven counter and replay the full ledger in
    /// (logged_at, id) order. Job cursors are reset first so each job's
    /// first log replays as a first entry again. Material quantities are
    /// left alone: they are not log-sourced, so replaying their consumption
    /// would double-debit them. A shortfall during replay aborts the whole
    /// rebuild.
    #[instrument(skip(self))]
    pub async fn rebuild_stocks(&self) -> Result<u64, ServiceError> {
        let replayed = self
            .db
            .transaction::<_, u64, ServiceError>(|txn| {
                Box::pin(async move {
                    zero_part_buckets(txn).await?;
                    zero_product_buckets(txn).await?;

                    production_job::Entity::update_many()
                        .col_expr(
                            production_job::Column::CurrentSection,
                            Expr::value(Option::<String>::None),
                        )
                        .col_expr(production_job::Column::IsExternalEntry, Expr::value(false))
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    let logs = production_log::Entity::find()
                        .order_by_asc(production_log::Column::LoggedAt)
                        .order_by_asc(production_log::Column::Id)
                        .all(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    let mut replayed = 0u64;
                    for log in &logs {
                        ledger::replay(txn, log).await?;
                        replayed += 1;
                    }
                    Ok(replayed)
                })
            })
            .await
            .map_err(map_txn_err)?;

        info!(logs_replayed = replayed, "stock counters rebuilt from ledger");
        self.event_sender
            .send_or_log(Event::StocksRebuilt {
                logs_replayed: replayed,
            })
            .await;
        Ok(replayed)
    }
}

async fn zero_part_buckets<C: ConnectionTrait>(txn: &C) -> Result<(), ServiceError> {
    part::Entity::update_many()
        .col_expr(part::Column::StockCut, Expr::value(0))
        .col_expr(part::Column::StockCncTools, Expr::value(0))
        .exec(txn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(())
}

async fn zero_product_buckets<C: ConnectionTrait>(txn: &C) -> Result<(), ServiceError> {
    product_stock::Entity::update_many()
        .col_expr(product_stock::Column::StockWorkpage, Expr::value(0))
        .col_expr(product_stock::Column::StockUndercoating, Expr::value(0))
        .col_expr(product_stock::Column::StockPainting, Expr::value(0))
        .col_expr(product_stock::Column::StockSewing, Expr::value(0))
        .col_expr(product_stock::Column::StockUpholstery, Expr::value(0))
        .col_expr(product_stock::Column::StockAssembly, Expr::value(0))
        .col_expr(product_stock::Column::StockPackaging, Expr::value(0))
        .exec(txn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(())
}
