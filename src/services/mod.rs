pub mod bom;
pub mod jobs;
pub mod ledger;
pub mod maintenance;
pub mod reports;

use crate::errors::ServiceError;
use sea_orm::TransactionError;

/// Flatten sea-orm's transaction error wrapper back into our error type.
pub(crate) fn map_txn_err(err: TransactionError<ServiceError>) -> ServiceError {
    match err {
        TransactionError::Connection(e) => ServiceError::DatabaseError(e),
        TransactionError::Transaction(e) => e,
    }
}
