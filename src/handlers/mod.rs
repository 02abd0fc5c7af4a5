pub mod health;
pub mod jobs;
pub mod maintenance;
pub mod movements;

use std::sync::Arc;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::jobs::JobService;
use crate::services::maintenance::MaintenanceService;
use crate::services::reports::ReportService;

/// Service container wired once at startup and cloned into the router state.
#[derive(Clone)]
pub struct AppServices {
    pub jobs: Arc<JobService>,
    pub maintenance: Arc<MaintenanceService>,
    pub reports: Arc<ReportService>,
}

impl AppServices {
    pub fn build(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            jobs: Arc::new(JobService::new(db.clone(), event_sender.clone())),
            maintenance: Arc::new(MaintenanceService::new(db.clone(), event_sender)),
            reports: Arc::new(ReportService::new(db)),
        }
    }
}
