use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

/// Events emitted by the production services. Consumers (notification fanout,
/// dashboards) subscribe to the receiving end of the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Movement events
    MovementLogged {
        log_id: Uuid,
        job_id: Option<Uuid>,
        section: String,
    },
    // Job lifecycle events
    JobCreated(Uuid),
    JobCompleted(Uuid),
    JobScrapped(Uuid),
    JobDeleted {
        job_id: Uuid,
        logs_removed: u64,
    },
    JobRewound {
        job_id: Uuid,
        logs_removed: u64,
        new_current_section: Option<String>,
    },
    // Maintenance events
    LogsPurged {
        logs_removed: u64,
        counters_zeroed: bool,
    },
    StocksRebuilt {
        logs_replayed: u64,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging rather than failing when nobody is listening.
    /// Inventory mutations must not be rolled back because a side channel is
    /// down.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event.clone()).await {
            warn!(error = %e, ?event, "event channel closed; dropping event");
        }
    }
}

/// Convenience constructor for tests and the default wiring in `main`.
pub fn channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}
