use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publishes after a commit. Delivery failures are logged and swallowed.
    pub async fn send_or_log(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event).await {
            counter!("consignment_events.dropped", 1);
            warn!(event = name, error = %e, "event could not be published");
        }
    }
}

/// Domain events published once the owning transaction has committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    ConsignmentCreated {
        consignment_id: Uuid,
        created_by: Uuid,
    },
    ConsignmentStepCompleted {
        consignment_id: Uuid,
        step: i32,
    },
    ConsignmentSubmitted {
        consignment_id: Uuid,
        submitted_by: Uuid,
    },
    ConsignmentApproved {
        consignment_id: Uuid,
        approved_by: Uuid,
    },
    ConsignmentRejected {
        consignment_id: Uuid,
        rejected_by: Uuid,
        reason: String,
    },
    ConsignmentCancelled {
        consignment_id: Uuid,
        cancelled_by: Uuid,
    },
    AllocationChanged {
        consignment_id: Uuid,
        po_line_id: Uuid,
        packaging_id: Uuid,
        allocated_qty: i32,
    },
    ConsoleCreated {
        console_id: Uuid,
        consignment_ids: Vec<Uuid>,
    },
    ConsoleMembershipChanged {
        console_id: Uuid,
        added: Vec<Uuid>,
        removed: Vec<Uuid>,
    },
    ConsoleCancelled {
        console_id: Uuid,
    },
    FreightForwarderAssigned {
        console_id: Uuid,
        freight_forwarder_id: Uuid,
        pickup_datetime: DateTime<Utc>,
    },
    PickupRejected {
        console_id: Uuid,
        reason: String,
    },
    DocumentGenerated {
        entity_id: Uuid,
        document: String,
        generated_by: Uuid,
    },
    DraftsPurged {
        count: usize,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::ConsignmentCreated { .. } => "consignment_created",
            Event::ConsignmentStepCompleted { .. } => "consignment_step_completed",
            Event::ConsignmentSubmitted { .. } => "consignment_submitted",
            Event::ConsignmentApproved { .. } => "consignment_approved",
            Event::ConsignmentRejected { .. } => "consignment_rejected",
            Event::ConsignmentCancelled { .. } => "consignment_cancelled",
            Event::AllocationChanged { .. } => "allocation_changed",
            Event::ConsoleCreated { .. } => "console_created",
            Event::ConsoleMembershipChanged { .. } => "console_membership_changed",
            Event::ConsoleCancelled { .. } => "console_cancelled",
            Event::FreightForwarderAssigned { .. } => "freight_forwarder_assigned",
            Event::PickupRejected { .. } => "pickup_rejected",
            Event::DocumentGenerated { .. } => "document_generated",
            Event::DraftsPurged { .. } => "drafts_purged",
        }
    }

    /// Whether the event warrants a user-facing notification.
    pub fn is_notifiable(&self) -> bool {
        matches!(
            self,
            Event::ConsignmentSubmitted { .. }
                | Event::ConsignmentApproved { .. }
                | Event::ConsignmentRejected { .. }
                | Event::FreightForwarderAssigned { .. }
                | Event::PickupRejected { .. }
        )
    }
}

/// Outbound notification delivery (mail, chat, push). Implementations live outside the core.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &Event) -> Result<(), String>;
}

/// Notifier that only writes a log line; used when no delivery channel is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &Event) -> Result<(), String> {
        let payload = serde_json::to_string(event).map_err(|e| e.to_string())?;
        info!(event = event.name(), %payload, "notification");
        Ok(())
    }
}

pub async fn process_events(mut rx: mpsc::Receiver<Event>, notifier: Arc<dyn Notifier>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        counter!("consignment_events.received", 1);
        info!(event = event.name(), "Received event: {:?}", event);

        if event.is_notifiable() {
            if let Err(e) = notifier.notify(&event).await {
                counter!("consignment_events.notify_failed", 1);
                error!(event = event.name(), error = %e, "Failed to deliver notification");
            }
        }
    }

    info!("Event channel closed; stopping event processing loop");
}
