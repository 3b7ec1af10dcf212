//! Event types for the Kobu event system
//!
//! Write operations emit a [`KobuEvent`] on the [`EventBus`]; the server
//! streams them to open dashboards over SSE so cards refresh without polling.

use crate::db::models::{AssetStatus, ValidationStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Kind of report a review applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Visit,
    Payment,
}

/// Kobu event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum KobuEvent {
    /// A case was registered
    AssetCreated {
        asset_id: Uuid,
        account_number: String,
        timestamp: DateTime<Utc>,
    },

    /// A batch of cases moved to a collector
    AssetsAssigned {
        collector_id: Uuid,
        asset_ids: Vec<Uuid>,
        auto_selected: bool,
        timestamp: DateTime<Utc>,
    },

    /// A case lost its collector
    AssetUnassigned {
        asset_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A collector submitted a visit report
    VisitReported {
        report_id: Uuid,
        asset_id: Uuid,
        collector_id: Uuid,
        flag_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A collector submitted a payment report
    PaymentReported {
        report_id: Uuid,
        asset_id: Uuid,
        collector_id: Uuid,
        amount_cents: i64,
        timestamp: DateTime<Utc>,
    },

    /// An administrator approved or rejected a report
    ReportReviewed {
        kind: ReportKind,
        report_id: Uuid,
        asset_id: Uuid,
        validation: ValidationStatus,
        asset_status: AssetStatus,
        timestamp: DateTime<Utc>,
    },

    /// Approved payments covered a case's balance
    AssetSettled {
        asset_id: Uuid,
        collected_cents: i64,
        timestamp: DateTime<Utc>,
    },
}

impl KobuEvent {
    /// Get event type as string for SSE event names
    pub fn event_type(&self) -> &str {
        match self {
            KobuEvent::AssetCreated { .. } => "AssetCreated",
            KobuEvent::AssetsAssigned { .. } => "AssetsAssigned",
            KobuEvent::AssetUnassigned { .. } => "AssetUnassigned",
            KobuEvent::VisitReported { .. } => "VisitReported",
            KobuEvent::PaymentReported { .. } => "PaymentReported",
            KobuEvent::ReportReviewed { .. } => "ReportReviewed",
            KobuEvent::AssetSettled { .. } => "AssetSettled",
        }
    }

    /// Collector the event concerns, if any (used to filter collector streams)
    pub fn collector_id(&self) -> Option<Uuid> {
        match self {
            KobuEvent::AssetsAssigned { collector_id, .. }
            | KobuEvent::VisitReported { collector_id, .. }
            | KobuEvent::PaymentReported { collector_id, .. } => Some(*collector_id),
            _ => None,
        }
    }
}

/// Broadcast bus for [`KobuEvent`]s
pub struct EventBus {
    tx: broadcast::Sender<KobuEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers that fall more than `capacity` events behind skip
    /// ahead and miss the oldest events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<KobuEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: KobuEvent,
    ) -> Result<usize, broadcast::error::SendError<KobuEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Dashboards are the only consumers, so a missing listener is normal.
    pub fn emit_lossy(&self, event: KobuEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
