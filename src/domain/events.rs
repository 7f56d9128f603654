//! Component transition events.
//!
//! Every progress change is also appended to a per-audit log. The log is
//! diagnostic only: pipeline state is the source of truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::component::ComponentKey;
use super::progress::ComponentStatus;

/// A single component transition in the append-only log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When the transition happened (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// The audit this event belongs to
    pub audit_id: Uuid,

    pub component: ComponentKey,

    pub from: ComponentStatus,
    pub to: ComponentStatus,

    /// Time spent running, for completed and failed transitions
    pub duration_ms: Option<u64>,

    /// Error message if the component failed
    pub error: Option<String>,

    /// Short human summary (NO payload data)
    pub summary: String,
}

impl TransitionEvent {
    pub fn new(
        audit_id: Uuid,
        component: ComponentKey,
        from: ComponentStatus,
        to: ComponentStatus,
        timestamp: DateTime<Utc>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            audit_id,
            component,
            from,
            to,
            duration_ms: None,
            error: None,
            summary: summary.into(),
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }
}
