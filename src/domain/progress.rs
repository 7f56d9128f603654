//! Per-component progress and its state machine.
//!
//! ```text
//! pending -> running -> completed
//!               |
//!               +----> failed -> running (retry)
//! ```
//!
//! A `running` entry whose start is older than the stale threshold is
//! treated like a failure and may be started again.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Flat status of a component, without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Progress of a single component.
///
/// Serialized flat as `{"status": "...", "startedAt": ..., ...}` so the
/// reporting layer can read it without knowing about the variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComponentProgress {
    /// Never started
    Pending,

    /// Started and not yet finished (or abandoned by a crashed worker)
    #[serde(rename_all = "camelCase")]
    Running { started_at: DateTime<Utc> },

    /// Finished successfully
    #[serde(rename_all = "camelCase")]
    Completed {
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },

    /// Finished with an error; eligible for retry
    #[serde(rename_all = "camelCase")]
    Failed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        started_at: Option<DateTime<Utc>>,
        error: String,
    },
}

impl Default for ComponentProgress {
    fn default() -> Self {
        Self::Pending
    }
}

impl ComponentProgress {
    pub fn status(&self) -> ComponentStatus {
        match self {
            Self::Pending => ComponentStatus::Pending,
            Self::Running { .. } => ComponentStatus::Running,
            Self::Completed { .. } => ComponentStatus::Completed,
            Self::Failed { .. } => ComponentStatus::Failed,
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Pending => None,
            Self::Running { started_at } | Self::Completed { started_at, .. } => Some(*started_at),
            Self::Failed { started_at, .. } => *started_at,
        }
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Completed { completed_at, .. } => Some(*completed_at),
            _ => None,
        }
    }

    /// Error message, present only for failed components
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// True for a running entry started more than `threshold` before `now`
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        match self {
            Self::Running { started_at } => match (now - *started_at).to_std() {
                Ok(elapsed) => elapsed > threshold,
                // Started in the future (clock skew): not stale
                Err(_) => false,
            },
            _ => false,
        }
    }

    /// Whether this component should be executed on the next pass
    pub fn needs_execution(&self, now: DateTime<Utc>, stale_threshold: Duration) -> bool {
        match self {
            Self::Pending | Self::Failed { .. } => true,
            Self::Running { .. } => self.is_stale(now, stale_threshold),
            Self::Completed { .. } => false,
        }
    }

    /// Transition to `running`.
    ///
    /// Allowed from pending, failed, and running (restart of a stale entry).
    pub fn start(&self, now: DateTime<Utc>) -> Result<Self, TransitionError> {
        match self {
            Self::Completed { .. } => Err(TransitionError {
                from: self.status(),
                to: ComponentStatus::Running,
            }),
            _ => Ok(Self::Running { started_at: now }),
        }
    }

    /// Transition `running -> completed`
    pub fn complete(&self, now: DateTime<Utc>) -> Result<Self, TransitionError> {
        match self {
            Self::Running { started_at } => Ok(Self::Completed {
                started_at: *started_at,
                completed_at: now,
            }),
            _ => Err(TransitionError {
                from: self.status(),
                to: ComponentStatus::Completed,
            }),
        }
    }

    /// Transition `running -> failed`
    pub fn fail(&self, error: impl Into<String>) -> Result<Self, TransitionError> {
        match self {
            Self::Running { started_at } => Ok(Self::Failed {
                started_at: Some(*started_at),
                error: error.into(),
            }),
            _ => Err(TransitionError {
                from: self.status(),
                to: ComponentStatus::Failed,
            }),
        }
    }
}

/// A progress change the state machine does not allow
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid component transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: ComponentStatus,
    pub to: ComponentStatus,
}
