//! Push feed of audit state transitions.
//!
//! Delivery is best-effort: a broadcast with no listeners, or to a listener
//! that has gone away, is not an error. Listeners that cannot keep up lose the
//! oldest events and can catch up by polling the store.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

use crate::types::{AuditRun, AuditStep, DetectedIssue};

/// Events published while a run executes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    AuditStarted {
        audit_run_id: Uuid,
        steps: Vec<AuditStep>,
    },
    StepStarted {
        audit_run_id: Uuid,
        step: AuditStep,
    },
    StepCompleted {
        audit_run_id: Uuid,
        step: AuditStep,
        percent_complete: u8,
    },
    IssueDetected {
        audit_run_id: Uuid,
        issue: DetectedIssue,
    },
    AuditCompleted {
        audit_run_id: Uuid,
        run: AuditRun,
    },
    AuditFailed {
        audit_run_id: Uuid,
        error: String,
    },
}

impl AuditEvent {
    /// Wire name of the event, matching its `type` field
    pub fn event_type(&self) -> &'static str {
        match self {
            AuditEvent::AuditStarted { .. } => "audit_started",
            AuditEvent::StepStarted { .. } => "step_started",
            AuditEvent::StepCompleted { .. } => "step_completed",
            AuditEvent::IssueDetected { .. } => "issue_detected",
            AuditEvent::AuditCompleted { .. } => "audit_completed",
            AuditEvent::AuditFailed { .. } => "audit_failed",
        }
    }

    pub fn run_id(&self) -> Uuid {
        match self {
            AuditEvent::AuditStarted { audit_run_id, .. }
            | AuditEvent::StepStarted { audit_run_id, .. }
            | AuditEvent::StepCompleted { audit_run_id, .. }
            | AuditEvent::IssueDetected { audit_run_id, .. }
            | AuditEvent::AuditCompleted { audit_run_id, .. }
            | AuditEvent::AuditFailed { audit_run_id, .. } => *audit_run_id,
        }
    }
}

/// Fan-out of audit events to every subscribed listener
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<AuditEvent>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Send to all current listeners.
    pub fn broadcast(&self, event: AuditEvent) {
        let event_type = event.event_type();
        let run_id = event.run_id();
        match self.tx.send(event) {
            Ok(listeners) => trace!(%run_id, event = event_type, listeners, "event broadcast"),
            Err(_) => trace!(%run_id, event = event_type, "event dropped, no listeners"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(256)
    }
}
