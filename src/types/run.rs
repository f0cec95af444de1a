//! Audit run records and derived progress.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::issue::DetectedIssue;
use super::step::{AuditStep, StepStatus};

/// Status of an audit run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Created, waiting for the run lock
    #[default]
    Pending,
    /// Steps are executing
    Running,
    /// Every step reached a terminal status
    Completed,
    /// The controller itself faulted; remaining steps were skipped
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One invocation of the full step sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRun {
    pub id: Uuid,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Opaque summary attached when the run completes
    #[serde(default)]
    pub results: Option<serde_json::Value>,
    /// Controller fault that failed the run
    #[serde(default)]
    pub error: Option<String>,
}

impl AuditRun {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            status: RunStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            results: None,
            error: None,
        }
    }
}

impl Default for AuditRun {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of how far a run has progressed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditProgress {
    pub steps: Vec<AuditStep>,
    /// `floor(terminal * 100 / total)`
    pub percent_complete: u8,
    pub is_complete: bool,
}

impl AuditProgress {
    pub fn from_steps(steps: Vec<AuditStep>) -> Self {
        let total = steps.len();
        let terminal = steps.iter().filter(|s| s.is_terminal()).count();
        let percent_complete = if total == 0 {
            0
        } else {
            (terminal * 100 / total) as u8
        };

        Self {
            steps,
            percent_complete,
            is_complete: terminal == total,
        }
    }

    pub fn completed_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.is_terminal()).count()
    }

    pub fn failed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
            .count()
    }
}

/// A run with everything recorded against it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDetails {
    pub run: AuditRun,
    pub steps: Vec<AuditStep>,
    pub issues: Vec<DetectedIssue>,
}
