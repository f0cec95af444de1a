//! Audit step records and their lifecycle.
//!
//! A step moves along `pending -> running -> {success | failed}` exactly once.
//! The transition methods refuse anything else so a store can never observe
//! a step re-entering `running`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Status of a single audit step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Created with its run, not started yet
    #[default]
    Pending,
    /// Currently executing
    Running,
    /// Finished and every command succeeded
    Success,
    /// Finished with a nonzero exit, a timeout or a scan finding
    Failed,
}

impl StepStatus {
    /// Success and failed are terminal; nothing follows them.
    pub fn is_terminal(self) -> bool {
        matches!(self, StepStatus::Success | StepStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected step lifecycle transition
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("step '{name}' cannot move from {from} to {to}")]
pub struct TransitionError {
    pub name: String,
    pub from: StepStatus,
    pub to: StepStatus,
}

/// One named unit of work within an audit run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditStep {
    pub id: Uuid,
    /// Owning run
    pub run_id: Uuid,
    /// 1-based position in the step registry
    pub order: u32,
    pub name: String,
    pub status: StepStatus,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl AuditStep {
    pub fn new(run_id: Uuid, order: u32, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            order,
            name: name.into(),
            status: StepStatus::Pending,
            output: None,
            error_message: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn reject(&self, to: StepStatus) -> TransitionError {
        TransitionError {
            name: self.name.clone(),
            from: self.status,
            to,
        }
    }

    /// Move `pending -> running`.
    pub fn start(&mut self, at: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status != StepStatus::Pending {
            return Err(self.reject(StepStatus::Running));
        }
        self.status = StepStatus::Running;
        self.started_at = Some(at);
        Ok(())
    }

    /// Move `running -> success | failed`.
    ///
    /// On failure the output doubles as the error message.
    pub fn finish(
        &mut self,
        success: bool,
        output: String,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        let to = if success {
            StepStatus::Success
        } else {
            StepStatus::Failed
        };
        if self.status != StepStatus::Running {
            return Err(self.reject(to));
        }
        self.status = to;
        self.error_message = if success { None } else { Some(output.clone()) };
        self.output = Some(output);
        self.completed_at = Some(at);
        Ok(())
    }
}
