//! Storage for runs, steps and detected issues.
//!
//! The controller is the only writer. Updates replace a whole record at once,
//! so readers see either the previous or the next version of a step, never a
//! mix.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::types::{AuditRun, AuditStep, DetectedIssue};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("{kind} '{id}' already exists")]
    Duplicate { kind: &'static str, id: Uuid },

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    fn run_not_found(id: Uuid) -> Self {
        StoreError::NotFound { kind: "audit run", id }
    }

    fn step_not_found(id: Uuid) -> Self {
        StoreError::NotFound { kind: "audit step", id }
    }

    fn issue_not_found(id: Uuid) -> Self {
        StoreError::NotFound { kind: "issue", id }
    }
}

/// Run, step and issue records.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn create_run(&self, run: AuditRun) -> Result<AuditRun, StoreError>;
    async fn get_run(&self, id: Uuid) -> Result<AuditRun, StoreError>;
    /// All runs, newest first
    async fn list_runs(&self) -> Result<Vec<AuditRun>, StoreError>;
    async fn update_run(&self, run: AuditRun) -> Result<AuditRun, StoreError>;

    /// Fails with `NotFound` if the owning run does not exist
    async fn create_step(&self, step: AuditStep) -> Result<AuditStep, StoreError>;
    async fn get_step(&self, id: Uuid) -> Result<AuditStep, StoreError>;
    /// Steps of a run ordered by step order
    async fn steps_for_run(&self, run_id: Uuid) -> Result<Vec<AuditStep>, StoreError>;
    async fn update_step(&self, step: AuditStep) -> Result<AuditStep, StoreError>;

    async fn create_issue(&self, issue: DetectedIssue) -> Result<DetectedIssue, StoreError>;
    async fn get_issue(&self, id: Uuid) -> Result<DetectedIssue, StoreError>;
    /// Issues of a run, most severe first
    async fn issues_for_run(&self, run_id: Uuid) -> Result<Vec<DetectedIssue>, StoreError>;
    async fn all_issues(&self) -> Result<Vec<DetectedIssue>, StoreError>;
    /// Flip the resolved flag in place and return the updated issue
    async fn set_issue_resolved(
        &self,
        id: Uuid,
        resolved: bool,
    ) -> Result<DetectedIssue, StoreError>;
}

#[derive(Default)]
struct Tables {
    runs: HashMap<Uuid, AuditRun>,
    /// Insertion order, breaks ties between runs started in the same instant
    run_order: Vec<Uuid>,
    steps: HashMap<Uuid, AuditStep>,
    issues: HashMap<Uuid, DetectedIssue>,
}

/// Process-lifetime store backed by hash maps
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_issues(issues: &mut [DetectedIssue]) {
    issues.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn create_run(&self, run: AuditRun) -> Result<AuditRun, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.runs.contains_key(&run.id) {
            return Err(StoreError::Duplicate {
                kind: "audit run",
                id: run.id,
            });
        }
        tables.run_order.push(run.id);
        tables.runs.insert(run.id, run.clone());
        Ok(run)
    }

    async fn get_run(&self, id: Uuid) -> Result<AuditRun, StoreError> {
        let tables = self.tables.read().await;
        tables
            .runs
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::run_not_found(id))
    }

    async fn list_runs(&self) -> Result<Vec<AuditRun>, StoreError> {
        let tables = self.tables.read().await;
        let mut runs: Vec<AuditRun> = tables
            .run_order
            .iter()
            .rev()
            .filter_map(|id| tables.runs.get(id).cloned())
            .collect();
        // Stable sort keeps reverse insertion order for equal timestamps
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }

    async fn update_run(&self, run: AuditRun) -> Result<AuditRun, StoreError> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .runs
            .get_mut(&run.id)
            .ok_or_else(|| StoreError::run_not_found(run.id))?;
        *slot = run.clone();
        Ok(run)
    }

    async fn create_step(&self, step: AuditStep) -> Result<AuditStep, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.runs.contains_key(&step.run_id) {
            return Err(StoreError::run_not_found(step.run_id));
        }
        if tables.steps.contains_key(&step.id) {
            return Err(StoreError::Duplicate {
                kind: "audit step",
                id: step.id,
            });
        }
        tables.steps.insert(step.id, step.clone());
        Ok(step)
    }

    async fn get_step(&self, id: Uuid) -> Result<AuditStep, StoreError> {
        let tables = self.tables.read().await;
        tables
            .steps
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::step_not_found(id))
    }

    async fn steps_for_run(&self, run_id: Uuid) -> Result<Vec<AuditStep>, StoreError> {
        let tables = self.tables.read().await;
        let mut steps: Vec<AuditStep> = tables
            .steps
            .values()
            .filter(|s| s.run_id == run_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.order);
        Ok(steps)
    }

    async fn update_step(&self, step: AuditStep) -> Result<AuditStep, StoreError> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .steps
            .get_mut(&step.id)
            .ok_or_else(|| StoreError::step_not_found(step.id))?;
        *slot = step.clone();
        Ok(step)
    }

    async fn create_issue(&self, issue: DetectedIssue) -> Result<DetectedIssue, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.runs.contains_key(&issue.run_id) {
            return Err(StoreError::run_not_found(issue.run_id));
        }
        tables.issues.insert(issue.id, issue.clone());
        Ok(issue)
    }

    async fn get_issue(&self, id: Uuid) -> Result<DetectedIssue, StoreError> {
        let tables = self.tables.read().await;
        tables
            .issues
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::issue_not_found(id))
    }

    async fn issues_for_run(&self, run_id: Uuid) -> Result<Vec<DetectedIssue>, StoreError> {
        let tables = self.tables.read().await;
        let mut issues: Vec<DetectedIssue> = tables
            .issues
            .values()
            .filter(|i| i.run_id == run_id)
            .cloned()
            .collect();
        sort_issues(&mut issues);
        Ok(issues)
    }

    async fn all_issues(&self) -> Result<Vec<DetectedIssue>, StoreError> {
        let tables = self.tables.read().await;
        let mut issues: Vec<DetectedIssue> = tables.issues.values().cloned().collect();
        issues.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(issues)
    }

    async fn set_issue_resolved(
        &self,
        id: Uuid,
        resolved: bool,
    ) -> Result<DetectedIssue, StoreError> {
        let mut tables = self.tables.write().await;
        let issue = tables
            .issues
            .get_mut(&id)
            .ok_or_else(|| StoreError::issue_not_found(id))?;
        issue.is_resolved = resolved;
        Ok(issue.clone())
    }
}
