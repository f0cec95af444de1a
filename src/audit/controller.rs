//! Run controller: creates audit runs and drives their steps in order.
//!
//! `start_run` records the run and its pending steps, then hands execution to
//! a worker task and returns. Runs are serialized: every step shells out in
//! the same project directory, so a second run waits in `pending` until the
//! first one finishes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::actions::{ScanPaths, StepActions, StepExecutor};
use super::error::ControllerError;
use super::executor::SystemCommandRunner;
use super::notifier::{AuditEvent, Notifier};
use super::registry::AuditStepKind;
use super::store::{AuditStore, MemoryStore};
use crate::config::Config;
use crate::types::{
    AuditProgress, AuditRun, AuditStep, DetectedIssue, RunDetails, RunStatus, StepStatus,
};

/// Final result of a run's worker, `None` while it is still executing
type Outcome = Option<Result<(), ControllerError>>;

#[derive(Clone)]
pub struct AuditController {
    store: Arc<dyn AuditStore>,
    notifier: Notifier,
    executor: Arc<dyn StepExecutor>,
    registry: Arc<Vec<String>>,
    run_lock: Arc<tokio::sync::Mutex<()>>,
    workers: Arc<Mutex<HashMap<Uuid, watch::Receiver<Outcome>>>>,
}

impl AuditController {
    pub fn new(
        store: Arc<dyn AuditStore>,
        notifier: Notifier,
        executor: Arc<dyn StepExecutor>,
    ) -> Self {
        Self {
            store,
            notifier,
            executor,
            registry: Arc::new(AuditStepKind::names()),
            run_lock: Arc::new(tokio::sync::Mutex::new(())),
            workers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Controller over an in-memory store running the real storefront steps
    pub fn from_config(config: &Config) -> Self {
        let runner = SystemCommandRunner::new(config.working_dir(), config.command_timeout())
            .with_capture_timeout(config.output_grace());
        let actions = StepActions::new(
            Arc::new(runner),
            config.commands.clone(),
            ScanPaths::from_config(config),
        );
        Self::new(
            Arc::new(MemoryStore::new()),
            Notifier::new(config.audit.event_buffer),
            Arc::new(actions),
        )
    }

    /// Replace the step names created for each run
    pub fn with_registry(mut self, names: Vec<String>) -> Self {
        self.registry = Arc::new(names);
        self
    }

    pub fn registry(&self) -> &[String] {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn AuditStore> {
        &self.store
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Create a run with one pending step per registry entry and start it
    /// in the background.
    pub async fn start_run(&self) -> Result<Uuid, ControllerError> {
        let run = self.store.create_run(AuditRun::new()).await?;

        let mut steps = Vec::with_capacity(self.registry.len());
        for (index, name) in self.registry.iter().enumerate() {
            let step = AuditStep::new(run.id, index as u32 + 1, name.clone());
            match self.store.create_step(step).await {
                Ok(step) => steps.push(step),
                Err(e) => {
                    let e = ControllerError::from(e);
                    self.fail_run(run.id, &e).await;
                    return Err(e);
                }
            }
        }

        info!(run_id = %run.id, steps = steps.len(), "Audit run created");
        self.notifier.broadcast(AuditEvent::AuditStarted {
            audit_run_id: run.id,
            steps,
        });

        self.spawn_worker(run.id);
        Ok(run.id)
    }

    fn spawn_worker(&self, run_id: Uuid) {
        let (done_tx, done_rx) = watch::channel(None);
        let this = self.clone();
        tokio::spawn(async move {
            // The job runs on its own task so a panic surfaces as a JoinError
            // here instead of leaving the run stuck in `running`.
            let job = {
                let this = this.clone();
                tokio::spawn(async move { this.drive(run_id).await })
            };
            let result = match job.await {
                Ok(result) => result,
                Err(e) => Err(ControllerError::WorkerAborted {
                    run_id,
                    reason: e.to_string(),
                }),
            };

            if let Err(ref e) = result {
                error!(run_id = %run_id, error = %e, "Audit run failed");
                this.fail_run(run_id, e).await;
            }
            done_tx.send_replace(Some(result));
        });

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        workers.retain(|_, done| done.borrow().is_none());
        workers.insert(run_id, done_rx);
    }

    #[instrument(skip(self))]
    async fn drive(&self, run_id: Uuid) -> Result<(), ControllerError> {
        let _turn = self.run_lock.lock().await;

        let mut run = self.store.get_run(run_id).await?;
        run.status = RunStatus::Running;
        self.store.update_run(run).await?;
        info!("Audit run executing");

        for step in self.store.steps_for_run(run_id).await? {
            self.execute_step(step).await?;
        }

        let progress = self.get_progress(run_id).await?;
        if !progress.is_complete {
            return Err(ControllerError::Incomplete {
                run_id,
                remaining: progress.steps.len() - progress.completed_steps(),
            });
        }

        let issues = self.store.issues_for_run(run_id).await?;
        let failed = progress.failed_steps();
        let mut run = self.store.get_run(run_id).await?;
        run.status = RunStatus::Completed;
        run.completed_at = Some(Utc::now());
        run.results = Some(json!({
            "total_steps": progress.steps.len(),
            "passed": progress.steps.len() - failed,
            "failed": failed,
            "issues": issues.len(),
        }));
        let run = self.store.update_run(run).await?;

        info!(failed_steps = failed, issues = issues.len(), "Audit run completed");
        self.notifier.broadcast(AuditEvent::AuditCompleted {
            audit_run_id: run_id,
            run,
        });
        Ok(())
    }

    async fn execute_step(&self, mut step: AuditStep) -> Result<(), ControllerError> {
        let run_id = step.run_id;

        step.start(Utc::now())?;
        let mut step = self.store.update_step(step).await?;
        debug!(step = %step.name, order = step.order, "Step running");
        self.notifier.broadcast(AuditEvent::StepStarted {
            audit_run_id: run_id,
            step: step.clone(),
        });

        let outcome = self.executor.execute(&step.name).await;

        for finding in outcome.findings {
            let issue = self
                .store
                .create_issue(DetectedIssue::from_finding(run_id, finding))
                .await?;
            self.notifier.broadcast(AuditEvent::IssueDetected {
                audit_run_id: run_id,
                issue,
            });
        }

        step.finish(outcome.success, outcome.output, Utc::now())?;
        let step = self.store.update_step(step).await?;

        if step.status == StepStatus::Success {
            info!(step = %step.name, "Step succeeded");
        } else {
            warn!(step = %step.name, "Step failed");
        }

        let progress = self.get_progress(run_id).await?;
        self.notifier.broadcast(AuditEvent::StepCompleted {
            audit_run_id: run_id,
            step,
            percent_complete: progress.percent_complete,
        });
        Ok(())
    }

    async fn fail_run(&self, run_id: Uuid, cause: &ControllerError) {
        self.fail_running_steps(run_id, cause).await;

        match self.store.get_run(run_id).await {
            Ok(mut run) => {
                run.status = RunStatus::Failed;
                run.completed_at = Some(Utc::now());
                run.error = Some(cause.to_string());
                if let Err(e) = self.store.update_run(run).await {
                    error!(run_id = %run_id, error = %e, "Failed to record run failure");
                }
            }
            Err(e) => error!(run_id = %run_id, error = %e, "Failed run is missing from store"),
        }

        self.notifier.broadcast(AuditEvent::AuditFailed {
            audit_run_id: run_id,
            error: cause.to_string(),
        });
    }

    /// Close out the step that was executing when the run faulted. Pending
    /// steps stay pending.
    async fn fail_running_steps(&self, run_id: Uuid, cause: &ControllerError) {
        let steps = match self.store.steps_for_run(run_id).await {
            Ok(steps) => steps,
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "Could not load steps of failed run");
                return;
            }
        };

        for mut step in steps
            .into_iter()
            .filter(|s| s.status == StepStatus::Running)
        {
            let name = step.name.clone();
            if let Err(e) = step.finish(false, cause.to_string(), Utc::now()) {
                warn!(run_id = %run_id, step = %name, error = %e, "Could not fail step");
                continue;
            }
            match self.store.update_step(step).await {
                Ok(step) => self.notifier.broadcast(AuditEvent::StepCompleted {
                    audit_run_id: run_id,
                    step,
                    percent_complete: self
                        .get_progress(run_id)
                        .await
                        .map(|p| p.percent_complete)
                        .unwrap_or_default(),
                }),
                Err(e) => {
                    warn!(run_id = %run_id, step = %name, error = %e, "Could not record step failure")
                }
            }
        }
    }

    /// Wait for a run's worker to finish and return the final run record.
    ///
    /// Any number of callers may wait on the same run; each sees the worker's
    /// result. Runs whose worker was already pruned are read from the store.
    pub async fn wait(&self, run_id: Uuid) -> Result<AuditRun, ControllerError> {
        let done = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&run_id)
            .cloned();

        if let Some(mut done) = done {
            let result = match done.wait_for(Option::is_some).await {
                Ok(outcome) => outcome.clone().unwrap_or(Ok(())),
                Err(_) => Err(ControllerError::WorkerAborted {
                    run_id,
                    reason: "worker exited without reporting".to_string(),
                }),
            };
            result?;
        }

        Ok(self.store.get_run(run_id).await?)
    }

    pub async fn get_run(&self, run_id: Uuid) -> Result<AuditRun, ControllerError> {
        Ok(self.store.get_run(run_id).await?)
    }

    pub async fn list_runs(&self) -> Result<Vec<AuditRun>, ControllerError> {
        Ok(self.store.list_runs().await?)
    }

    pub async fn get_progress(&self, run_id: Uuid) -> Result<AuditProgress, ControllerError> {
        self.store.get_run(run_id).await?;
        let steps = self.store.steps_for_run(run_id).await?;
        Ok(AuditProgress::from_steps(steps))
    }

    pub async fn get_run_details(&self, run_id: Uuid) -> Result<RunDetails, ControllerError> {
        let run = self.store.get_run(run_id).await?;
        let steps = self.store.steps_for_run(run_id).await?;
        let issues = self.store.issues_for_run(run_id).await?;
        Ok(RunDetails { run, steps, issues })
    }
}
