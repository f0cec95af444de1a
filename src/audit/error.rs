//! Controller-level faults.
//!
//! A step that exits nonzero or times out is not an error: it is recorded on
//! the step and the run carries on. Anything here stops the run and marks it
//! failed.

use thiserror::Error;
use uuid::Uuid;

use super::store::StoreError;
use crate::types::TransitionError;

#[derive(Debug, Clone, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("run '{run_id}' finished its step sequence with {remaining} step(s) not terminal")]
    Incomplete { run_id: Uuid, remaining: usize },

    #[error("audit worker for run '{run_id}' aborted: {reason}")]
    WorkerAborted { run_id: Uuid, reason: String },
}

impl ControllerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ControllerError::Store(e) if e.is_not_found())
    }
}
