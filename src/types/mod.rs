//! Records kept for audit runs: runs, their steps and the issues they find.

mod issue;
mod run;
mod step;

pub use issue::{DetectedIssue, IssueFinding, IssueKind, IssueSeverity};
pub use run::{AuditProgress, AuditRun, RunDetails, RunStatus};
pub use step::{AuditStep, StepStatus, TransitionError};
