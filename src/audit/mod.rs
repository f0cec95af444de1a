//! Audit engine: step registry, command execution, run control and the event feed.

pub mod actions;
pub mod controller;
pub mod error;
pub mod executor;
pub mod notifier;
pub mod registry;
pub mod store;

pub use actions::{ScanPaths, StepActions, StepExecutor, StepOutcome};
pub use controller::AuditController;
pub use error::ControllerError;
pub use executor::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use notifier::{AuditEvent, Notifier};
pub use registry::AuditStepKind;
pub use store::{AuditStore, MemoryStore, StoreError};
