//! API state management for the REST server.

use std::sync::Arc;

use crate::audit::AuditController;
use crate::config::Config;

/// Shared state for the REST API
#[derive(Clone)]
pub struct ApiState {
    /// Run controller, also the gateway to the store and the event feed
    pub controller: AuditController,
    /// Effective configuration, reported by the status endpoint
    pub config: Arc<Config>,
}

impl ApiState {
    pub fn new(config: Config, controller: AuditController) -> Self {
        Self {
            controller,
            config: Arc::new(config),
        }
    }

    /// State wired to the real step actions, as `serve` uses it
    pub fn from_config(config: Config) -> Self {
        let controller = AuditController::from_config(&config);
        Self::new(config, controller)
    }
}
