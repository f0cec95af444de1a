//! The fixed, ordered list of audit steps.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStepKind {
    InstallDependencies,
    DevServerTest,
    Lint,
    BlockedInputScan,
    ProductionSimulation,
    ConsoleNetworkCheck,
}

impl AuditStepKind {
    /// Every step in execution order
    pub const ALL: [AuditStepKind; 6] = [
        AuditStepKind::InstallDependencies,
        AuditStepKind::DevServerTest,
        AuditStepKind::Lint,
        AuditStepKind::BlockedInputScan,
        AuditStepKind::ProductionSimulation,
        AuditStepKind::ConsoleNetworkCheck,
    ];

    /// Display name, also stored on step records
    pub fn name(self) -> &'static str {
        match self {
            AuditStepKind::InstallDependencies => "Install Dependencies",
            AuditStepKind::DevServerTest => "Local Dev Server Test",
            AuditStepKind::Lint => "Lint Code",
            AuditStepKind::BlockedInputScan => "Search Blocked Inputs",
            AuditStepKind::ProductionSimulation => "Production Simulation",
            AuditStepKind::ConsoleNetworkCheck => "Console & Network Errors",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AuditStepKind::InstallDependencies => "Install project dependencies",
            AuditStepKind::DevServerTest => {
                "Boot the dev server briefly and scan client forms for locked inputs"
            }
            AuditStepKind::Lint => "Type-check the project",
            AuditStepKind::BlockedInputScan => {
                "Search components for readonly and disabled attributes"
            }
            AuditStepKind::ProductionSimulation => "Build, then start the production server",
            AuditStepKind::ConsoleNetworkCheck => "Scan server and client logs for errors",
        }
    }

    /// 1-based position in the registry
    pub fn order(self) -> u32 {
        Self::ALL
            .iter()
            .position(|k| *k == self)
            .map(|i| i as u32 + 1)
            .unwrap_or(0)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Registry names in order
    pub fn names() -> Vec<String> {
        Self::ALL.iter().map(|k| k.name().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_six_steps_in_order() {
        let names = AuditStepKind::names();
        assert_eq!(
            names,
            vec![
                "Install Dependencies",
                "Local Dev Server Test",
                "Lint Code",
                "Search Blocked Inputs",
                "Production Simulation",
                "Console & Network Errors",
            ]
        );
    }

    #[test]
    fn test_orders_are_one_based_and_contiguous() {
        let orders: Vec<u32> = AuditStepKind::ALL.iter().map(|k| k.order()).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_from_name_round_trips() {
        for kind in AuditStepKind::ALL {
            assert_eq!(AuditStepKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(AuditStepKind::from_name("Deploy"), None);
    }
}
