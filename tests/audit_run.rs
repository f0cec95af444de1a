//! End-to-end audit runs against real processes.
//!
//! These tests spawn `sh`, `sleep`, `grep` and friends, so they only run on
//! Unix hosts.

#![cfg(unix)]

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::broadcast::Receiver;

use auditor::audit::{
    AuditController, AuditEvent, CommandRunner, MemoryStore, Notifier, StepExecutor, StepOutcome,
    SystemCommandRunner,
};
use auditor::config::Config;
use auditor::types::{IssueKind, IssueSeverity, RunStatus, StepStatus};

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Maps each step name to one shell command
struct ShellSteps {
    runner: SystemCommandRunner,
    scripts: Vec<(&'static str, &'static str)>,
}

#[async_trait]
impl StepExecutor for ShellSteps {
    async fn execute(&self, step_name: &str) -> StepOutcome {
        let script = self
            .scripts
            .iter()
            .find(|(name, _)| *name == step_name)
            .map(|(_, script)| *script)
            .unwrap_or("true");
        let args = vec!["-c".to_string(), script.to_string()];
        self.runner.run("sh", &args).await.into()
    }
}

fn drain(rx: &mut Receiver<AuditEvent>) -> Vec<AuditEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| (*p).to_string()).collect()
}

/// A storefront checkout with one disabled input and an error in its server log
fn fixture_project() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let root = dir.path();

    fs::create_dir_all(root.join("client/src/components")).unwrap();
    fs::write(
        root.join("client/src/components/BirthDetails.tsx"),
        "export const BirthDetails = () => <input name=\"dob\" disabled={true} />;\n",
    )
    .unwrap();
    fs::write(
        root.join("client/src/App.tsx"),
        "export const App = () => <main />;\n",
    )
    .unwrap();

    fs::create_dir_all(root.join("server/logs")).unwrap();
    fs::write(
        root.join("server/logs/app.log"),
        "GET /api/horoscope 200\nPOST /api/checkout request failed: 502\n",
    )
    .unwrap();

    dir
}

fn fixture_config(project: &TempDir) -> Config {
    let mut config = Config::default();
    config.audit.working_dir = project.path().to_string_lossy().to_string();
    config.audit.command_timeout_secs = 5;
    config.commands.install = argv(&["true"]);
    config.commands.dev_server = argv(&["echo", "dev server ready"]);
    config.commands.lint = argv(&[
        "sh",
        "-c",
        "echo 'src/App.tsx(1,1): error TS2304' >&2; exit 2",
    ]);
    config.commands.build = argv(&["echo", "built"]);
    config.commands.serve = argv(&["echo", "serving"]);
    config
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_timed_out_step_does_not_stop_the_run() {
    let project = TempDir::new().unwrap();
    let executor = ShellSteps {
        runner: SystemCommandRunner::new(project.path(), Duration::from_secs(1)),
        scripts: vec![("A", "echo a"), ("B", "sleep 5"), ("C", "echo c")],
    };
    let controller = AuditController::new(
        Arc::new(MemoryStore::new()),
        Notifier::new(64),
        Arc::new(executor),
    )
    .with_registry(vec!["A".into(), "B".into(), "C".into()]);
    let mut events = controller.notifier().subscribe();

    let run_id = controller.start_run().await.unwrap();
    let run = controller.wait(run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);

    let steps = controller.store().steps_for_run(run_id).await.unwrap();
    assert_eq!(steps[0].status, StepStatus::Success);
    assert_eq!(steps[0].output.as_deref(), Some("a\n"));
    assert_eq!(steps[1].status, StepStatus::Failed);
    assert_eq!(
        steps[1].error_message.as_deref(),
        Some("Command timed out after 1 seconds")
    );
    assert_eq!(steps[2].status, StepStatus::Success);

    let percents: Vec<u8> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            AuditEvent::StepCompleted {
                percent_complete, ..
            } => Some(percent_complete),
            _ => None,
        })
        .collect();
    assert_eq!(percents, vec![33, 66, 100]);
}

#[tokio::test]
async fn test_storefront_audit_against_fixture_project() {
    let project = fixture_project();
    let config = fixture_config(&project);
    let controller = AuditController::from_config(&config);

    let run_id = controller.start_run().await.unwrap();
    let run = controller.wait(run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);

    let details = controller.get_run_details(run_id).await.unwrap();
    let step = |name: &str| {
        details
            .steps
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("missing step {}", name))
    };

    assert_eq!(step("Install Dependencies").status, StepStatus::Success);

    let dev = step("Local Dev Server Test");
    assert_eq!(dev.status, StepStatus::Failed);
    let dev_output = dev.output.as_deref().unwrap();
    assert!(dev_output.starts_with("Dev server test: dev server ready"));
    assert!(dev_output.contains("Form input explicitly disabled"));

    let lint = step("Lint Code");
    assert_eq!(lint.status, StepStatus::Failed);
    assert!(lint.error_message.as_deref().unwrap().contains("TS2304"));

    let search = step("Search Blocked Inputs");
    assert_eq!(search.status, StepStatus::Success);
    assert!(search.output.as_deref().unwrap().contains("BirthDetails.tsx"));

    let production = step("Production Simulation");
    assert_eq!(production.status, StepStatus::Success);
    assert_eq!(
        production.output.as_deref(),
        Some("Build: built\n\nProduction test: serving\n")
    );

    let console = step("Console & Network Errors");
    assert_eq!(console.status, StepStatus::Failed);
    assert_eq!(
        console.output.as_deref(),
        Some("POST /api/checkout request failed: 502")
    );

    assert_eq!(details.issues.len(), 1);
    let issue = &details.issues[0];
    assert_eq!(issue.kind, IssueKind::FormInput);
    assert_eq!(issue.severity, IssueSeverity::Critical);
    assert_eq!(issue.line_number, Some(1));
    assert!(issue
        .file_path
        .as_deref()
        .unwrap()
        .ends_with("client/src/components/BirthDetails.tsx"));

    let results = run.results.unwrap();
    assert_eq!(results["failed"], 3);
    assert_eq!(results["passed"], 3);
    assert_eq!(results["issues"], 1);
}

#[tokio::test]
async fn test_missing_tooling_fails_steps_not_the_run() {
    let project = TempDir::new().unwrap();
    let mut config = fixture_config(&project);
    config.commands.install = argv(&["definitely-not-a-package-manager", "install"]);

    let controller = AuditController::from_config(&config);
    let run_id = controller.start_run().await.unwrap();
    let run = controller.wait(run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);

    let progress = controller.get_progress(run_id).await.unwrap();
    assert!(progress.is_complete);
    let install = &progress.steps[0];
    assert_eq!(install.status, StepStatus::Failed);
    assert!(install
        .error_message
        .as_deref()
        .unwrap()
        .starts_with("Failed to spawn definitely-not-a-package-manager"));
}
