//! What each registered step actually does.
//!
//! Steps are built from one or more command invocations plus file scans of
//! the audited project. A step never returns an error: every problem, from a
//! nonzero exit to an unreadable directory, ends up in its outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use super::executor::{CommandOutput, CommandRunner};
use super::registry::AuditStepKind;
use crate::config::{CommandsConfig, Config};
use crate::types::IssueFinding;

/// Result of executing one step
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepOutcome {
    pub output: String,
    pub success: bool,
    /// Issues to record against the run
    pub findings: Vec<IssueFinding>,
}

impl From<CommandOutput> for StepOutcome {
    fn from(result: CommandOutput) -> Self {
        Self {
            output: result.output,
            success: result.success,
            findings: Vec::new(),
        }
    }
}

/// Executes a step by name.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, step_name: &str) -> StepOutcome;
}

static DISABLED_INPUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"disabled=(\{true\}|true)").expect("valid regex"));
static READ_ONLY_INPUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"readOnly=(\{true\}|true)").expect("valid regex"));
static ERROR_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)error|failed").expect("valid regex"));

/// Where the scans look, relative to the project directory
#[derive(Debug, Clone)]
pub struct ScanPaths {
    pub working_dir: PathBuf,
    pub client_src: String,
    pub scan_root: String,
    pub log_dirs: Vec<String>,
}

impl ScanPaths {
    pub fn from_config(config: &Config) -> Self {
        Self {
            working_dir: config.working_dir(),
            client_src: config.audit.client_src.clone(),
            scan_root: config.audit.scan_root.clone(),
            log_dirs: config.audit.log_dirs.clone(),
        }
    }
}

/// The six storefront audit steps
pub struct StepActions {
    runner: Arc<dyn CommandRunner>,
    commands: CommandsConfig,
    paths: ScanPaths,
}

impl StepActions {
    pub fn new(runner: Arc<dyn CommandRunner>, commands: CommandsConfig, paths: ScanPaths) -> Self {
        Self {
            runner,
            commands,
            paths,
        }
    }

    async fn run_argv(&self, argv: &[String]) -> CommandOutput {
        match argv.split_first() {
            Some((program, args)) => self.runner.run(program, args).await,
            None => CommandOutput::failure("No command configured"),
        }
    }

    pub async fn run_kind(&self, kind: AuditStepKind) -> StepOutcome {
        match kind {
            AuditStepKind::InstallDependencies => self.run_argv(&self.commands.install).await.into(),
            AuditStepKind::DevServerTest => self.dev_server_test().await,
            AuditStepKind::Lint => self.run_argv(&self.commands.lint).await.into(),
            AuditStepKind::BlockedInputScan => self.search_blocked_inputs().await,
            AuditStepKind::ProductionSimulation => self.production_simulation().await,
            AuditStepKind::ConsoleNetworkCheck => self.console_errors().await,
        }
    }

    async fn dev_server_test(&self) -> StepOutcome {
        let dev = self.run_argv(&self.commands.dev_server).await;
        let forms = scan_form_inputs(&self.paths.working_dir.join(&self.paths.client_src)).await;

        StepOutcome {
            output: format!(
                "Dev server test: {}\nForm scan: {}",
                dev.output, forms.output
            ),
            success: dev.success && forms.success,
            findings: Vec::new(),
        }
    }

    async fn search_blocked_inputs(&self) -> StepOutcome {
        let mut sections = Vec::new();
        let mut findings = Vec::new();

        for (label, pattern) in [("Readonly", "readonly"), ("Disabled", "disabled")] {
            let args = vec![
                "-r".to_string(),
                "-n".to_string(),
                pattern.to_string(),
                self.paths.scan_root.clone(),
                "--include=*.tsx".to_string(),
                "--include=*.jsx".to_string(),
            ];
            let result = self.runner.run(&self.commands.search, &args).await;
            let matches = result.output.trim();

            if result.success && !matches.is_empty() {
                findings.extend(matches.lines().filter_map(IssueFinding::blocked_input));
                sections.push(format!("{} attributes found:\n{}", label, matches));
            } else if !result.success && !matches.is_empty() {
                // grep exits 1 with empty stderr when nothing matched
                warn!(pattern, error = matches, "blocked input search failed");
                sections.push(format!("{} search failed:\n{}", label, matches));
            }
        }

        info!(findings = findings.len(), "blocked input search finished");

        StepOutcome {
            output: if sections.is_empty() {
                "No blocked inputs found".to_string()
            } else {
                sections.join("\n\n")
            },
            success: true,
            findings,
        }
    }

    async fn production_simulation(&self) -> StepOutcome {
        let build = self.run_argv(&self.commands.build).await;
        if !build.success {
            return build.into();
        }

        let serve = self.run_argv(&self.commands.serve).await;
        StepOutcome {
            output: format!(
                "Build: {}\nProduction test: {}",
                build.output, serve.output
            ),
            success: build.success && serve.success,
            findings: Vec::new(),
        }
    }

    async fn console_errors(&self) -> StepOutcome {
        let dirs: Vec<PathBuf> = self
            .paths
            .log_dirs
            .iter()
            .map(|d| self.paths.working_dir.join(d))
            .collect();
        scan_log_errors(&dirs).await
    }
}

#[async_trait]
impl StepExecutor for StepActions {
    async fn execute(&self, step_name: &str) -> StepOutcome {
        match AuditStepKind::from_name(step_name) {
            Some(kind) => self.run_kind(kind).await,
            None => StepOutcome {
                output: "Unknown step".to_string(),
                success: false,
                findings: Vec::new(),
            },
        }
    }
}

/// Files under `root` matching `*.{ext}` at any depth
fn files_with_extensions(root: &Path, extensions: &[&str], recursive: bool) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for ext in extensions {
        let pattern = if recursive {
            root.join("**").join(format!("*.{}", ext))
        } else {
            root.join(format!("*.{}", ext))
        };
        let Ok(paths) = glob::glob(&pattern.to_string_lossy()) else {
            continue;
        };
        files.extend(paths.flatten().filter(|p| p.is_file()));
    }
    files.sort();
    files
}

/// Flag component files that hard-disable or lock their inputs.
pub async fn scan_form_inputs(client_src: &Path) -> CommandOutput {
    let mut issues = Vec::new();
    for path in files_with_extensions(client_src, &["tsx", "jsx"], true) {
        let Ok(content) = tokio::fs::read_to_string(&path).await else {
            debug!(path = %path.display(), "skipping unreadable file");
            continue;
        };
        if DISABLED_INPUT.is_match(&content) {
            issues.push(format!("{}: Form input explicitly disabled", path.display()));
        }
        if READ_ONLY_INPUT.is_match(&content) {
            issues.push(format!("{}: Form input set to read-only", path.display()));
        }
    }

    if issues.is_empty() {
        CommandOutput::success("No form issues detected")
    } else {
        CommandOutput::failure(issues.join("\n"))
    }
}

/// Collect error lines from `*.log` files directly inside `dirs`.
///
/// Missing directories are skipped.
pub async fn scan_log_errors(dirs: &[PathBuf]) -> StepOutcome {
    let mut errors = Vec::new();
    for dir in dirs {
        for path in files_with_extensions(dir, &["log"], false) {
            let Ok(content) = tokio::fs::read_to_string(&path).await else {
                continue;
            };
            errors.extend(
                content
                    .lines()
                    .filter(|line| ERROR_LINE.is_match(line))
                    .map(str::to_string),
            );
        }
    }

    StepOutcome {
        success: errors.is_empty(),
        output: if errors.is_empty() {
            "No console errors detected in log files".to_string()
        } else {
            errors.join("\n")
        },
        findings: Vec::new(),
    }
}
