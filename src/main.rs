use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;

use auditor::audit::{AuditController, AuditEvent, AuditStepKind};
use auditor::config::Config;
use auditor::logging;
use auditor::rest::{self, ApiDoc};
use auditor::types::{RunStatus, StepStatus};

#[derive(Parser)]
#[command(name = "auditor")]
#[command(about = "Runs storefront build audits and streams their progress")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API and WebSocket feed
    Serve {
        /// Port to listen on (default: 7010)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one audit in the foreground
    Run,

    /// List the audit steps in execution order
    Steps,

    /// Print the OpenAPI document
    Openapi {
        /// Emit YAML instead of JSON
        #[arg(long)]
        yaml: bool,
    },

    /// Show the effective configuration
    Config {
        /// Save it to the project-local config file
        #[arg(short, long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let config = Config::load(cli.config.as_deref())?;

    let is_server_mode = matches!(cli.command, Commands::Serve { .. });
    let logging_handle = logging::init_logging(&config, is_server_mode, cli.debug)?;
    if let Some(path) = &logging_handle.log_file_path {
        eprintln!("Logging to {}", path.display());
    }

    match cli.command {
        Commands::Serve { port } => cmd_serve(&config, port).await?,
        Commands::Run => cmd_run(&config).await?,
        Commands::Steps => cmd_steps(),
        Commands::Openapi { yaml } => cmd_openapi(yaml)?,
        Commands::Config { write } => cmd_config(&config, write)?,
    }

    Ok(())
}

async fn cmd_serve(config: &Config, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or(config.rest_api.port);

    println!("Starting audit server...");
    println!("  Project: {}", config.working_dir().display());
    println!("  Port:    {}", port);
    println!("  Endpoints:");
    println!("    POST /api/v1/audit/start              Start an audit run");
    println!("    GET  /api/v1/audit/runs/:id           Run, steps and issues");
    println!("    GET  /api/v1/audit/runs/:id/progress  Poll progress");
    println!("    GET  /api/v1/dashboard/summary        Dashboard summary");
    println!("    GET  /api/v1/ws                       Event feed (WebSocket)");
    println!("    GET  /swagger-ui                      API documentation");
    println!();

    let state = rest::ApiState::from_config(config.clone());
    rest::serve(state, port).await
}

async fn cmd_run(config: &Config) -> Result<()> {
    let controller = AuditController::from_config(config);
    let total = controller.registry().len();
    let mut events = controller.notifier().subscribe();

    let run_id = controller
        .start_run()
        .await
        .context("Failed to start audit run")?;
    println!("Audit run {} in {}", run_id, config.working_dir().display());

    // The worker always publishes a terminal event before it returns
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let done = matches!(
                        event,
                        AuditEvent::AuditCompleted { .. } | AuditEvent::AuditFailed { .. }
                    );
                    print_event(&event, total);
                    if done {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let outcome = controller.wait(run_id).await;
    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "Progress printer stopped");
    }
    let run = outcome.context("Audit run failed")?;
    if run.status == RunStatus::Failed {
        bail!("Audit run failed: {}", run.error.unwrap_or_default());
    }

    let details = controller.get_run_details(run_id).await?;
    let failed = details
        .steps
        .iter()
        .filter(|s| s.status == StepStatus::Failed)
        .count();

    if !details.issues.is_empty() {
        println!();
        println!("Issues:");
        for issue in &details.issues {
            let location = match (&issue.file_path, issue.line_number) {
                (Some(path), Some(line)) => format!("{}:{}", path, line),
                (Some(path), None) => path.clone(),
                _ => String::new(),
            };
            println!(
                "  [{}] {} {} {}",
                issue.severity.as_str(),
                issue.title,
                location,
                issue.description
            );
        }
    }

    if failed > 0 {
        bail!("{} of {} audit steps failed", failed, total);
    }
    println!();
    println!("All {} audit steps passed", total);
    Ok(())
}

fn print_event(event: &AuditEvent, total: usize) {
    match event {
        AuditEvent::StepStarted { step, .. } => {
            println!("[{}/{}] {} ...", step.order, total, step.name);
        }
        AuditEvent::StepCompleted {
            step,
            percent_complete,
            ..
        } => {
            println!(
                "[{}/{}] {} {} ({}%)",
                step.order, total, step.name, step.status, percent_complete
            );
            if step.status == StepStatus::Failed {
                if let Some(line) = step
                    .error_message
                    .as_deref()
                    .and_then(|m| m.lines().find(|l| !l.trim().is_empty()))
                {
                    println!("      {}", line.trim());
                }
            }
        }
        AuditEvent::AuditCompleted { run, .. } => {
            if let Some(results) = &run.results {
                println!("Audit completed: {}", results);
            }
        }
        AuditEvent::AuditFailed { error, .. } => println!("Audit failed: {}", error),
        AuditEvent::AuditStarted { .. } | AuditEvent::IssueDetected { .. } => {}
    }
}

fn cmd_steps() {
    for kind in AuditStepKind::ALL {
        println!("{}. {:<26} {}", kind.order(), kind.name(), kind.description());
    }
}

fn cmd_openapi(yaml: bool) -> Result<()> {
    let doc = if yaml {
        ApiDoc::yaml().context("Failed to render OpenAPI YAML")?
    } else {
        ApiDoc::json().context("Failed to render OpenAPI JSON")?
    };
    println!("{}", doc);
    Ok(())
}

fn cmd_config(config: &Config, write: bool) -> Result<()> {
    if write {
        config.save()?;
        println!("Saved {}", Config::local_config_path().display());
    } else {
        print!("{}", config.to_toml()?);
    }
    Ok(())
}
