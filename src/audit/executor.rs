//! Command execution for audit steps.
//!
//! Each invocation spawns exactly one process, collects its stdout and stderr
//! separately and is bounded by a wall-clock timeout. A timed out process is
//! killed and reaped before the result is returned.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

/// Result of one command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// stdout on success, stderr on failure, or the timeout message
    pub output: String,
    pub success: bool,
}

impl CommandOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: true,
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: false,
        }
    }
}

/// Message reported when a command exceeds its timeout
pub fn timeout_message(timeout: Duration) -> String {
    format!("Command timed out after {} seconds", timeout.as_secs())
}

/// Runs external commands on behalf of audit steps.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> CommandOutput;
}

/// Runs commands as host processes with a fixed timeout.
#[derive(Debug, Clone)]
pub struct SystemCommandRunner {
    working_dir: PathBuf,
    timeout: Duration,
    capture_timeout: Duration,
}

impl SystemCommandRunner {
    pub fn new(working_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            working_dir: working_dir.into(),
            timeout,
            capture_timeout: IO_CAPTURE_TIMEOUT,
        }
    }

    /// Bound how long pipes are read after the process exits
    pub fn with_capture_timeout(mut self, capture_timeout: Duration) -> Self {
        self.capture_timeout = capture_timeout;
        self
    }
}

/// Default bound on reading pipes after the process exited. Grandchildren that
/// inherited the pipes can keep them open long after the direct child is gone.
const IO_CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

/// One output pipe read on its own task into a shared buffer, so bytes read
/// so far survive the task being aborted.
struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl Capture {
    fn spawn<R>(reader: Option<R>) -> Self
    where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = buf.clone();
        let task = tokio::spawn(async move {
            let Some(mut reader) = reader else {
                return;
            };
            let mut chunk = [0u8; 8192];
            loop {
                match reader.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => {
                        let mut buf = sink.lock().unwrap_or_else(PoisonError::into_inner);
                        buf.extend_from_slice(&chunk[..n]);
                    }
                    Err(e) => {
                        debug!(error = %e, "output pipe closed early");
                        break;
                    }
                }
            }
        });
        Self { buf, task }
    }

    fn abort(&self) {
        self.task.abort();
    }

    fn text(&self) -> String {
        let buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Read both pipes to EOF under one shared deadline, keeping whatever
/// arrived if the deadline passes first.
async fn collect(
    stdout: &mut Capture,
    stderr: &mut Capture,
    deadline: Duration,
) -> (String, String) {
    let both = async {
        let _ = tokio::join!(&mut stdout.task, &mut stderr.task);
    };
    if tokio::time::timeout(deadline, both).await.is_err() {
        warn!("output capture timed out; pipes still held open");
        stdout.abort();
        stderr.abort();
    }
    (stdout.text(), stderr.text())
}

async fn kill(child: &mut Child, program: &str) {
    if let Err(e) = child.kill().await {
        warn!(program, error = %e, "failed to kill timed-out process");
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    #[instrument(skip(self), fields(cwd = %self.working_dir.display()))]
    async fn run(&self, program: &str, args: &[String]) -> CommandOutput {
        debug!("Spawning command");

        let mut child = match Command::new(program)
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(error = %e, "Failed to spawn command");
                return CommandOutput::failure(format!("Failed to spawn {}: {}", program, e));
            }
        };

        let mut stdout = Capture::spawn(child.stdout.take());
        let mut stderr = Capture::spawn(child.stderr.take());

        let waited = tokio::time::timeout(self.timeout, child.wait()).await;
        match waited {
            Ok(Ok(status)) => {
                let (stdout, stderr) =
                    collect(&mut stdout, &mut stderr, self.capture_timeout).await;
                debug!(code = ?status.code(), "Command exited");
                if status.success() {
                    CommandOutput::success(stdout)
                } else {
                    CommandOutput::failure(stderr)
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Failed waiting for command");
                kill(&mut child, program).await;
                stdout.abort();
                stderr.abort();
                CommandOutput::failure(e.to_string())
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Command timed out; killing");
                kill(&mut child, program).await;
                stdout.abort();
                stderr.abort();
                CommandOutput::failure(timeout_message(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn runner(dir: &TempDir, timeout: Duration) -> SystemCommandRunner {
        SystemCommandRunner::new(dir.path(), timeout)
    }

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| (*p).to_string()).collect()
    }

    #[test]
    fn test_timeout_message_literal() {
        assert_eq!(
            timeout_message(Duration::from_secs(60)),
            "Command timed out after 60 seconds"
        );
    }

    #[tokio::test]
    async fn test_zero_exit_returns_stdout() {
        let dir = TempDir::new().unwrap();
        let result = runner(&dir, Duration::from_secs(5))
            .run("sh", &args(&["-c", "echo out; echo err >&2"]))
            .await;

        assert!(result.success);
        assert_eq!(result.output.trim(), "out");
    }

    #[tokio::test]
    async fn test_nonzero_exit_returns_stderr() {
        let dir = TempDir::new().unwrap();
        let result = runner(&dir, Duration::from_secs(5))
            .run("sh", &args(&["-c", "echo out; echo broken >&2; exit 3"]))
            .await;

        assert!(!result.success);
        assert_eq!(result.output.trim(), "broken");
    }

    #[tokio::test]
    async fn test_runs_in_working_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();

        let result = runner(&dir, Duration::from_secs(5))
            .run("cat", &args(&["marker.txt"]))
            .await;

        assert!(result.success);
        assert_eq!(result.output, "here");
    }

    #[tokio::test]
    async fn test_missing_program_is_failure() {
        let dir = TempDir::new().unwrap();
        let result = runner(&dir, Duration::from_secs(5))
            .run("definitely-not-a-real-program-xyz", &[])
            .await;

        assert!(!result.success);
        assert!(result.output.contains("Failed to spawn"));
    }

    #[tokio::test]
    async fn test_output_kept_when_background_child_holds_pipe() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir, Duration::from_secs(20))
            .with_capture_timeout(Duration::from_millis(300));

        let started = std::time::Instant::now();
        let result = runner
            .run("sh", &args(&["-c", "echo built-ok; sleep 3 &"]))
            .await;

        assert!(result.success);
        assert_eq!(result.output, "built-ok\n");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = TempDir::new().unwrap();
        let timeout = Duration::from_millis(300);
        let result = runner(&dir, timeout)
            .run("sh", &args(&["-c", "echo $$ > pid; exec sleep 30"]))
            .await;

        assert!(!result.success);
        assert_eq!(result.output, timeout_message(timeout));

        let pid = std::fs::read_to_string(dir.path().join("pid")).unwrap();
        let proc_path = std::path::Path::new("/proc").join(pid.trim());
        assert!(!proc_path.exists(), "process {} still running", pid.trim());
    }
}
