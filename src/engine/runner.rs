//! Child-process execution with a wall-clock deadline
//!
//! Runs a program with piped stdio, feeds it optional input, accumulates
//! stdout/stderr incrementally and races process exit against a timeout.
//! The child is spawned into its own process group so that a timeout can
//! kill the whole group, not just the direct child.

use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;

/// Specification for one child-process execution.
#[derive(Debug, Clone)]
pub struct ExecSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub stdin: Option<String>,
    pub timeout: Duration,
    /// Capture cap per stream; output past the cap is drained but dropped
    pub max_output_bytes: usize,
}

impl ExecSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            timeout: Duration::from_secs(5),
            max_output_bytes: 1024 * 1024,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.max_output_bytes = max;
        self
    }
}

/// Terminal record of one execution. Never mutated after creation.
#[derive(Debug)]
pub struct ExecOutcome {
    pub stdout: String,
    pub stderr: String,
    /// Exit code if the process exited on its own; absent when it was
    /// signal-terminated or timed out
    pub exit_code: Option<i32>,
    /// Signal that terminated the process, if any
    pub signal: Option<i32>,
    pub timed_out: bool,
    /// OS-level failure to start or reap the process; when set, the
    /// captured streams are not trustworthy
    pub process_error: Option<String>,
}

impl ExecOutcome {
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out && self.process_error.is_none()
    }

    fn process_failure(message: String) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            signal: None,
            timed_out: false,
            process_error: Some(message),
        }
    }
}

/// Execute a program to completion or until the deadline elapses.
///
/// Every failure mode is folded into the returned outcome; this function
/// does not error. Partial output captured before a crash or timeout is
/// preserved.
pub async fn execute(spec: &ExecSpec) -> ExecOutcome {
    debug!(
        "Executing {:?} with args {:?}, timeout {:?}",
        spec.program, spec.args, spec.timeout
    );

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return ExecOutcome::process_failure(e.to_string()),
    };

    // The child leads its own process group, so its pgid equals its pid.
    let pgid = child.id().map(|pid| Pid::from_raw(pid as i32));

    // Feed stdin from a concurrent writer so a child that emits output
    // before reading all its input cannot deadlock against us. A broken
    // pipe here just means the child stopped reading.
    if let Some(input) = &spec.stdin {
        if let Some(mut stdin) = child.stdin.take() {
            let bytes = input.clone().into_bytes();
            tokio::spawn(async move {
                let _ = stdin.write_all(&bytes).await;
                let _ = stdin.shutdown().await;
            });
        }
    }

    let stdout_task = spawn_capped_reader(child.stdout.take(), spec.max_output_bytes);
    let stderr_task = spawn_capped_reader(child.stderr.take(), spec.max_output_bytes);

    let mut exit_code = None;
    let mut signal = None;
    let mut timed_out = false;
    let mut process_error = None;

    match tokio::time::timeout(spec.timeout, child.wait()).await {
        Ok(Ok(status)) => {
            exit_code = status.code();
            signal = status.signal();
        }
        Ok(Err(e)) => {
            process_error = Some(format!("failed to wait for process: {}", e));
        }
        Err(_) => {
            timed_out = true;
            if let Some(pgid) = pgid {
                if let Err(e) = killpg(pgid, Signal::SIGKILL) {
                    debug!("killpg({}) failed: {}", pgid, e);
                }
            }
            // Reap the direct child; the readers finish once the pipes close.
            let _ = child.kill().await;
        }
    }

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    ExecOutcome {
        stdout,
        stderr,
        exit_code,
        signal,
        timed_out,
        process_error,
    }
}

/// Convenience for running a compiled artifact with no arguments.
pub fn artifact_spec(artifact: &Path, timeout_ms: u64, max_output_bytes: usize) -> ExecSpec {
    ExecSpec::new(artifact)
        .with_timeout(Duration::from_millis(timeout_ms))
        .with_max_output_bytes(max_output_bytes)
}

fn spawn_capped_reader<R>(pipe: Option<R>, cap: usize) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut collected: Vec<u8> = Vec::new();
        if let Some(mut pipe) = pipe {
            let mut buf = [0u8; 8192];
            loop {
                match pipe.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if collected.len() < cap {
                            let take = n.min(cap - collected.len());
                            collected.extend_from_slice(&buf[..take]);
                        }
                        // past the cap: keep draining so the child never
                        // blocks on a full pipe
                    }
                }
            }
        }
        String::from_utf8_lossy(&collected).into_owned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> ExecSpec {
        ExecSpec::new("/bin/sh").with_args(["-c", script])
    }

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let outcome = execute(&sh("echo hello")).await;
        assert_eq!(outcome.stdout, "hello\n");
        assert_eq!(outcome.exit_code, Some(0));
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_stdin_is_piped() {
        let outcome = execute(&sh("cat").with_stdin("line one\nline two\n")).await;
        assert_eq!(outcome.stdout, "line one\nline two\n");
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_nonzero_exit() {
        let outcome = execute(&sh("echo oops >&2; exit 3")).await;
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.stderr, "oops\n");
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let start = Instant::now();
        let spec = sh("sleep 30").with_timeout(Duration::from_millis(200));
        let outcome = execute(&spec).await;

        assert!(outcome.timed_out);
        assert_eq!(outcome.exit_code, None);
        // deadline plus a small teardown margin, nowhere near the sleep
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_partial_output_survives_timeout() {
        let spec = sh("echo partial; sleep 30").with_timeout(Duration::from_millis(300));
        let outcome = execute(&spec).await;

        assert!(outcome.timed_out);
        assert_eq!(outcome.stdout, "partial\n");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let outcome = execute(&ExecSpec::new("/nonexistent/binary")).await;
        assert!(outcome.process_error.is_some());
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        let script = "i=0; while [ $i -lt 1000 ]; do echo aaaaaaaaaa; i=$((i+1)); done";
        let spec = sh(script).with_max_output_bytes(100);
        let outcome = execute(&spec).await;

        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.stdout.len(), 100);
    }
}
