//! Untrusted code execution engine
//!
//! Pipeline for one request: write the submitted source into a fresh
//! scratch directory, compile it, run the artifact against the supplied
//! input under a wall-clock limit, and optionally verify the output against
//! an expected answer. Every stage short-circuits on failure, and all
//! expected failure modes come back as data rather than errors.
//!
//! Concurrent requests never interfere: each owns a disjoint scratch
//! directory and an independent child process.

pub mod compiler;
pub mod runner;
pub mod verifier;

use std::fmt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};

use crate::config::RunnerConfig;
use self::runner::artifact_spec;

/// Terminal classification of one execution request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Compiled and exited with code 0
    Success,
    /// Compiler rejected the source
    CompileError,
    /// Nonzero exit or signal termination after a successful compile
    RuntimeError,
    /// Wall-clock limit exceeded; the process group was killed
    TimedOut,
    /// The environment failed (compiler or artifact unspawnable), not the
    /// submitted code
    SystemError,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Success => "success",
            RunStatus::CompileError => "compile_error",
            RunStatus::RuntimeError => "runtime_error",
            RunStatus::TimedOut => "timed_out",
            RunStatus::SystemError => "system_error",
        };
        write!(f, "{}", s)
    }
}

/// Result of compiling and running one submission.
#[derive(Debug)]
pub struct RunReport {
    pub status: RunStatus,
    /// Program stdout; partial output before a crash or timeout is kept
    pub stdout: String,
    /// Compiler diagnostics, program stderr, or a system error message,
    /// depending on the status
    pub diagnostics: Option<String>,
    /// Exit code when the process exited on its own
    pub exit_code: Option<i32>,
}

impl RunReport {
    fn system(message: String) -> Self {
        Self {
            status: RunStatus::SystemError,
            stdout: String::new(),
            diagnostics: Some(message),
            exit_code: None,
        }
    }
}

/// Result of running a submission against an expected answer.
#[derive(Debug)]
pub struct VerifyReport {
    pub run: RunReport,
    /// Present only when the run succeeded; a failed compile or run makes
    /// verification not applicable
    pub comparison: Option<verifier::Comparison>,
}

/// Source file plus its derived build artifact for one request.
///
/// The scratch directory is unique per unit, so concurrent requests never
/// share a path, and it is removed (with everything in it) when the unit is
/// dropped, on every exit path.
struct CompilationUnit {
    dir: TempDir,
    source_path: PathBuf,
    artifact_path: PathBuf,
}

impl CompilationUnit {
    async fn create(code: &str) -> anyhow::Result<Self> {
        let dir = tempfile::Builder::new().prefix("cpp-run-").tempdir()?;
        let source_path = dir.path().join("main.cpp");
        let artifact_path = dir.path().join("main");

        tokio::fs::write(&source_path, code).await?;

        Ok(Self {
            dir,
            source_path,
            artifact_path,
        })
    }

    fn source_path(&self) -> &Path {
        &self.source_path
    }

    fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }
}

/// Compile and run a submission, feeding it `stdin_text` if non-empty.
///
/// Compile errors, runtime errors, timeouts and environment failures are
/// all returned inside the report; `Err` is reserved for unexpected local
/// failures such as being unable to create the scratch directory.
pub async fn compile_and_run(
    config: &RunnerConfig,
    code: &str,
    stdin_text: &str,
) -> anyhow::Result<RunReport> {
    let unit = CompilationUnit::create(code).await?;
    debug!("Prepared compilation unit in {:?}", unit.dir.path());

    let compiled = compiler::compile(config, unit.source_path(), unit.artifact_path()).await;

    if let Some(err) = compiled.invoke_error {
        return Ok(RunReport::system(err));
    }

    if !compiled.success {
        info!(status = %RunStatus::CompileError, "Submission rejected by compiler");
        return Ok(RunReport {
            status: RunStatus::CompileError,
            stdout: String::new(),
            diagnostics: compiled.message,
            exit_code: None,
        });
    }

    let mut spec = artifact_spec(
        unit.artifact_path(),
        config.run_time_limit_ms,
        config.max_output_bytes,
    );
    if !stdin_text.is_empty() {
        spec = spec.with_stdin(stdin_text);
    }

    let outcome = runner::execute(&spec).await;

    let report = if let Some(err) = outcome.process_error {
        RunReport::system(err)
    } else if outcome.timed_out {
        RunReport {
            status: RunStatus::TimedOut,
            stdout: outcome.stdout,
            diagnostics: Some(format!(
                "Time limit of {}ms exceeded",
                config.run_time_limit_ms
            )),
            exit_code: None,
        }
    } else {
        match outcome.exit_code {
            Some(0) => RunReport {
                status: RunStatus::Success,
                stdout: outcome.stdout,
                diagnostics: None,
                exit_code: Some(0),
            },
            Some(code) => RunReport {
                status: RunStatus::RuntimeError,
                stdout: outcome.stdout,
                diagnostics: Some(if outcome.stderr.is_empty() {
                    format!("Process exited with code {}", code)
                } else {
                    outcome.stderr
                }),
                exit_code: Some(code),
            },
            None => RunReport {
                status: RunStatus::RuntimeError,
                stdout: outcome.stdout,
                diagnostics: Some(if outcome.stderr.is_empty() {
                    match outcome.signal {
                        Some(sig) => format!("Process terminated by signal {}", sig),
                        None => "Process terminated abnormally".into(),
                    }
                } else {
                    outcome.stderr
                }),
                exit_code: None,
            },
        }
    };

    info!(status = %report.status, "Run completed");
    Ok(report)
}

/// Compile and run a submission, then verify its output against the
/// expected answer. Verification is skipped unless the run succeeded.
pub async fn verify(
    config: &RunnerConfig,
    code: &str,
    stdin_text: &str,
    expected_output: &str,
) -> anyhow::Result<VerifyReport> {
    let run = compile_and_run(config, code, stdin_text).await?;

    let comparison = if run.status == RunStatus::Success {
        let comparison = verifier::compare(&run.stdout, expected_output);
        info!(is_match = comparison.is_match, "Verification completed");
        Some(comparison)
    } else {
        None
    };

    Ok(VerifyReport { run, comparison })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compilation_unit_paths_are_disjoint() {
        tokio_test::block_on(async {
            let a = CompilationUnit::create("int main(){}").await.unwrap();
            let b = CompilationUnit::create("int main(){}").await.unwrap();
            assert_ne!(a.source_path(), b.source_path());
            assert_ne!(a.artifact_path(), b.artifact_path());
        });
    }

    #[test]
    fn test_compilation_unit_cleans_up_on_drop() {
        tokio_test::block_on(async {
            let unit = CompilationUnit::create("int main(){}").await.unwrap();
            let dir = unit.dir.path().to_path_buf();
            let source = unit.source_path().to_path_buf();
            assert!(source.exists());

            drop(unit);
            assert!(!source.exists());
            assert!(!dir.exists());
        });
    }

    #[test]
    fn test_run_status_display() {
        assert_eq!(RunStatus::Success.to_string(), "success");
        assert_eq!(RunStatus::CompileError.to_string(), "compile_error");
        assert_eq!(RunStatus::TimedOut.to_string(), "timed_out");
    }
}
