//! Compiler invocation
//!
//! Turns a source file into an executable artifact, or a structured failure
//! carrying the compiler's diagnostics verbatim. A failed compilation is a
//! normal business outcome here, not an error.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use tracing::debug;

use crate::config::RunnerConfig;
use crate::engine::runner::{self, ExecSpec};

/// Result of a compilation attempt
#[derive(Debug)]
pub struct CompileResult {
    pub success: bool,
    /// Compiler diagnostics when compilation failed
    pub message: Option<String>,
    /// Set when the compiler itself could not be run (missing binary,
    /// permission denied); distinct from the submitted code being wrong
    pub invoke_error: Option<String>,
}

/// Compile `source` into `artifact` with the configured compiler.
pub async fn compile(config: &RunnerConfig, source: &Path, artifact: &Path) -> CompileResult {
    let args = config.compile_args(source, artifact);
    debug!("Compiling with {} {:?}", config.compiler, args);

    let spec = ExecSpec::new(&config.compiler)
        .with_args(args)
        .with_timeout(Duration::from_millis(config.compile_time_limit_ms))
        .with_max_output_bytes(config.max_output_bytes);

    let outcome = runner::execute(&spec).await;

    if let Some(err) = outcome.process_error {
        return CompileResult {
            success: false,
            message: None,
            invoke_error: Some(err),
        };
    }

    if outcome.timed_out {
        return CompileResult {
            success: false,
            message: Some("Compilation timed out".into()),
            invoke_error: None,
        };
    }

    if outcome.exit_code == Some(0) {
        return CompileResult {
            success: true,
            message: None,
            invoke_error: None,
        };
    }

    let message = if !outcome.stderr.is_empty() {
        outcome.stderr
    } else if !outcome.stdout.is_empty() {
        outcome.stdout
    } else {
        match outcome.exit_code {
            Some(code) => format!("Compiler exited with code {}", code),
            None => "Compiler crashed".into(),
        }
    };

    CompileResult {
        success: false,
        message: Some(message),
        invoke_error: None,
    }
}

/// Probe the configured compiler once at startup; fail fast if it cannot
/// even report its version.
pub async fn ensure_compiler_available(config: &RunnerConfig) -> anyhow::Result<()> {
    let output = tokio::process::Command::new(&config.compiler)
        .arg("--version")
        .output()
        .await
        .with_context(|| format!("Compiler '{}' is not available", config.compiler))?;

    if !output.status.success() {
        anyhow::bail!(
            "Compiler '{}' failed its version probe (exit status {})",
            config.compiler,
            output.status
        );
    }

    Ok(())
}
