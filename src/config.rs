//! Engine configuration
//!
//! Policy values for the compile-and-run pipeline, loaded from a TOML file at
//! startup. The loaded value is owned by the application state and passed by
//! reference into each request; there is no process-wide singleton.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

/// Policy values for one execution request.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// Compiler binary to invoke (default: g++)
    pub compiler: String,
    /// Language standard passed as -std=<value> (default: c++11)
    pub std: String,
    /// Compile time limit in milliseconds (default: 30000ms = 30s)
    pub compile_time_limit_ms: u64,
    /// Run time limit in milliseconds (default: 5000ms = 5s)
    pub run_time_limit_ms: u64,
    /// Maximum bytes captured per output stream; excess is drained and dropped
    pub max_output_bytes: usize,
    /// Maximum accepted source size in bytes; larger submissions are rejected
    pub max_source_bytes: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            compiler: "g++".into(),
            std: "c++11".into(),
            compile_time_limit_ms: 30_000,
            run_time_limit_ms: 5_000,
            max_output_bytes: 1024 * 1024,
            max_source_bytes: 1024 * 1024,
        }
    }
}

impl RunnerConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file is not an error: the defaults above apply, so the
    /// service can run without any configuration on disk.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            warn!("Runner config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read runner config: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid runner config: {}", path.display()))?;

        Ok(config)
    }

    /// Compiler arguments for building `source` into `artifact`.
    pub fn compile_args(&self, source: &Path, artifact: &Path) -> Vec<String> {
        vec![
            format!("-std={}", self.std),
            "-o".into(),
            artifact.display().to_string(),
            source.display().to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.compiler, "g++");
        assert_eq!(config.std, "c++11");
        assert_eq!(config.run_time_limit_ms, 5_000);
        assert_eq!(config.compile_time_limit_ms, 30_000);
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let config = RunnerConfig::load("/nonexistent/runner.toml").unwrap();
        assert_eq!(config.compiler, "g++");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
std = "c++17"
run_time_limit_ms = 2000
"#
        )
        .unwrap();

        let config = RunnerConfig::load(file.path()).unwrap();
        assert_eq!(config.std, "c++17");
        assert_eq!(config.run_time_limit_ms, 2_000);
        // untouched fields keep their defaults
        assert_eq!(config.compiler, "g++");
        assert_eq!(config.max_source_bytes, 1024 * 1024);
    }

    #[test]
    fn test_load_rejects_unknown_fields() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "time_limit = 1000").unwrap();

        assert!(RunnerConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_compile_args() {
        let config = RunnerConfig::default();
        let args = config.compile_args(Path::new("/tmp/w/main.cpp"), Path::new("/tmp/w/main"));
        assert_eq!(args[0], "-std=c++11");
        assert_eq!(args[1], "-o");
        assert_eq!(args[2], "/tmp/w/main");
        assert_eq!(args[3], "/tmp/w/main.cpp");
    }
}
