use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use cpp_runner::config::RunnerConfig;
use cpp_runner::engine::compiler::ensure_compiler_available;
use cpp_runner::routes::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cpp_runner=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let config_path =
        std::env::var("RUNNER_CONFIG").unwrap_or_else(|_| "./files/runner.toml".into());
    let config = RunnerConfig::load(&config_path)?;
    info!("Loaded runner configuration from {}", config_path);

    // Fail fast on a broken environment instead of answering every request
    // with a system error.
    ensure_compiler_available(&config).await?;
    info!("Confirmed compiler '{}' is available", config.compiler);

    let state = Arc::new(AppState { config });
    let app = routes::router(state);

    let addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
