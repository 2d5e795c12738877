//! HTTP surface
//!
//! Two JSON routes mirror the platform contract: `/api/coding/run-cpp`
//! compiles and runs a submission, `/api/coding/verify-cpp` additionally
//! checks the output against an expected answer. Compile errors, runtime
//! errors and timeouts are normal response payloads; only validation
//! failures and unexpected internal errors map to non-200 statuses.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info};

use crate::config::RunnerConfig;
use crate::engine::{self, RunReport, RunStatus, VerifyReport};

/// Shared application state; the runner config is read-only after startup.
pub struct AppState {
    pub config: RunnerConfig,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/coding/run-cpp", post(run_cpp))
        .route("/api/coding/verify-cpp", post(verify_cpp))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub code: String,
    #[serde(default)]
    pub input: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub code: String,
    #[serde(default)]
    pub input: String,
    pub expected_output: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compilation_error: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    #[serde(flatten)]
    pub run: RunResponse,
    /// Absent when compilation or execution failed: the verdict is
    /// "not applicable", not "fail"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": message })),
            )
                .into_response(),
            ApiError::Internal(e) => {
                error!("Request failed: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "success": false,
                        "message": "server error",
                        "error": format!("{:#}", e),
                    })),
                )
                    .into_response()
            }
        }
    }
}

async fn run_cpp(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    validate_source(&state.config, &req.code)?;

    info!(bytes = req.code.len(), "Received run-cpp request");
    let report = engine::compile_and_run(&state.config, &req.code, &req.input).await?;

    Ok(Json(run_response(report)))
}

async fn verify_cpp(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    validate_source(&state.config, &req.code)?;
    if req.expected_output.is_empty() {
        return Err(ApiError::BadRequest(
            "expectedOutput must not be empty".into(),
        ));
    }

    info!(bytes = req.code.len(), "Received verify-cpp request");
    let report = engine::verify(&state.config, &req.code, &req.input, &req.expected_output).await?;

    Ok(Json(verify_response(report)))
}

fn validate_source(config: &RunnerConfig, code: &str) -> Result<(), ApiError> {
    if code.trim().is_empty() {
        return Err(ApiError::BadRequest("code must not be empty".into()));
    }
    if code.len() > config.max_source_bytes {
        return Err(ApiError::BadRequest(format!(
            "source exceeds maximum size of {} bytes",
            config.max_source_bytes
        )));
    }
    Ok(())
}

fn run_response(report: RunReport) -> RunResponse {
    match report.status {
        RunStatus::Success => RunResponse {
            success: true,
            output: report.stdout,
            error: None,
            compilation_error: None,
            message: "execution succeeded".into(),
        },
        RunStatus::CompileError => RunResponse {
            success: false,
            output: String::new(),
            error: None,
            compilation_error: report.diagnostics,
            message: "compilation failed".into(),
        },
        RunStatus::RuntimeError => RunResponse {
            success: false,
            output: report.stdout,
            error: report.diagnostics,
            compilation_error: None,
            message: "runtime error".into(),
        },
        RunStatus::TimedOut => RunResponse {
            success: false,
            output: report.stdout,
            error: report.diagnostics,
            compilation_error: None,
            message: "time limit exceeded".into(),
        },
        RunStatus::SystemError => RunResponse {
            success: false,
            output: report.stdout,
            error: report.diagnostics,
            compilation_error: None,
            message: "system error".into(),
        },
    }
}

fn verify_response(report: VerifyReport) -> VerifyResponse {
    let mut response = VerifyResponse {
        run: run_response(report.run),
        is_correct: None,
        actual_output: None,
        expected_output: None,
    };

    if let Some(comparison) = report.comparison {
        response.run.message = if comparison.is_match {
            "test passed".into()
        } else {
            "test failed: output does not match expected output".into()
        };
        response.is_correct = Some(comparison.is_match);
        response.actual_output = Some(comparison.actual);
        response.expected_output = Some(comparison.expected);
    }

    response
}
