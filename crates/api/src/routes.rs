//! HTTP route handlers for the API.

use crate::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use meridian_common::{AnalysisReport, ChatTurn, MeridianError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub reports: usize,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        reports: state.reports.read().await.len(),
    })
}

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip)]
    pub status: StatusCode,
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl From<MeridianError> for ErrorResponse {
    fn from(e: MeridianError) -> Self {
        let (status, code) = match &e {
            MeridianError::DocumentNotFound(_) => (StatusCode::NOT_FOUND, "DOCUMENT_NOT_FOUND"),
            MeridianError::NotIndexed(_) => (StatusCode::NOT_FOUND, "NOT_INDEXED"),
            MeridianError::Collaborator(_) => (StatusCode::BAD_GATEWAY, "COLLABORATOR_ERROR"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        Self {
            error: e.to_string(),
            code,
            status,
        }
    }
}

fn bad_request(message: &str) -> ErrorResponse {
    ErrorResponse {
        error: message.to_string(),
        code: "BAD_REQUEST",
        status: StatusCode::BAD_REQUEST,
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub subject: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub report: AnalysisReport,
    pub indexed_chunks: usize,
}

/// Run a full analysis for a subject and index it for chat.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ErrorResponse> {
    if request.subject.trim().is_empty() {
        return Err(bad_request("subject must not be empty"));
    }
    info!(subject = %request.subject, "Analysis requested");

    let (report, indexed_chunks) = state
        .analyze_and_index(&request.subject)
        .await
        .map_err(|e| {
            error!(subject = %request.subject, error = %e, "Analysis failed");
            ErrorResponse::from(e)
        })?;

    Ok(Json(AnalyzeResponse {
        report,
        indexed_chunks,
    }))
}

/// Latest report for a subject.
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
) -> Result<Json<AnalysisReport>, ErrorResponse> {
    let key = subject.trim().to_uppercase();
    state
        .reports
        .read()
        .await
        .get(&key)
        .cloned()
        .map(Json)
        .ok_or(ErrorResponse {
            error: format!("No report for {key}"),
            code: "NOT_FOUND",
            status: StatusCode::NOT_FOUND,
        })
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub subject: String,
    pub question: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub subject: String,
    pub answer: String,
    pub has_analysis: bool,
}

/// Ask a follow-up question about an indexed analysis.
///
/// Always answers with text; a missing analysis or a failed completion is
/// described in `answer`.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ErrorResponse> {
    if request.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let has_analysis = state.chat.has_analysis(&request.subject).await;
    let answer = state
        .chat
        .chat(&request.subject, &request.question, &request.history)
        .await;

    Ok(Json(ChatResponse {
        subject: request.subject.trim().to_uppercase(),
        answer,
        has_analysis,
    }))
}
