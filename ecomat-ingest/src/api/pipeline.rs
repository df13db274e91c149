//! Pipeline control API handlers
//!
//! POST /pipeline/run, GET /pipeline/status, POST /pipeline/decision

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use ecomat_common::models::Decision;

use crate::error::{ApiError, ApiResult};
use crate::services::approval::DecisionOutcome;
use crate::AppState;

/// POST /pipeline/run response
#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub started: bool,
}

/// GET /pipeline/status response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatusResponse {
    pub current_label: Option<String>,
    pub pending: Option<PendingSummary>,
}

/// Summary of the staged release awaiting a decision
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSummary {
    pub label: String,
    pub url: String,
    pub publish_date: Option<NaiveDate>,
    pub file_size_text: Option<String>,
    pub materials_count: usize,
    pub staged_at: DateTime<Utc>,
}

/// POST /pipeline/decision request
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub label: String,
    pub decision: Decision,
    /// Re-promote a label that is already in history
    #[serde(default)]
    pub force: bool,
}

/// POST /pipeline/decision response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResponse {
    pub result: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub materials_count: Option<i64>,
}

/// POST /pipeline/run
///
/// Trigger an ingest pass in the background. 409 Conflict when a pass is
/// already running, whether scheduled or on-demand.
pub async fn run_pipeline(State(state): State<AppState>) -> ApiResult<Json<RunResponse>> {
    let guard = state
        .run_gate
        .clone()
        .try_lock_owned()
        .map_err(|_| ApiError::Conflict("an ingest pass is already running".to_string()))?;

    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        let _guard = guard;
        let outcome = pipeline.run_once().await;
        tracing::info!(outcome = ?outcome, "On-demand ingest pass finished");
    });

    Ok(Json(RunResponse { started: true }))
}

/// GET /pipeline/status
pub async fn pipeline_status(
    State(state): State<AppState>,
) -> ApiResult<Json<PipelineStatusResponse>> {
    let current_label = state.store.current_label().await?;
    let pending = state.approval.pending().await?.map(|p| {
        let label = p.label().to_string();
        PendingSummary {
            label,
            url: p.candidate.url,
            publish_date: p.candidate.publish_date,
            file_size_text: p.candidate.file_size_text,
            materials_count: p.materials.len(),
            staged_at: p.staged_at,
        }
    });

    Ok(Json(PipelineStatusResponse {
        current_label,
        pending,
    }))
}

/// POST /pipeline/decision
///
/// Route an operator decision to the approval state machine. The submitted
/// label must match the staged release: 404 when nothing is pending, 409
/// when the labels disagree.
pub async fn submit_decision(
    State(state): State<AppState>,
    Json(request): Json<DecisionRequest>,
) -> ApiResult<Json<DecisionResponse>> {
    let outcome = state
        .approval
        .decide(request.decision, &request.label, request.force)
        .await?;

    let response = match outcome {
        DecisionOutcome::Promoted(version) => DecisionResponse {
            result: "promoted".to_string(),
            label: version.label,
            materials_count: Some(version.materials_count),
        },
        DecisionOutcome::AlreadyInHistory { label } => DecisionResponse {
            result: "already_in_history".to_string(),
            label,
            materials_count: None,
        },
        DecisionOutcome::Rejected { label } => DecisionResponse {
            result: "rejected".to_string(),
            label,
            materials_count: None,
        },
    };
    Ok(Json(response))
}

/// Build pipeline control routes
pub fn pipeline_routes() -> Router<AppState> {
    Router::new()
        .route("/pipeline/run", post(run_pipeline))
        .route("/pipeline/status", get(pipeline_status))
        .route("/pipeline/decision", post(submit_decision))
}
