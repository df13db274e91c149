//! ecomat-ingest library interface
//!
//! Exposes the pipeline, store and HTTP API for the binaries and for
//! integration testing.

pub mod api;
pub mod diff;
pub mod error;
pub mod html;
pub mod services;
pub mod store;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::services::approval::ApprovalEngine;
use crate::services::pipeline::IngestPipeline;
use crate::store::VersionStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub store: VersionStore,
    pub approval: Arc<ApprovalEngine>,
    pub pipeline: Arc<IngestPipeline>,
    /// Single-flight gate shared with the scheduler
    pub run_gate: Arc<Mutex<()>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        store: VersionStore,
        approval: Arc<ApprovalEngine>,
        pipeline: Arc<IngestPipeline>,
        run_gate: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            db,
            store,
            approval,
            pipeline,
            run_gate,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::pipeline_routes())
        .merge(api::version_routes())
        .merge(api::health_routes())
        .with_state(state)
}
