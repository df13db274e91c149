//! Version history API handlers
//!
//! Read-only views over the versioned store for downstream consumers.
//! Version labels contain `/` and `:`, so single-version lookup takes the
//! label as a query parameter instead of a path segment.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde::Serialize;

use ecomat_common::models::{Material, Version};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /versions/current response. `version` stays `null` until the first
/// promotion; that empty state is deliberate, not an error.
#[derive(Debug, Serialize)]
pub struct CurrentVersionResponse {
    pub version: Option<Version>,
    pub materials: Vec<Material>,
}

/// GET /versions/by-label response
#[derive(Debug, Serialize)]
pub struct VersionDetailResponse {
    pub version: Version,
    pub materials: Vec<Material>,
}

#[derive(Debug, Deserialize)]
pub struct LabelQuery {
    pub label: String,
}

/// GET /versions
pub async fn list_versions(State(state): State<AppState>) -> ApiResult<Json<Vec<Version>>> {
    Ok(Json(state.store.history().await?))
}

/// GET /versions/current
pub async fn current_version(
    State(state): State<AppState>,
) -> ApiResult<Json<CurrentVersionResponse>> {
    let response = match state.store.current().await? {
        Some((version, materials)) => CurrentVersionResponse {
            version: Some(version),
            materials,
        },
        None => CurrentVersionResponse {
            version: None,
            materials: Vec::new(),
        },
    };
    Ok(Json(response))
}

/// GET /versions/by-label?label=...
pub async fn version_by_label(
    State(state): State<AppState>,
    Query(query): Query<LabelQuery>,
) -> ApiResult<Json<VersionDetailResponse>> {
    let version = state
        .store
        .version_meta(&query.label)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("version '{}' not in history", query.label)))?;
    let materials = state.store.get_by_label(&query.label).await?;

    Ok(Json(VersionDetailResponse { version, materials }))
}

/// Build version history routes
pub fn version_routes() -> Router<AppState> {
    Router::new()
        .route("/versions", get(list_versions))
        .route("/versions/current", get(current_version))
        .route("/versions/by-label", get(version_by_label))
}
