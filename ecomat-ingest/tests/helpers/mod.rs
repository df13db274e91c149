//! Test helper utilities
//!
//! Shared builders for store, approval, pipeline and API tests.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use ecomat_common::models::{CandidateMetadata, Material, PendingVersion};
use ecomat_ingest::services::approval::ApprovalEngine;
use ecomat_ingest::services::notifier::{MemorySink, Notifier};
use ecomat_ingest::store::VersionStore;

/// In-memory database with the full service schema applied.
///
/// A `:memory:` database exists per connection, so the pool is pinned to a
/// single connection to keep every test query on the same database.
pub async fn create_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    ecomat_common::db::create_schema(&pool)
        .await
        .expect("Failed to create schema");
    pool
}

/// Approval engine capturing its notifications in memory
#[allow(dead_code)]
pub fn create_test_approval(store: VersionStore) -> (Arc<ApprovalEngine>, MemorySink) {
    let sink = MemorySink::new();
    let engine = Arc::new(ApprovalEngine::new(store, Notifier::Memory(sink.clone())));
    (engine, sink)
}

/// Material with a valid hyphenated v4 UUID derived from `n`
#[allow(dead_code)]
pub fn material(n: u32, name: &str) -> Material {
    Material {
        uuid: format!("{:08x}-1111-4222-8333-444444444444", n),
        name_de: Some(name.to_string()),
        ghg_total: Some(n as f64),
        ..Default::default()
    }
}

/// Candidate carrying `label`, published on the given date
#[allow(dead_code)]
pub fn candidate(label: &str, publish_date: Option<NaiveDate>) -> CandidateMetadata {
    CandidateMetadata {
        url: format!(
            "https://files.example.ch/2025/02/17/{}.xlsx",
            label.replace(['/', ':', ',', ' '], "_")
        ),
        version_label: Some(label.to_string()),
        title: Some("Excel".to_string()),
        file_size_text: Some("363 kB".to_string()),
        publish_date,
        filename: "oekobilanzdaten.xlsx".to_string(),
    }
}

/// Pending version with `count` generated materials
#[allow(dead_code)]
pub fn pending(label: &str, count: u32) -> PendingVersion {
    PendingVersion {
        candidate: candidate(label, NaiveDate::from_ymd_opt(2025, 2, 17)),
        materials: (1..=count)
            .map(|n| material(n, &format!("Material {}", n)))
            .collect(),
        staged_at: Utc::now(),
    }
}
