//! Versioned material store
//!
//! SQLite-backed storage for promoted releases. Promoted versions are
//! immutable: each lives under its label in the `versions` log with its
//! materials in row order, and a single settings key points at the current
//! one. Promotion is one transaction, so readers either see the old current
//! version or the new one, never a mix.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

use ecomat_common::db::get_setting;
use ecomat_common::models::{CandidateMetadata, Material, PendingVersion, Version};
use ecomat_common::{Error, Result};

/// Settings key holding the label of the current version
pub const CURRENT_VERSION_KEY: &str = "current_version_label";

/// Outcome of a promotion attempt
#[derive(Debug)]
pub enum PromoteOutcome {
    Promoted(Version),
    /// The label is already in history and `force` was not set; nothing
    /// was written
    AlreadyInHistory,
}

#[derive(Clone)]
pub struct VersionStore {
    db: SqlitePool,
}

impl VersionStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Label of the current version, if any release was ever promoted
    pub async fn current_label(&self) -> Result<Option<String>> {
        get_setting(&self.db, CURRENT_VERSION_KEY).await
    }

    /// Current version with its materials. `None` is the explicit empty
    /// state before the first promotion.
    pub async fn current(&self) -> Result<Option<(Version, Vec<Material>)>> {
        let Some(label) = self.current_label().await? else {
            return Ok(None);
        };
        let Some(version) = self.version_meta(&label).await? else {
            return Err(Error::Internal(format!(
                "current pointer references unknown version '{}'",
                label
            )));
        };
        let materials = self.get_by_label(&label).await?;
        Ok(Some((version, materials)))
    }

    /// Materials of one promoted release, in original row order
    pub async fn get_by_label(&self, label: &str) -> Result<Vec<Material>> {
        let exists: Option<(String,)> = sqlx::query_as("SELECT label FROM versions WHERE label = ?")
            .bind(label)
            .fetch_optional(&self.db)
            .await?;
        if exists.is_none() {
            return Err(Error::NotFound(format!("version '{}' not in history", label)));
        }

        let materials = sqlx::query_as::<_, Material>(
            "SELECT * FROM materials WHERE version_label = ? ORDER BY position",
        )
        .bind(label)
        .fetch_all(&self.db)
        .await?;
        Ok(materials)
    }

    /// Metadata of one promoted release
    pub async fn version_meta(&self, label: &str) -> Result<Option<Version>> {
        let row: Option<VersionRow> = sqlx::query_as(
            "SELECT label, publish_date, ingested_at, materials_count FROM versions WHERE label = ?",
        )
        .bind(label)
        .fetch_optional(&self.db)
        .await?;

        let current = self.current_label().await?;
        row.map(|r| row_to_version(r, current.as_deref())).transpose()
    }

    /// All promoted releases, newest publication first; undated releases
    /// sort last, ties break by label descending
    pub async fn history(&self) -> Result<Vec<Version>> {
        let rows: Vec<VersionRow> = sqlx::query_as(
            "SELECT label, publish_date, ingested_at, materials_count FROM versions",
        )
        .fetch_all(&self.db)
        .await?;

        let current = self.current_label().await?;
        let mut versions = rows
            .into_iter()
            .map(|r| row_to_version(r, current.as_deref()))
            .collect::<Result<Vec<_>>>()?;

        versions.sort_by(|a, b| match (a.publish_date, b.publish_date) {
            (Some(ad), Some(bd)) => bd.cmp(&ad).then_with(|| b.label.cmp(&a.label)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => b.label.cmp(&a.label),
        });
        Ok(versions)
    }

    /// Promote a pending release: write its version row and materials,
    /// repoint the current pointer and clear the pending slot, all in one
    /// transaction.
    ///
    /// Promoting a label already in history is a no-op unless `force` is
    /// set; `force` rewrites the release in place and keeps a single
    /// history row for the label.
    pub async fn promote(&self, pending: &PendingVersion, force: bool) -> Result<PromoteOutcome> {
        let label = pending
            .candidate
            .version_label
            .as_deref()
            .ok_or_else(|| Error::InvalidInput("pending version has no label".to_string()))?;

        let ingested_at = Utc::now();
        let mut tx = self.db.begin().await?;

        let exists: Option<(String,)> = sqlx::query_as("SELECT label FROM versions WHERE label = ?")
            .bind(label)
            .fetch_optional(&mut *tx)
            .await?;

        if exists.is_some() {
            if !force {
                tracing::info!(label = %label, "Label already in history, promotion is a no-op");
                return Ok(PromoteOutcome::AlreadyInHistory);
            }
            sqlx::query("DELETE FROM materials WHERE version_label = ?")
                .bind(label)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "UPDATE versions SET publish_date = ?, ingested_at = ?, materials_count = ?
                 WHERE label = ?",
            )
            .bind(pending.candidate.publish_date.map(|d| d.to_string()))
            .bind(ingested_at.to_rfc3339())
            .bind(pending.materials.len() as i64)
            .bind(label)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                "INSERT INTO versions (label, publish_date, ingested_at, materials_count)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(label)
            .bind(pending.candidate.publish_date.map(|d| d.to_string()))
            .bind(ingested_at.to_rfc3339())
            .bind(pending.materials.len() as i64)
            .execute(&mut *tx)
            .await?;
        }

        for (position, material) in pending.materials.iter().enumerate() {
            sqlx::query(
                "INSERT INTO materials (
                    version_label, position, uuid, uuid_key,
                    legacy_id, name_de, name_fr,
                    disposal_id, disposal_name_de, disposal_name_fr,
                    density, density_min, density_max, unit,
                    ubp_total, ubp_production, ubp_disposal,
                    pe_total, pe_production, pe_production_energetic,
                    pe_production_material, pe_disposal,
                    pe_renewable_total, pe_renewable_production,
                    pe_renewable_production_energetic,
                    pe_renewable_production_material, pe_renewable_disposal,
                    pe_non_renewable_total, pe_non_renewable_production,
                    pe_non_renewable_production_energetic,
                    pe_non_renewable_production_material, pe_non_renewable_disposal,
                    ghg_total, ghg_production, ghg_disposal,
                    biogenic_carbon
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                          ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(label)
            .bind(position as i64)
            .bind(&material.uuid)
            .bind(material.uuid_key())
            .bind(&material.legacy_id)
            .bind(&material.name_de)
            .bind(&material.name_fr)
            .bind(&material.disposal_id)
            .bind(&material.disposal_name_de)
            .bind(&material.disposal_name_fr)
            .bind(&material.density)
            .bind(material.density_min)
            .bind(material.density_max)
            .bind(&material.unit)
            .bind(material.ubp_total)
            .bind(material.ubp_production)
            .bind(material.ubp_disposal)
            .bind(material.pe_total)
            .bind(material.pe_production)
            .bind(material.pe_production_energetic)
            .bind(material.pe_production_material)
            .bind(material.pe_disposal)
            .bind(material.pe_renewable_total)
            .bind(material.pe_renewable_production)
            .bind(material.pe_renewable_production_energetic)
            .bind(material.pe_renewable_production_material)
            .bind(material.pe_renewable_disposal)
            .bind(material.pe_non_renewable_total)
            .bind(material.pe_non_renewable_production)
            .bind(material.pe_non_renewable_production_energetic)
            .bind(material.pe_non_renewable_production_material)
            .bind(material.pe_non_renewable_disposal)
            .bind(material.ghg_total)
            .bind(material.ghg_production)
            .bind(material.ghg_disposal)
            .bind(material.biogenic_carbon)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(CURRENT_VERSION_KEY)
        .bind(label)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM pending_version")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            label = %label,
            materials = pending.materials.len(),
            "Promoted version to current"
        );

        Ok(PromoteOutcome::Promoted(Version {
            label: label.to_string(),
            publish_date: pending.candidate.publish_date,
            ingested_at,
            materials_count: pending.materials.len() as i64,
            is_current: true,
        }))
    }

    /// Stage a release into the single pending slot, replacing whatever was
    /// there. Returns the label of a superseded different release, for the
    /// supersession notice.
    pub async fn put_pending(&self, pending: &PendingVersion) -> Result<Option<String>> {
        let label = pending
            .candidate
            .version_label
            .as_deref()
            .ok_or_else(|| Error::InvalidInput("cannot stage a version without a label".to_string()))?;

        let previous: Option<(String,)> =
            sqlx::query_as("SELECT version_label FROM pending_version WHERE id = 1")
                .fetch_optional(&self.db)
                .await?;

        let materials_json = serde_json::to_string(&pending.materials)
            .map_err(|e| Error::Internal(format!("serialize pending materials: {}", e)))?;

        sqlx::query(
            "INSERT OR REPLACE INTO pending_version
             (id, version_label, url, title, file_size_text, publish_date, filename,
              materials_json, staged_at)
             VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(label)
        .bind(&pending.candidate.url)
        .bind(&pending.candidate.title)
        .bind(&pending.candidate.file_size_text)
        .bind(pending.candidate.publish_date.map(|d| d.to_string()))
        .bind(&pending.candidate.filename)
        .bind(materials_json)
        .bind(pending.staged_at.to_rfc3339())
        .execute(&self.db)
        .await?;

        Ok(previous.map(|(l,)| l).filter(|l| l != label))
    }

    /// The release currently awaiting a decision, if any
    pub async fn pending(&self) -> Result<Option<PendingVersion>> {
        let row: Option<PendingRow> = sqlx::query_as(
            "SELECT version_label, url, title, file_size_text, publish_date, filename,
                    materials_json, staged_at
             FROM pending_version WHERE id = 1",
        )
        .fetch_optional(&self.db)
        .await?;

        let Some((version_label, url, title, file_size_text, publish_date, filename, materials_json, staged_at)) =
            row
        else {
            return Ok(None);
        };
        let materials: Vec<Material> = serde_json::from_str(&materials_json)
            .map_err(|e| Error::Internal(format!("corrupt pending materials: {}", e)))?;

        Ok(Some(PendingVersion {
            candidate: CandidateMetadata {
                url,
                version_label: Some(version_label),
                title,
                file_size_text,
                publish_date: publish_date
                    .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
                filename,
            },
            materials,
            staged_at: parse_timestamp(&staged_at)?,
        }))
    }

    /// Drop the pending slot (rejection, or consuming a no-op approval)
    pub async fn clear_pending(&self) -> Result<()> {
        sqlx::query("DELETE FROM pending_version")
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

type VersionRow = (String, Option<String>, String, i64);
type PendingRow = (
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    String,
    String,
);

fn row_to_version(row: VersionRow, current: Option<&str>) -> Result<Version> {
    let (label, publish_date, ingested_at, materials_count) = row;
    let is_current = current == Some(label.as_str());
    Ok(Version {
        is_current,
        publish_date: publish_date.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        ingested_at: parse_timestamp(&ingested_at)?,
        materials_count,
        label,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("corrupt timestamp '{}': {}", raw, e)))
}
