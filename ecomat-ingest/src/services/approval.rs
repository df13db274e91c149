//! Approval workflow
//!
//! Holds a newly parsed release in the single pending slot until an
//! operator approves or rejects it. Staging and deciding serialize on an
//! internal lock, so a decision always applies to the release it was read
//! against.

use thiserror::Error;
use tokio::sync::Mutex;

use ecomat_common::models::{Decision, PendingVersion, Version};

use crate::services::notifier::{Notification, Notifier};
use crate::store::{PromoteOutcome, VersionStore};

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("no version is awaiting a decision")]
    NoPending,

    #[error("decision names version '{submitted}' but '{staged}' is staged")]
    VersionMismatch { submitted: String, staged: String },

    #[error(transparent)]
    Store(#[from] ecomat_common::Error),
}

/// Result of a processed decision
#[derive(Debug)]
pub enum DecisionOutcome {
    /// Approved and now current
    Promoted(Version),
    /// Approved, but the label was already in history; the pending slot
    /// was cleared and the stored release left unchanged
    AlreadyInHistory { label: String },
    /// Rejected and discarded
    Rejected { label: String },
}

pub struct ApprovalEngine {
    store: VersionStore,
    notifier: Notifier,
    gate: Mutex<()>,
}

impl ApprovalEngine {
    pub fn new(store: VersionStore, notifier: Notifier) -> Self {
        Self {
            store,
            notifier,
            gate: Mutex::new(()),
        }
    }

    /// Stage a parsed release for operator review and send the decision
    /// request. A release already staged under a different label is
    /// superseded and announced as such; restaging the same label just
    /// refreshes the slot.
    pub async fn stage(&self, pending: PendingVersion) -> ecomat_common::Result<()> {
        let _guard = self.gate.lock().await;

        let label = pending.label().to_string();
        let superseded = self.store.put_pending(&pending).await?;

        if let Some(old_label) = superseded {
            tracing::info!(old = %old_label, new = %label, "Superseding staged version");
            self.notifier
                .send(&Notification::plain(format!(
                    "Staged version '{}' was superseded by '{}' before a decision was made",
                    old_label, label
                )))
                .await;
        }

        self.notifier
            .send(&Notification::decision_request(summary_text(&pending), &label))
            .await;

        tracing::info!(label = %label, materials = pending.materials.len(), "Version staged for approval");
        Ok(())
    }

    /// Apply an operator decision to the staged release.
    ///
    /// The submitted label must match the staged one, so a decision made
    /// against a superseded notification cannot land on the wrong release.
    /// On approval failure the pending slot is left intact for a retry.
    pub async fn decide(
        &self,
        decision: Decision,
        version: &str,
        force: bool,
    ) -> Result<DecisionOutcome, ApprovalError> {
        let _guard = self.gate.lock().await;

        let pending = self.store.pending().await?.ok_or(ApprovalError::NoPending)?;
        let staged = pending.label().to_string();
        if version != staged {
            return Err(ApprovalError::VersionMismatch {
                submitted: version.to_string(),
                staged,
            });
        }

        match decision {
            Decision::Approve => match self.store.promote(&pending, force).await {
                Ok(PromoteOutcome::Promoted(promoted)) => {
                    self.notifier
                        .send(&Notification::plain(format!(
                            "Version '{}' approved and promoted to current ({} materials)",
                            promoted.label, promoted.materials_count
                        )))
                        .await;
                    Ok(DecisionOutcome::Promoted(promoted))
                }
                Ok(PromoteOutcome::AlreadyInHistory) => {
                    self.store.clear_pending().await?;
                    self.notifier
                        .send(&Notification::plain(format!(
                            "Version '{}' is already in history; stored data left unchanged",
                            staged
                        )))
                        .await;
                    Ok(DecisionOutcome::AlreadyInHistory { label: staged })
                }
                Err(e) => {
                    tracing::error!(label = %staged, error = %e, "Promotion failed, pending version kept");
                    self.notifier
                        .send(&Notification::plain(format!(
                            "Failed to promote version '{}': {}. It remains staged.",
                            staged, e
                        )))
                        .await;
                    Err(e.into())
                }
            },
            Decision::Reject => {
                self.store.clear_pending().await?;
                self.notifier
                    .send(&Notification::plain(format!("Version '{}' rejected", staged)))
                    .await;
                tracing::info!(label = %staged, "Version rejected");
                Ok(DecisionOutcome::Rejected { label: staged })
            }
        }
    }

    /// The release currently awaiting a decision
    pub async fn pending(&self) -> ecomat_common::Result<Option<PendingVersion>> {
        self.store.pending().await
    }
}

/// Human-readable staging summary for the decision request
fn summary_text(pending: &PendingVersion) -> String {
    let candidate = &pending.candidate;
    let mut text = format!("New dataset version staged: {}", pending.label());

    if let Some(date) = candidate.publish_date {
        text.push_str(&format!("\nPublished: {}", date));
    }
    match &candidate.file_size_text {
        Some(size) => text.push_str(&format!("\nFile: {} ({})", candidate.filename, size)),
        None => text.push_str(&format!("\nFile: {}", candidate.filename)),
    }
    text.push_str(&format!("\nSource: {}", candidate.url));
    text.push_str(&format!("\nParsed {} materials", pending.materials.len()));

    let preview: Vec<&str> = pending
        .materials
        .iter()
        .take(3)
        .map(|m| m.display_name())
        .collect();
    if !preview.is_empty() {
        text.push_str(&format!(", starting with {}", preview.join(", ")));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ecomat_common::models::{CandidateMetadata, Material};

    fn material(uuid: &str, name: &str) -> Material {
        Material {
            uuid: uuid.to_string(),
            name_de: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn pending(label: &str) -> PendingVersion {
        PendingVersion {
            candidate: CandidateMetadata {
                url: "https://example.ch/files/data.xlsx".to_string(),
                version_label: Some(label.to_string()),
                title: None,
                file_size_text: Some("2.8 MB".to_string()),
                publish_date: None,
                filename: "data.xlsx".to_string(),
            },
            materials: vec![
                material("11111111-2222-4333-8444-555555555555", "Beton C25/30"),
                material("21111111-2222-4333-8444-555555555555", "Kalksandstein"),
            ],
            staged_at: Utc::now(),
        }
    }

    #[test]
    fn summary_includes_label_size_and_preview() {
        let text = summary_text(&pending("2022/1:2025, Version 5"));
        assert!(text.contains("2022/1:2025, Version 5"));
        assert!(text.contains("data.xlsx (2.8 MB)"));
        assert!(text.contains("Parsed 2 materials"));
        assert!(text.contains("Beton C25/30"));
        assert!(text.contains("Kalksandstein"));
    }

    #[test]
    fn summary_omits_missing_fields() {
        let mut p = pending("2022/1:2025");
        p.candidate.file_size_text = None;
        p.materials.clear();
        let text = summary_text(&p);
        assert!(!text.contains("("));
        assert!(!text.contains("starting with"));
        assert!(text.contains("Parsed 0 materials"));
    }
}
