//! Ingest pipeline
//!
//! Runs one sequential pass: discover candidates, pick the most recent,
//! compare against the current version, and for a new release download,
//! normalize and stage it for approval. Failures notify the operator and
//! leave the store and the pending slot untouched; the pass reports a
//! typed outcome instead of an error so the scheduled loop never dies.

use std::sync::Arc;

use chrono::Utc;

use ecomat_common::models::{CandidateMetadata, PendingVersion};

use crate::services::approval::ApprovalEngine;
use crate::services::comparator::{compare, CompareError, VersionDecision};
use crate::services::crawler::{filename_from_url, DiscoverySource};
use crate::services::dir_monitor::DirectoryMonitor;
use crate::services::downloader::Downloader;
use crate::services::normalizer::normalize;
use crate::services::notifier::{Notification, Notifier};
use crate::store::VersionStore;

/// Outcome of one ingest pass
#[derive(Debug)]
pub enum PassOutcome {
    /// Neither the publisher page nor the file host yielded a candidate
    NoCandidates,
    /// Best candidate matches the current version
    UpToDate { label: String },
    /// A new release was parsed and staged for approval
    Staged { label: String, materials: usize },
    /// A file was found but no version label could be extracted; the
    /// operator was alerted for a manual check
    LabelMissing { url: String },
    /// The pass stopped at `stage`; the operator was notified
    Failed { stage: &'static str, message: String },
}

pub struct IngestPipeline {
    source: DiscoverySource,
    monitor: Option<DirectoryMonitor>,
    downloader: Downloader,
    store: VersionStore,
    approval: Arc<ApprovalEngine>,
    notifier: Notifier,
}

impl IngestPipeline {
    pub fn new(
        source: DiscoverySource,
        monitor: Option<DirectoryMonitor>,
        downloader: Downloader,
        store: VersionStore,
        approval: Arc<ApprovalEngine>,
        notifier: Notifier,
    ) -> Self {
        Self {
            source,
            monitor,
            downloader,
            store,
            approval,
            notifier,
        }
    }

    pub async fn run_once(&self) -> PassOutcome {
        tracing::info!("Starting ingest pass");

        let mut discovery_error = None;
        let mut candidates = match self.source.discover().await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(error = %e, "Publisher discovery failed, probing file host");
                discovery_error = Some(e);
                Vec::new()
            }
        };

        if candidates.is_empty() {
            candidates = self.fallback_candidates().await;
        }

        let Some(best) = pick_best(candidates) else {
            // An unreachable page and an empty page are different problems;
            // tell the operator which one this was
            let text = match discovery_error {
                Some(e) => format!(
                    "Dataset check could not read the publisher page and no fallback was found on the file host: {}",
                    e
                ),
                None => "Dataset check found no spreadsheet files on the publisher page or the file host"
                    .to_string(),
            };
            self.notifier.send(&Notification::plain(text)).await;
            tracing::warn!("No candidates found");
            return PassOutcome::NoCandidates;
        };

        let current = match self.store.current_label().await {
            Ok(current) => current,
            Err(e) => return self.fail("store", e.to_string()).await,
        };

        match compare(&best, current.as_deref()) {
            Ok(VersionDecision::Unchanged) => {
                let label = current.unwrap_or_default();
                tracing::info!(label = %label, "Dataset is up to date");
                PassOutcome::UpToDate { label }
            }
            Ok(VersionDecision::New) => self.ingest(best).await,
            Err(CompareError::LabelMissing { url }) => {
                self.notifier
                    .send(&Notification::plain(format!(
                        "Found a dataset file but could not extract a version label; manual check needed: {}",
                        url
                    )))
                    .await;
                tracing::warn!(url = %url, "Candidate has no version label");
                PassOutcome::LabelMissing { url }
            }
        }
    }

    /// Download, parse and stage a new release
    async fn ingest(&self, candidate: CandidateMetadata) -> PassOutcome {
        let label = candidate.version_label.clone().unwrap_or_default();
        tracing::info!(label = %label, url = %candidate.url, "New version detected");

        let path = match self.downloader.fetch(&candidate.url, &candidate.filename).await {
            Ok(path) => path,
            Err(e) => {
                return self
                    .fail("download", format!("{}: {}", candidate.url, e))
                    .await
            }
        };

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return self
                    .fail("download", format!("read {}: {}", path.display(), e))
                    .await
            }
        };

        let materials = match normalize(&bytes) {
            Ok(materials) => materials,
            Err(e) => return self.fail("normalize", e.to_string()).await,
        };
        if materials.is_empty() {
            return self
                .fail("normalize", format!("'{}' contains no material rows", candidate.filename))
                .await;
        }

        let count = materials.len();
        let pending = PendingVersion {
            candidate,
            materials,
            staged_at: Utc::now(),
        };
        if let Err(e) = self.approval.stage(pending).await {
            return self.fail("stage", e.to_string()).await;
        }

        PassOutcome::Staged {
            label,
            materials: count,
        }
    }

    /// Directory-monitor fallback. A URL found here has no surrounding page
    /// text, so the candidate carries no label and the comparator will flag
    /// it for manual review.
    async fn fallback_candidates(&self) -> Vec<CandidateMetadata> {
        let Some(monitor) = &self.monitor else {
            return Vec::new();
        };

        match monitor.find_latest(Utc::now().date_naive()).await {
            Ok(Some(url)) => {
                tracing::info!(url = %url, "File host probe found a dated spreadsheet");
                vec![CandidateMetadata {
                    filename: filename_from_url(&url),
                    url,
                    version_label: None,
                    title: None,
                    file_size_text: None,
                    publish_date: None,
                }]
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "File host probe failed");
                Vec::new()
            }
        }
    }

    async fn fail(&self, stage: &'static str, message: String) -> PassOutcome {
        tracing::error!(stage = stage, error = %message, "Ingest pass failed");
        self.notifier
            .send(&Notification::plain(format!(
                "Dataset ingest failed during {}: {}",
                stage, message
            )))
            .await;
        PassOutcome::Failed { stage, message }
    }
}

/// Most recent candidate: latest publish date first, undated last, ties by
/// label so "Version 5" beats "Version 4"
fn pick_best(mut candidates: Vec<CandidateMetadata>) -> Option<CandidateMetadata> {
    candidates.sort_by(|a, b| {
        match (a.publish_date, b.publish_date) {
            (Some(ad), Some(bd)) => ad.cmp(&bd),
            (Some(_), None) => std::cmp::Ordering::Greater,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (None, None) => std::cmp::Ordering::Equal,
        }
        .then_with(|| a.version_label.cmp(&b.version_label))
    });
    candidates.pop()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn candidate(label: Option<&str>, date: Option<(i32, u32, u32)>) -> CandidateMetadata {
        CandidateMetadata {
            url: format!("https://example.ch/{}.xlsx", label.unwrap_or("unlabeled")),
            version_label: label.map(str::to_string),
            title: None,
            file_size_text: None,
            publish_date: date.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap()),
            filename: "data.xlsx".to_string(),
        }
    }

    #[test]
    fn pick_best_prefers_latest_publish_date() {
        let best = pick_best(vec![
            candidate(Some("2022/1:2025, Version 4"), Some((2024, 3, 1))),
            candidate(Some("2022/1:2025, Version 5"), Some((2025, 2, 17))),
        ])
        .unwrap();
        assert_eq!(best.version_label.as_deref(), Some("2022/1:2025, Version 5"));
    }

    #[test]
    fn pick_best_puts_undated_last() {
        let best = pick_best(vec![
            candidate(None, None),
            candidate(Some("2022/1:2025, Version 4"), Some((2024, 3, 1))),
        ])
        .unwrap();
        assert_eq!(best.version_label.as_deref(), Some("2022/1:2025, Version 4"));
    }

    #[test]
    fn pick_best_breaks_date_ties_by_label() {
        let best = pick_best(vec![
            candidate(Some("2022/1:2025, Version 4"), Some((2025, 2, 17))),
            candidate(Some("2022/1:2025, Version 5"), Some((2025, 2, 17))),
        ])
        .unwrap();
        assert_eq!(best.version_label.as_deref(), Some("2022/1:2025, Version 5"));
    }

    #[test]
    fn pick_best_of_nothing_is_none() {
        assert!(pick_best(Vec::new()).is_none());
    }
}
