//! Version comparator
//!
//! Decides whether a discovered candidate is a new release. The comparison
//! is exact string equality on version labels: labels are opaque publisher
//! identifiers, not ordered values, and any label other than the current one
//! (including a rollback to an older label) counts as new.

use ecomat_common::models::CandidateMetadata;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionDecision {
    /// Candidate differs from the current version and should be ingested
    New,
    /// Candidate matches the current version; nothing to do
    Unchanged,
}

#[derive(Debug, Error)]
pub enum CompareError {
    /// The candidate has no resolvable version label. This needs operator
    /// attention: either the page layout changed or the publisher shipped
    /// an unlabeled file.
    #[error("no version label resolvable for candidate at {url}")]
    LabelMissing { url: String },
}

/// Classify a candidate against the current version label
pub fn compare(
    candidate: &CandidateMetadata,
    current_label: Option<&str>,
) -> Result<VersionDecision, CompareError> {
    let label = candidate
        .version_label
        .as_deref()
        .ok_or_else(|| CompareError::LabelMissing {
            url: candidate.url.clone(),
        })?;

    match current_label {
        Some(current) if current == label => Ok(VersionDecision::Unchanged),
        // No current version yet, or a different label: ingest it
        _ => Ok(VersionDecision::New),
    }
}
