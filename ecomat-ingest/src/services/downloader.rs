//! Spreadsheet downloader
//!
//! Downloads release files into the local downloads folder. Files on the
//! publisher's host are immutable once uploaded (new content gets a new
//! dated path), so an existing local file with the same name is trusted and
//! not refetched. Writes go through a `.part` file and a rename so a
//! crashed download never leaves a half-written spreadsheet behind.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::services::pacing::Pacer;

const USER_AGENT: &str = "ecomat-ingest/0.1 (dataset sync)";

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {0}: {1}")]
    Http(u16, String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Downloader {
    http_client: reqwest::Client,
    pacer: Arc<Pacer>,
    dir: PathBuf,
}

impl Downloader {
    pub fn new(dir: PathBuf, pacer: Arc<Pacer>, timeout: Duration) -> Result<Self, DownloadError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| DownloadError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            pacer,
            dir,
        })
    }

    /// Fetch a release file, returning the local path.
    ///
    /// Skips the network entirely when the file is already cached.
    pub async fn fetch(&self, url: &str, filename: &str) -> Result<PathBuf, DownloadError> {
        let target = self.dir.join(sanitize_filename(filename));
        if tokio::fs::try_exists(&target).await? {
            tracing::debug!(path = %target.display(), "Reusing cached download");
            return Ok(target);
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        self.pacer.wait().await;

        tracing::info!(url = %url, "Downloading release file");
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(DownloadError::Http(status.as_u16(), error_text));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DownloadError::Network(e.to_string()))?;

        let part = target.with_extension("part");
        tokio::fs::write(&part, &bytes).await?;
        tokio::fs::rename(&part, &target).await?;

        tracing::info!(
            path = %target.display(),
            size = bytes.len(),
            "Download complete"
        );
        Ok(target)
    }
}

/// Keep downloads inside the downloads folder regardless of what the URL
/// path segment contains
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.chars().any(|c| c.is_ascii_alphanumeric()) {
        cleaned
    } else {
        "download.xlsx".to_string()
    }
}
