//! File host directory monitor
//!
//! Fallback discovery channel: spreadsheets live on a separate file host
//! under date-based paths (`.../files/YYYY/MM/DD/<uuid>.xlsx`). When page
//! scraping breaks (layout changes, scrape blocks), probing the current and
//! previous month directories still surfaces newly uploaded files.

use chrono::{Datelike, NaiveDate};
use ecomat_common::uuid_norm::is_material_uuid;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;

use crate::html;
use crate::services::crawler::{absolutize, DiscoveryError};
use crate::services::pacing::Pacer;

const USER_AGENT: &str = "ecomat-ingest/0.1 (dataset sync)";

/// Dated spreadsheet paths on the file host; the stem must still pass the
/// UUID shape check before the entry counts
static DATED_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/(\d{4})/(\d{2})/(\d{2})/([^/]+)\.xlsx$").unwrap());

/// `YYYY/MM` path segments for the current and previous month
pub fn month_paths(today: NaiveDate) -> [String; 2] {
    let (prev_year, prev_month) = if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    };
    [
        format!("{:04}/{:02}", prev_year, prev_month),
        format!("{:04}/{:02}", today.year(), today.month()),
    ]
}

/// All dated spreadsheet URLs in one directory listing
pub fn spreadsheet_urls_in_listing(
    listing_html: &str,
    dir_url: &str,
) -> Vec<(NaiveDate, String)> {
    let mut out = Vec::new();

    for anchor in html::anchors(listing_html) {
        let Some(href) = anchor.href.as_deref() else {
            continue;
        };
        let Some(url) = absolutize(dir_url, href) else {
            continue;
        };
        let path = url.split(['?', '#']).next().unwrap_or("");
        let Some(caps) = DATED_FILE_RE.captures(path) else {
            continue;
        };
        // Dataset uploads are named by material-set UUID; anything else in
        // the month directory (reports, annexes) is not ours
        if !is_material_uuid(&caps[4]) {
            continue;
        }
        let (Ok(year), Ok(month), Ok(day)) = (
            caps[1].parse::<i32>(),
            caps[2].parse::<u32>(),
            caps[3].parse::<u32>(),
        ) else {
            continue;
        };
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            out.push((date, url));
        }
    }

    out
}

/// Probes the file host's month directories for fresh uploads
pub struct DirectoryMonitor {
    http_client: reqwest::Client,
    pacer: Arc<Pacer>,
    base_url: String,
}

impl DirectoryMonitor {
    pub fn new(
        base_url: String,
        pacer: Arc<Pacer>,
        timeout: Duration,
    ) -> Result<Self, DiscoveryError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| DiscoveryError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            pacer,
            base_url,
        })
    }

    /// URL of the most recently dated spreadsheet in the probed window.
    ///
    /// Missing month directories count as empty, not as errors; a brand-new
    /// month may not exist on the host yet.
    pub async fn find_latest(&self, today: NaiveDate) -> Result<Option<String>, DiscoveryError> {
        let mut best: Option<(NaiveDate, String)> = None;

        for month in month_paths(today) {
            let dir_url = format!("{}/{}/", self.base_url.trim_end_matches('/'), month);
            let Some(listing) = self.fetch_listing(&dir_url).await? else {
                tracing::debug!(dir = %dir_url, "No listing for month directory");
                continue;
            };
            for entry in spreadsheet_urls_in_listing(&listing, &dir_url) {
                let newer = best
                    .as_ref()
                    .map_or(true, |b| entry.0 > b.0 || (entry.0 == b.0 && entry.1 > b.1));
                if newer {
                    best = Some(entry);
                }
            }
        }

        if let Some((date, url)) = &best {
            tracing::info!(date = %date, url = %url, "Directory monitor found latest upload");
        }
        Ok(best.map(|(_, url)| url))
    }

    async fn fetch_listing(&self, url: &str) -> Result<Option<String>, DiscoveryError> {
        self.pacer.wait().await;

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| DiscoveryError::Network(e.to_string()))?;

        let status = response.status();
        if status == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::Http(status.as_u16(), error_text));
        }

        response
            .text()
            .await
            .map(Some)
            .map_err(|e| DiscoveryError::Network(e.to_string()))
    }
}
