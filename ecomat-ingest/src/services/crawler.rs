//! Publisher page crawler
//!
//! Fetches the publisher's release page over plain HTTP and extracts
//! spreadsheet download candidates from the markup. The page is
//! server-rendered, so no script evaluation is needed; all the interesting
//! metadata (version label, publication date, file size) sits in or next to
//! the download anchors.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use ecomat_common::models::CandidateMetadata;

use crate::html;
use crate::services::pacing::Pacer;

const USER_AGENT: &str = "ecomat-ingest/0.1 (dataset sync)";

/// Container tags worth inspecting around a download anchor
const CONTEXT_TAGS: &[&str] = &["li", "td", "p", "div"];

/// Discovery errors
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {0}: {1}")]
    Http(u16, String),
}

/// Version labels like `2024/1:2024, Version 5` or `2009/1:2022`
static VERSION_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{4})\s*/\s*(\d+)\s*:\s*(\d{4})(?:\s*,\s*version\s+(\d+))?").unwrap()
});

/// Written-out dates, `12. April 2024` or `12 avril 2024`
static WORD_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})\.?\s*(\p{L}+)\.?\s+(\d{4})").unwrap());

/// Numeric dates, `12.04.2024`
static NUMERIC_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})\.(\d{1,2})\.(\d{4})\b").unwrap());

/// File sizes as printed on the page, `363 kB`
static SIZE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b\d+(?:[.,']\d+)?\s*(?:kb|mb|gb)\b").unwrap());

/// Extract the canonical version label from a piece of page text.
///
/// The label is rebuilt from its parts, so page-side whitespace quirks
/// (`2024 / 1 : 2024`) do not leak into stored labels.
pub fn extract_version_label(text: &str) -> Option<String> {
    let caps = VERSION_LABEL_RE.captures(text)?;
    let mut label = format!("{}/{}:{}", &caps[1], &caps[2], &caps[3]);
    if let Some(version) = caps.get(4) {
        label.push_str(", Version ");
        label.push_str(version.as_str());
    }
    Some(label)
}

/// Extract the publication date from a block of text.
///
/// Blocks often carry several dates (validity ranges, correction notes); the
/// publication date is the trailing one, so the last parseable match wins.
pub fn extract_publish_date(text: &str) -> Option<NaiveDate> {
    let mut best: Option<(usize, NaiveDate)> = None;

    for caps in WORD_DATE_RE.captures_iter(text) {
        let offset = caps.get(0).map(|m| m.start()).unwrap_or(0);
        let (Ok(day), Ok(year)) = (caps[1].parse::<u32>(), caps[3].parse::<i32>()) else {
            continue;
        };
        let Some(month) = month_number(&caps[2]) else {
            continue;
        };
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            if best.map_or(true, |(o, _)| offset >= o) {
                best = Some((offset, date));
            }
        }
    }

    for caps in NUMERIC_DATE_RE.captures_iter(text) {
        let offset = caps.get(0).map(|m| m.start()).unwrap_or(0);
        let (Ok(day), Ok(month), Ok(year)) = (
            caps[1].parse::<u32>(),
            caps[2].parse::<u32>(),
            caps[3].parse::<i32>(),
        ) else {
            continue;
        };
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            if best.map_or(true, |(o, _)| offset >= o) {
                best = Some((offset, date));
            }
        }
    }

    best.map(|(_, date)| date)
}

/// Month name lookup, German and French, with prefix matching for
/// abbreviations (`Sept.`, `Okt.`)
fn month_number(name: &str) -> Option<u32> {
    const MONTHS: &[(&str, u32)] = &[
        ("januar", 1),
        ("februar", 2),
        ("märz", 3),
        ("maerz", 3),
        ("april", 4),
        ("mai", 5),
        ("juni", 6),
        ("juli", 7),
        ("august", 8),
        ("september", 9),
        ("oktober", 10),
        ("november", 11),
        ("dezember", 12),
        ("janvier", 1),
        ("février", 2),
        ("fevrier", 2),
        ("mars", 3),
        ("avril", 4),
        ("juin", 6),
        ("juillet", 7),
        ("août", 8),
        ("aout", 8),
        ("septembre", 9),
        ("octobre", 10),
        ("novembre", 11),
        ("décembre", 12),
        ("decembre", 12),
    ];

    let needle = name.trim_end_matches('.').to_lowercase();
    if needle.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .find(|(month, _)| *month == needle || month.starts_with(&needle))
        .map(|(_, n)| *n)
}

/// File size token from page text, kept verbatim (`363 kB`)
pub fn extract_size(text: &str) -> Option<String> {
    SIZE_RE.find(text).map(|m| m.as_str().to_string())
}

/// Whether an href points at a spreadsheet, ignoring query and fragment
fn is_spreadsheet_href(href: &str) -> bool {
    let path = href.split(['?', '#']).next().unwrap_or("");
    let lower = html::to_lower(path);
    lower.ends_with(".xlsx") || lower.ends_with(".xls")
}

/// Resolve an href against the page URL
pub fn absolutize(base: &str, href: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }

    let scheme_end = base.find("://")?;
    let scheme = &base[..scheme_end];
    let origin_end = base[scheme_end + 3..]
        .find('/')
        .map(|i| scheme_end + 3 + i)
        .unwrap_or(base.len());
    let origin = &base[..origin_end];

    if let Some(rest) = href.strip_prefix("//") {
        return Some(format!("{}://{}", scheme, rest));
    }
    if href.starts_with('/') {
        return Some(format!("{}{}", origin, href));
    }

    let href = href.strip_prefix("./").unwrap_or(href);
    let dir = match base.rfind('/') {
        Some(pos) if pos > scheme_end + 2 => &base[..=pos],
        _ => return Some(format!("{}/{}", origin, href)),
    };
    Some(format!("{}{}", dir, href))
}

/// Last path segment of a URL, used as the local download name
pub fn filename_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("download.xlsx")
        .to_string()
}

/// Pull all spreadsheet candidates out of a page.
///
/// Metadata lookup order: the anchor's own text first, then the smallest
/// enclosing list/table block. The same URL linked twice (icon plus text
/// link) yields one candidate with the union of the metadata.
pub fn extract_candidates(page_html: &str, base_url: &str) -> Vec<CandidateMetadata> {
    let mut out: Vec<CandidateMetadata> = Vec::new();

    for anchor in html::anchors(page_html) {
        let Some(href) = anchor.href.as_deref() else {
            continue;
        };
        if !is_spreadsheet_href(href) {
            continue;
        }
        let Some(url) = absolutize(base_url, href) else {
            continue;
        };

        let block = html::enclosing_block(page_html, anchor.start, CONTEXT_TAGS);
        let version_label = extract_version_label(&anchor.text)
            .or_else(|| block.as_deref().and_then(extract_version_label));
        let publish_date = block
            .as_deref()
            .and_then(extract_publish_date)
            .or_else(|| extract_publish_date(&anchor.text));
        let file_size_text =
            extract_size(&anchor.text).or_else(|| block.as_deref().and_then(extract_size));
        let title = (!anchor.text.is_empty()).then(|| anchor.text.clone());

        if let Some(existing) = out.iter_mut().find(|c| c.url == url) {
            // Second anchor to the same file fills in what the first missed
            existing.version_label = existing.version_label.take().or(version_label);
            existing.publish_date = existing.publish_date.or(publish_date);
            existing.file_size_text = existing.file_size_text.take().or(file_size_text);
            existing.title = existing.title.take().or(title);
        } else {
            let filename = filename_from_url(&url);
            out.push(CandidateMetadata {
                url,
                version_label,
                title,
                file_size_text,
                publish_date,
                filename,
            });
        }
    }

    out
}

/// HTTP crawler for the publisher's release page
pub struct PublisherCrawler {
    http_client: reqwest::Client,
    pacer: Arc<Pacer>,
    page_url: String,
    retries: u32,
}

impl PublisherCrawler {
    pub fn new(
        page_url: String,
        pacer: Arc<Pacer>,
        timeout: Duration,
        retries: u32,
    ) -> Result<Self, DiscoveryError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| DiscoveryError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            pacer,
            page_url,
            retries,
        })
    }

    /// Fetch the page and extract candidates.
    ///
    /// A page that loads fine but yields zero spreadsheet links is refetched
    /// a bounded number of times; the publisher occasionally serves partial
    /// pages under load.
    pub async fn discover(&self) -> Result<Vec<CandidateMetadata>, DiscoveryError> {
        let mut attempt = 0;
        loop {
            let page = self.fetch_page().await?;
            let candidates = extract_candidates(&page, &self.page_url);
            if !candidates.is_empty() {
                tracing::info!(count = candidates.len(), "Discovered release candidates");
                return Ok(candidates);
            }
            if attempt >= self.retries {
                tracing::warn!(url = %self.page_url, "Publisher page yielded no spreadsheet links");
                return Ok(Vec::new());
            }
            attempt += 1;
            tracing::debug!(attempt, "No candidates on page, refetching");
        }
    }

    async fn fetch_page(&self) -> Result<String, DiscoveryError> {
        self.pacer.wait().await;

        tracing::debug!(url = %self.page_url, "Fetching publisher page");
        let response = self
            .http_client
            .get(&self.page_url)
            .send()
            .await
            .map_err(|e| DiscoveryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::Http(status.as_u16(), error_text));
        }

        response
            .text()
            .await
            .map_err(|e| DiscoveryError::Network(e.to_string()))
    }
}

/// Where the pipeline gets its candidates from.
///
/// `Static` serves a fixed list and exists for tests and offline operation
/// (re-running a pass against a known URL without touching the publisher).
pub enum DiscoverySource {
    Publisher(PublisherCrawler),
    Static(Vec<CandidateMetadata>),
}

impl DiscoverySource {
    pub async fn discover(&self) -> Result<Vec<CandidateMetadata>, DiscoveryError> {
        match self {
            DiscoverySource::Publisher(crawler) => crawler.discover().await,
            DiscoverySource::Static(list) => Ok(list.clone()),
        }
    }
}
