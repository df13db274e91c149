//! Service modules for the dataset ingest workflow

pub mod approval;
pub mod comparator;
pub mod crawler;
pub mod dir_monitor;
pub mod downloader;
pub mod normalizer;
pub mod notifier;
pub mod pacing;
pub mod pipeline;
pub mod scheduler;

pub use approval::{ApprovalEngine, ApprovalError, DecisionOutcome};
pub use comparator::{compare, CompareError, VersionDecision};
pub use crawler::{DiscoveryError, DiscoverySource, PublisherCrawler};
pub use dir_monitor::DirectoryMonitor;
pub use downloader::{DownloadError, Downloader};
pub use normalizer::{normalize, NormalizeError};
pub use notifier::{Notification, Notifier};
pub use pipeline::{IngestPipeline, PassOutcome};
pub use scheduler::Scheduler;
