//! # ecomat Common Library
//!
//! Shared code for the ecomat dataset pipeline:
//! - Material and version data model
//! - Database schema and settings access
//! - Configuration loading
//! - UUID normalization

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod uuid_norm;

pub use error::{Error, Result};
pub use models::{CandidateMetadata, Decision, Indicator, Material, PendingVersion, Version};
