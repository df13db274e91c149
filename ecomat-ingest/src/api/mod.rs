//! HTTP API handlers for ecomat-ingest

pub mod health;
pub mod pipeline;
pub mod versions;

pub use health::health_routes;
pub use pipeline::pipeline_routes;
pub use versions::version_routes;
