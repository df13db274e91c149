//! Periodic check scheduler
//!
//! Drives the ingest pipeline on a fixed interval. The first pass runs at
//! startup, then one per interval. A single-flight gate shared with the
//! on-demand API trigger keeps passes from overlapping; a tick that lands
//! while a pass is running is skipped, not queued.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

use crate::services::pipeline::IngestPipeline;

pub struct Scheduler {
    pipeline: Arc<IngestPipeline>,
    run_gate: Arc<Mutex<()>>,
    interval: Duration,
    enabled: bool,
}

impl Scheduler {
    pub fn new(
        pipeline: Arc<IngestPipeline>,
        run_gate: Arc<Mutex<()>>,
        interval: Duration,
        enabled: bool,
    ) -> Self {
        Self {
            pipeline,
            run_gate,
            interval,
            enabled,
        }
    }

    pub async fn run(self: Arc<Self>) {
        if !self.enabled {
            tracing::info!("Scheduled dataset checks are disabled");
            return;
        }

        tracing::info!(interval_secs = self.interval.as_secs(), "Starting check scheduler");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            match self.run_gate.clone().try_lock_owned() {
                Ok(_guard) => {
                    let outcome = self.pipeline.run_once().await;
                    tracing::info!(outcome = ?outcome, "Scheduled ingest pass finished");
                }
                Err(_) => {
                    tracing::debug!("Skipping scheduled pass, another pass is running");
                }
            }
        }
    }
}
