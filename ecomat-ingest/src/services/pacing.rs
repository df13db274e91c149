//! Politeness pacing for publisher requests
//!
//! The publisher is a small government site; every HTTP interaction in the
//! pipeline goes through one shared [`Pacer`] so that page fetches, directory
//! probes and downloads together never exceed the configured rate.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Enforces a minimum interval between requests
pub struct Pacer {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    /// Wait if necessary to comply with the configured rate
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Pacing: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}
