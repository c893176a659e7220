//! Client-side polling for notes whose compression is still pending.
//!
//! Reads fail with `NotReady` until the worker has run. This module retries
//! exactly that condition with fixed or exponential backoff; every other
//! error is final and returned on the first attempt.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::retrieve::{Note, RetrieveService};

/// Configuration for readiness polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Total attempts, including the first (default: 3).
    pub max_attempts: u32,
    /// Delay before the second attempt (default: 1000ms).
    pub delay_ms: u64,
    /// Growth factor per attempt; 1.0 gives a fixed delay (default: 1.0).
    pub backoff_multiplier: f64,
    /// Upper bound on a single delay (default: 10 seconds).
    pub max_delay_ms: u64,
    /// Add up to 50% random jitter to each delay (default: false).
    pub jitter: bool,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1_000,
            backoff_multiplier: 1.0,
            max_delay_ms: 10_000,
            jitter: false,
        }
    }
}

impl ReadinessConfig {
    /// Delay after the given zero-based failed attempt.
    ///
    /// Computes `delay_ms * backoff_multiplier^attempt`, capped at `max_delay_ms`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay_ms as f64).max(0.0) as u64;
        if self.jitter && capped > 1 {
            let extra = rand::thread_rng().gen_range(0..=capped / 2);
            Duration::from_millis(capped.saturating_add(extra))
        } else {
            Duration::from_millis(capped)
        }
    }
}

/// Retries an operation while it reports `NotReady`.
#[derive(Debug, Clone, Default)]
pub struct ReadinessPoller {
    config: ReadinessConfig,
}

impl ReadinessPoller {
    /// Create a poller with the given configuration.
    pub fn new(config: ReadinessConfig) -> Self {
        Self { config }
    }

    /// Run `operation` until it stops returning `NotReady` or attempts run out.
    /// On exhaustion the last `NotReady` is returned.
    pub async fn poll<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                    let delay = self.config.delay(attempt);
                    debug!(attempt = attempt + 1, delay_ms = delay.as_millis() as u64, "Not ready, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Retrieve a note, waiting out a pending compression.
    pub async fn retrieve(&self, service: &RetrieveService, note_id: &str, version: &str) -> Result<Note> {
        self.poll(move || service.retrieve(Some(note_id), Some(version)))
            .await
    }
}
