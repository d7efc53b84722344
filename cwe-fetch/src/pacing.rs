//! Adaptive pacing and per-unit timing
//!
//! The inter-group delay tracks the API's recent responsiveness: the slower
//! the last 100 responses, the longer workers wait between groups.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

pub const LATENCY_WINDOW: usize = 100;

/// Delay in seconds for an average latency in seconds
///
/// | average | delay |
/// |---------|-------|
/// | > 5.0   | 3.0   |
/// | > 2.0   | 2.0   |
/// | > 1.0   | 1.5   |
/// | else / no samples | 1.0 |
pub fn adaptive_delay(average: Option<f64>) -> f64 {
    match average {
        Some(avg) if avg > 5.0 => 3.0,
        Some(avg) if avg > 2.0 => 2.0,
        Some(avg) if avg > 1.0 => 1.5,
        _ => 1.0,
    }
}

/// Rolling window of the most recent response latencies
pub struct LatencyWindow {
    samples: Mutex<VecDeque<f64>>,
    capacity: usize,
}

impl LatencyWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, latency: Duration) {
        let mut samples = self.samples.lock();
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(latency.as_secs_f64());
    }

    /// Mean latency in seconds, None without samples
    pub fn average(&self) -> Option<f64> {
        let samples = self.samples.lock();
        if samples.is_empty() {
            None
        } else {
            Some(samples.iter().sum::<f64>() / samples.len() as f64)
        }
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::new(LATENCY_WINDOW)
    }
}

/// Sleeps and timeouts of the collection strategies
#[derive(Debug, Clone)]
pub struct PacingConfig {
    /// Multiplier applied to the adaptive delay (1.0 = seconds as tabled)
    pub adaptive_scale: f64,
    /// Group retry wait is `group_retry_base × (retry + 1)`
    pub group_retry_base: Duration,
    pub group_retries: u32,
    /// Sleep after each individual fetch of a failed group
    pub individual_delay: Duration,
    /// Sleep after each call inside a chunk
    pub chunk_call_delay: Duration,
    /// Pause before the final sequential pass
    pub final_pause: Duration,
    /// Sleep between calls of the final pass
    pub final_call_delay: Duration,
    pub id_timeout: Duration,
    pub group_timeout: Duration,
    pub chunk_timeout: Duration,
    pub type_batch_timeout: Duration,
    pub probe_timeout: Duration,
    pub fallback_timeout: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            adaptive_scale: 1.0,
            group_retry_base: Duration::from_secs(3),
            group_retries: 2,
            individual_delay: Duration::from_secs(1),
            chunk_call_delay: Duration::from_millis(100),
            final_pause: Duration::from_secs(5),
            final_call_delay: Duration::from_secs(2),
            id_timeout: Duration::from_secs(60),
            group_timeout: Duration::from_secs(120),
            chunk_timeout: Duration::from_secs(300),
            type_batch_timeout: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(15),
            fallback_timeout: Duration::from_secs(60),
        }
    }
}

impl PacingConfig {
    /// Zero sleeps with the default timeouts, for tests against a local server
    pub fn immediate() -> Self {
        Self {
            adaptive_scale: 0.0,
            group_retry_base: Duration::ZERO,
            individual_delay: Duration::ZERO,
            chunk_call_delay: Duration::ZERO,
            final_pause: Duration::ZERO,
            final_call_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Inter-group sleep for the window's current average
    pub fn group_delay(&self, window: &LatencyWindow) -> Duration {
        Duration::from_secs_f64(adaptive_delay(window.average()) * self.adaptive_scale.max(0.0))
    }

    pub fn group_retry_wait(&self, retry: u32) -> Duration {
        self.group_retry_base.saturating_mul(retry + 1)
    }
}
