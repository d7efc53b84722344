//! Request counters and the `--show-stats` report

use crate::pacing::LatencyWindow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters shared by every worker
pub struct RequestStats {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    latencies: LatencyWindow,
    started: Instant,
}

impl RequestStats {
    pub fn new(window: usize) -> Self {
        Self {
            requests: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            latencies: LatencyWindow::new(window),
            started: Instant::now(),
        }
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_latency(&self, latency: Duration) {
        self.latencies.record(latency);
    }

    pub fn latencies(&self) -> &LatencyWindow {
        &self.latencies
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn report(&self, cache_size: usize, workers: usize) -> PerformanceStats {
        let requests = self.requests();
        let cache_hits = self.cache_hits();
        let elapsed = self.started.elapsed().as_secs_f64();
        PerformanceStats {
            total_requests: requests,
            cache_hits,
            cache_hit_ratio: cache_hits as f64 / requests.max(1) as f64 * 100.0,
            elapsed_secs: elapsed,
            requests_per_second: requests as f64 / elapsed.max(1.0),
            cache_size,
            max_workers: workers,
            avg_response_secs: self.latencies.average().unwrap_or(0.0),
            response_samples: self.latencies.len(),
        }
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new(crate::pacing::LATENCY_WINDOW)
    }
}

/// Snapshot of the counters at the end of a run
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    /// Percent of lookups served from cache, relative to network requests
    pub cache_hit_ratio: f64,
    pub elapsed_secs: f64,
    pub requests_per_second: f64,
    pub cache_size: usize,
    pub max_workers: usize,
    pub avg_response_secs: f64,
    pub response_samples: usize,
}

impl fmt::Display for PerformanceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Performance statistics")?;
        writeln!(f, "  Total requests:     {}", self.total_requests)?;
        writeln!(f, "  Cache hits:         {} ({:.1}%)", self.cache_hits, self.cache_hit_ratio)?;
        writeln!(f, "  Elapsed:            {:.1}s", self.elapsed_secs)?;
        writeln!(f, "  Requests/second:    {:.2}", self.requests_per_second)?;
        writeln!(f, "  Cache size:         {}", self.cache_size)?;
        writeln!(f, "  Workers:            {}", self.max_workers)?;
        write!(
            f,
            "  Avg response time:  {:.3}s ({} samples)",
            self.avg_response_secs, self.response_samples
        )
    }
}
