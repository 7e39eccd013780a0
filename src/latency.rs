//! Rolling recompute-latency statistics for the dashboards and the
//! stress sweep.

use std::collections::VecDeque;
use std::time::Instant;

use serde::Serialize;

const WINDOW_SIZE: usize = 256;

#[derive(Debug, Clone, Default, Serialize)]
pub struct LatencyStats {
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub mean_us: u64,
    pub max_us: u64,
    pub count: usize,
}

/// Tracks full-pipeline recompute durations over a sliding window.
pub struct RecomputeTracker {
    samples: VecDeque<u64>,
}

impl RecomputeTracker {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(WINDOW_SIZE),
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }

    /// Record one recompute that started at `started`.
    pub fn record(&mut self, started: Instant) {
        if self.samples.len() >= WINDOW_SIZE {
            self.samples.pop_front();
        }
        self.samples.push_back(started.elapsed().as_micros() as u64);
    }

    pub fn stats(&self) -> LatencyStats {
        if self.samples.is_empty() {
            return LatencyStats::default();
        }
        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let n = sorted.len();
        let pct = |p: usize| sorted[(n * p / 100).min(n - 1)];
        LatencyStats {
            p50_us: pct(50),
            p95_us: pct(95),
            p99_us: pct(99),
            mean_us: sorted.iter().sum::<u64>() / n as u64,
            max_us: sorted[n - 1],
            count: n,
        }
    }
}

impl Default for RecomputeTracker {
    fn default() -> Self {
        Self::new()
    }
}

pub fn format_latency(us: u64) -> String {
    if us >= 1_000_000 {
        format!("{:.1}s", us as f64 / 1_000_000.0)
    } else if us >= 1_000 {
        format!("{:.1}ms", us as f64 / 1_000.0)
    } else {
        format!("{us}us")
    }
}
