//! Hit/miss/population counters and the periodic report.
//!
//! Counters are bumped on the lookup hot path. [`Metrics::maybe_report`] is
//! also called on the hot path; a compare-and-exchange on the last report
//! timestamp lets exactly one caller per interval drain the counters and log.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

/// Process-wide cache counters.
#[derive(Debug)]
pub struct Metrics {
    hits: AtomicU64,
    misses: AtomicU64,
    populations: AtomicU64,
    /// Milliseconds since `epoch` at the last report.
    last_report_ms: AtomicU64,
    epoch: Instant,
    interval: Duration,
}

/// Counters drained by one report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    /// Lookups served from a populated entry.
    pub hits: u64,
    /// Lookups served by the quick path.
    pub misses: u64,
    /// Successful populations (rescanned or skipped).
    pub populations: u64,
    /// Resident entries across all rulesets.
    pub live_entries: u64,
    /// Resident set size of the process, when the platform exposes it.
    pub resident_bytes: Option<u64>,
}

impl MetricsSnapshot {
    /// Calculate hit rate (0.0 to 1.0).
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl Metrics {
    /// Creates counters that report at most once per `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            populations: AtomicU64::new(0),
            last_report_ms: AtomicU64::new(0),
            epoch: Instant::now(),
            interval,
        }
    }

    /// Records a lookup answered from cache.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a lookup answered by the quick path.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successful population.
    pub fn record_population(&self) {
        self.populations.fetch_add(1, Ordering::Relaxed);
    }

    /// Hits since the last report.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Misses since the last report.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Populations since the last report.
    #[must_use]
    pub fn populations(&self) -> u64 {
        self.populations.load(Ordering::Relaxed)
    }

    /// Reports if the interval has elapsed and this caller wins the claim.
    ///
    /// `live_entries` is only evaluated by the winning caller.
    pub fn maybe_report<F>(&self, live_entries: F) -> Option<MetricsSnapshot>
    where
        F: FnOnce() -> u64,
    {
        let now_ms = self.epoch.elapsed().as_millis() as u64;
        let last_ms = self.last_report_ms.load(Ordering::Acquire);
        if now_ms.saturating_sub(last_ms) < self.interval.as_millis() as u64 {
            return None;
        }

        self.last_report_ms
            .compare_exchange(last_ms, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        let snapshot = MetricsSnapshot {
            hits: self.hits.swap(0, Ordering::Relaxed),
            misses: self.misses.swap(0, Ordering::Relaxed),
            populations: self.populations.swap(0, Ordering::Relaxed),
            live_entries: live_entries(),
            resident_bytes: resident_memory_bytes(),
        };

        info!(
            hits = snapshot.hits,
            misses = snapshot.misses,
            populations = snapshot.populations,
            hit_rate = %format!("{:.1}%", snapshot.hit_rate() * 100.0),
            live_entries = snapshot.live_entries,
            resident_mb = snapshot.resident_bytes.map(|b| b / 1_048_576),
            "cache stats"
        );

        Some(snapshot)
    }
}

/// Resident set size from `/proc/self/status` (Linux only).
fn resident_memory_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: u64 = line
        .trim_start_matches("VmRSS:")
        .trim()
        .trim_end_matches("kB")
        .trim()
        .parse()
        .ok()?;
    Some(kb * 1024)
}
