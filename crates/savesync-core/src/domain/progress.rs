//! Throughput estimation and human-readable formatting
//!
//! [`ProgressEstimator`] turns raw byte counters sampled over time into an
//! exponentially smoothed rate and an ETA. Samples closer together than the
//! minimum interval are ignored so bursty callbacks don't skew the rate.

use std::time::{Duration, Instant};

/// Default minimum spacing between rate samples
pub const DEFAULT_MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(50);

/// Default weight of the newest instantaneous rate
pub const DEFAULT_SMOOTHING: f64 = 0.2;

/// Smoothed throughput / ETA estimator for one transfer
#[derive(Debug, Clone)]
pub struct ProgressEstimator {
    min_interval: Duration,
    alpha: f64,
    last_sample_at: Instant,
    last_sample_bytes: u64,
    smoothed_bps: f64,
}

impl ProgressEstimator {
    /// Creates an estimator with default parameters, baselined at `now`
    pub fn new(now: Instant) -> Self {
        Self::with_params(DEFAULT_MIN_SAMPLE_INTERVAL, DEFAULT_SMOOTHING, now)
    }

    /// Creates an estimator with a custom sample interval and smoothing weight
    ///
    /// `alpha` is clamped into `(0, 1]`.
    pub fn with_params(min_interval: Duration, alpha: f64, now: Instant) -> Self {
        let alpha = if alpha.is_finite() && alpha > 0.0 {
            alpha.min(1.0)
        } else {
            DEFAULT_SMOOTHING
        };
        Self {
            min_interval,
            alpha,
            last_sample_at: now,
            last_sample_bytes: 0,
            smoothed_bps: 0.0,
        }
    }

    /// Clears the rate and re-baselines at `now` with zero bytes
    pub fn reset(&mut self, now: Instant) {
        self.last_sample_at = now;
        self.last_sample_bytes = 0;
        self.smoothed_bps = 0.0;
    }

    /// Feeds a cumulative byte count observed at `now`
    ///
    /// Returns true if the sample was far enough from the previous one to
    /// update the rate.
    pub fn sample_at(&mut self, transferred: u64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_sample_at);
        if elapsed <= self.min_interval {
            return false;
        }

        let delta = transferred.saturating_sub(self.last_sample_bytes);
        let instant_bps = delta as f64 / elapsed.as_secs_f64();
        self.smoothed_bps = if self.smoothed_bps <= 0.0 {
            instant_bps
        } else {
            self.alpha * instant_bps + (1.0 - self.alpha) * self.smoothed_bps
        };

        self.last_sample_at = now;
        self.last_sample_bytes = transferred;
        true
    }

    /// Current smoothed rate in bytes per second
    pub fn rate_bps(&self) -> f64 {
        self.smoothed_bps
    }

    /// Seconds remaining, or `None` when the total is unknown
    pub fn eta_secs(&self, transferred: u64, total: Option<u64>) -> Option<u64> {
        let total = total?;
        let remaining = total.saturating_sub(transferred);
        let eta = (remaining as f64 / self.smoothed_bps.max(1.0)).ceil();
        Some(eta.max(0.0) as u64)
    }
}

// ============================================================================
// Formatting
// ============================================================================

const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

/// Formats a byte count as `B`, or `KB`/`MB`/`GB`/`TB` with one decimal
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    value /= 1024.0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Like [`format_bytes`] but rounds down, so 4.96 GB reads "4.9 GB"
///
/// Whole values and values of 100 or more drop the decimal.
pub fn format_bytes_floor(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let floored = (value * 10.0).floor() / 10.0;
    if floored >= 100.0 || (floored - floored.round()).abs() < 1e-9 {
        format!("{:.0} {}", floored, UNITS[unit])
    } else {
        format!("{:.1} {}", floored, UNITS[unit])
    }
}

/// Formats seconds as `Ns`, `Mm SSs` or `Hh MMm`
pub fn format_duration(seconds: u64) -> String {
    if seconds == 0 {
        return "0s".to_string();
    }
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{}h {:02}m", h, m)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}
