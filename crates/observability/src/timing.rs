//! Stage timing collectors
//!
//! Each pipeline stage receives its timers explicitly. A timer is either a
//! [`TimeCollector`] that keeps every sample and reports rates through
//! `tracing`, or a [`NoopTimer`] when the reporting level is disabled.

use std::time::{Duration, Instant};

use tracing::Level;

const NANOS_IN_SECOND: f64 = 1_000_000_000.0;

/// Measuring / no-op capability shared by all stage timers
pub trait Timer: Send {
    /// Whether samples are kept
    fn is_enabled(&self) -> bool;

    /// Add one sample
    fn put(&mut self, elapsed: Duration);

    /// Report min/avg/median/max times and rates
    ///
    /// `divider` is the number of items one sample covers.
    fn report(&self, comment: &str, divider: u64);

    /// Drop all samples
    fn reset(&mut self);
}

/// Time a synchronous call into `timer`
pub fn measure<T>(timer: &mut dyn Timer, func: impl FnOnce() -> T) -> T {
    if !timer.is_enabled() {
        return func();
    }
    let start = Instant::now();
    let result = func();
    timer.put(start.elapsed());
    result
}

/// Create a timer that measures only if `level` is enabled
pub fn timer_for(level: Level) -> Box<dyn Timer> {
    let enabled = match level {
        Level::TRACE => tracing::enabled!(Level::TRACE),
        Level::DEBUG => tracing::enabled!(Level::DEBUG),
        Level::INFO => tracing::enabled!(Level::INFO),
        Level::WARN => tracing::enabled!(Level::WARN),
        Level::ERROR => tracing::enabled!(Level::ERROR),
    };
    if enabled {
        Box::new(TimeCollector::new(level))
    } else {
        Box::new(NoopTimer)
    }
}

/// Timer that keeps every sample
#[derive(Debug, Clone)]
pub struct TimeCollector {
    level: Level,
    samples: Vec<u64>,
}

impl TimeCollector {
    /// Create a collector reporting at `level`
    pub fn new(level: Level) -> Self {
        Self {
            level,
            samples: Vec::new(),
        }
    }

    /// Number of samples kept
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample was kept
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Compute the report line, `None` without samples
    pub fn summary(&self, divider: u64) -> Option<TimingSummary> {
        if self.samples.is_empty() {
            return None;
        }
        let divider = divider.max(1) as f64;

        let mut sorted = self.samples.clone();
        sorted.sort_unstable();
        let len = sorted.len();
        let median = if len % 2 == 0 {
            (sorted[len / 2] + sorted[(len - 1) / 2]) / 2
        } else {
            sorted[len / 2]
        };
        let min = sorted[0] as f64;
        let max = sorted[len - 1] as f64;
        let avg = sorted.iter().map(|&v| v as f64).sum::<f64>() / len as f64;
        let median = median as f64;

        Some(TimingSummary {
            samples: len,
            min_nanos: min / divider,
            avg_nanos: avg / divider,
            median_nanos: median / divider,
            max_nanos: max / divider,
            min_rate: rate(divider, max),
            avg_rate: rate(divider, avg),
            median_rate: rate(divider, median),
            max_rate: rate(divider, min),
        })
    }
}

fn rate(divider: f64, nanos: f64) -> f64 {
    if nanos > 0.0 {
        divider * NANOS_IN_SECOND / nanos
    } else {
        f64::INFINITY
    }
}

impl Timer for TimeCollector {
    fn is_enabled(&self) -> bool {
        true
    }

    fn put(&mut self, elapsed: Duration) {
        self.samples
            .push(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX));
    }

    fn report(&self, comment: &str, divider: u64) {
        let message = match self.summary(divider) {
            Some(summary) => format!("{comment} - {summary}"),
            None => format!("{comment}: no samples"),
        };
        match self.level {
            Level::TRACE => tracing::trace!("{message}"),
            Level::DEBUG => tracing::debug!("{message}"),
            Level::INFO => tracing::info!("{message}"),
            Level::WARN => tracing::warn!("{message}"),
            Level::ERROR => tracing::error!("{message}"),
        }
    }

    fn reset(&mut self) {
        self.samples.clear();
    }
}

/// Timer that keeps nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTimer;

impl Timer for NoopTimer {
    fn is_enabled(&self) -> bool {
        false
    }

    fn put(&mut self, _elapsed: Duration) {}

    fn report(&self, _comment: &str, _divider: u64) {}

    fn reset(&mut self) {}
}

/// Timing report for one collector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingSummary {
    pub samples: usize,
    pub min_nanos: f64,
    pub avg_nanos: f64,
    pub median_nanos: f64,
    pub max_nanos: f64,
    pub min_rate: f64,
    pub avg_rate: f64,
    pub median_rate: f64,
    pub max_rate: f64,
}

impl std::fmt::Display for TimingSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "time (nano): min: {:.3}, avg: {:.3}, median: {:.3}, max: {:.3}; \
             rate (item/sec): min: {:.3}, avg: {:.3}, median: {:.3}, max: {:.3} (n={})",
            self.min_nanos,
            self.avg_nanos,
            self.median_nanos,
            self.max_nanos,
            self.min_rate,
            self.avg_rate,
            self.median_rate,
            self.max_rate,
            self.samples
        )
    }
}
