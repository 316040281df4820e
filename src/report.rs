use std::{fmt, future::Future, time::Duration};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::aggregate::{percentile, AggregateState, Distribution};

/// Queue delay statistics. Only positive delays are sampled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueTimeStats {
    pub samples: u64,
    pub mean: Duration,
    pub p95: Duration,
    pub max: Duration,
}

impl QueueTimeStats {
    fn from_samples(samples: &[Duration]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();
        let total: Duration = sorted.iter().sum();
        Self {
            samples: sorted.len() as u64,
            mean: total / sorted.len() as u32,
            p95: percentile(&sorted, 95.0),
            max: sorted[sorted.len() - 1],
        }
    }
}

/// Immutable snapshot of a run's statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadResult {
    pub name: String,
    /// Completed requests, always `success + failure`.
    pub total: u64,
    pub success: u64,
    pub failure: u64,
    pub elapsed: Duration,
    pub latency: Distribution,
    pub requests_started: u64,
    /// Started but never completed, e.g. abandoned at shutdown.
    pub requests_in_flight: u64,
    pub requests_per_second: f64,
    pub queue_time: QueueTimeStats,
    pub worker_threads: usize,
    /// `(started / workers) / elapsed_seconds`. A per-worker start rate,
    /// not a bounded percentage.
    pub worker_utilization: f64,
    pub peak_memory_bytes: u64,
    pub batches_completed: u64,
}

impl LoadResult {
    /// All-zero result for a run that had nothing to do.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_aggregate(name: &str, state: &AggregateState, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        let requests_per_second = if secs > 0.0 {
            state.completed as f64 / secs
        } else {
            0.0
        };
        let worker_utilization = if state.worker_threads_used > 0 && secs > 0.0 {
            (state.started as f64 / state.worker_threads_used as f64) / secs
        } else {
            0.0
        };

        Self {
            name: name.to_owned(),
            total: state.completed,
            success: state.success,
            failure: state.failure,
            elapsed,
            latency: Distribution::from_samples(&state.latencies),
            requests_started: state.started,
            requests_in_flight: state.in_flight(),
            requests_per_second,
            queue_time: QueueTimeStats::from_samples(&state.queue_times),
            worker_threads: state.worker_threads_used,
            worker_utilization,
            peak_memory_bytes: state.peak_memory,
            batches_completed: state.batches_completed,
        }
    }

    /// Fraction of completed requests that succeeded, in `[0, 1]`.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.success as f64 / self.total as f64
    }
}

impl fmt::Display for LoadResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "scenario: {}", self.name)?;
        writeln!(
            f,
            "  requests:   {} total, {} ok, {} failed ({:.2}% success)",
            self.total,
            self.success,
            self.failure,
            self.success_rate() * 100.0
        )?;
        writeln!(
            f,
            "  started:    {} ({} in flight), {} batches",
            self.requests_started, self.requests_in_flight, self.batches_completed
        )?;
        writeln!(
            f,
            "  elapsed:    {:?}, {:.2} req/s",
            self.elapsed, self.requests_per_second
        )?;
        writeln!(
            f,
            "  latency:    min {:?} | mean {:?} | p50 {:?} | p95 {:?} | p99 {:?} | max {:?}",
            self.latency.min,
            self.latency.mean,
            self.latency.median,
            self.latency.p95,
            self.latency.p99,
            self.latency.max
        )?;
        writeln!(
            f,
            "  queue time: mean {:?} | p95 {:?} | max {:?}",
            self.queue_time.mean, self.queue_time.p95, self.queue_time.max
        )?;
        writeln!(
            f,
            "  workers:    {} (utilization {:.2})",
            self.worker_threads, self.worker_utilization
        )?;
        write!(
            f,
            "  memory:     {:.1} MiB peak",
            self.peak_memory_bytes as f64 / 1_048_576.0
        )
    }
}

/// A processed view of a [`LoadResult`].
///
/// Reports are pure data: they derive whatever a consumer needs from the
/// result and carry no I/O. `LoadResult` is itself a report, so the simplest
/// reporter can consume it directly.
pub trait Report
where
    Self: Send + Sync + fmt::Debug + From<LoadResult> + Serialize + DeserializeOwned,
{
}

impl Report for LoadResult {}

/// Consumes a [`Report`] and performs side effects (printing, persisting, sending).
///
/// # Example
/// ```rust
/// use volley::{Report, Reporter};
///
/// struct CountingReporter;
///
/// impl<R: Report> Reporter<R> for CountingReporter {
///     async fn report(&self, report: &R) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
///         println!("{report:?}");
///         Ok(())
///     }
/// }
/// ```
pub trait Reporter<R: Report> {
    fn report(
        &self,
        report: &R,
    ) -> impl Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>>;
}

/// Prints a human readable summary to stdout.
pub struct StdoutReporter;

impl Reporter<LoadResult> for StdoutReporter {
    async fn report(
        &self,
        report: &LoadResult,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        println!("{report}");
        Ok(())
    }
}
