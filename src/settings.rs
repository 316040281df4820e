use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{Result, VolleyError};

/// Smallest accepted `duration` and `interval`.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

const GRACEFUL_STOP_FRACTION: f64 = 0.30;
const GRACEFUL_STOP_FLOOR: Duration = Duration::from_secs(5);
const GRACEFUL_STOP_CEILING: Duration = Duration::from_secs(60);
const HARD_CEILING_SLACK: Duration = Duration::from_secs(60);

/// What happens to outstanding work once the run duration has elapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationMode {
    /// Stop scheduling, then drain queued work for at most the graceful-stop timeout.
    #[default]
    Duration,
    /// Stop scheduling, then let every enqueued item finish (bounded by the hard ceiling).
    CompleteCurrentInterval,
    /// Stop at the duration cutoff and abandon everything still queued or running.
    StrictDuration,
}

/// How work items are turned into concurrent executions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// A fixed pool of workers pulling from the shared queue.
    #[default]
    WorkerPool,
    /// One spawned task per work item. Only sensible for small batches.
    TaskPerItem,
}

/// Load shape for a single run.
///
/// `concurrency` is the number of work items emitted per `interval` tick,
/// not the number of workers.
///
/// ```
/// use std::time::Duration;
/// use volley::settings::{Settings, TerminationMode};
///
/// let settings = Settings::builder()
///     .concurrency(50)
///     .duration(Duration::from_secs(10))
///     .interval(Duration::from_millis(500))
///     .termination_mode(TerminationMode::CompleteCurrentInterval)
///     .build();
/// assert!(settings.validate().is_ok());
/// assert_eq!(settings.graceful_stop_timeout(), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct Settings {
    pub concurrency: usize,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    #[serde(with = "humantime_serde")]
    #[builder(default = Duration::from_secs(1))]
    pub interval: Duration,
    #[serde(default)]
    #[builder(default)]
    pub termination_mode: TerminationMode,
    /// Explicit drain window; derived from `duration` when unset.
    #[serde(default, with = "humantime_serde")]
    #[builder(default, setter(strip_option))]
    pub graceful_stop_timeout: Option<Duration>,
    #[serde(default)]
    #[builder(default)]
    pub strategy: ExecutionStrategy,
}

impl Settings {
    /// Checked constructor: fails immediately on any non-positive value.
    pub fn new(concurrency: usize, duration: Duration, interval: Duration) -> Result<Self> {
        let settings = Self::builder()
            .concurrency(concurrency)
            .duration(duration)
            .interval(interval)
            .build();
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(VolleyError::invalid("concurrency", "must be at least 1"));
        }
        if self.duration < MIN_PERIOD {
            return Err(VolleyError::invalid(
                "duration",
                format!("must be at least {MIN_PERIOD:?}, got {:?}", self.duration),
            ));
        }
        if self.interval < MIN_PERIOD {
            return Err(VolleyError::invalid(
                "interval",
                format!("must be at least {MIN_PERIOD:?}, got {:?}", self.interval),
            ));
        }
        Ok(())
    }

    /// The drain window, `clamp(0.30 * duration, 5s, 60s)` unless set explicitly.
    pub fn graceful_stop_timeout(&self) -> Duration {
        self.graceful_stop_timeout.unwrap_or_else(|| {
            self.duration
                .mul_f64(GRACEFUL_STOP_FRACTION)
                .clamp(GRACEFUL_STOP_FLOOR, GRACEFUL_STOP_CEILING)
        })
    }

    /// Upper bound on the whole run, so a stuck action can never hang the caller.
    pub fn hard_ceiling(&self) -> Duration {
        self.duration + self.graceful_stop_timeout().max(HARD_CEILING_SLACK)
    }

    /// Number of batches a drift-free run emits: `ceil(duration / interval)`.
    pub fn expected_batches(&self) -> u64 {
        let duration = self.duration.as_nanos();
        let interval = self.interval.as_nanos().max(1);
        duration.div_ceil(interval) as u64
    }
}
