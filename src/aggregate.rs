use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::metric::{Outcome, Verdict};

/// The mutable state behind a run's statistics.
///
/// Only the collector task owns an `AggregateState`; every mutation goes
/// through its mailbox so updates are linearized. Final statistics
/// (percentiles, rates) are derived in [`LoadResult`](crate::report::LoadResult),
/// this type keeps only counters and raw samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateState {
    pub started: u64,
    pub completed: u64,
    pub success: u64,
    pub failure: u64,
    pub batches_completed: u64,
    pub worker_threads_used: usize,
    pub latencies: Vec<Duration>,
    pub queue_times: Vec<Duration>,
    pub peak_memory: u64,
}

impl AggregateState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request_started(&mut self) {
        self.started += 1;
    }

    pub fn observe_memory(&mut self, bytes: u64) {
        self.peak_memory = self.peak_memory.max(bytes);
    }

    /// Incorporate a single outcome.
    pub fn consume(&mut self, outcome: &Outcome) {
        self.completed += 1;
        match outcome.verdict {
            Verdict::Success => self.success += 1,
            Verdict::Failure | Verdict::Error => self.failure += 1,
        }
        self.latencies.push(outcome.execution_latency);
        if !outcome.queue_delay.is_zero() {
            self.queue_times.push(outcome.queue_delay);
        }
    }

    pub fn record_batch(&mut self) {
        self.batches_completed += 1;
    }

    pub fn record_worker_count(&mut self, workers: usize) {
        self.worker_threads_used = self.worker_threads_used.max(workers);
    }

    pub fn in_flight(&self) -> u64 {
        self.started.saturating_sub(self.completed)
    }
}

/// Summary statistics over a set of duration samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
    pub median: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

impl Distribution {
    /// All fields are zero for an empty sample set.
    pub fn from_samples(samples: &[Duration]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        let total: Duration = sorted.iter().sum();
        Self {
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean: total / sorted.len() as u32,
            median: percentile(&sorted, 50.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
        }
    }
}

/// Ceiling-rank percentile over an already sorted slice.
///
/// Returns the sample at index `ceil(p / 100 * n) - 1`, so ties resolve toward
/// the higher sample. `p` is clamped to `[0, 100]`; an empty slice yields zero.
pub fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let p = p.clamp(0.0, 100.0);
    let rank = (p / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn consume_tracks_counters_and_samples() {
        let mut agg = AggregateState::new();
        agg.record_request_started();
        agg.record_request_started();
        agg.consume(&Outcome::new(Verdict::Success, ms(10), ms(2)));
        agg.consume(&Outcome::new(Verdict::Error, ms(10), Duration::ZERO));

        assert_eq!(agg.started, 2);
        assert_eq!(agg.completed, 2);
        assert_eq!(agg.success, 1);
        assert_eq!(agg.failure, 1);
        assert_eq!(agg.latencies, vec![ms(10), Duration::ZERO]);
        // zero queue delays are not recorded
        assert_eq!(agg.queue_times, vec![ms(2)]);
        assert_eq!(agg.in_flight(), 0);
    }

    #[test]
    fn worker_count_keeps_the_maximum() {
        let mut agg = AggregateState::new();
        agg.record_worker_count(8);
        agg.record_worker_count(4);
        assert_eq!(agg.worker_threads_used, 8);
    }

    #[test]
    fn peak_memory_only_grows() {
        let mut agg = AggregateState::new();
        agg.observe_memory(1024);
        agg.observe_memory(512);
        assert_eq!(agg.peak_memory, 1024);
    }

    #[test]
    fn percentile_uses_ceiling_rank() {
        let sorted: Vec<Duration> = (1..=10).map(ms).collect();
        assert_eq!(percentile(&sorted, 50.0), ms(5));
        assert_eq!(percentile(&sorted, 95.0), ms(10));
        assert_eq!(percentile(&sorted, 10.0), ms(1));
        assert_eq!(percentile(&sorted, 0.0), ms(1));
        assert_eq!(percentile(&sorted, 100.0), ms(10));

        let pair = [ms(1), ms(2)];
        assert_eq!(percentile(&pair, 50.0), ms(1));
        assert_eq!(percentile(&pair, 51.0), ms(2));
    }

    #[test]
    fn empty_distribution_is_zero() {
        assert_eq!(Distribution::from_samples(&[]), Distribution::default());
    }

    #[test]
    fn distribution_of_unsorted_samples() {
        let d = Distribution::from_samples(&[ms(30), ms(10), ms(20)]);
        assert_eq!(d.min, ms(10));
        assert_eq!(d.max, ms(30));
        assert_eq!(d.mean, ms(20));
        assert_eq!(d.median, ms(20));
        assert_eq!(d.p95, ms(30));
        assert_eq!(d.p99, ms(30));
    }

    proptest! {
        #[test]
        fn percentiles_are_ordered(samples in proptest::collection::vec(0u64..10_000_000, 1..500)) {
            let samples: Vec<Duration> = samples.into_iter().map(Duration::from_micros).collect();
            let d = Distribution::from_samples(&samples);
            prop_assert!(d.min <= d.median);
            prop_assert!(d.median <= d.p95);
            prop_assert!(d.p95 <= d.p99);
            prop_assert!(d.p99 <= d.max);
            prop_assert!(d.min <= d.mean && d.mean <= d.max);
        }
    }
}
