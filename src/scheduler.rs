//! Work scheduler: emits one batch of `concurrency` work items per interval.
//!
//! Fire times are computed from the run's start as `start + tick * interval`
//! rather than by sleeping `interval` after each batch, so the time spent
//! enqueuing and reporting never accumulates into drift.
//!
//! When the scheduler falls behind (a fire time is already in the past) it
//! logs a warning, fires once immediately and re-anchors on the next future
//! tick. Missed ticks are skipped, never made up with extra batches.

use std::time::Duration;

use tokio::time::Instant;

use crate::{
    collector::CollectorHandle,
    queue::WorkSender,
    settings::Settings,
    signal::Shutdown,
};

/// What the scheduler did during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleSummary {
    pub batches: u64,
    pub items: u64,
    pub skipped_ticks: u64,
}

pub struct Scheduler {
    concurrency: usize,
    duration: Duration,
    interval: Duration,
    queue: WorkSender,
    collector: CollectorHandle,
    shutdown: Shutdown,
}

impl Scheduler {
    pub fn new(
        settings: &Settings,
        queue: WorkSender,
        collector: CollectorHandle,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            concurrency: settings.concurrency,
            duration: settings.duration,
            interval: settings.interval,
            queue,
            collector,
            shutdown,
        }
    }

    /// Runs until the duration elapses or shutdown is signalled. The queue is
    /// closed when this returns (the sender is dropped with `self`).
    pub async fn run(mut self) -> ScheduleSummary {
        let mut summary = ScheduleSummary::default();
        let start = Instant::now();
        let deadline = start + self.duration;
        let mut tick: u64 = 0;

        loop {
            let now = Instant::now();
            if now.duration_since(start) >= self.duration || self.shutdown.is_triggered() {
                break;
            }

            let accepted = self.queue.push_batch(summary.batches, self.concurrency, now);
            self.collector.batch_completed(summary.batches, accepted, now);
            summary.items += accepted as u64;
            summary.batches += 1;
            if accepted < self.concurrency {
                tracing::warn!("Work queue closed, stopping scheduler.");
                break;
            }

            tick += 1;
            let mut next_fire =
                start + self.interval.saturating_mul(u32::try_from(tick).unwrap_or(u32::MAX));
            let after_enqueue = Instant::now();
            if next_fire <= after_enqueue {
                let behind = after_enqueue.duration_since(next_fire);
                let skipped = (behind.as_nanos() / self.interval.as_nanos().max(1)) as u64;
                tracing::warn!(
                    "Schedule drift: batch {} is {behind:?} late, firing now",
                    summary.batches
                );
                // fire the late batch now, then resume on the next future tick
                summary.skipped_ticks += skipped;
                tick += skipped;
                continue;
            }
            next_fire = next_fire.min(deadline);

            tokio::select! {
                _ = tokio::time::sleep_until(next_fire) => {}
                _ = self.shutdown.wait() => {
                    tracing::debug!("Scheduler received shutdown signal.");
                    break;
                }
            }
        }

        tracing::info!(
            "Scheduler finished: {} batches, {} items",
            summary.batches,
            summary.items
        );
        summary
    }
}
