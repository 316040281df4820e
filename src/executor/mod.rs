//! Executors: turn queued work items into concurrent invocations of the action.
//!
//! The scheduler decides *when* and *how many* work items exist; an executor
//! decides *how* they run. Two strategies are provided:
//!
//! - [`PoolExecutor`]: a fixed set of worker tasks pulling from the shared
//!   queue. The pool size is independent of `concurrency`, which keeps the
//!   task count bounded however large the batches get.
//! - [`TaskPerItemExecutor`]: one spawned task per work item. Simple, and fine
//!   for small batches, but its footprint grows with the number of items in
//!   flight.
//!
//! Both report through the same [`CollectorHandle`] and observe the same
//! shutdown signal. Every work item goes through [`execute_item`]:
//!
//! 1. report "request started",
//! 2. measure the queue delay (`processing start - scheduled_at`),
//! 3. run the action, catching panics,
//! 4. report the [`Outcome`].
//!
//! A failing or panicking action only lowers the success count; it never
//! stops a worker.
pub mod pool;
pub mod task_per_item;

pub use pool::PoolExecutor;
pub use task_per_item::TaskPerItemExecutor;

use std::{future::Future, panic::AssertUnwindSafe};

use futures::FutureExt;
use tokio::{task::JoinHandle, time::Instant};

use crate::{
    collector::CollectorHandle,
    error::Result,
    metric::{ActionOutput, Outcome, Verdict},
    queue::{WorkItem, WorkReceiver},
    settings::Settings,
    signal::Shutdown,
};

/// Shared state handed to every task an executor spawns.
#[derive(Clone)]
pub struct ExecutionContext {
    pub queue: WorkReceiver,
    pub collector: CollectorHandle,
    pub shutdown: Shutdown,
}

/// Strategy for executing queued work.
pub trait Executor<F, Fut>
where
    Self: Send + Sync + Sized,
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: ActionOutput,
{
    /// Reject executor-specific configuration before a run starts.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Spawn the tasks that consume `ctx.queue`.
    ///
    /// Each returned handle resolves to the number of items it processed,
    /// once the queue is closed and drained or shutdown is signalled.
    fn spawn(&self, settings: &Settings, ctx: ExecutionContext, action: F) -> Vec<JoinHandle<u64>>;
}

/// Run one work item and report it to the collector.
pub async fn execute_item<F, Fut>(item: WorkItem, action: &F, collector: &CollectorHandle)
where
    F: Fn() -> Fut,
    Fut: Future,
    Fut::Output: ActionOutput,
{
    collector.request_started();
    let started = Instant::now();
    let queue_delay = started.saturating_duration_since(item.scheduled_at);

    // calling the closure is guarded too, it may panic before returning a future
    let output = AssertUnwindSafe(async { action().await }).catch_unwind().await;
    let latency = started.elapsed();

    let verdict = match output {
        Ok(output) => output.verdict(),
        Err(_) => {
            tracing::warn!("Action panicked while processing work item {}", item.id);
            Verdict::Error
        }
    };
    collector.outcome(Outcome::new(verdict, latency, queue_delay));
}

/// Worker count heuristic: `min(max(2 * cores, concurrency / 10), min(1000, 50 * cores))`.
pub fn pool_size(concurrency: usize, cores: usize) -> usize {
    let cores = cores.max(1);
    let wanted = (2 * cores).max(concurrency / 10);
    let upper = (50 * cores).min(1000);
    wanted.min(upper).max(1)
}
