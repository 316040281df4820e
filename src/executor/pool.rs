use std::future::Future;

use tokio::task::JoinHandle;
use typed_builder::TypedBuilder;

use super::{execute_item, pool_size, ExecutionContext, Executor};
use crate::{
    error::{Result, VolleyError},
    metric::ActionOutput,
    settings::Settings,
};

/// Items a worker processes before yielding back to the runtime.
pub const DEFAULT_YIELD_EVERY: u64 = 64;

/// Fixed-size worker pool fed from the shared work queue.
///
/// - Each worker loops: take the next item, run it, report it.
/// - Workers park on the queue while it is empty and exit once it is closed
///   and drained.
/// - On shutdown every worker stops at its next await point; the item it was
///   running is abandoned and never reported as completed.
///
/// # Tuning knobs
///
/// - `workers`: overrides the sizing heuristic ([`pool_size`]).
/// - `yield_every`: how many items a worker runs back to back before calling
///   `yield_now`, so a stream of instantly-ready actions cannot starve other
///   tasks on the same runtime thread.
#[derive(Debug, Clone, TypedBuilder)]
pub struct PoolExecutor {
    #[builder(default, setter(strip_option))]
    pub workers: Option<usize>,
    #[builder(default = DEFAULT_YIELD_EVERY)]
    pub yield_every: u64,
}

impl Default for PoolExecutor {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PoolExecutor {
    pub fn validate(&self) -> Result<()> {
        if self.workers == Some(0) {
            return Err(VolleyError::invalid("workers", "must be at least 1"));
        }
        Ok(())
    }

    /// Number of workers this executor will spawn for `concurrency`.
    pub fn worker_count(&self, concurrency: usize) -> usize {
        self.workers.unwrap_or_else(|| pool_size(concurrency, num_cpus::get()))
    }
}

impl<F, Fut> Executor<F, Fut> for PoolExecutor
where
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: ActionOutput,
{
    fn validate(&self) -> Result<()> {
        PoolExecutor::validate(self)
    }

    fn spawn(&self, settings: &Settings, ctx: ExecutionContext, action: F) -> Vec<JoinHandle<u64>> {
        let workers = self.worker_count(settings.concurrency);
        let yield_every = self.yield_every.max(1);
        tracing::info!("Spawning {workers} workers...");
        ctx.collector.worker_count(workers);

        (0..workers)
            .map(|i| {
                let ctx = ctx.clone();
                let action = action.clone();
                tokio::spawn(async move {
                    let mut processed: u64 = 0;
                    tracing::debug!("Worker {i} started.");

                    let main_task = async {
                        while let Some(item) = ctx.queue.recv().await {
                            execute_item(item, &action, &ctx.collector).await;
                            processed += 1;
                            if processed % yield_every == 0 {
                                tokio::task::yield_now().await;
                            }
                        }
                    };

                    let mut shutdown = ctx.shutdown.clone();
                    tokio::select! {
                        _ = main_task => {
                            tracing::debug!("Worker {i} drained the queue.");
                        }
                        _ = shutdown.wait() => {
                            tracing::debug!("Worker {i} received shutdown signal.");
                        }
                    };

                    tracing::debug!("Worker {i} shutting down after {processed} items.");
                    processed
                })
            })
            .collect()
    }
}
