use std::future::Future;

use tokio::task::{JoinHandle, JoinSet};

use super::{execute_item, ExecutionContext, Executor};
use crate::{metric::ActionOutput, settings::Settings};

/// Spawns one task per work item.
///
/// A single dispatcher task pulls items from the queue and spawns each one
/// into a [`JoinSet`]. The number of concurrently running tasks is reported to
/// the collector as the worker count (the collector keeps the maximum seen).
/// Only use this for small batches: nothing bounds the number of live tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskPerItemExecutor;

impl<F, Fut> Executor<F, Fut> for TaskPerItemExecutor
where
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: ActionOutput,
{
    fn spawn(&self, settings: &Settings, ctx: ExecutionContext, action: F) -> Vec<JoinHandle<u64>> {
        tracing::info!("Dispatching up to {} tasks per batch...", settings.concurrency);
        let dispatcher = tokio::spawn(async move {
            let mut tasks = JoinSet::new();
            let mut processed: u64 = 0;
            let mut peak: usize = 0;
            let mut shutdown = ctx.shutdown.clone();

            let main_task = async {
                while let Some(item) = ctx.queue.recv().await {
                    let action = action.clone();
                    let collector = ctx.collector.clone();
                    tasks.spawn(async move {
                        execute_item(item, &action, &collector).await;
                    });
                    if tasks.len() > peak {
                        peak = tasks.len();
                        ctx.collector.worker_count(peak);
                    }
                    // reap finished tasks without waiting
                    while let Some(done) = tasks.try_join_next() {
                        if done.is_ok() {
                            processed += 1;
                        }
                    }
                }
                while let Some(done) = tasks.join_next().await {
                    if done.is_ok() {
                        processed += 1;
                    }
                }
            };

            tokio::select! {
                _ = main_task => {
                    tracing::debug!("Dispatcher drained the queue.");
                }
                _ = shutdown.wait() => {
                    tracing::debug!("Dispatcher received shutdown signal.");
                }
            };

            if !tasks.is_empty() {
                tracing::debug!("Abandoning {} running tasks.", tasks.len());
                tasks.shutdown().await;
            }
            processed
        });
        vec![dispatcher]
    }
}
