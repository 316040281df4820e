//! Orchestrator: drives one complete run of an [`ExecutionPlan`].
//!
//! A run goes through `Created -> Running -> Draining -> Completed`:
//!
//! 1. **Running**: the collector, the executor's workers and the scheduler
//!    are started. The scheduler emits batches until the duration elapses.
//! 2. **Draining**: scheduling has stopped and the queue is closed. What
//!    happens to outstanding work depends on the [`TerminationMode`]:
//!    - `Duration`: workers drain for at most the graceful-stop timeout,
//!    - `CompleteCurrentInterval`: workers drain until the queue is empty,
//!      bounded only by the hard ceiling,
//!    - `StrictDuration`: everything still queued or running is abandoned.
//! 3. **Completed**: the collector is frozen and the result is read.
//!
//! The whole run is bounded by
//! [`Settings::hard_ceiling`](crate::settings::Settings::hard_ceiling), so an
//! action that never returns cannot hang the caller. Abandoned work shows up as
//! `requests_in_flight > 0` in the result.

use std::{future::Future, time::Duration};

use futures::future::join_all;
use tokio::{
    sync::watch,
    task::{JoinError, JoinHandle},
    time::Instant,
};

use crate::{
    collector::Collector,
    error::Result,
    executor::{ExecutionContext, Executor, PoolExecutor, TaskPerItemExecutor},
    memory::MemoryProbe,
    metric::ActionOutput,
    queue::work_queue,
    report::LoadResult,
    scenario::ExecutionPlan,
    scheduler::{ScheduleSummary, Scheduler},
    settings::{ExecutionStrategy, TerminationMode},
    signal::shutdown_channel,
};

/// How long workers get to observe the shutdown signal before being aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Created,
    Running,
    Draining,
    Completed,
}

/// Runs a single plan. Consumed by [`Runner::run`], so it can never be reused.
pub struct Runner<F, Fut>
where
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: ActionOutput,
{
    plan: ExecutionPlan<F, Fut>,
    pool: PoolExecutor,
    state: watch::Sender<RunState>,
}

impl<F, Fut> Runner<F, Fut>
where
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: ActionOutput,
{
    pub fn new(plan: ExecutionPlan<F, Fut>) -> Self {
        let (state, _) = watch::channel(RunState::Created);
        Self {
            plan,
            pool: PoolExecutor::default(),
            state,
        }
    }

    /// Replace the default worker pool configuration.
    pub fn with_pool(mut self, pool: PoolExecutor) -> Self {
        self.pool = pool;
        self
    }

    pub fn state_rx(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Execute the plan and return its statistics.
    ///
    /// Fails only on invalid settings (before any work is scheduled) or when
    /// the collector cannot produce a result. Failures of the action itself
    /// are part of the returned [`LoadResult`].
    pub async fn run(self) -> Result<LoadResult> {
        let Runner { plan, pool, state } = self;
        let (name, settings, action) = plan.into_parts();
        let set_state = |next: RunState| {
            tracing::debug!("Run state -> {next:?}");
            state.send_replace(next);
        };

        if settings.concurrency == 0 {
            tracing::info!("Scenario {name} has nothing to run.");
            set_state(RunState::Completed);
            return Ok(LoadResult::empty(name));
        }
        settings.validate()?;
        if settings.strategy == ExecutionStrategy::WorkerPool {
            pool.validate()?;
        }

        let hard_deadline = Instant::now() + settings.hard_ceiling();
        let (collector, _collector_task) = Collector::new(&name, MemoryProbe::default()).spawn();
        let (queue_tx, queue_rx) = work_queue();
        let (trigger, shutdown) = shutdown_channel();
        let ctx = ExecutionContext {
            queue: queue_rx.clone(),
            collector: collector.clone(),
            shutdown: shutdown.clone(),
        };

        collector.start();
        set_state(RunState::Running);
        tracing::info!(
            "Running scenario: {name} ({} per {:?} for {:?}, {:?})",
            settings.concurrency,
            settings.interval,
            settings.duration,
            settings.termination_mode
        );

        let workers = match settings.strategy {
            ExecutionStrategy::WorkerPool => pool.spawn(&settings, ctx, action),
            ExecutionStrategy::TaskPerItem => TaskPerItemExecutor.spawn(&settings, ctx, action),
        };
        let aborts: Vec<_> = workers.iter().map(JoinHandle::abort_handle).collect();

        let mut scheduler = tokio::spawn(
            Scheduler::new(&settings, queue_tx, collector.clone(), shutdown).run(),
        );
        let summary = match tokio::time::timeout_at(hard_deadline, &mut scheduler).await {
            Ok(Ok(summary)) => summary,
            Ok(Err(e)) => {
                tracing::error!("Scheduler task failed: {e}");
                ScheduleSummary::default()
            }
            Err(_) => {
                tracing::warn!("Hard ceiling reached while scheduling, stopping.");
                scheduler.abort();
                ScheduleSummary::default()
            }
        };
        tracing::debug!("Schedule summary: {summary:?}");

        set_state(RunState::Draining);
        let mut joined = Box::pin(join_all(workers));
        let joined_in_time = match settings.termination_mode {
            TerminationMode::StrictDuration => {
                tracing::info!("Strict duration reached, abandoning outstanding work.");
                None
            }
            TerminationMode::Duration => {
                let window = Instant::now() + settings.graceful_stop_timeout();
                tokio::time::timeout_at(window.min(hard_deadline), &mut joined)
                    .await
                    .ok()
            }
            TerminationMode::CompleteCurrentInterval => {
                tokio::time::timeout_at(hard_deadline, &mut joined).await.ok()
            }
        };

        match joined_in_time {
            Some(exits) => log_worker_exits(&exits),
            None => {
                if settings.termination_mode != TerminationMode::StrictDuration {
                    tracing::warn!(
                        "Workers did not finish within the drain window, abandoning in-flight work."
                    );
                }
                trigger.trigger();
                match tokio::time::timeout(SHUTDOWN_GRACE, &mut joined).await {
                    Ok(exits) => log_worker_exits(&exits),
                    Err(_) => {
                        tracing::warn!("Workers ignored shutdown, aborting them.");
                        aborts.iter().for_each(|a| a.abort());
                    }
                }
            }
        }
        trigger.trigger();

        let discarded = queue_rx.discard_pending();
        if discarded > 0 {
            tracing::warn!("Discarded {discarded} queued work items that never started.");
        }

        collector.finish();
        let result = collector.result().await?;
        set_state(RunState::Completed);

        tracing::info!(
            "Done running scenario: {}! {} requests, {} failed, {:.2} req/s",
            result.name,
            result.total,
            result.failure,
            result.requests_per_second
        );
        Ok(result)
    }
}

fn log_worker_exits(exits: &[std::result::Result<u64, JoinError>]) {
    let mut processed = 0;
    for exit in exits {
        match exit {
            Ok(n) => processed += n,
            Err(e) if e.is_cancelled() => {}
            Err(e) => tracing::error!("Worker task failed: {e}"),
        }
    }
    tracing::debug!("Workers processed {processed} items.");
}

/// Run `plan` with the default worker pool.
///
/// ```no_run
/// use std::time::Duration;
/// use volley::{ExecutionPlan, Settings};
///
/// # async fn demo() -> volley::Result<()> {
/// let plan = ExecutionPlan::builder()
///     .name("noop")
///     .action(|| async {})
///     .settings(Settings::new(10, Duration::from_secs(2), Duration::from_secs(1))?)
///     .build();
/// let result = volley::run(plan).await?;
/// assert_eq!(result.total, 20);
/// # Ok(())
/// # }
/// ```
pub async fn run<F, Fut>(plan: ExecutionPlan<F, Fut>) -> Result<LoadResult>
where
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: ActionOutput,
{
    Runner::new(plan).run().await
}
