//! Volley: interval-batched load generation for async Rust.
//!
//! Volley fires a fixed-size batch of calls to your action at every interval
//! tick for a bounded duration, runs them on a bounded set of workers and
//! reports aggregate statistics: latency percentiles, throughput, queue time,
//! worker utilization and peak memory.
//!
//! # Architecture
//!
//! Commands flow one way, results the other:
//!
//! ```text
//! Runner -> Scheduler -> work queue -> Executor workers -> Collector
//!   ^                                                         |
//!   +------------------------- LoadResult --------------------+
//! ```
//!
//! - [`Settings`]: the load shape (concurrency per tick, duration, interval,
//!   termination mode, graceful-stop window).
//! - [`ExecutionPlan`]: a name, the action and its settings.
//! - [`Scheduler`](scheduler::Scheduler): emits `concurrency` work items per
//!   tick using absolute fire times, so the schedule never drifts.
//! - [`Executor`]: turns work items into invocations. [`PoolExecutor`] keeps a
//!   fixed worker pool regardless of batch size; [`TaskPerItemExecutor`]
//!   spawns a task per item.
//! - [`Collector`](collector::Collector): the single owner of the aggregate
//!   state. Every report goes through its mailbox.
//! - [`Runner`]: wires everything up for one run and applies the termination
//!   policy.
//! - [`LoadResult`], [`Report`], [`Reporter`]: the output and its sinks.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use volley::{ExecutionPlan, Reporter, Settings, StdoutReporter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let plan = ExecutionPlan::builder()
//!         .name("cache lookup")
//!         .action(|| async {
//!             tokio::time::sleep(Duration::from_millis(5)).await;
//!             Ok::<_, std::io::Error>(true)
//!         })
//!         .settings(Settings::new(
//!             100,
//!             Duration::from_secs(10),
//!             Duration::from_secs(1),
//!         )?)
//!         .build();
//!
//!     let result = volley::run(plan).await?;
//!     StdoutReporter.report(&result).await?;
//!     Ok(())
//! }
//! ```
//!
//! Actions may resolve to `()`, `bool` or `Result<T, E>`; see
//! [`ActionOutput`]. Failures and panics of the action are counted, never
//! propagated.

/// Raw aggregate state and percentile math
pub mod aggregate;
/// Single-owner statistics actor
pub mod collector;
pub mod error;
/// Strategies for running queued work
pub mod executor;
pub mod memory;
/// Per-invocation measurements
pub mod metric;
pub mod queue;
/// Results and reporters
pub mod report;
/// Orchestration of a single run
pub mod runner;
pub mod scenario;
pub mod scheduler;
pub mod settings;
pub mod signal;

pub use error::{Result, VolleyError};
pub use executor::{Executor, PoolExecutor, TaskPerItemExecutor};
pub use metric::{ActionOutput, Outcome, Verdict};
pub use report::{LoadResult, Report, Reporter, StdoutReporter};
pub use runner::{run, RunState, Runner};
pub use scenario::ExecutionPlan;
pub use settings::{ExecutionStrategy, Settings, TerminationMode};
