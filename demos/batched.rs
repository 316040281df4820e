use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::sync::Semaphore;
use tracing_subscriber::EnvFilter;
use volley::{
    ExecutionPlan, PoolExecutor, Reporter, Runner, Settings, StdoutReporter, TerminationMode,
};

/// Pretend backend: a fixed number of connections and a latency that
/// creeps up every few calls.
struct Backend {
    connections: Semaphore,
    calls: AtomicU64,
}

impl Backend {
    async fn query(&self) -> Result<bool, &'static str> {
        let _permit = self
            .connections
            .acquire()
            .await
            .map_err(|_| "backend closed")?;
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(5 + n % 20)).await;

        // every 50th call times out, every 7th returns a bad answer
        if n % 50 == 49 {
            return Err("timeout");
        }
        Ok(n % 7 != 0)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Build shared things once, outside the action
    let backend = Arc::new(Backend {
        connections: Semaphore::new(32),
        calls: AtomicU64::new(0),
    });

    let settings = Settings::builder()
        .concurrency(200)
        .duration(Duration::from_secs(5))
        .interval(Duration::from_millis(500))
        .termination_mode(TerminationMode::CompleteCurrentInterval)
        .build();

    let plan = ExecutionPlan::builder()
        .name("batched backend queries")
        .action(move || {
            let backend = backend.clone();
            async move { backend.query().await }
        })
        .settings(settings)
        .build();

    let result = Runner::new(plan)
        .with_pool(PoolExecutor::builder().workers(64).build())
        .run()
        .await?;

    StdoutReporter.report(&result).await?;
    Ok(())
}
