use std::{
    io,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use volley::{
    ExecutionPlan, ExecutionStrategy, PoolExecutor, RunState, Runner, Settings, TerminationMode,
    VolleyError,
};

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

fn settings(concurrency: usize, duration: u64, interval: u64) -> Settings {
    Settings::builder()
        .concurrency(concurrency)
        .duration(ms(duration))
        .interval(ms(interval))
        .build()
}

fn assert_counts_consistent(result: &volley::LoadResult) {
    assert_eq!(result.total, result.success + result.failure);
    assert!(result.total <= result.requests_started);
    assert_eq!(
        result.requests_in_flight,
        result.requests_started - result.total
    );
}

#[tokio::test(start_paused = true)]
async fn single_item_single_tick() {
    let plan = ExecutionPlan::new("one", settings(1, 1000, 1000), || async { true });
    let result = volley::run(plan).await.unwrap();

    assert_eq!(result.name, "one");
    assert_eq!(result.total, 1);
    assert_eq!(result.success, 1);
    assert_eq!(result.batches_completed, 1);
    assert_counts_consistent(&result);
}

#[tokio::test(start_paused = true)]
async fn two_ticks_of_ten() {
    let calls = Arc::new(AtomicU64::new(0));
    let counter = calls.clone();
    let plan = ExecutionPlan::builder()
        .name("two ticks")
        .action(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(ms(10)).await;
            }
        })
        .settings(settings(10, 2000, 1000))
        .build();

    let result = volley::run(plan).await.unwrap();

    assert_eq!(calls.load(Ordering::Relaxed), 20);
    assert_eq!(result.total, 20);
    assert_eq!(result.success, 20);
    assert_eq!(result.failure, 0);
    assert_eq!(result.requests_in_flight, 0);
    assert_eq!(result.batches_completed, 2);
    assert_eq!(result.latency.min, ms(10));
    assert_eq!(result.latency.max, ms(10));
    assert!(result.worker_threads >= 1);
    assert!(result.peak_memory_bytes > 0);
    assert_counts_consistent(&result);
}

#[tokio::test(start_paused = true)]
async fn throughput_is_completed_over_elapsed() {
    let plan = ExecutionPlan::new("throughput", settings(25, 3000, 500), || async {
        tokio::time::sleep(ms(20)).await;
    });
    let result = volley::run(plan).await.unwrap();

    assert_eq!(result.total, 150);
    assert!(result.elapsed >= ms(3000));
    let expected = result.total as f64 / result.elapsed.as_secs_f64();
    assert!((result.requests_per_second - expected).abs() < 1e-6);
}

#[tokio::test(start_paused = true)]
async fn zero_concurrency_is_a_no_op() {
    let calls = Arc::new(AtomicU64::new(0));
    let counter = calls.clone();
    let plan = ExecutionPlan::new("idle", settings(0, 1000, 100), move || {
        counter.fetch_add(1, Ordering::Relaxed);
        async {}
    });

    let runner = Runner::new(plan);
    let state = runner.state_rx();
    let result = runner.run().await.unwrap();

    assert_eq!(result, volley::LoadResult::empty("idle"));
    assert_eq!(calls.load(Ordering::Relaxed), 0);
    assert_eq!(*state.borrow(), RunState::Completed);
}

#[tokio::test(start_paused = true)]
async fn invalid_settings_are_rejected_before_running() {
    let calls = Arc::new(AtomicU64::new(0));
    let counter = calls.clone();
    let plan = ExecutionPlan::new("bad", settings(5, 1000, 0), move || {
        counter.fetch_add(1, Ordering::Relaxed);
        async {}
    });

    let err = volley::run(plan).await.unwrap_err();
    assert!(matches!(
        err,
        VolleyError::InvalidSettings {
            parameter: "interval",
            ..
        }
    ));
    assert_eq!(calls.load(Ordering::Relaxed), 0);
}

#[tokio::test(start_paused = true)]
async fn zero_worker_pool_is_rejected() {
    let plan = ExecutionPlan::new("no workers", settings(5, 1000, 100), || async {});
    let err = Runner::new(plan)
        .with_pool(PoolExecutor::builder().workers(0).build())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VolleyError::InvalidSettings {
            parameter: "workers",
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn every_invocation_failing_is_still_a_result() {
    let plan = ExecutionPlan::new("always false", settings(4, 1000, 250), || async { false });
    let result = volley::run(plan).await.unwrap();

    assert_eq!(result.total, 16);
    assert_eq!(result.success, 0);
    assert_eq!(result.failure, 16);
    assert_eq!(result.success_rate(), 0.0);
    assert_counts_consistent(&result);
}

#[tokio::test(start_paused = true)]
async fn errors_and_panics_count_as_failures() {
    let calls = Arc::new(AtomicU64::new(0));
    let counter = calls.clone();
    let plan = ExecutionPlan::new("mixed", settings(6, 1000, 1000), move || {
        let n = counter.fetch_add(1, Ordering::Relaxed);
        async move {
            match n % 3 {
                0 => Ok(()),
                1 => Err(io::Error::other("refused")),
                _ => panic!("action blew up"),
            }
        }
    });

    let result = volley::run(plan).await.unwrap();
    assert_eq!(result.total, 6);
    assert_eq!(result.success, 2);
    assert_eq!(result.failure, 4);
    assert_counts_consistent(&result);
}

#[tokio::test(start_paused = true)]
async fn closure_panic_does_not_kill_the_worker() {
    let calls = Arc::new(AtomicU64::new(0));
    let counter = calls.clone();
    let plan = ExecutionPlan::new("early panic", settings(4, 1000, 1000), move || {
        let n = counter.fetch_add(1, Ordering::Relaxed);
        if n == 0 {
            panic!("refused before building the request");
        }
        async move { true }
    });

    let result = Runner::new(plan)
        .with_pool(PoolExecutor::builder().workers(1).build())
        .run()
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::Relaxed), 4);
    assert_eq!(result.total, 4);
    assert_eq!(result.success, 3);
    assert_eq!(result.failure, 1);
    assert_eq!(result.requests_in_flight, 0);
}

#[tokio::test(start_paused = true)]
async fn small_worker_pool_queues_work() {
    let plan = ExecutionPlan::new("queued", settings(8, 1000, 1000), || async {
        tokio::time::sleep(ms(50)).await;
    });
    let result = Runner::new(plan)
        .with_pool(PoolExecutor::builder().workers(2).build())
        .run()
        .await
        .unwrap();

    assert_eq!(result.total, 8);
    assert_eq!(result.worker_threads, 2);
    // four rounds of two: items waited 0, 50, 100 and 150ms
    assert_eq!(result.queue_time.max, ms(150));
    assert_eq!(result.queue_time.samples, 6);
}

#[tokio::test(start_paused = true)]
async fn task_per_item_strategy_runs_everything() {
    let mut settings = settings(20, 2000, 1000);
    settings.strategy = ExecutionStrategy::TaskPerItem;
    let plan = ExecutionPlan::new("per item", settings, || async {
        tokio::time::sleep(ms(100)).await;
        true
    });

    let result = volley::run(plan).await.unwrap();
    assert_eq!(result.total, 40);
    assert_eq!(result.success, 40);
    assert_eq!(result.worker_threads, 20);
    assert_eq!(result.queue_time.samples, 0);
}

#[tokio::test(start_paused = true)]
async fn strict_duration_abandons_running_work() {
    let mut settings = settings(3, 1000, 1000);
    settings.termination_mode = TerminationMode::StrictDuration;
    let plan = ExecutionPlan::new("strict", settings, || async {
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let result = volley::run(plan).await.unwrap();
    assert_eq!(result.requests_started, 3);
    assert_eq!(result.total, 0);
    assert_eq!(result.requests_in_flight, 3);
    assert!(result.elapsed < Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn duration_mode_gives_up_after_graceful_timeout() {
    let settings = Settings::builder()
        .concurrency(2)
        .duration(ms(1000))
        .interval(ms(1000))
        .graceful_stop_timeout(ms(2000))
        .build();
    let plan = ExecutionPlan::new("hung", settings, || async {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    });

    let result = volley::run(plan).await.unwrap();
    assert_eq!(result.requests_started, 2);
    assert_eq!(result.requests_in_flight, 2);
    assert_eq!(result.total, 0);
    assert!(result.elapsed >= ms(3000));
    assert!(result.elapsed < ms(5000));
}

#[tokio::test(start_paused = true)]
async fn duration_mode_waits_for_slow_but_finite_work() {
    let plan = ExecutionPlan::new("slow", settings(2, 1000, 1000), || async {
        tokio::time::sleep(ms(2500)).await;
    });

    let result = volley::run(plan).await.unwrap();
    assert_eq!(result.total, 2);
    assert_eq!(result.requests_in_flight, 0);
    assert!(result.elapsed >= ms(2500));
}

#[tokio::test(start_paused = true)]
async fn complete_current_interval_finishes_queued_work() {
    let mut settings = settings(4, 1000, 500);
    settings.termination_mode = TerminationMode::CompleteCurrentInterval;
    let plan = ExecutionPlan::new("complete", settings, || async {
        tokio::time::sleep(ms(800)).await;
    });

    let result = Runner::new(plan)
        .with_pool(PoolExecutor::builder().workers(4).build())
        .run()
        .await
        .unwrap();
    assert_eq!(result.batches_completed, 2);
    assert_eq!(result.total, 8);
    assert_eq!(result.requests_in_flight, 0);
}

#[tokio::test(start_paused = true)]
async fn state_moves_through_the_lifecycle() {
    let plan = ExecutionPlan::new("states", settings(2, 500, 250), || async {});
    let runner = Runner::new(plan);
    let mut state = runner.state_rx();
    assert_eq!(*state.borrow(), RunState::Created);

    let observer = tokio::spawn(async move {
        let mut seen = vec![*state.borrow_and_update()];
        while state.changed().await.is_ok() {
            seen.push(*state.borrow_and_update());
        }
        seen
    });

    runner.run().await.unwrap();
    let seen = observer.await.unwrap();
    assert_eq!(seen.last(), Some(&RunState::Completed));
    assert!(seen.contains(&RunState::Running));
}
