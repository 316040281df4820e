//! Result collector: the single owner of a run's aggregate state.
//!
//! Workers and the scheduler never touch [`AggregateState`] directly. They
//! send [`CollectorEvent`]s through a cloneable [`CollectorHandle`] and a
//! single task applies them one at a time, so every mutation is linearized
//! without locks on the hot path.
//!
//! Reporting is fire-and-forget over an unbounded channel: a worker never
//! waits on the collector. Only [`CollectorHandle::result`] awaits a reply,
//! and it does so under a short timeout because a run without a collector
//! has no meaningful result.

use std::time::Duration;

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::Instant,
};

use crate::{
    aggregate::AggregateState,
    error::{Result, VolleyError},
    memory::MemoryProbe,
    metric::Outcome,
    report::LoadResult,
};

/// How long [`CollectorHandle::result`] waits for a reply.
pub const RESULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum number of events applied per wake-up.
const DRAIN_BATCH: usize = 1024;

#[derive(Debug)]
pub enum CollectorEvent {
    Start,
    RequestStarted,
    Outcome(Outcome),
    BatchCompleted {
        batch_number: u64,
        size: usize,
        at: Instant,
    },
    WorkerCount(usize),
    /// Freezes the elapsed time; later worker reports are discarded.
    Finish,
    GetResult(oneshot::Sender<LoadResult>),
}

/// Cheap, cloneable sender side of the collector mailbox.
#[derive(Clone)]
pub struct CollectorHandle {
    tx: mpsc::UnboundedSender<CollectorEvent>,
}

impl CollectorHandle {
    fn send(&self, event: CollectorEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Collector is gone, dropping report.");
        }
    }

    pub fn start(&self) {
        self.send(CollectorEvent::Start);
    }

    pub fn request_started(&self) {
        self.send(CollectorEvent::RequestStarted);
    }

    pub fn outcome(&self, outcome: Outcome) {
        self.send(CollectorEvent::Outcome(outcome));
    }

    pub fn batch_completed(&self, batch_number: u64, size: usize, at: Instant) {
        self.send(CollectorEvent::BatchCompleted {
            batch_number,
            size,
            at,
        });
    }

    pub fn worker_count(&self, workers: usize) {
        self.send(CollectorEvent::WorkerCount(workers));
    }

    pub fn finish(&self) {
        self.send(CollectorEvent::Finish);
    }

    /// Snapshot of the current statistics. Does not modify the state.
    pub async fn result(&self) -> Result<LoadResult> {
        self.result_within(RESULT_TIMEOUT).await
    }

    pub async fn result_within(&self, timeout: Duration) -> Result<LoadResult> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CollectorEvent::GetResult(reply_tx))
            .map_err(|_| VolleyError::CollectorClosed)?;

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(VolleyError::CollectorClosed),
            Err(_) => Err(VolleyError::CollectorUnavailable { timeout }),
        }
    }
}

/// The task side of the collector.
pub struct Collector {
    name: String,
    state: AggregateState,
    memory: MemoryProbe,
    start_time: Option<Instant>,
    end_time: Option<Instant>,
    discarded: u64,
}

impl Collector {
    pub fn new(name: impl Into<String>, memory: MemoryProbe) -> Self {
        Self {
            name: name.into(),
            state: AggregateState::new(),
            memory,
            start_time: None,
            end_time: None,
            discarded: 0,
        }
    }

    /// Spawn the collector task. It runs until every handle is dropped and
    /// then yields its final state.
    pub fn spawn(self) -> (CollectorHandle, JoinHandle<AggregateState>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx));
        (CollectorHandle { tx }, task)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<CollectorEvent>) -> AggregateState {
        let mut batch = Vec::with_capacity(DRAIN_BATCH);
        loop {
            match rx.recv().await {
                Some(event) => batch.push(event),
                None => break,
            }
            while batch.len() < DRAIN_BATCH {
                match rx.try_recv() {
                    Ok(event) => batch.push(event),
                    Err(_) => break,
                }
            }
            for event in batch.drain(..) {
                self.apply(event);
            }
        }
        if self.discarded > 0 {
            tracing::debug!("Collector discarded {} late reports.", self.discarded);
        }
        self.state
    }

    fn apply(&mut self, event: CollectorEvent) {
        let finished = self.end_time.is_some();
        match event {
            CollectorEvent::Start => {
                self.start_time = Some(Instant::now());
                if let Some(bytes) = self.memory.sample_now() {
                    self.state.observe_memory(bytes);
                }
            }
            CollectorEvent::RequestStarted | CollectorEvent::Outcome(_) if finished => {
                self.discarded += 1;
            }
            CollectorEvent::RequestStarted => {
                self.state.record_request_started();
                if let Some(bytes) = self.memory.sample() {
                    self.state.observe_memory(bytes);
                }
            }
            CollectorEvent::Outcome(outcome) => self.state.consume(&outcome),
            CollectorEvent::BatchCompleted {
                batch_number,
                size,
                at,
            } => {
                self.state.record_batch();
                tracing::debug!(
                    "Batch {batch_number} of {size} items enqueued at +{:?}",
                    self.start_time
                        .map(|s| at.saturating_duration_since(s))
                        .unwrap_or_default()
                );
            }
            CollectorEvent::WorkerCount(n) => self.state.record_worker_count(n),
            CollectorEvent::Finish => {
                if !finished {
                    self.end_time = Some(Instant::now());
                }
            }
            CollectorEvent::GetResult(reply) => {
                // the caller may have timed out already
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn elapsed(&self) -> Duration {
        match self.start_time {
            Some(start) => self
                .end_time
                .unwrap_or_else(Instant::now)
                .saturating_duration_since(start),
            None => Duration::ZERO,
        }
    }

    fn snapshot(&self) -> LoadResult {
        LoadResult::from_aggregate(&self.name, &self.state, self.elapsed())
    }
}
