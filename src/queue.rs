use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::time::Instant;

/// One unit of scheduled work. Consumed exactly once by exactly one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkItem {
    pub id: u64,
    pub batch_number: u64,
    pub scheduled_at: Instant,
}

/// Creates the shared queue between the scheduler and the workers.
pub fn work_queue() -> (WorkSender, WorkReceiver) {
    let (tx, rx) = async_channel::unbounded();
    (
        WorkSender {
            tx,
            next_id: Arc::new(AtomicU64::new(0)),
        },
        WorkReceiver { rx },
    )
}

/// Producer side. Dropping every sender closes the queue; receivers then
/// drain what is left and observe the end.
#[derive(Clone)]
pub struct WorkSender {
    tx: async_channel::Sender<WorkItem>,
    next_id: Arc<AtomicU64>,
}

impl WorkSender {
    /// Enqueue `count` items stamped with the same `scheduled_at`.
    /// Returns how many were accepted (fewer only if the queue was closed).
    pub fn push_batch(&self, batch_number: u64, count: usize, scheduled_at: Instant) -> usize {
        let mut accepted = 0;
        for _ in 0..count {
            let item = WorkItem {
                id: self.next_id.fetch_add(1, Ordering::Relaxed),
                batch_number,
                scheduled_at,
            };
            if self.tx.try_send(item).is_err() {
                break;
            }
            accepted += 1;
        }
        accepted
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side, cloned into every worker. Idle workers park on the
/// channel itself, so no consumer holds a lock while waiting.
#[derive(Clone)]
pub struct WorkReceiver {
    rx: async_channel::Receiver<WorkItem>,
}

impl WorkReceiver {
    /// Next item, or `None` once the queue is closed and drained.
    pub async fn recv(&self) -> Option<WorkItem> {
        self.rx.recv().await.ok()
    }

    /// Closes the queue and drops everything still in it without running it.
    /// Returns the count.
    pub fn discard_pending(&self) -> usize {
        self.rx.close();
        let mut discarded = 0;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }
}
