//! Shared delayed-task runner used for endpoint reinstatement.
//!
//! One Tokio task serves every pool that shares the scheduler: jobs arrive
//! over an unbounded channel and are kept in a min-heap keyed by due time.
//! Repeated endpoint failures therefore never grow the number of tasks.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Job {
    due: Instant,
    seq: u64,
    task: Task,
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Job {}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so the max-heap pops the earliest job first.
impl Ord for Job {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Handle to the scheduler task. Cheap to share behind an `Arc`.
pub struct CooldownScheduler {
    tx: mpsc::UnboundedSender<(Instant, Task)>,
}

impl CooldownScheduler {
    /// Start the scheduler task on the current Tokio runtime.
    ///
    /// The task exits once every handle has been dropped.
    pub fn spawn() -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx));
        Arc::new(Self { tx })
    }

    /// Run `task` once `due` has passed. Returns `false` if the scheduler
    /// task is gone (runtime shut down).
    pub fn schedule_at(&self, due: Instant, task: impl FnOnce() + Send + 'static) -> bool {
        self.tx.send((due, Box::new(task))).is_ok()
    }
}

impl std::fmt::Debug for CooldownScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CooldownScheduler")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<(Instant, Task)>) {
    let mut heap: BinaryHeap<Job> = BinaryHeap::new();
    let mut seq: u64 = 0;

    loop {
        let next_due = heap.peek().map(|job| job.due);
        let wait = async move {
            match next_due {
                Some(due) => tokio::time::sleep_until(due).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            msg = rx.recv() => match msg {
                Some((due, task)) => {
                    seq += 1;
                    heap.push(Job { due, seq, task });
                }
                None => break,
            },
            _ = wait => {
                let now = Instant::now();
                while heap.peek().is_some_and(|job| job.due <= now) {
                    if let Some(job) = heap.pop() {
                        (job.task)();
                    }
                }
            }
        }
    }

    tracing::debug!(pending = heap.len(), "cooldown scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn runs_jobs_in_due_order() {
        let scheduler = CooldownScheduler::spawn();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let start = Instant::now();

        for (label, secs) in [("late", 30u64), ("early", 10), ("middle", 20)] {
            let order = order.clone();
            scheduler.schedule_at(start + Duration::from_secs(secs), move || {
                order.lock().push(label);
            });
        }

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(*order.lock(), vec!["early"]);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(*order.lock(), vec!["early", "middle", "late"]);
    }

    #[tokio::test(start_paused = true)]
    async fn past_due_job_runs_promptly() {
        let scheduler = CooldownScheduler::spawn();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        scheduler.schedule_at(Instant::now(), move || {
            h.fetch_add(1, AtomicOrdering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(hits.load(AtomicOrdering::SeqCst), 1);
    }
}
