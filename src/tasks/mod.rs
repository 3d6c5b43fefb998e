//! Background task pool.
//!
//! Long-running work that must not stall the frame loop — asset decodes,
//! offline shader warm-up — runs on a small worker pool. Submitters get a
//! [`TaskHandle`] to poll for completion, take the result, or cancel the task
//! while it is still queued. One mutex per task guards the state transitions,
//! so cancel-vs-start races resolve to exactly one winner.

use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::errors::{Result, StrataError};

/// Lifecycle of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Running,
    Completed,
    /// Cancelled before a worker picked it up; the closure never ran.
    Cancelled,
}

struct TaskCell<T> {
    state: TaskState,
    result: Option<T>,
}

struct TaskShared<T> {
    cell: Mutex<TaskCell<T>>,
}

/// Handle to a task submitted to a [`TaskPool`].
///
/// Dropping the handle does not cancel the task; it just discards the result.
pub struct TaskHandle<T> {
    shared: Arc<TaskShared<T>>,
}

impl<T> TaskHandle<T> {
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.shared.cell.lock().state
    }

    /// Cancel the task if it has not started. Returns whether it was
    /// cancelled; `false` means a worker already picked it up (or it is
    /// already done).
    pub fn cancel(&self) -> bool {
        let mut cell = self.shared.cell.lock();
        if cell.state == TaskState::Queued {
            cell.state = TaskState::Cancelled;
            true
        } else {
            false
        }
    }

    /// Take the result of a completed task. Returns `None` while the task is
    /// pending and after the result has been taken.
    pub fn try_take(&self) -> Option<T> {
        let mut cell = self.shared.cell.lock();
        if cell.state == TaskState::Completed {
            cell.result.take()
        } else {
            None
        }
    }
}

type Job = Box<dyn FnOnce() + Send>;

/// Fixed-size worker pool over a bounded channel.
///
/// The bounded queue applies backpressure: when every worker is busy and the
/// queue is full, `spawn` blocks the submitter instead of growing without
/// limit. Dropping the pool closes the channel and joins the workers.
pub struct TaskPool {
    sender: Option<flume::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl TaskPool {
    /// Pool with `workers` threads and a queue of `workers * 4` slots.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let (sender, receiver) = flume::bounded::<Job>(workers * 4);

        let handles = (0..workers)
            .map(|i| {
                let receiver = receiver.clone();
                std::thread::Builder::new()
                    .name(format!("strata-worker-{i}"))
                    .spawn(move || {
                        for job in receiver.iter() {
                            job();
                        }
                    })
                    .unwrap_or_else(|e| panic!("failed to spawn worker thread: {e}"))
            })
            .collect();

        Self {
            sender: Some(sender),
            workers: handles,
        }
    }

    /// Submit a task, blocking when the queue is full.
    pub fn spawn<T, F>(&self, task: F) -> Result<TaskHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let shared = Arc::new(TaskShared {
            cell: Mutex::new(TaskCell {
                state: TaskState::Queued,
                result: None,
            }),
        });

        let job_shared = Arc::clone(&shared);
        let job: Job = Box::new(move || {
            {
                let mut cell = job_shared.cell.lock();
                if cell.state == TaskState::Cancelled {
                    return;
                }
                cell.state = TaskState::Running;
            }
            // Run outside the lock so state() stays pollable.
            let output = task();
            let mut cell = job_shared.cell.lock();
            cell.state = TaskState::Completed;
            cell.result = Some(output);
        });

        self.sender
            .as_ref()
            .ok_or(StrataError::TaskPoolShutDown)?
            .send(job)
            .map_err(|_| StrataError::TaskPoolShutDown)?;

        Ok(TaskHandle { shared })
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        // Closing the channel lets workers drain the queue and exit.
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn wait_for<T>(handle: &TaskHandle<T>, state: TaskState) {
        for _ in 0..500 {
            if handle.state() == state {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("task never reached {state:?}");
    }

    #[test]
    fn task_completes_and_yields_result() {
        let pool = TaskPool::new(2);
        let handle = pool.spawn(|| 21 * 2).unwrap();

        wait_for(&handle, TaskState::Completed);
        assert_eq!(handle.try_take(), Some(42));
        // Result is single-take.
        assert_eq!(handle.try_take(), None);
    }

    #[test]
    fn cancel_while_queued_prevents_execution() {
        let pool = TaskPool::new(1);
        let (gate_tx, gate_rx) = flume::bounded::<()>(0);

        // Occupy the single worker so the next task stays queued.
        let _blocker = pool
            .spawn(move || {
                let _ = gate_rx.recv();
            })
            .unwrap();

        let ran = Arc::new(Mutex::new(false));
        let ran_clone = Arc::clone(&ran);
        let handle = pool
            .spawn(move || {
                *ran_clone.lock() = true;
            })
            .unwrap();

        assert!(handle.cancel());
        assert_eq!(handle.state(), TaskState::Cancelled);

        gate_tx.send(()).unwrap();
        drop(pool); // joins workers, draining the queue

        assert!(!*ran.lock());
    }

    #[test]
    fn cancel_after_completion_fails() {
        let pool = TaskPool::new(1);
        let handle = pool.spawn(|| ()).unwrap();
        wait_for(&handle, TaskState::Completed);
        assert!(!handle.cancel());
    }
}
