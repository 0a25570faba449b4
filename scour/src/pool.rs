//! Fixed-size worker pool backed by a shared unbounded task queue.
//!
//! The traversal thread submits content-scan closures without blocking;
//! workers pull tasks until the queue is closed. Dropping (or joining) the
//! pool closes the queue and blocks until every already-queued task has
//! run, so no task is ever dropped.

use crossbeam_channel::{unbounded, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// A unit of deferred work executed by exactly one worker.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of long-lived worker threads consuming a shared task queue.
pub struct WorkerPool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `size` workers; 0 is treated as 1, degrading to
    /// effectively-sequential execution without changing correctness.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = unbounded::<Task>();

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("scour-worker-{id}"))
                .spawn(move || {
                    while let Ok(task) = receiver.recv() {
                        // One failing task must never kill the worker or
                        // the rest of the queue.
                        if catch_unwind(AssertUnwindSafe(task)).is_err() {
                            warn!("worker {id}: task panicked, continuing");
                        }
                    }
                    debug!("worker {id}: queue closed, exiting");
                })
                .expect("failed to spawn worker thread");
            workers.push(handle);
        }

        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// Enqueues a unit of work and returns immediately.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(sender) = &self.sender {
            // The receivers outlive the sender, so this cannot fail while
            // the pool is alive.
            let _ = sender.send(Box::new(task));
        }
    }

    /// Closes the queue and blocks until every queued task has completed.
    pub fn join(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender closes the channel; workers drain what is
        // left and exit.
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread panicked outside a task");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_all_tasks_run_before_join_returns() {
        let counter = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(4);
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.join();
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_zero_workers_degrades_to_one() {
        let counter = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(0);
        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.join();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_panicking_task_does_not_kill_pool() {
        let counter = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(1);
        pool.submit(|| panic!("boom"));
        let c = Arc::clone(&counter);
        pool.submit(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        pool.join();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_drains_queue() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = WorkerPool::new(2);
            for _ in 0..20 {
                let counter = Arc::clone(&counter);
                pool.submit(move || {
                    thread::sleep(Duration::from_millis(1));
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }
}
