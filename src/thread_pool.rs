//! Fixed-size worker pool draining a task queue.
//!
//! Grounded on the original `ThreadPool` (named pool, `execute`/`stop`/
//! `stop_now`/`join`, each worker looping on task availability) and on the
//! idiomatic Rust shape for this pattern: a `MessageQueue` of boxed
//! closures plus a `Vec<JoinHandle>`. Each task runs with `(thread_name,
//! thread_id)` arguments; panics inside a task are caught so one bad
//! handler cannot take a worker down.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::queue::MessageQueue;

/// A unit of work submitted to a [`ThreadPool`].
pub type Task = Box<dyn FnOnce(&str, usize) + Send + 'static>;

/// A named, fixed-size pool of worker threads draining a shared task queue.
pub struct ThreadPool {
    name: String,
    num_threads: usize,
    queue: Arc<MessageQueue<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawn `num_threads` workers named `"{name}-{id}"`.
    #[must_use]
    pub fn new(name: impl Into<String>, num_threads: usize) -> Self {
        let name = name.into();
        let queue = Arc::new(MessageQueue::new(crate::queue::DEFAULT_CAPACITY));
        let mut workers = Vec::with_capacity(num_threads);
        for thread_id in 0..num_threads {
            let queue = Arc::clone(&queue);
            let thread_name = format!("{name}-{thread_id}");
            let handle = thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || run(&thread_name, thread_id, &queue))
                .expect("failed to spawn thread pool worker");
            workers.push(handle);
        }
        Self {
            name,
            num_threads,
            queue,
            workers,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.queue.is_running()
    }

    /// Submit a task for execution on some worker. Returns `false` if the
    /// pool has been stopped.
    pub fn execute<F>(&self, task: F) -> bool
    where
        F: FnOnce(&str, usize) + Send + 'static,
    {
        self.queue.enqueue(Box::new(task))
    }

    /// Stop accepting new tasks; workers finish whatever is already queued.
    pub fn stop(&self) {
        self.queue.stop();
    }

    /// Stop accepting new tasks and discard anything still queued; workers
    /// exit as soon as their current task (if any) completes.
    pub fn stop_now(&self) {
        self.queue.stop_now();
    }

    /// Block until every worker thread has exited.
    pub fn join(&mut self) {
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn run(thread_name: &str, thread_id: usize, queue: &MessageQueue<Task>) {
    loop {
        let task = match queue.dequeue() {
            Ok(task) => task,
            Err(_) => break,
        };
        let result = catch_unwind(AssertUnwindSafe(|| task(thread_name, thread_id)));
        if let Err(panic) = result {
            let message = panic_message(&panic);
            tracing::error!(thread = thread_name, thread_id, %message, "thread pool task panicked");
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.queue.stop_now();
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn executes_tasks_on_worker_threads() {
        let pool = ThreadPool::new("test", 2);
        let (tx, rx) = mpsc::channel();
        for i in 0..10 {
            let tx = tx.clone();
            assert!(pool.execute(move |_name, _id| {
                tx.send(i).unwrap();
            }));
        }
        drop(tx);
        let mut results: Vec<_> = rx.iter().collect();
        results.sort_unstable();
        assert_eq!(results, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn execute_after_stop_returns_false() {
        let pool = ThreadPool::new("test", 1);
        pool.stop();
        assert!(!pool.execute(|_, _| {}));
    }

    #[test]
    fn panicking_task_does_not_kill_worker() {
        let pool = ThreadPool::new("test", 1);
        let ran_after = Arc::new(AtomicUsize::new(0));

        assert!(pool.execute(|_name, _id| panic!("boom")));

        let ran_after2 = Arc::clone(&ran_after);
        let (tx, rx) = mpsc::channel();
        assert!(pool.execute(move |_name, _id| {
            ran_after2.fetch_add(1, Ordering::SeqCst);
            tx.send(()).unwrap();
        }));
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(ran_after.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn join_waits_for_workers_to_exit() {
        let mut pool = ThreadPool::new("test", 3);
        pool.stop();
        pool.join();
    }

    #[test]
    fn name_and_num_threads_accessors() {
        let pool = ThreadPool::new("workers", 4);
        assert_eq!(pool.name(), "workers");
        assert_eq!(pool.num_threads(), 4);
    }
}
