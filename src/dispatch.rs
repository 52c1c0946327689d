//! Cross-thread dispatch queue
//!
//! Any thread may push closures that run on the single consuming thread (the
//! GUI thread). The consumer drains the queue whenever it is woken, either from
//! its message loop (through the wake-up hook) or from the bounded fallback wait
//! it performs after the native window is gone.
//!
//! Tasks run in submission order, never concurrently with each other, and never
//! while the queue lock is held, so a task may itself submit more work.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::trace;

type Task<C> = Box<dyn FnOnce(&mut C) + Send>;

/// Hook run after every successful enqueue
pub type Wakeup = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The consumer has finished its final drain and accepts no more work
    #[error("dispatch queue is closed")]
    Closed,
    /// The task was dropped without running (consumer went away)
    #[error("dispatched task was dropped before it completed")]
    Dropped,
}

struct Inner<C> {
    tasks: VecDeque<Task<C>>,
    interrupted: bool,
    closed: bool,
}

pub struct DispatchQueue<C> {
    inner: Mutex<Inner<C>>,
    cond: Condvar,
    wakeup: Mutex<Option<Wakeup>>,
    consumer: OnceLock<ThreadId>,
}

impl<C> Default for DispatchQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> DispatchQueue<C> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                tasks: VecDeque::new(),
                interrupted: false,
                closed: false,
            }),
            cond: Condvar::new(),
            wakeup: Mutex::new(None),
            consumer: OnceLock::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<C>> {
        // Tasks never run under the lock, so a poisoned guard still holds a
        // consistent queue.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Install the hook that wakes the consumer out of its native message wait.
    pub fn set_wakeup(&self, hook: Option<Wakeup>) {
        *self.wakeup.lock().unwrap_or_else(|e| e.into_inner()) = hook;
    }

    /// Record the calling thread as the consumer.
    ///
    /// Only used to catch synchronous submissions from the consumer itself,
    /// which would block forever.
    pub fn bind_consumer(&self) {
        let _ = self.consumer.set(thread::current().id());
    }

    fn on_consumer_thread(&self) -> bool {
        self.consumer.get() == Some(&thread::current().id())
    }

    /// Enqueue `f` and return immediately.
    pub fn submit_async<F>(&self, f: F) -> Result<(), DispatchError>
    where
        F: FnOnce(&mut C) + Send + 'static,
    {
        {
            let mut inner = self.lock();
            if inner.closed {
                return Err(DispatchError::Closed);
            }
            inner.tasks.push_back(Box::new(f));
            trace!(pending = inner.tasks.len(), "task enqueued");
        }
        self.cond.notify_all();

        let hook = self
            .wakeup
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(hook) = hook {
            hook();
        }
        Ok(())
    }

    /// Enqueue `f` and block until the consumer has run it, returning its result.
    ///
    /// Must not be called from the consumer thread, nor from inside an async
    /// runtime worker (use `spawn_blocking`).
    pub fn submit_sync<F, R>(&self, f: F) -> Result<R, DispatchError>
    where
        F: FnOnce(&mut C) -> R + Send + 'static,
        R: Send + 'static,
    {
        debug_assert!(
            !self.on_consumer_thread(),
            "synchronous dispatch from the consuming thread would deadlock"
        );

        let (tx, rx) = oneshot::channel();
        self.submit_async(move |ctx| {
            // The caller only goes away by panicking; nothing to report then
            let _ = tx.send(f(ctx));
        })?;
        rx.blocking_recv().map_err(|_| DispatchError::Dropped)
    }

    /// Run queued tasks on the calling (consumer) thread.
    ///
    /// With a zero timeout this drains what is queued and returns. Otherwise it
    /// keeps waiting for new work until the timeout elapses or [`interrupt`]
    /// is called. A pending interrupt is consumed on return.
    ///
    /// [`interrupt`]: DispatchQueue::interrupt
    pub fn process(&self, ctx: &mut C, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();
        loop {
            if let Some(task) = inner.tasks.pop_front() {
                drop(inner);
                task(ctx);
                inner = self.lock();
                continue;
            }
            if inner.interrupted {
                inner.interrupted = false;
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            inner = self
                .cond
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
    }

    /// Make a current or upcoming [`process`](DispatchQueue::process) call return
    /// as soon as the queue is empty.
    pub fn interrupt(&self) {
        self.lock().interrupted = true;
        self.cond.notify_all();
    }

    /// Refuse all further submissions, then run every task still queued.
    ///
    /// The consumer calls this as its last act, so that no synchronous caller is
    /// left waiting on a task that will never run.
    pub fn close_and_drain(&self, ctx: &mut C) {
        self.lock().closed = true;
        self.set_wakeup(None);
        loop {
            let task = self.lock().tasks.pop_front();
            match task {
                Some(task) => task(ctx),
                None => break,
            }
        }
    }

    /// Refuse all further submissions and drop every queued task unrun.
    ///
    /// For a consumer that exits without a context to run tasks against
    /// (failed start-up, panic). Synchronous callers get
    /// [`DispatchError::Dropped`].
    pub fn abandon(&self) {
        let dropped = {
            let mut inner = self.lock();
            inner.closed = true;
            std::mem::take(&mut inner.tasks)
        };
        self.set_wakeup(None);
        self.cond.notify_all();
        if !dropped.is_empty() {
            trace!(count = dropped.len(), "dropping unrun tasks");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::assert;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_async_tasks_run_in_order() {
        let queue = DispatchQueue::<Vec<u32>>::new();
        for i in 0..5 {
            queue.submit_async(move |log| log.push(i)).unwrap();
        }
        let mut log = Vec::new();
        queue.process(&mut log, Duration::ZERO);
        assert!(log == vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_sync_returns_result() {
        let queue = Arc::new(DispatchQueue::<u32>::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                queue.bind_consumer();
                let mut value = 41;
                queue.process(&mut value, Duration::from_secs(5));
                value
            })
        };

        let result = queue
            .submit_sync(|v| {
                *v += 1;
                *v * 2
            })
            .unwrap();
        assert!(result == 84);

        queue.interrupt();
        assert!(consumer.join().unwrap() == 42);
    }

    #[test]
    fn test_concurrent_callers_are_serialized() {
        let queue = Arc::new(DispatchQueue::<Vec<(usize, u32)>>::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut log = Vec::new();
                queue.process(&mut log, Duration::from_secs(10));
                queue.close_and_drain(&mut log);
                log
            })
        };

        let callers: Vec<_> = (0..4)
            .map(|caller| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for seq in 0..50 {
                        queue
                            .submit_sync(move |log| log.push((caller, seq)))
                            .unwrap();
                    }
                })
            })
            .collect();
        for caller in callers {
            caller.join().unwrap();
        }
        queue.interrupt();

        let log = consumer.join().unwrap();
        assert!(log.len() == 200);
        // Per caller, tasks ran in the order they were submitted
        for caller in 0..4 {
            let seqs: Vec<u32> = log
                .iter()
                .filter(|(c, _)| *c == caller)
                .map(|(_, s)| *s)
                .collect();
            assert!(seqs == (0..50).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_interrupt_ends_bounded_wait() {
        let queue = Arc::new(DispatchQueue::<()>::new());
        let started = Instant::now();
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.process(&mut (), Duration::from_secs(30)))
        };
        thread::sleep(Duration::from_millis(20));
        queue.interrupt();
        consumer.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_interrupt_is_consumed() {
        let queue = DispatchQueue::<()>::new();
        queue.interrupt();
        queue.process(&mut (), Duration::ZERO);
        assert!(!queue.lock().interrupted);
    }

    #[test]
    fn test_wakeup_hook_runs_per_submit() {
        let queue = DispatchQueue::<()>::new();
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);
        queue.set_wakeup(Some(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })));

        queue.submit_async(|_| {}).unwrap();
        queue.submit_async(|_| {}).unwrap();
        assert!(wakes.load(Ordering::SeqCst) == 2);
    }

    #[test]
    fn test_closed_queue_rejects_work() {
        let queue = DispatchQueue::<u32>::new();
        queue.submit_async(|v| *v = 7).unwrap();

        let mut value = 0;
        queue.close_and_drain(&mut value);
        assert!(value == 7);
        assert!(queue.is_closed());
        assert!(queue.submit_async(|_| {}) == Err(DispatchError::Closed));
        assert!(queue.submit_sync(|_| 1) == Err(DispatchError::Closed));
    }

    #[test]
    fn test_dropped_task_unblocks_caller() {
        let queue = Arc::new(DispatchQueue::<()>::new());
        let caller = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.submit_sync(|_| ()))
        };
        // Wait until the task is queued, then throw it away unrun
        while queue.lock().tasks.is_empty() {
            thread::sleep(Duration::from_millis(1));
        }
        queue.abandon();
        assert!(caller.join().unwrap() == Err(DispatchError::Dropped));
        assert!(queue.submit_async(|_| {}) == Err(DispatchError::Closed));
    }
}
