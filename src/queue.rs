//! Bounded-concurrency task queue with deferred tasks and an idle barrier.
//!
//! The queue owns plain task data; the handler future is supplied once at
//! start. Concurrency is enforced with a semaphore, FIFO order with an
//! unbounded channel, and completion with an outstanding-task counter: a
//! task counts from the moment it is added (delayed tasks included) until
//! its handler future is dropped.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify, Semaphore};

pub struct WorkQueue<T> {
    inner: Arc<QueueInner<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct QueueInner<T> {
    tx: Mutex<Option<mpsc::UnboundedSender<T>>>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<T>>>,
    permits: Arc<Semaphore>,
    outstanding: AtomicUsize,
    idle: Notify,
}

impl<T: Send + 'static> WorkQueue<T> {
    pub fn new(concurrency: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(QueueInner {
                tx: Mutex::new(Some(tx)),
                rx: Mutex::new(Some(rx)),
                permits: Arc::new(Semaphore::new(concurrency.max(1))),
                outstanding: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    /// Enqueue a task. FIFO among runnable tasks. Tasks added after
    /// `close` are dropped.
    pub fn add(&self, task: T) {
        let Some(tx) = self.inner.tx.lock().clone() else {
            return;
        };
        self.inner.outstanding.fetch_add(1, Ordering::SeqCst);
        if tx.send(task).is_err() {
            self.inner.finish_one();
        }
    }

    /// Enqueue a task that becomes runnable only after `delay`. The task
    /// counts as outstanding immediately so the idle barrier covers it.
    pub fn add_delayed(&self, task: T, delay: Duration) {
        if delay.is_zero() {
            return self.add(task);
        }

        let Some(tx) = self.inner.tx.lock().clone() else {
            return;
        };
        self.inner.outstanding.fetch_add(1, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(task).is_err() {
                inner.finish_one();
            }
        });
    }

    /// Start the dispatch loop. Panics when called twice: the receiver
    /// can only be taken once.
    pub fn start<F, Fut>(&self, handler: F)
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut rx = self
            .inner
            .rx
            .lock()
            .take()
            .expect("WorkQueue::start called twice");
        let inner = Arc::clone(&self.inner);
        let handler = Arc::new(handler);

        tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                let permit = match Arc::clone(&inner.permits).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };

                let handler = Arc::clone(&handler);
                let guard = TaskGuard {
                    inner: Arc::clone(&inner),
                };
                tokio::spawn(async move {
                    let _permit = permit;
                    handler(task).await;
                    drop(guard);
                });
            }
        });
    }

    /// Resolves once there are zero runnable, zero running, and zero
    /// delayed tasks. The sole termination signal for a run.
    pub async fn on_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inner.outstanding.load(Ordering::SeqCst) == 0 {
                return;
            }

            notified.await;
        }
    }

    /// Drop the sender side so the dispatch loop (and the handler it
    /// owns) can wind down. Call after `on_idle`; later adds are no-ops.
    pub fn close(&self) {
        self.inner.tx.lock().take();
    }

    pub fn pending(&self) -> usize {
        self.inner.outstanding.load(Ordering::SeqCst)
    }
}

impl<T> QueueInner<T> {
    fn finish_one(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Decrements the outstanding count when the task future is dropped, so
/// a panicking handler cannot wedge the idle barrier.
struct TaskGuard<T> {
    inner: Arc<QueueInner<T>>,
}

impl<T> Drop for TaskGuard<T> {
    fn drop(&mut self) {
        self.inner.finish_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_runs_all_tasks_then_idles() {
        let queue: WorkQueue<u32> = WorkQueue::new(4);
        let counter = Arc::new(AtomicUsize::new(0));

        let seen = Arc::clone(&counter);
        queue.start(move |_| {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });

        for i in 0..50 {
            queue.add(i);
        }

        queue.on_idle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 50);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrency_bound_is_respected() {
        let queue: WorkQueue<u32> = WorkQueue::new(3);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let r = Arc::clone(&running);
        let p = Arc::clone(&peak);
        queue.start(move |_| {
            let running = Arc::clone(&r);
            let peak = Arc::clone(&p);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }
        });

        for i in 0..20 {
            queue.add(i);
        }

        queue.on_idle().await;
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_idle_waits_for_delayed_tasks() {
        let queue: WorkQueue<()> = WorkQueue::new(2);
        let done = Arc::new(AtomicUsize::new(0));

        let d = Arc::clone(&done);
        queue.start(move |_| {
            let done = Arc::clone(&d);
            async move {
                done.fetch_add(1, Ordering::SeqCst);
            }
        });

        let start = Instant::now();
        queue.add_delayed((), Duration::from_millis(150));
        queue.on_idle().await;

        assert!(start.elapsed() >= Duration::from_millis(150));
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_tasks_can_enqueue_more_work() {
        let queue: WorkQueue<u32> = WorkQueue::new(2);
        let total = Arc::new(AtomicUsize::new(0));

        let q = queue.clone();
        let t = Arc::clone(&total);
        queue.start(move |depth| {
            let queue = q.clone();
            let total = Arc::clone(&t);
            async move {
                total.fetch_add(1, Ordering::SeqCst);
                if depth < 3 {
                    queue.add(depth + 1);
                    queue.add(depth + 1);
                }
            }
        });

        queue.add(0);
        queue.on_idle().await;

        // 1 + 2 + 4 + 8 tasks at depths 0..=3
        assert_eq!(total.load(Ordering::SeqCst), 15);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_panicking_task_does_not_wedge_idle() {
        let queue: WorkQueue<bool> = WorkQueue::new(2);

        queue.start(move |explode| async move {
            if explode {
                panic!("task failure");
            }
        });

        queue.add(true);
        queue.add(false);
        queue.on_idle().await;
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_close_makes_later_adds_noops() {
        let queue: WorkQueue<u32> = WorkQueue::new(1);
        let counter = Arc::new(AtomicUsize::new(0));

        let seen = Arc::clone(&counter);
        queue.start(move |_| {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });

        queue.add(1);
        queue.on_idle().await;
        queue.close();

        queue.add(2);
        queue.on_idle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
