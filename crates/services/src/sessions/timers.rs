use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

/// Cancellable timers owned by one practice session.
///
/// Callbacks run on the tokio runtime. `cancel_all` aborts every pending task
/// and bumps an epoch, so a callback that already woke up but has not run yet
/// is discarded instead of touching state the host has torn down. Clones share
/// the same set; dropping the last clone cancels everything.
#[derive(Clone, Default)]
pub struct SessionTimers {
    inner: Arc<TimersInner>,
}

#[derive(Default)]
struct TimersInner {
    epoch: AtomicU64,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TimersInner {
    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    fn abort_all(&self) -> usize {
        let Ok(mut tasks) = self.tasks.lock() else {
            return 0;
        };
        let pending = tasks.iter().filter(|t| !t.is_finished()).count();
        for task in tasks.drain(..) {
            task.abort();
        }
        pending
    }
}

impl Drop for TimersInner {
    fn drop(&mut self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.abort_all();
    }
}

fn fire_if_current(weak: &Weak<TimersInner>, epoch: u64) -> bool {
    weak.upgrade().is_some_and(|inner| inner.is_current(epoch))
}

impl SessionTimers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` once after `delay`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn after<F>(&self, delay: Duration, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let epoch = self.epoch();
        let weak = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if fire_if_current(&weak, epoch) {
                callback();
            }
        });
        self.track(task);
    }

    /// Run `callback` every `period`, first after one full period.
    ///
    /// Must be called from within a tokio runtime.
    pub fn every<F>(&self, period: Duration, mut callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        let epoch = self.epoch();
        let weak = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                ticks.tick().await;
                if !fire_if_current(&weak, epoch) {
                    break;
                }
                callback();
            }
        });
        self.track(task);
    }

    /// Abort every pending timer; returns how many were still pending.
    pub fn cancel_all(&self) -> usize {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        let cancelled = self.inner.abort_all();
        if cancelled > 0 {
            debug!(cancelled, "session timers cancelled");
        }
        cancelled
    }

    /// Number of timers that have not fired or been cancelled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner
            .tasks
            .lock()
            .map(|tasks| tasks.iter().filter(|t| !t.is_finished()).count())
            .unwrap_or(0)
    }

    fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    fn track(&self, task: JoinHandle<()>) {
        match self.inner.tasks.lock() {
            Ok(mut tasks) => {
                tasks.retain(|t| !t.is_finished());
                tasks.push(task);
            }
            Err(_) => task.abort(),
        }
    }
}
