//! Background collect loop.
//!
//! The worker collects once on start, then on a fixed cadence anchored to
//! the previous scheduled instant so passes do not drift. `set_interval`
//! wakes the worker through a [`Notify`]; on wake the schedule is
//! re-anchored to the current instant and the next pass waits one full
//! (new) interval. Waking never triggers an early sample. After a stall
//! that spans several slots, one catch-up pass runs and the schedule is
//! re-anchored to that pass.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info};

use mocktrics_core::InvalidParameter;

use crate::error::{MetricError, MetricResult};
use crate::registry::MetricRegistry;

struct Inner {
    registry: MetricRegistry,
    /// Seconds between passes.
    interval: AtomicU64,
    read_only: bool,
    wake: Notify,
    collections: AtomicU64,
    /// Passes left to fail before collecting normally.
    #[cfg(test)]
    failing_passes: AtomicU64,
}

impl Inner {
    fn interval(&self) -> Duration {
        Duration::from_secs(self.interval.load(Ordering::Acquire))
    }

    fn collect_pass(&self) {
        let result = catch_unwind(AssertUnwindSafe(|| {
            #[cfg(test)]
            if self
                .failing_passes
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                .is_ok()
            {
                panic!("collect pass failed");
            }
            self.registry.collect_all()
        }));
        match result {
            Ok(()) => {
                self.collections.fetch_add(1, Ordering::AcqRel);
            }
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(%reason, "collect pass panicked");
            }
        }
    }
}

struct Worker {
    handle: JoinHandle<()>,
    stop_tx: watch::Sender<bool>,
}

/// Handle to the collect loop. Clones share the same worker.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
    worker: Arc<Mutex<Option<Worker>>>,
}

impl Scheduler {
    /// `read_only` pins the interval; `set_interval` then always fails.
    pub fn new(registry: MetricRegistry, interval: u64, read_only: bool) -> MetricResult<Self> {
        check_interval(interval)?;
        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                interval: AtomicU64::new(interval),
                read_only,
                wake: Notify::new(),
                collections: AtomicU64::new(0),
                #[cfg(test)]
                failing_passes: AtomicU64::new(0),
            }),
            worker: Arc::new(Mutex::new(None)),
        })
    }

    /// Spawn the worker on the current tokio runtime. Returns false if it
    /// was already running.
    pub fn start(&self) -> bool {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return false;
        }
        let (stop_tx, stop_rx) = watch::channel(false);
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(run(inner, stop_rx));
        *worker = Some(Worker { handle, stop_tx });
        info!(interval = self.get_interval(), "scheduler started");
        true
    }

    /// Signal the worker and wait for it to exit. No pass starts after the
    /// stop flag is observed.
    pub async fn stop(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        let _ = worker.stop_tx.send(true);
        if let Err(e) = worker.handle.await {
            error!(error = %e, "scheduler worker failed");
        }
        info!("scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Change the interval and wake the worker so the new cadence applies
    /// immediately.
    pub fn set_interval(&self, seconds: u64) -> MetricResult<()> {
        if self.inner.read_only {
            return Err(MetricError::ReadOnly(
                "collect interval is set in the configuration file".to_string(),
            ));
        }
        check_interval(seconds)?;
        let previous = self.inner.interval.swap(seconds, Ordering::AcqRel);
        self.inner.wake.notify_one();
        info!(previous, interval = seconds, "collect interval updated");
        Ok(())
    }

    pub fn get_interval(&self) -> u64 {
        self.inner.interval.load(Ordering::Acquire)
    }

    pub fn interval_is_read_only(&self) -> bool {
        self.inner.read_only
    }

    /// Number of completed collect passes.
    pub fn collections(&self) -> u64 {
        self.inner.collections.load(Ordering::Acquire)
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.inner.registry
    }
}

fn check_interval(seconds: u64) -> MetricResult<()> {
    if seconds == 0 {
        return Err(InvalidParameter::new("collect_interval", "must be at least 1 second").into());
    }
    Ok(())
}

async fn run(inner: Arc<Inner>, mut stop_rx: watch::Receiver<bool>) {
    let mut next = Instant::now();
    loop {
        if *stop_rx.borrow() {
            break;
        }

        if Instant::now() >= next {
            inner.collect_pass();
            next += inner.interval();
            let now = Instant::now();
            if next <= now {
                // Missed slots are dropped, not replayed.
                next = now + inner.interval();
                debug!(interval = ?inner.interval(), "collect schedule fell behind, re-anchored");
            }
            continue;
        }

        tokio::select! {
            _ = sleep_until(next) => {}
            _ = inner.wake.notified() => {
                next = Instant::now() + inner.interval();
                debug!(interval = ?inner.interval(), "scheduler woken, schedule re-anchored");
            }
            changed = stop_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    debug!("scheduler loop exited");
}
