//! Cancellable fixed-cadence background tasks.
//!
//! The compositor draw loop and the keepalive blank-frame refresh both run
//! on a timer owned by the component that started them. `PeriodicTask`
//! aborts its tokio task on `cancel()` and on `Drop`, so a task never
//! outlives its owner.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A recurring task running `tick` every `period` until cancelled.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    period: Duration,
    handle: Option<JoinHandle<()>>,
    ticks: Arc<AtomicU64>,
}

impl PeriodicTask {
    /// Spawn the task on the current tokio runtime.
    ///
    /// The first tick fires immediately. Ticks that fall behind are delayed
    /// rather than bursted.
    pub fn spawn<F>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let ticks = Arc::new(AtomicU64::new(0));
        let counter = ticks.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tick();
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });

        tracing::debug!(task = name, period_ms = period.as_millis() as u64, "Periodic task started");

        Self {
            name,
            period,
            handle: Some(handle),
            ticks,
        }
    }

    /// Stop the task. Returns `true` if it was still running.
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                tracing::debug!(task = self.name, ticks = self.ticks(), "Periodic task cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Number of completed ticks so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_at_fixed_cadence() {
        let hits = Arc::new(AtomicU64::new(0));
        let seen = hits.clone();
        let task = PeriodicTask::spawn("test", Duration::from_millis(100), move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(350)).await;
        // t = 0, 100, 200, 300
        assert_eq!(hits.load(Ordering::SeqCst), 4);
        assert_eq!(task.ticks(), 4);
        assert!(task.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticking() {
        let hits = Arc::new(AtomicU64::new(0));
        let seen = hits.clone();
        let mut task = PeriodicTask::spawn("test", Duration::from_millis(100), move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(task.cancel());
        assert!(!task.cancel());
        let after_cancel = hits.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(hits.load(Ordering::SeqCst), after_cancel);
        assert!(!task.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_aborts_task() {
        let hits = Arc::new(AtomicU64::new(0));
        let seen = hits.clone();
        let task = PeriodicTask::spawn("test", Duration::from_millis(50), move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(60)).await;
        drop(task);
        let at_drop = hits.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(hits.load(Ordering::SeqCst), at_drop);
    }
}
