//! # Periodic Scheduler
//!
//! Starts a unit of async work on a fixed cadence until cancelled.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Periodic Task                                    │
//! │                                                                         │
//! │   spawn(name, interval, action)                                         │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   tick (t=0) ──► action() ──► JoinSet ◄── tick (t=1i) ──► action() ...  │
//! │                                  │                                      │
//! │                                  └── work runs detached, reaped as it   │
//! │                                      finishes                           │
//! │                                                                         │
//! │   cancel() / drop(handle)                                               │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   No further tick starts, unfinished work is drained, task exits.       │
//! │                                                                         │
//! │   A panicking action is logged; the next tick still runs.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `action()` itself runs on the loop and should be quick; the future it
//! returns is spawned, so slow work never holds back the next tick.

use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info};

use crate::error::{ClientError, ClientResult};

// =============================================================================
// Periodic Task
// =============================================================================

/// Spawner for cancellable fixed-cadence loops.
pub struct PeriodicTask;

impl PeriodicTask {
    /// Spawns the loop on the current runtime, first tick immediately.
    ///
    /// On every tick `action` is called on the loop task and the future it
    /// returns is spawned into a set owned by the loop. Must be called from
    /// within a tokio runtime.
    pub fn spawn<F, Fut>(
        name: &'static str,
        interval: Duration,
        mut action: F,
    ) -> ReportingLoopHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let join = tokio::spawn(async move {
            info!(task = name, ?interval, "Periodic task starting");

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut in_flight: JoinSet<()> = JoinSet::new();
            let mut ticks: u64 = 0;

            loop {
                tokio::select! {
                    biased;

                    // Cancel request, or every handle dropped
                    _ = shutdown_rx.recv() => {
                        info!(task = name, ticks, "Periodic task cancelled");
                        break;
                    }

                    Some(finished) = in_flight.join_next(), if !in_flight.is_empty() => {
                        log_outcome(name, finished);
                    }

                    _ = ticker.tick() => {
                        ticks += 1;
                        match catch_unwind(AssertUnwindSafe(|| action())) {
                            Ok(work) => {
                                in_flight.spawn(work);
                            }
                            Err(panic) => {
                                error!(
                                    task = name,
                                    tick = ticks,
                                    panic = %panic_message(panic.as_ref()),
                                    "Periodic action panicked"
                                );
                            }
                        }
                    }
                }
            }

            // Work already started runs to completion; none is interrupted.
            debug!(task = name, pending = in_flight.len(), "Draining periodic work");
            while let Some(finished) = in_flight.join_next().await {
                log_outcome(name, finished);
            }

            debug!(task = name, "Periodic task stopped");
        });

        ReportingLoopHandle {
            name,
            shutdown_tx: Some(shutdown_tx),
            join: Some(join),
        }
    }
}

fn log_outcome(name: &'static str, finished: Result<(), JoinError>) {
    match finished {
        Ok(()) => {}
        Err(e) if e.is_panic() => {
            let panic = e.into_panic();
            error!(
                task = name,
                panic = %panic_message(panic.as_ref()),
                "Periodic action panicked"
            );
        }
        Err(_) => debug!(task = name, "Periodic action aborted"),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// =============================================================================
// Loop Handle
// =============================================================================

/// Owner of a running periodic loop.
///
/// Dropping the handle cancels the loop without waiting for it.
pub struct ReportingLoopHandle {
    name: &'static str,
    shutdown_tx: Option<mpsc::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl ReportingLoopHandle {
    /// Requests cancellation. Idempotent; does not wait.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            debug!(task = self.name, "Cancelling periodic task");
            let _ = tx.try_send(());
        }
    }

    /// Returns true until cancellation has been requested.
    pub fn is_active(&self) -> bool {
        self.shutdown_tx.is_some()
    }

    /// Returns true once the loop task has exited.
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancels the loop and waits for it to exit.
    ///
    /// Work spawned by earlier ticks is allowed to finish before this
    /// returns, so nothing started by the loop outlives the call.
    pub async fn stop(mut self) -> ClientResult<()> {
        self.cancel();

        if let Some(join) = self.join.take() {
            join.await
                .map_err(|e| ClientError::Internal(format!("{} task failed: {}", self.name, e)))?;
        }

        Ok(())
    }
}

impl Drop for ReportingLoopHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for ReportingLoopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportingLoopHandle")
            .field("name", &self.name)
            .field("active", &self.is_active())
            .field("finished", &self.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::{sleep, Instant};

    fn counting_task(interval: Duration) -> (ReportingLoopHandle, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let handle = PeriodicTask::spawn("test", interval, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (handle, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_at_fixed_cadence() {
        let (handle, count) = counting_task(Duration::from_secs(1));

        // Ticks at 0, 1, 2 and 3 seconds.
        sleep(Duration::from_millis(3500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);

        handle.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ticks_after_stop() {
        let (handle, count) = counting_task(Duration::from_secs(1));

        sleep(Duration::from_millis(1500)).await;
        let started = Instant::now();
        handle.stop().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));

        let at_stop = count.load(Ordering::SeqCst);
        assert_eq!(at_stop, 2);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), at_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let (handle, count) = counting_task(Duration::from_secs(1));

        sleep(Duration::from_millis(500)).await;
        drop(handle);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let (mut handle, _count) = counting_task(Duration::from_secs(1));
        assert!(handle.is_active());

        handle.cancel();
        handle.cancel();
        assert!(!handle.is_active());

        handle.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_unfinished_work() {
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let (start_count, done_count) = (started.clone(), finished.clone());
        let handle = PeriodicTask::spawn("slow", Duration::from_secs(1), move || {
            let (start_count, done_count) = (start_count.clone(), done_count.clone());
            async move {
                start_count.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(500)).await;
                done_count.fetch_add(1, Ordering::SeqCst);
            }
        });

        sleep(Duration::from_millis(200)).await;
        let stopping = Instant::now();
        handle.stop().await.unwrap();

        // The tick started at 0 ms finishes at 500 ms; no new tick starts.
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert!(stopping.elapsed() < Duration::from_secs(1));

        sleep(Duration::from_secs(2)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_work_does_not_delay_schedule() {
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let (start_count, done_count) = (started.clone(), finished.clone());
        let handle = PeriodicTask::spawn("slow", Duration::from_secs(1), move || {
            let (start_count, done_count) = (start_count.clone(), done_count.clone());
            async move {
                start_count.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(2500)).await;
                done_count.fetch_add(1, Ordering::SeqCst);
            }
        });

        // Work started at 0, 1, 2 and 3 seconds; only the first has finished.
        sleep(Duration::from_millis(3500)).await;
        assert_eq!(started.load(Ordering::SeqCst), 4);
        assert_eq!(finished.load(Ordering::SeqCst), 1);

        handle.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_tick_does_not_kill_loop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handle = PeriodicTask::spawn("flaky", Duration::from_secs(1), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 1 {
                    panic!("tick blew up");
                }
            }
        });

        sleep(Duration::from_millis(3500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(!handle.is_finished());

        handle.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_action_call_does_not_kill_loop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handle = PeriodicTask::spawn("flaky", Duration::from_secs(1), move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("action blew up");
            }
            async {}
        });

        sleep(Duration::from_millis(2500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(!handle.is_finished());

        handle.stop().await.unwrap();
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");

        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }
}
