//! Async countdown engine driving the one-second tick loop.
//!
//! [`TimerEngine`] wraps a shared [`ProjectStateManager`] and owns the task
//! that calls [`ProjectStateManager::tick`] once per second while the timer is
//! running. Snapshots are published through a watch channel, so any number of
//! observers can subscribe without touching the manager lock; late subscribers
//! immediately see the latest snapshot.
//!
//! Command methods (`start`, `reset_to_row`, `finish`) are synchronous: they
//! mutate state through the manager, then manage the tick task around the
//! mutation. At most one tick task is alive at a time.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::Stream;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::manager::ProjectStateManager;
use crate::types::TimerSnapshot;

/// Countdown engine bound to a shared project manager.
pub struct TimerEngine {
    manager: Arc<Mutex<ProjectStateManager>>,
    snapshot_tx: watch::Sender<TimerSnapshot>,
    snapshot_rx: watch::Receiver<TimerSnapshot>,
    cancel: Option<CancellationToken>,
}

impl TimerEngine {
    pub fn new(manager: Arc<Mutex<ProjectStateManager>>) -> Self {
        let initial = manager
            .lock()
            .map(|m| m.snapshot())
            .unwrap_or_else(|_| TimerSnapshot::idle(0));
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);
        Self { manager, snapshot_tx, snapshot_rx, cancel: None }
    }

    /// Shared access to the underlying manager, for status commands and reads
    /// that go around the tick loop.
    pub fn manager(&self) -> Arc<Mutex<ProjectStateManager>> {
        Arc::clone(&self.manager)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> TimerSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Stream of snapshots, one per tick plus one per command.
    ///
    /// The underlying WatchStream yields the current value immediately, so a
    /// UI that subscribes mid-race renders the live row without waiting a
    /// second.
    pub fn subscribe(&self) -> impl Stream<Item = TimerSnapshot> + Send + Unpin + use<> {
        WatchStream::new(self.snapshot_rx.clone())
    }

    /// Start the countdown and spawn the tick task.
    pub fn start(&mut self) -> Result<TimerSnapshot> {
        let snapshot = self.with_manager(|m| m.start_timer())?;
        let _ = self.snapshot_tx.send(snapshot);
        self.respawn();
        Ok(snapshot)
    }

    /// Jump the countdown to `row`, restarting the tick task against the
    /// re-anchored start time.
    pub fn reset_to_row(&mut self, row: usize) -> Result<TimerSnapshot> {
        let snapshot = self.with_manager(|m| m.reset_to_row(row))?;
        let _ = self.snapshot_tx.send(snapshot);
        self.respawn();
        Ok(snapshot)
    }

    /// Stop the countdown, returning the timer to idle.
    pub fn finish(&mut self) -> Result<()> {
        self.shutdown();
        let snapshot = self.with_manager(|m| {
            m.finish_timer()?;
            Ok(m.snapshot())
        })?;
        let _ = self.snapshot_tx.send(snapshot);
        Ok(())
    }

    /// Cancel the tick task without altering project state. Used when the
    /// project is closed or swapped under a running engine.
    pub fn shutdown(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }

    fn with_manager<T>(
        &self,
        f: impl FnOnce(&mut ProjectStateManager) -> Result<T>,
    ) -> Result<T> {
        let mut manager = self
            .manager
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut manager)
    }

    /// Replace any live tick task with a fresh one.
    fn respawn(&mut self) {
        self.shutdown();
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        self.cancel = Some(cancel);

        let manager = Arc::clone(&self.manager);
        let snapshot_tx = self.snapshot_tx.clone();
        tokio::spawn(async move {
            tick_task(manager, snapshot_tx, task_cancel).await;
        });
    }
}

impl Drop for TimerEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One-second tick loop. Winds itself down when cancelled, when the manager
/// reports nothing left to drive, or when a tick fails to persist.
async fn tick_task(
    manager: Arc<Mutex<ProjectStateManager>>,
    snapshot_tx: watch::Sender<TimerSnapshot>,
    cancel: CancellationToken,
) {
    info!("tick task started");
    let mut ticker = interval(Duration::from_secs(1));
    // A delayed tick must not trigger a catch-up burst; rows are re-derived
    // from wall-clock elapsed time, so skipped ticks lose nothing.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval() fires immediately; the first row was already published by
    // the command that spawned us.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("tick task cancelled");
                break;
            }
            _ = ticker.tick() => {}
        }

        let result = {
            let Ok(mut manager) = manager.lock() else {
                warn!("manager lock poisoned, stopping tick task");
                break;
            };
            manager.tick()
        };

        match result {
            Ok(Some(snapshot)) => {
                debug!(elapsed_ms = snapshot.elapsed_ms, row = ?snapshot.current_row, "tick");
                if snapshot_tx.send(snapshot).is_err() {
                    debug!("all snapshot receivers dropped, stopping tick task");
                    break;
                }
            }
            Ok(None) => {
                info!("timer idle, tick task stopping");
                break;
            }
            Err(error) => {
                warn!(%error, "tick failed, stopping tick task");
                break;
            }
        }
    }
}
