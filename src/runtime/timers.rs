//! Timer service backed by `tokio::time`.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

use super::driver::Command;
use crate::core::{TimerHandle, TimerService, TimerToken};
use crate::dispatch::Event;

/// Runs each timer as a sleeping task that posts
/// [`Event::TimerExpired`] back to the driver.
///
/// Must be used from within a tokio runtime.
#[derive(Debug)]
pub struct TokioTimers {
    next: u64,
    tasks: HashMap<TimerHandle, JoinHandle<()>>,
    events: mpsc::WeakUnboundedSender<Command>,
}

impl TokioTimers {
    pub(super) fn new(events: mpsc::WeakUnboundedSender<Command>) -> Self {
        Self {
            next: 0,
            tasks: HashMap::new(),
            events,
        }
    }

    /// Number of timers that have not fired or been cancelled.
    pub fn pending(&self) -> usize {
        self.tasks.values().filter(|task| !task.is_finished()).count()
    }
}

impl TimerService for TokioTimers {
    fn start(&mut self, token: TimerToken, delay: Duration) -> TimerHandle {
        self.tasks.retain(|_, task| !task.is_finished());

        self.next += 1;
        let handle = TimerHandle(self.next);
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = events.upgrade() {
                let _ = tx.send(Command::Event(Event::TimerExpired { token, handle }));
            }
        });
        trace!(?token, ?delay, ?handle, "timer started");
        self.tasks.insert(handle, task);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(task) = self.tasks.remove(&handle) {
            task.abort();
        }
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}
