//! Flush engine.
//!
//! Decides which outstanding packets to cancel and drives each link's flush
//! timer. Packets are time ordered, so a walk from the oldest packet can stop
//! at the first one that has not expired yet.

use std::time::{Duration, Instant};

use tracing::debug;

use super::data_manager::DataManager;
use super::link::{FlushCallback, LogicalLink};
use crate::core::{
    DataManagerError, LogicalLinkHandle, RequestId, Result, TimerHandle, TimerService, Transport,
};

/// Result of one drain pass over a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct DrainOutcome {
    /// Cancel requests issued by this pass.
    pub marked: u32,
    /// Cancel requests outstanding on the link after this pass.
    pub pending: u32,
}

/// Delay until the first packet with no cancel request expires; zero if none.
///
/// An expired packet still waiting for a command slot also yields zero. No
/// timer is kept for it: the next completion on the link releases a slot or
/// re-drains, and that drain issues the cancel.
pub(super) fn next_deadline(link: &LogicalLink, now: Instant) -> Duration {
    link.queue
        .first_unflushed()
        .and_then(|packet| packet.expiry)
        .map_or(Duration::ZERO, |expiry| expiry.saturating_duration_since(now))
}

impl<T: Transport, S: TimerService> DataManager<T, S> {
    /// Cancel expired packets, or every packet when `all` is set.
    ///
    /// Returns the number of cancel requests outstanding on the link.
    pub fn request_flush(&mut self, handle: LogicalLinkHandle, all: bool, now: Instant) -> Result<u32> {
        let link = self
            .links
            .get_mut(handle)
            .ok_or(DataManagerError::UnknownLogicalLink(handle))?;
        if all {
            link.flush_all_pending = true;
        }
        self.drain(handle, now)
    }

    /// Flush every outstanding packet and report completion through
    /// `on_complete`.
    ///
    /// When nothing needs cancelling the callback runs before this returns,
    /// with `false`.
    pub fn flush_link(
        &mut self,
        handle: LogicalLinkHandle,
        on_complete: FlushCallback,
        now: Instant,
    ) -> Result<u32> {
        let link = self
            .links
            .get_mut(handle)
            .ok_or(DataManagerError::UnknownLogicalLink(handle))?;
        if link.on_flush_complete.is_some() {
            return Err(DataManagerError::FlushInProgress(handle));
        }
        link.on_flush_complete = Some(on_complete);
        self.request_flush(handle, true, now)
    }

    /// Issue cancel requests while command slots are free.
    ///
    /// Returns the number of cancel requests outstanding on the link.
    pub fn drain(&mut self, handle: LogicalLinkHandle, now: Instant) -> Result<u32> {
        self.drain_link(handle, now)
            .map(|outcome| outcome.pending)
            .ok_or(DataManagerError::UnknownLogicalLink(handle))
    }

    pub(super) fn drain_link(&mut self, handle: LogicalLinkHandle, now: Instant) -> Option<DrainOutcome> {
        let Self {
            links,
            command_queue,
            transport,
            timers,
            config,
            stats,
            ..
        } = self;
        let link = links.get_mut(handle)?;

        let flush_all = link.flush_all_pending;
        let mut marked = 0u32;
        for packet in link.queue.iter_mut() {
            if !command_queue.has_free_slot() {
                break;
            }
            if packet.flush_pending {
                continue;
            }
            if !flush_all && !packet.is_expired(now) {
                break;
            }
            command_queue.try_acquire();
            transport.cancel(RequestId::encode(config.app_id, handle, packet.tag));
            packet.flush_pending = true;
            packet.cancelled_on_expiry = !flush_all;
            marked += 1;
        }

        if marked > 0 {
            link.flush_pending_count += marked;
            stats.cancels_issued += u64::from(marked);
            link.stop_flush_timer(timers);
            debug!(
                logical_link = %handle,
                marked,
                pending = link.flush_pending_count,
                flush_all,
                "flush requested"
            );
        }

        let pending = link.flush_pending_count;
        let mut on_complete = None;
        if pending == 0 {
            if !link.delete_requested {
                link.flush_all_pending = false;
            }
            on_complete = link.on_flush_complete.take();
        }
        if let Some(on_complete) = on_complete {
            on_complete(false);
        }

        Some(DrainOutcome { marked, pending })
    }

    /// Delay until the link's next flush deadline; zero when no timer is
    /// needed, including when the oldest expired packet is only waiting for a
    /// command slot.
    pub fn next_flush_deadline(&self, handle: LogicalLinkHandle, now: Instant) -> Result<Duration> {
        self.links
            .get(handle)
            .map(|link| next_deadline(link, now))
            .ok_or(DataManagerError::UnknownLogicalLink(handle))
    }

    /// Re-arm the flush timer for the next deadline, or stop it.
    pub(super) fn reschedule_flush_timer(&mut self, handle: LogicalLinkHandle, now: Instant) -> Duration {
        let Self { links, timers, .. } = self;
        let Some(link) = links.get_mut(handle) else {
            return Duration::ZERO;
        };

        let next = if link.flow_spec.has_flush_timeout() {
            next_deadline(link, now)
        } else {
            Duration::ZERO
        };
        if next.is_zero() {
            link.stop_flush_timer(timers);
        } else {
            link.restart_flush_timer(timers, next);
        }
        next
    }

    pub(super) fn on_flush_timer(&mut self, handle: LogicalLinkHandle, timer: TimerHandle, now: Instant) {
        let Some(link) = self.links.get_mut(handle) else {
            debug!(logical_link = %handle, "flush timer for unknown link");
            return;
        };
        if link.flush_timer != Some(timer) {
            debug!(logical_link = %handle, "stale flush timer");
            return;
        }
        link.flush_timer = None;

        if let Some(outcome) = self.drain_link(handle, now) {
            if outcome.marked == 0 {
                self.reschedule_flush_timer(handle, now);
            }
        }
    }
}
