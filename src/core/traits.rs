//! Trait seams between the data manager and its collaborators.
//!
//! The data manager never performs I/O itself. Frames, cancel requests and
//! subscriptions go through a [`Transport`]; deadlines are handed to a
//! [`TimerService`] and come back later as timer expiry events.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;

use super::types::{LogicalLinkHandle, PhysicalLinkHandle, TrafficClass};

/// 32-bit identifier attached to every transmission request.
///
/// Layout: `app_id(4) << 28 | logical_link(12) << 16 | packet_tag(16)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u32);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// The shared MAC transport underneath every logical link.
///
/// All calls are fire-and-forget; results come back as events.
pub trait Transport {
    /// Ask for traffic and command queue sizes. Answered by a capabilities event.
    fn query_capabilities(&mut self);

    /// Submit a frame for transmission.
    fn send_frame(&mut self, request_id: RequestId, class: TrafficClass, payload: Bytes);

    /// Cancel an outstanding transmission. Uses one command queue slot.
    fn cancel(&mut self, request_id: RequestId);

    /// Start delivering inbound frames.
    fn subscribe_inbound(&mut self);

    /// Stop delivering inbound frames.
    fn unsubscribe_inbound(&mut self);
}

/// What a scheduled timer is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerToken {
    /// Flush deadline of a logical link.
    Flush(LogicalLinkHandle),
    /// Early link loss check of a physical link.
    EarlyLoss(PhysicalLinkHandle),
    /// Final link loss check of a physical link.
    Loss(PhysicalLinkHandle),
}

/// Opaque handle of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub u64);

/// External scheduler for the flush and supervision timers.
///
/// A started timer is delivered back as an expiry event carrying both the
/// token and the handle. Cancelling an unknown or already fired handle is a
/// no-op.
pub trait TimerService {
    /// Schedule `token` to fire after `delay`.
    fn start(&mut self, token: TimerToken, delay: Duration) -> TimerHandle;

    /// Cancel a scheduled timer.
    fn cancel(&mut self, handle: TimerHandle);
}

/// Stop the timer held in `slot`, if any.
pub(crate) fn stop_timer<S: TimerService + ?Sized>(timers: &mut S, slot: &mut Option<TimerHandle>) {
    if let Some(handle) = slot.take() {
        timers.cancel(handle);
    }
}
