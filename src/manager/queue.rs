//! Outstanding transmissions of a logical link.
//!
//! Packets are acknowledged strictly oldest first, so the queue only ever
//! grows at the tail and shrinks at the head.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::tag::PacketTag;
use crate::core::{DataManagerError, Result};

/// An admitted frame awaiting its completion event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxPacket {
    /// Tag embedded in the request identifier.
    pub tag: PacketTag,
    /// When the frame was admitted.
    pub enqueued_at: Instant,
    /// Flush deadline; `None` when the link has no flush timeout.
    pub expiry: Option<Instant>,
    /// A cancel request has been issued for this packet.
    pub flush_pending: bool,
    /// The cancel request was issued because the flush deadline passed,
    /// not by an explicit flush of the whole link.
    pub cancelled_on_expiry: bool,
}

impl TxPacket {
    /// New packet admitted at `now`.
    ///
    /// Fails with `InvalidParameter` when the flush deadline is not
    /// representable.
    pub fn new(tag: PacketTag, now: Instant, flush_timeout: Duration) -> Result<Self> {
        let expiry = if flush_timeout.is_zero() {
            None
        } else {
            let expiry = now.checked_add(flush_timeout).ok_or_else(|| {
                DataManagerError::InvalidParameter(format!(
                    "flush timeout {flush_timeout:?} out of range"
                ))
            })?;
            Some(expiry)
        };
        Ok(Self {
            tag,
            enqueued_at: now,
            expiry,
            flush_pending: false,
            cancelled_on_expiry: false,
        })
    }

    /// Whether the flush deadline has passed at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }

    /// Time spent waiting for acknowledgment.
    pub fn time_in_queue(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.enqueued_at)
    }
}

/// FIFO of outstanding packets.
#[derive(Debug, Default)]
pub struct TxQueue {
    packets: VecDeque<TxPacket>,
}

impl TxQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a packet, failing with `OutOfMemory` if the queue cannot grow.
    pub fn push(&mut self, packet: TxPacket) -> Result<()> {
        self.packets.try_reserve(1)?;
        self.packets.push_back(packet);
        Ok(())
    }

    /// Oldest outstanding packet.
    pub fn front(&self) -> Option<&TxPacket> {
        self.packets.front()
    }

    /// Remove the oldest packet.
    pub fn pop_front(&mut self) -> Option<TxPacket> {
        self.packets.pop_front()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &TxPacket> {
        self.packets.iter()
    }

    /// Oldest to newest, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TxPacket> {
        self.packets.iter_mut()
    }

    /// Number of outstanding packets.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Whether nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// First packet with no cancel request issued.
    pub fn first_unflushed(&self) -> Option<&TxPacket> {
        self.packets.iter().find(|p| !p.flush_pending)
    }
}
