//! Packet tag codec.
//!
//! A transmission is identified towards the transport by a 32-bit request
//! identifier built from the subsystem's application id, the logical link
//! handle and a per-link packet tag:
//!
//! ```text
//!  31    28 27          16 15                0
//! +--------+--------------+------------------+
//! | app id | logical link |    packet tag    |
//! +--------+--------------+------------------+
//! ```
//!
//! The logical link field is 12 bits. Tags wrap at twice the class credit so a
//! tag can never be reused while an older packet carrying it is in flight.

use std::fmt;

use crate::core::{
    APP_ID_MASK, APP_ID_SHIFT, LOGICAL_HANDLE_MASK, LOGICAL_HANDLE_SHIFT, LogicalLinkHandle,
    PACKET_TAG_MASK, RequestId,
};

/// Per-link sequence number correlating a completion with its packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PacketTag(pub u16);

impl fmt::Display for PacketTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fields carried by a request identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedRequest {
    /// Application id (4 bits).
    pub app_id: u8,
    /// Logical link the packet was sent on.
    pub logical_link: LogicalLinkHandle,
    /// Packet tag.
    pub tag: PacketTag,
}

impl RequestId {
    /// Build an identifier. Only the low 4 bits of `app_id` are used.
    pub fn encode(app_id: u8, logical_link: LogicalLinkHandle, tag: PacketTag) -> Self {
        let app = (u32::from(app_id) & APP_ID_MASK) << APP_ID_SHIFT;
        let link = (u32::from(logical_link.get()) & LOGICAL_HANDLE_MASK) << LOGICAL_HANDLE_SHIFT;
        let tag = u32::from(tag.0) & PACKET_TAG_MASK;
        RequestId(app | link | tag)
    }

    /// Split an identifier into its fields.
    pub fn decode(self) -> DecodedRequest {
        DecodedRequest {
            app_id: self.app_id(),
            logical_link: self.logical_link(),
            tag: self.packet_tag(),
        }
    }

    /// Application id field.
    pub fn app_id(self) -> u8 {
        ((self.0 >> APP_ID_SHIFT) & APP_ID_MASK) as u8
    }

    /// Logical link field.
    pub fn logical_link(self) -> LogicalLinkHandle {
        LogicalLinkHandle::from_wire(self.0 >> LOGICAL_HANDLE_SHIFT)
    }

    /// Packet tag field.
    pub fn packet_tag(self) -> PacketTag {
        PacketTag((self.0 & PACKET_TAG_MASK) as u16)
    }
}

/// Wrapping tag allocator of one logical link.
#[derive(Debug, Clone)]
pub struct TagSequence {
    next: u32,
    modulus: u32,
}

impl TagSequence {
    /// Sequence wrapping at `2 * total_credit` (at least 1, at most 2^16).
    pub fn new(total_credit: u32) -> Self {
        let modulus = total_credit.saturating_mul(2).clamp(1, PACKET_TAG_MASK + 1);
        Self { next: 0, modulus }
    }

    /// Allocate the next tag.
    pub fn next_tag(&mut self) -> PacketTag {
        let tag = PacketTag(self.next as u16);
        self.next = (self.next + 1) % self.modulus;
        tag
    }

    /// Tag value at which the sequence wraps to zero.
    pub fn modulus(&self) -> u32 {
        self.modulus
    }
}
