//! Handles, addresses and flow specifications shared across layers.

use std::fmt;
use std::time::Duration;

use super::constants::LOGICAL_HANDLE_MASK;
use super::error::{DataManagerError, Result};

/// Logical link handle (12 bits on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogicalLinkHandle(u16);

impl LogicalLinkHandle {
    /// Create a handle, rejecting values wider than 12 bits.
    pub fn new(raw: u16) -> Result<Self> {
        if u32::from(raw) & !LOGICAL_HANDLE_MASK != 0 {
            return Err(DataManagerError::InvalidHandle(u32::from(raw)));
        }
        Ok(Self(raw))
    }

    /// Raw handle value.
    pub fn get(self) -> u16 {
        self.0
    }

    /// Handle from a wire field, truncated to 12 bits.
    pub(crate) fn from_wire(raw: u32) -> Self {
        Self((raw & LOGICAL_HANDLE_MASK) as u16)
    }
}

impl fmt::Display for LogicalLinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#05x}", self.0)
    }
}

/// Physical link handle. Zero is reserved and never a valid handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysicalLinkHandle(u8);

impl PhysicalLinkHandle {
    /// Create a handle, rejecting zero.
    pub fn new(raw: u8) -> Result<Self> {
        if raw == 0 {
            return Err(DataManagerError::InvalidHandle(0));
        }
        Ok(Self(raw))
    }

    /// Raw handle value.
    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for PhysicalLinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// 48-bit MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Create from raw bytes.
    pub fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Get the address bytes.
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        Self::new(bytes)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Flow spec service type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ServiceType {
    /// No traffic is carried; frames are refused.
    #[default]
    NoTraffic = 0x00,
    /// Best effort delivery.
    BestEffort = 0x01,
    /// Guaranteed delivery with access latency bounds.
    Guaranteed = 0x02,
}

impl ServiceType {
    /// Convert from wire format byte
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(ServiceType::NoTraffic),
            0x01 => Some(ServiceType::BestEffort),
            0x02 => Some(ServiceType::Guaranteed),
            _ => None,
        }
    }

    /// Convert to wire format byte
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Whether frames may be transmitted under this service type.
    pub fn carries_traffic(self) -> bool {
        !matches!(self, ServiceType::NoTraffic)
    }
}

/// Traffic class used for credit accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrafficClass {
    /// Best effort (and no-traffic) links.
    BestEffort,
    /// Guaranteed links.
    Guaranteed,
}

impl TrafficClass {
    /// Every class, in ledger order.
    pub const ALL: [TrafficClass; 2] = [TrafficClass::BestEffort, TrafficClass::Guaranteed];

    /// Ledger index of this class.
    pub fn index(self) -> usize {
        match self {
            TrafficClass::BestEffort => 0,
            TrafficClass::Guaranteed => 1,
        }
    }
}

impl From<ServiceType> for TrafficClass {
    fn from(service: ServiceType) -> Self {
        match service {
            ServiceType::Guaranteed => TrafficClass::Guaranteed,
            ServiceType::BestEffort | ServiceType::NoTraffic => TrafficClass::BestEffort,
        }
    }
}

/// Negotiated extended flow specification of a logical link.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlowSpec {
    /// Flow spec identifier.
    pub identifier: u8,
    /// Service type.
    pub service_type: ServiceType,
    /// Maximum SDU size in octets.
    pub max_sdu_size: u16,
    /// SDU inter-arrival time.
    pub sdu_inter_arrival_time: Duration,
    /// Maximum time a guaranteed packet may wait before acknowledgment.
    pub access_latency: Duration,
    /// Time after which an unacknowledged packet is flushed. Zero disables
    /// automatic flushing.
    pub flush_timeout: Duration,
}

impl FlowSpec {
    /// Best effort flow spec with the given flush timeout.
    pub fn best_effort(flush_timeout: Duration) -> Self {
        Self {
            service_type: ServiceType::BestEffort,
            flush_timeout,
            ..Self::default()
        }
    }

    /// Guaranteed flow spec with access latency and flush timeout.
    pub fn guaranteed(access_latency: Duration, flush_timeout: Duration) -> Self {
        Self {
            service_type: ServiceType::Guaranteed,
            access_latency,
            flush_timeout,
            ..Self::default()
        }
    }

    /// Whether packets on this flow expire.
    pub fn has_flush_timeout(&self) -> bool {
        !self.flush_timeout.is_zero()
    }
}

/// Which upward events the transport-facing side reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMask {
    /// Report QoS violations on guaranteed links.
    pub qos_violation: bool,
    /// Report restored data-block credits.
    pub completed_data_blocks: bool,
}

impl Default for EventMask {
    fn default() -> Self {
        Self {
            qos_violation: true,
            completed_data_blocks: true,
        }
    }
}
