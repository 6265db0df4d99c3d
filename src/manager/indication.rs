//! Events the data manager raises towards the upper layer, and the inputs
//! it consumes from the transport.

use bytes::Bytes;

use crate::core::{
    LogicalLinkHandle, PhysicalLinkHandle, RequestId, ServiceType, TrafficClass,
};

/// Upward indication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indication {
    /// A guaranteed packet waited longer than its access latency.
    QosViolation {
        /// Affected logical link.
        logical_link: LogicalLinkHandle,
    },
    /// Credits were returned for completed transmissions.
    CompletedDataBlocks {
        /// Credit class.
        class: TrafficClass,
        /// Logical link the completions belonged to.
        logical_link: LogicalLinkHandle,
        /// Number of data blocks restored.
        count: u32,
    },
    /// A flush round discarded at least one packet.
    FlushOccurred {
        /// Affected logical link.
        logical_link: LogicalLinkHandle,
    },
    /// No traffic seen within the early supervision window.
    EarlyLinkLoss {
        /// Affected physical link.
        physical_link: PhysicalLinkHandle,
    },
    /// The supervision timeout elapsed without traffic.
    LinkLost {
        /// Affected physical link.
        physical_link: PhysicalLinkHandle,
    },
    /// An inbound frame was received.
    DataReceived {
        /// Physical link the frame arrived on.
        physical_link: PhysicalLinkHandle,
        /// User priority of the frame.
        priority: u8,
        /// Service type of the frame.
        service_type: ServiceType,
        /// Frame payload.
        payload: Bytes,
    },
}

/// MAC-level result of a transmission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmResult {
    /// The request was processed.
    Success,
    /// The request failed.
    Failure,
}

/// What happened to the transmitted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmissionStatus {
    /// Acknowledged by the peer.
    Delivered,
    /// Discarded before delivery, normally after a cancel request.
    Discarded,
    /// Transmission failed.
    Failed,
}

/// Transmission completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxConfirm {
    /// Request result.
    pub result: ConfirmResult,
    /// Transmission status.
    pub status: TransmissionStatus,
    /// User priority the frame was sent with.
    pub priority: u8,
    /// Service class the frame was sent with.
    pub service_type: ServiceType,
    /// Identifier given to the transport when the frame was sent.
    pub request_id: RequestId,
}

impl TxConfirm {
    /// Successful delivery of `request_id`.
    pub fn delivered(request_id: RequestId, priority: u8, service_type: ServiceType) -> Self {
        Self {
            result: ConfirmResult::Success,
            status: TransmissionStatus::Delivered,
            priority,
            service_type,
            request_id,
        }
    }

    /// Discard of `request_id`, as reported after a cancel.
    pub fn discarded(request_id: RequestId, priority: u8, service_type: ServiceType) -> Self {
        Self {
            result: ConfirmResult::Success,
            status: TransmissionStatus::Discarded,
            priority,
            service_type,
            request_id,
        }
    }

    /// Whether the peer received the frame.
    pub fn is_delivered(&self) -> bool {
        self.result == ConfirmResult::Success && self.status == TransmissionStatus::Delivered
    }
}

/// Reception status of an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceptionStatus {
    /// Frame received intact.
    Ok,
    /// Frame received with errors.
    Error,
}

/// Inbound frame from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    /// Physical link the frame arrived on.
    pub physical_link: PhysicalLinkHandle,
    /// Frame payload.
    pub payload: Bytes,
    /// Reception status.
    pub status: ReceptionStatus,
    /// User priority.
    pub priority: u8,
    /// Service type.
    pub service_type: ServiceType,
}

/// Why a completion event was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmRejection {
    /// The identifier belongs to another subsystem.
    ForeignAppId(u8),
    /// No such logical link.
    UnknownLink(LogicalLinkHandle),
    /// The link carries no traffic.
    NoTraffic(LogicalLinkHandle),
    /// The event priority differs from the link's.
    PriorityMismatch {
        /// Link priority.
        expected: u8,
        /// Event priority.
        actual: u8,
    },
    /// Nothing is outstanding on the link.
    NothingOutstanding(LogicalLinkHandle),
    /// The tag is not the oldest outstanding one.
    OutOfOrder {
        /// Tag of the oldest outstanding packet.
        expected: u16,
        /// Tag in the event.
        actual: u16,
    },
}

/// Result of reconciling a completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// The oldest packet was retired.
    Reconciled {
        /// Delay until the link's flush timer should fire; zero if none.
        next_flush: std::time::Duration,
    },
    /// The event was dropped without touching any state.
    Rejected(ConfirmRejection),
}

impl ConfirmOutcome {
    /// Delay until the next flush deadline; zero when rejected or idle.
    pub fn next_flush(&self) -> std::time::Duration {
        match self {
            ConfirmOutcome::Reconciled { next_flush } => *next_flush,
            ConfirmOutcome::Rejected(_) => std::time::Duration::ZERO,
        }
    }
}
