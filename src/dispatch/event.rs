//! Events consumed and outputs produced by the dispatcher.

use std::time::Duration;

use bytes::Bytes;

use crate::core::{
    DataManagerError, EventMask, FlowSpec, LogicalLinkHandle, PhysicalLinkHandle, RequestId,
    Result, TimerHandle, TimerToken,
};
use crate::manager::{InboundFrame, Indication, LinkParams, TxConfirm};

/// Everything the dispatcher can be fed.
#[derive(Debug, Clone)]
pub enum Event {
    /// Start the activation handshake.
    Activate,
    /// Transport answer to the capability query.
    Capabilities {
        /// Frames the transport can hold per traffic class.
        traffic_queue_size: u32,
        /// Requests the transport's command queue can hold.
        command_queue_size: u32,
    },
    /// Soft teardown back to `WaitForStartup`.
    Deactivate,
    /// Enable or disable upward events.
    SetEventMask(EventMask),
    /// Create a logical link.
    LinkCreate(LinkParams),
    /// Replace a link's flow spec.
    LinkModify {
        /// Target link.
        logical_link: LogicalLinkHandle,
        /// New flow spec.
        flow_spec: FlowSpec,
    },
    /// Delete a logical link once its queue has drained.
    LinkDelete {
        /// Target link.
        logical_link: LogicalLinkHandle,
    },
    /// Flush every outstanding packet of a link.
    LinkFlush {
        /// Target link.
        logical_link: LogicalLinkHandle,
    },
    /// Read a link's failed contact counter.
    FailedContactCounterRead {
        /// Target link.
        logical_link: LogicalLinkHandle,
    },
    /// Zero a link's failed contact counter.
    FailedContactCounterReset {
        /// Target link.
        logical_link: LogicalLinkHandle,
    },
    /// Start supervising a physical link.
    SupervisionTimeoutSet {
        /// Target physical link.
        physical_link: PhysicalLinkHandle,
        /// Supervision timeout; zero disables the timers.
        timeout: Duration,
    },
    /// Change a physical link's supervision timeout.
    SupervisionTimeoutModify {
        /// Target physical link.
        physical_link: PhysicalLinkHandle,
        /// New timeout.
        timeout: Duration,
    },
    /// Stop supervising a physical link.
    SupervisionTimeoutDelete {
        /// Target physical link.
        physical_link: PhysicalLinkHandle,
    },
    /// Liveness hint for a physical link.
    LinkAlive {
        /// Target physical link.
        physical_link: PhysicalLinkHandle,
    },
    /// Outbound frame.
    SendFrame {
        /// Link to send on.
        logical_link: LogicalLinkHandle,
        /// Frame payload.
        payload: Bytes,
    },
    /// Inbound frame from the transport.
    FrameReceived(InboundFrame),
    /// Transmission completion from the transport.
    TxConfirm(TxConfirm),
    /// A scheduled timer fired.
    TimerExpired {
        /// What the timer was for.
        token: TimerToken,
        /// Handle returned when it was started.
        handle: TimerHandle,
    },
}

impl Event {
    /// Whether this event belongs to the data path.
    pub fn is_data_path(&self) -> bool {
        matches!(
            self,
            Event::SendFrame { .. } | Event::FrameReceived(_) | Event::TxConfirm(_)
        )
    }
}

/// Outcome of a control-plane request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// The request succeeded.
    Success,
    /// The request failed.
    Error(DataManagerError),
}

impl Status {
    /// Whether the request succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }
}

impl<T> From<&Result<T>> for Status {
    fn from(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(e) => Status::Error(e.clone()),
        }
    }
}

impl From<DataManagerError> for Status {
    fn from(err: DataManagerError) -> Self {
        Status::Error(err)
    }
}

/// Answer to a control-plane request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Activation finished.
    Activated {
        /// Result.
        status: Status,
    },
    /// Teardown finished.
    Deactivated,
    /// Event mask updated.
    EventMaskSet {
        /// Result.
        status: Status,
    },
    /// Link creation result.
    LinkCreated {
        /// Target link.
        logical_link: LogicalLinkHandle,
        /// Result.
        status: Status,
    },
    /// Flow spec modification result.
    LinkModified {
        /// Target link.
        logical_link: LogicalLinkHandle,
        /// Result.
        status: Status,
    },
    /// The link left the registry, or could not be deleted.
    LinkDeleted {
        /// Target link.
        logical_link: LogicalLinkHandle,
        /// Result.
        status: Status,
    },
    /// The requested flush completed.
    LinkFlushed {
        /// Target link.
        logical_link: LogicalLinkHandle,
        /// Result.
        status: Status,
        /// Whether any packet was discarded.
        flush_occurred: bool,
    },
    /// Failed contact counter value.
    FailedContactCounter {
        /// Target link.
        logical_link: LogicalLinkHandle,
        /// Result.
        status: Status,
        /// Counter value; zero on failure.
        value: u16,
    },
    /// Failed contact counter reset result.
    FailedContactCounterReset {
        /// Target link.
        logical_link: LogicalLinkHandle,
        /// Result.
        status: Status,
    },
    /// Supervision set result.
    SupervisionTimeoutSet {
        /// Target physical link.
        physical_link: PhysicalLinkHandle,
        /// Result.
        status: Status,
        /// This was the first supervised physical link.
        first_active: bool,
    },
    /// Supervision modify result.
    SupervisionTimeoutModified {
        /// Target physical link.
        physical_link: PhysicalLinkHandle,
        /// Result.
        status: Status,
    },
    /// Supervision delete result.
    SupervisionTimeoutDeleted {
        /// Target physical link.
        physical_link: PhysicalLinkHandle,
        /// Result.
        status: Status,
        /// No supervised physical link remains.
        last_active: bool,
    },
    /// Admission result of an outbound frame.
    FrameSent {
        /// Link the frame was sent on.
        logical_link: LogicalLinkHandle,
        /// Result.
        status: Status,
        /// Identifier handed to the transport, when admitted.
        request_id: Option<RequestId>,
    },
}

impl Confirmation {
    /// Status carried by the confirmation. `Deactivated` always succeeds.
    pub fn status(&self) -> Status {
        match self {
            Confirmation::Deactivated => Status::Success,
            Confirmation::Activated { status }
            | Confirmation::EventMaskSet { status }
            | Confirmation::LinkCreated { status, .. }
            | Confirmation::LinkModified { status, .. }
            | Confirmation::LinkDeleted { status, .. }
            | Confirmation::LinkFlushed { status, .. }
            | Confirmation::FailedContactCounter { status, .. }
            | Confirmation::FailedContactCounterReset { status, .. }
            | Confirmation::SupervisionTimeoutSet { status, .. }
            | Confirmation::SupervisionTimeoutModified { status, .. }
            | Confirmation::SupervisionTimeoutDeleted { status, .. }
            | Confirmation::FrameSent { status, .. } => status.clone(),
        }
    }

    /// Failure answer to a control-plane request, or `None` for events that
    /// are not answered.
    pub(crate) fn failure(event: &Event, err: DataManagerError) -> Option<Self> {
        let status = Status::Error(err);
        let confirmation = match event {
            Event::Activate => Confirmation::Activated { status },
            Event::SetEventMask(_) => Confirmation::EventMaskSet { status },
            Event::LinkCreate(params) => Confirmation::LinkCreated {
                logical_link: params.logical_link,
                status,
            },
            Event::LinkModify { logical_link, .. } => Confirmation::LinkModified {
                logical_link: *logical_link,
                status,
            },
            Event::LinkDelete { logical_link } => Confirmation::LinkDeleted {
                logical_link: *logical_link,
                status,
            },
            Event::LinkFlush { logical_link } => Confirmation::LinkFlushed {
                logical_link: *logical_link,
                status,
                flush_occurred: false,
            },
            Event::FailedContactCounterRead { logical_link } => {
                Confirmation::FailedContactCounter {
                    logical_link: *logical_link,
                    status,
                    value: 0,
                }
            }
            Event::FailedContactCounterReset { logical_link } => {
                Confirmation::FailedContactCounterReset {
                    logical_link: *logical_link,
                    status,
                }
            }
            Event::SupervisionTimeoutSet { physical_link, .. } => {
                Confirmation::SupervisionTimeoutSet {
                    physical_link: *physical_link,
                    status,
                    first_active: false,
                }
            }
            Event::SupervisionTimeoutModify { physical_link, .. } => {
                Confirmation::SupervisionTimeoutModified {
                    physical_link: *physical_link,
                    status,
                }
            }
            Event::SupervisionTimeoutDelete { physical_link } => {
                Confirmation::SupervisionTimeoutDeleted {
                    physical_link: *physical_link,
                    status,
                    last_active: false,
                }
            }
            Event::Capabilities { .. }
            | Event::Deactivate
            | Event::LinkAlive { .. }
            | Event::SendFrame { .. }
            | Event::FrameReceived(_)
            | Event::TxConfirm(_)
            | Event::TimerExpired { .. } => return None,
        };
        Some(confirmation)
    }
}

/// Something the dispatcher reports upward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Unsolicited event.
    Indication(Indication),
    /// Answer to a request.
    Confirmation(Confirmation),
}

impl Output {
    /// The confirmation, if this is one.
    pub fn as_confirmation(&self) -> Option<&Confirmation> {
        match self {
            Output::Confirmation(c) => Some(c),
            Output::Indication(_) => None,
        }
    }

    /// The indication, if this is one.
    pub fn as_indication(&self) -> Option<&Indication> {
        match self {
            Output::Indication(i) => Some(i),
            Output::Confirmation(_) => None,
        }
    }
}
