//! Error types for the data manager.

use std::collections::TryReserveError;

use thiserror::Error;

use super::types::{LogicalLinkHandle, PhysicalLinkHandle, TrafficClass};

/// Errors returned by data manager operations.
///
/// Protocol anomalies on completion events are not errors; they are logged
/// and dropped by the reconciler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataManagerError {
    /// The data manager has not completed its startup handshake.
    #[error("data manager not activated")]
    NotActivated,

    /// No logical link is registered under this handle.
    #[error("unknown logical link {0}")]
    UnknownLogicalLink(LogicalLinkHandle),

    /// No supervision entry exists for this physical link.
    #[error("unknown physical link {0}")]
    UnknownPhysicalLink(PhysicalLinkHandle),

    /// A logical link with this handle already exists.
    #[error("logical link {0} already exists")]
    DuplicateLogicalLink(LogicalLinkHandle),

    /// Link creation requires supervision on its physical link.
    #[error("physical link {0} has no supervision timeout configured")]
    NoSupervision(PhysicalLinkHandle),

    /// Every supervision slot is in use.
    #[error("no free link supervision slot")]
    SupervisionSlotsExhausted,

    /// No transmit credit left for the class.
    #[error("no credit available for {0:?} traffic")]
    NoCredit(TrafficClass),

    /// The link's flow spec carries no traffic.
    #[error("logical link {0} carries no traffic")]
    NoTraffic(LogicalLinkHandle),

    /// The link is being deleted and accepts no new frames.
    #[error("logical link {0} is closing")]
    LinkClosing(LogicalLinkHandle),

    /// A requested flush on this link has not completed yet.
    #[error("flush already in progress on logical link {0}")]
    FlushInProgress(LogicalLinkHandle),

    /// A handle value does not fit its wire field.
    #[error("invalid handle value {0:#x}")]
    InvalidHandle(u32),

    /// A request parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A link or packet record could not be allocated.
    #[error("out of memory")]
    OutOfMemory,
}

impl From<TryReserveError> for DataManagerError {
    fn from(_: TryReserveError) -> Self {
        DataManagerError::OutOfMemory
    }
}

/// Result alias for data manager operations.
pub type Result<T> = std::result::Result<T, DataManagerError>;
