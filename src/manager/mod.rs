//! The data manager.
//!
//! Admission control for outbound frames, cancellation of expired packets,
//! completion reconciliation and physical link supervision. The manager is
//! driven by explicit calls carrying the current time and never blocks.
//!
//! # Example
//!
//! ```ignore
//! use amp_datamgr::manager::{DataManager, DataManagerConfig, LinkParams};
//!
//! let mut dm = DataManager::new(transport, timers, DataManagerConfig::default())?;
//! dm.initialize(traffic_queue_size, command_queue_size);
//! dm.set_supervision_timeout(physical, Duration::from_secs(2), Instant::now())?;
//! dm.create_link(params)?;
//! let request_id = dm.send_frame(logical, payload, Instant::now())?;
//! ```

mod config;
mod credit;
mod data_manager;
mod flush;
mod indication;
mod link;
mod queue;
mod reconcile;
mod stats;
mod supervision;
mod tag;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{DataManagerConfig, DataManagerConfigBuilder};
pub use credit::{CommandQueue, CreditInfo, CreditLedger};
pub use data_manager::DataManager;
pub use indication::{
    ConfirmOutcome, ConfirmRejection, ConfirmResult, InboundFrame, Indication, ReceptionStatus,
    TransmissionStatus, TxConfirm,
};
pub use link::{DeleteCallback, FlushCallback, LinkParams, LinkRegistry, LogicalLink};
pub use queue::{TxPacket, TxQueue};
pub use stats::DataStats;
pub use supervision::{
    LinkSupervisionEntry, SupervisionState, SupervisionTable, SupervisionVerdict,
};
pub use tag::{DecodedRequest, PacketTag, TagSequence};
