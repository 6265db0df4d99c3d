//! # AMP Data Manager
//!
//! Multiplexes logical links over a shared MAC transport. The data manager
//! provides:
//!
//! - **Admission**: per traffic class transmit credits, one per frame in flight
//! - **Flushing**: cancellation of packets that outlive their flush timeout
//! - **Supervision**: a two-stage early-loss and loss timer chain per physical link
//! - **Reconciliation**: strict oldest-first matching of completions to packets
//! - **Deferred deletion**: links leave the registry only once drained
//!
//! The manager performs no I/O. Frames and cancel requests go through a
//! [`Transport`](crate::core::Transport); timers through a
//! [`TimerService`](crate::core::TimerService).
//!
//! ## Feature Flags
//!
//! - `dispatch` (default): Front-end dispatcher (startup handshake, event routing)
//! - `runtime` (default): Tokio driver task servicing a dispatcher's timers
//!
//! ## Modules
//!
//! - [`core`](crate::core): Constants, errors, handle types and trait seams (always included)
//! - [`manager`]: The data manager (always included)
//! - [`dispatch`]: Event dispatcher (requires `dispatch` feature)
//! - [`runtime`]: Tokio driver (requires `runtime` feature)
//!
//! ## Example Usage
//!
//! ```rust
//! use std::time::{Duration, Instant};
//!
//! use amp_datamgr::prelude::*;
//!
//! struct NullTransport;
//!
//! impl Transport for NullTransport {
//!     fn query_capabilities(&mut self) {}
//!     fn send_frame(&mut self, _: RequestId, _: TrafficClass, _: bytes::Bytes) {}
//!     fn cancel(&mut self, _: RequestId) {}
//!     fn subscribe_inbound(&mut self) {}
//!     fn unsubscribe_inbound(&mut self) {}
//! }
//!
//! #[derive(Default)]
//! struct CountingTimers(u64);
//!
//! impl TimerService for CountingTimers {
//!     fn start(&mut self, _: TimerToken, _: Duration) -> TimerHandle {
//!         self.0 += 1;
//!         TimerHandle(self.0)
//!     }
//!     fn cancel(&mut self, _: TimerHandle) {}
//! }
//!
//! # fn main() -> amp_datamgr::Result<()> {
//! let now = Instant::now();
//! let mut dm = DataManager::new(NullTransport, CountingTimers::default(), DataManagerConfig::default())?;
//! dm.initialize(8, 8);
//!
//! let physical = PhysicalLinkHandle::new(1)?;
//! let logical = LogicalLinkHandle::new(0x10)?;
//! dm.set_supervision_timeout(physical, Duration::from_secs(2), now)?;
//! dm.create_link(LinkParams {
//!     physical_link: physical,
//!     logical_link: logical,
//!     flow_spec: FlowSpec::best_effort(Duration::from_millis(100)),
//!     priority: 0,
//!     remote_mac: MacAddress::default(),
//!     local_mac: MacAddress::default(),
//! })?;
//!
//! let id = dm.send_frame(logical, bytes::Bytes::from_static(b"hello"), now)?;
//! let outcome = dm.on_tx_confirm(TxConfirm::delivered(id, 0, ServiceType::BestEffort), now);
//! assert!(matches!(outcome, ConfirmOutcome::Reconciled { .. }));
//! assert_eq!(dm.credits().info(TrafficClass::BestEffort).free(), 7);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Data manager (always included)
pub mod manager;

// Dispatcher (feature-gated)
#[cfg(feature = "dispatch")]
#[cfg_attr(docsrs, doc(cfg(feature = "dispatch")))]
pub mod dispatch;

// Tokio driver (feature-gated)
#[cfg(feature = "runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
pub mod runtime;

/// Prelude module for convenient imports.
pub mod prelude {
    // Core types and seams
    pub use crate::core::*;

    // Data manager
    pub use crate::manager::{
        ConfirmOutcome, ConfirmRejection, DataManager, DataManagerConfig, DataStats,
        InboundFrame, Indication, LinkParams, ReceptionStatus, TxConfirm,
    };

    // Dispatcher types (when enabled)
    #[cfg(feature = "dispatch")]
    pub use crate::dispatch::{Confirmation, Dispatcher, DispatcherState, Event, Output, Status};

    // Runtime driver (when enabled)
    #[cfg(feature = "runtime")]
    pub use crate::runtime::{DataManagerHandle, RuntimeError, TokioTimers};
}

// Re-export commonly used items at crate root
pub use crate::core::{DataManagerError, LogicalLinkHandle, PhysicalLinkHandle, RequestId, Result};
pub use crate::manager::{DataManager, DataManagerConfig};

#[cfg(feature = "dispatch")]
pub use crate::dispatch::{Dispatcher, Event, Output};
