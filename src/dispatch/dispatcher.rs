//! Front-end dispatcher.
//!
//! Gates the data manager behind the activation handshake and routes every
//! event to the matching operation. Confirmations produced by deferred
//! callbacks travel through an internal channel and are collected after the
//! event has been fully processed.

use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::event::{Confirmation, Event, Output, Status};
use crate::core::{DataManagerError, Result, TimerService, Transport};
use crate::manager::{DataManager, DataManagerConfig, DeleteCallback, FlushCallback};

/// Lifecycle state of the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Waiting for activation and the transport's capabilities.
    WaitForStartup,
    /// Fully operational.
    Ready,
}

/// Owns a [`DataManager`] and feeds it events.
#[derive(Debug)]
pub struct Dispatcher<T, S> {
    manager: DataManager<T, S>,
    state: DispatcherState,
    capabilities_requested: bool,
    confirm_tx: mpsc::UnboundedSender<Confirmation>,
    confirm_rx: mpsc::UnboundedReceiver<Confirmation>,
}

impl<T: Transport, S: TimerService> Dispatcher<T, S> {
    /// Create a dispatcher in `WaitForStartup`.
    pub fn new(transport: T, timers: S, config: DataManagerConfig) -> Result<Self> {
        let (confirm_tx, confirm_rx) = mpsc::unbounded_channel();
        Ok(Self {
            manager: DataManager::new(transport, timers, config)?,
            state: DispatcherState::WaitForStartup,
            capabilities_requested: false,
            confirm_tx,
            confirm_rx,
        })
    }

    /// Current state.
    pub fn state(&self) -> DispatcherState {
        self.state
    }

    /// The data manager.
    pub fn manager(&self) -> &DataManager<T, S> {
        &self.manager
    }

    /// The data manager, mutably. Calls made through it bypass the state
    /// gate.
    pub fn manager_mut(&mut self) -> &mut DataManager<T, S> {
        &mut self.manager
    }

    /// Process one event at the current time.
    pub fn handle(&mut self, event: Event) -> Vec<Output> {
        self.handle_at(event, Instant::now())
    }

    /// Process one event at `now`.
    ///
    /// Indications raised by the event come first, followed by every
    /// confirmation it produced.
    pub fn handle_at(&mut self, event: Event, now: Instant) -> Vec<Output> {
        match self.state {
            DispatcherState::WaitForStartup => self.on_startup(event),
            DispatcherState::Ready => self.on_ready(event, now),
        }

        let mut outputs: Vec<Output> = self
            .manager
            .drain_indications()
            .into_iter()
            .map(Output::Indication)
            .collect();
        while let Ok(confirmation) = self.confirm_rx.try_recv() {
            outputs.push(Output::Confirmation(confirmation));
        }
        outputs
    }

    fn confirm(&self, confirmation: Confirmation) {
        // the receiver lives as long as self
        let _ = self.confirm_tx.send(confirmation);
    }

    fn on_startup(&mut self, event: Event) {
        match event {
            Event::Activate => {
                if !self.capabilities_requested {
                    info!("activation requested, querying transport capabilities");
                    self.manager.transport_mut().query_capabilities();
                    self.capabilities_requested = true;
                }
            }
            Event::Capabilities {
                traffic_queue_size,
                command_queue_size,
            } => {
                if !self.capabilities_requested {
                    warn!("unsolicited capabilities ignored");
                    return;
                }
                self.manager.initialize(traffic_queue_size, command_queue_size);
                self.capabilities_requested = false;
                self.state = DispatcherState::Ready;
                info!("dispatcher ready");
                self.confirm(Confirmation::Activated {
                    status: Status::Success,
                });
            }
            Event::Deactivate => {
                self.capabilities_requested = false;
                self.confirm(Confirmation::Deactivated);
            }
            Event::TimerExpired { token, .. } => {
                debug!(?token, "timer ignored before startup");
            }
            event if event.is_data_path() => {
                debug!(?event, "data path event dropped before startup");
            }
            event => {
                warn!(?event, "request before activation");
                if let Some(confirmation) =
                    Confirmation::failure(&event, DataManagerError::NotActivated)
                {
                    self.confirm(confirmation);
                }
            }
        }
    }

    fn on_ready(&mut self, event: Event, now: Instant) {
        match event {
            Event::Activate => self.confirm(Confirmation::Activated {
                status: Status::Success,
            }),
            Event::Capabilities { .. } => debug!("capabilities ignored while ready"),
            Event::Deactivate => {
                self.manager.reset();
                self.state = DispatcherState::WaitForStartup;
                info!("dispatcher deactivated");
                self.confirm(Confirmation::Deactivated);
            }
            Event::SetEventMask(mask) => {
                self.manager.set_event_mask(mask);
                self.confirm(Confirmation::EventMaskSet {
                    status: Status::Success,
                });
            }
            Event::LinkCreate(params) => {
                let logical_link = params.logical_link;
                let status = Status::from(&self.manager.create_link(params));
                self.confirm(Confirmation::LinkCreated {
                    logical_link,
                    status,
                });
            }
            Event::LinkModify {
                logical_link,
                flow_spec,
            } => {
                let status = Status::from(&self.manager.modify_link(logical_link, flow_spec));
                self.confirm(Confirmation::LinkModified {
                    logical_link,
                    status,
                });
            }
            Event::LinkDelete { logical_link } => {
                let tx = self.confirm_tx.clone();
                let on_deleted: DeleteCallback = Box::new(move |logical_link| {
                    let _ = tx.send(Confirmation::LinkDeleted {
                        logical_link,
                        status: Status::Success,
                    });
                });
                if let Err(err) = self.manager.delete_link(logical_link, Some(on_deleted), now) {
                    warn!(logical_link = %logical_link, %err, "link delete failed");
                    self.confirm(Confirmation::LinkDeleted {
                        logical_link,
                        status: err.into(),
                    });
                }
            }
            Event::LinkFlush { logical_link } => {
                let tx = self.confirm_tx.clone();
                let on_complete: FlushCallback = Box::new(move |flush_occurred| {
                    let _ = tx.send(Confirmation::LinkFlushed {
                        logical_link,
                        status: Status::Success,
                        flush_occurred,
                    });
                });
                if let Err(err) = self.manager.flush_link(logical_link, on_complete, now) {
                    warn!(logical_link = %logical_link, %err, "link flush failed");
                    self.confirm(Confirmation::LinkFlushed {
                        logical_link,
                        status: err.into(),
                        flush_occurred: false,
                    });
                }
            }
            Event::FailedContactCounterRead { logical_link } => {
                let result = self.manager.failed_contact_counter(logical_link);
                self.confirm(Confirmation::FailedContactCounter {
                    logical_link,
                    status: Status::from(&result),
                    value: result.unwrap_or(0),
                });
            }
            Event::FailedContactCounterReset { logical_link } => {
                let status =
                    Status::from(&self.manager.reset_failed_contact_counter(logical_link));
                self.confirm(Confirmation::FailedContactCounterReset {
                    logical_link,
                    status,
                });
            }
            Event::SupervisionTimeoutSet {
                physical_link,
                timeout,
            } => {
                let result = self
                    .manager
                    .set_supervision_timeout(physical_link, timeout, now);
                self.confirm(Confirmation::SupervisionTimeoutSet {
                    physical_link,
                    status: Status::from(&result),
                    first_active: result.unwrap_or(false),
                });
            }
            Event::SupervisionTimeoutModify {
                physical_link,
                timeout,
            } => {
                let status = Status::from(
                    &self
                        .manager
                        .modify_supervision_timeout(physical_link, timeout, now),
                );
                self.confirm(Confirmation::SupervisionTimeoutModified {
                    physical_link,
                    status,
                });
            }
            Event::SupervisionTimeoutDelete { physical_link } => {
                let result = self.manager.delete_supervision_timeout(physical_link, now);
                self.confirm(Confirmation::SupervisionTimeoutDeleted {
                    physical_link,
                    status: Status::from(&result),
                    last_active: result.unwrap_or(false),
                });
            }
            Event::LinkAlive { physical_link } => {
                if let Err(err) = self.manager.link_alive(physical_link, now) {
                    warn!(physical_link = %physical_link, %err, "liveness hint ignored");
                }
            }
            Event::SendFrame {
                logical_link,
                payload,
            } => {
                let result = self.manager.send_frame(logical_link, payload, now);
                if let Err(err) = &result {
                    debug!(logical_link = %logical_link, %err, "frame rejected");
                }
                self.confirm(Confirmation::FrameSent {
                    logical_link,
                    status: Status::from(&result),
                    request_id: result.ok(),
                });
            }
            Event::FrameReceived(frame) => {
                self.manager.receive_frame(frame, now);
            }
            Event::TxConfirm(confirm) => {
                self.manager.on_tx_confirm(confirm, now);
            }
            Event::TimerExpired { token, handle } => self.manager.on_timer(token, handle, now),
        }
    }
}
