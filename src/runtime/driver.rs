//! Driver task owning a dispatcher.

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::timers::TokioTimers;
use crate::core::{DataManagerError, LogicalLinkHandle, Transport};
use crate::dispatch::{Dispatcher, DispatcherState, Event, Output};
use crate::manager::{DataManagerConfig, InboundFrame, TxConfirm};

/// Errors from the runtime driver.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The driver task has stopped.
    #[error("data manager driver stopped")]
    Stopped,

    /// The dispatcher could not be created.
    #[error(transparent)]
    DataManager(#[from] DataManagerError),
}

#[derive(Debug)]
pub(super) enum Command {
    Event(Event),
    Shutdown,
}

/// Cloneable handle submitting events to a running driver.
#[derive(Debug, Clone)]
pub struct DataManagerHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl DataManagerHandle {
    /// Queue an event for the driver.
    pub fn submit(&self, event: Event) -> Result<(), RuntimeError> {
        self.tx
            .send(Command::Event(event))
            .map_err(|_| RuntimeError::Stopped)
    }

    /// Start the activation handshake.
    pub fn activate(&self) -> Result<(), RuntimeError> {
        self.submit(Event::Activate)
    }

    /// Forward the transport's capabilities.
    pub fn capabilities(
        &self,
        traffic_queue_size: u32,
        command_queue_size: u32,
    ) -> Result<(), RuntimeError> {
        self.submit(Event::Capabilities {
            traffic_queue_size,
            command_queue_size,
        })
    }

    /// Queue an outbound frame.
    pub fn send_frame(&self, logical_link: LogicalLinkHandle, payload: Bytes) -> Result<(), RuntimeError> {
        self.submit(Event::SendFrame {
            logical_link,
            payload,
        })
    }

    /// Forward a transmission completion.
    pub fn tx_confirm(&self, confirm: TxConfirm) -> Result<(), RuntimeError> {
        self.submit(Event::TxConfirm(confirm))
    }

    /// Forward an inbound frame.
    pub fn frame_received(&self, frame: InboundFrame) -> Result<(), RuntimeError> {
        self.submit(Event::FrameReceived(frame))
    }

    /// Deactivate and stop the driver. Outputs of the teardown are still
    /// delivered before the output channel closes.
    pub fn shutdown(&self) -> Result<(), RuntimeError> {
        self.tx.send(Command::Shutdown).map_err(|_| RuntimeError::Stopped)
    }

    /// Whether the driver has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Start a driver task for `transport`.
///
/// Must be called from within a tokio runtime. The driver stops on
/// [`DataManagerHandle::shutdown`] or once every handle has been dropped.
pub fn spawn<T>(
    transport: T,
    config: DataManagerConfig,
) -> Result<(DataManagerHandle, mpsc::UnboundedReceiver<Output>), RuntimeError>
where
    T: Transport + Send + 'static,
{
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
    let timers = TokioTimers::new(cmd_tx.downgrade());
    let mut dispatcher = Dispatcher::new(transport, timers, config)?;
    let (out_tx, out_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        info!("data manager driver started");
        while let Some(command) = cmd_rx.recv().await {
            match command {
                Command::Event(event) => forward(&out_tx, dispatcher.handle(event)),
                Command::Shutdown => break,
            }
        }
        cmd_rx.close();

        if dispatcher.state() == DispatcherState::Ready {
            forward(&out_tx, dispatcher.handle(Event::Deactivate));
        }
        info!("data manager driver stopped");
    });

    Ok((DataManagerHandle { tx: cmd_tx }, out_rx))
}

fn forward(out_tx: &mpsc::UnboundedSender<Output>, outputs: Vec<Output>) {
    for output in outputs {
        if out_tx.send(output).is_err() {
            debug!("output receiver dropped");
            return;
        }
    }
}
