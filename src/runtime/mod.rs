//! Tokio runtime driver.
//!
//! Runs a [`Dispatcher`](crate::dispatch::Dispatcher) on its own task and
//! services its timers with `tokio::time`. Events are submitted through a
//! cloneable [`DataManagerHandle`]; outputs arrive on an unbounded channel.
//!
//! # Example
//!
//! ```ignore
//! let (handle, mut outputs) = amp_datamgr::runtime::spawn(transport, config)?;
//! handle.activate()?;
//! while let Some(output) = outputs.recv().await {
//!     // forward indications and confirmations upward
//! }
//! ```

mod driver;
mod timers;

pub use driver::{DataManagerHandle, RuntimeError, spawn};
pub use timers::TokioTimers;
