//! Event dispatch.
//!
//! A two-state machine (`WaitForStartup`, `Ready`) in front of the data
//! manager. Requests and data path events enter as [`Event`] values and
//! come back out as [`Output`] values.

mod dispatcher;
mod event;

pub use dispatcher::{Dispatcher, DispatcherState};
pub use event::{Confirmation, Event, Output, Status};
