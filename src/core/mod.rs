//! Core constants, errors, shared types and trait seams.
//!
//! Nothing here performs I/O.

mod constants;
mod error;
mod traits;
mod types;

pub use constants::*;
pub use error::*;
pub use traits::*;
pub use types::*;
