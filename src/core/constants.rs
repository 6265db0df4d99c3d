//! Data manager constants.
//!
//! Bit layouts and default policy values shared by every layer.

use std::time::Duration;

// =============================================================================
// REQUEST IDENTIFIER LAYOUT
// =============================================================================

/// Shift of the application-id field.
pub const APP_ID_SHIFT: u32 = 28;

/// Mask of the application-id field after shifting down.
pub const APP_ID_MASK: u32 = 0x0F;

/// Shift of the logical-link handle field.
pub const LOGICAL_HANDLE_SHIFT: u32 = 16;

/// Mask of the logical-link handle field after shifting down.
///
/// Handles are 12 bits wide on the wire.
pub const LOGICAL_HANDLE_MASK: u32 = 0x0FFF;

/// Mask of the packet tag field.
pub const PACKET_TAG_MASK: u32 = 0xFFFF;

/// Application id used when none is configured.
pub const DEFAULT_APP_ID: u8 = 0x1;

// =============================================================================
// TRAFFIC CLASSES
// =============================================================================

/// Number of traffic classes tracked by the credit ledger.
pub const NUM_TRAFFIC_CLASSES: usize = 2;

// =============================================================================
// LINK SUPERVISION
// =============================================================================

/// Default number of physical-link supervision slots.
pub const DEFAULT_MAX_PHYSICAL_LINKS: usize = 2;

/// Below this remaining time the supervision chain stops halving and arms
/// the final loss timer directly.
pub const MIN_EARLY_LOSS_DURATION: Duration = Duration::from_micros(1_000_000);

/// Largest flush, access latency or supervision timeout accepted. This is
/// the range of the 32-bit microsecond fields the link commands carry.
pub const MAX_TIMEOUT: Duration = Duration::from_micros(u32::MAX as u64);

// =============================================================================
// COMPLETION BATCHING
// =============================================================================

/// Completions accumulated before credits are handed back.
pub const DEFAULT_BLOCK_ACK_BATCH_SIZE: u16 = 1;
