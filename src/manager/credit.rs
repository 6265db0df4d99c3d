//! Transmit credit accounting.
//!
//! The transport advertises how many frames of each traffic class and how
//! many command requests it can hold. One slot of each is reserved, so a
//! queue of size `n` yields `n - 1` credits.

use crate::core::{NUM_TRAFFIC_CLASSES, TrafficClass};

/// Credit counters of one traffic class.
///
/// Invariant: `free <= total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreditInfo {
    total: u32,
    free: u32,
}

impl CreditInfo {
    fn with_total(total: u32) -> Self {
        Self { total, free: total }
    }

    /// Total data blocks granted by the transport.
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Data blocks currently available.
    pub fn free(&self) -> u32 {
        self.free
    }

    /// Data blocks debited and not yet restored.
    pub fn outstanding(&self) -> u32 {
        self.total - self.free
    }
}

/// Per-class credit ledger.
#[derive(Debug, Clone, Default)]
pub struct CreditLedger {
    classes: [CreditInfo; NUM_TRAFFIC_CLASSES],
}

impl CreditLedger {
    /// Ledger with no credit in any class.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `max(traffic_queue_size - 1, 0)` credits to every class.
    pub fn initialize(&mut self, traffic_queue_size: u32) {
        let total = traffic_queue_size.saturating_sub(1);
        for info in &mut self.classes {
            *info = CreditInfo::with_total(total);
        }
    }

    /// Counters of a class.
    pub fn info(&self, class: TrafficClass) -> CreditInfo {
        self.classes[class.index()]
    }

    /// Whether a frame of `class` may be admitted.
    pub fn has_credit(&self, class: TrafficClass) -> bool {
        self.classes[class.index()].free > 0
    }

    /// Debit one credit. Callers check [`has_credit`](Self::has_credit) first;
    /// a sent frame cannot be taken back.
    pub fn consume(&mut self, class: TrafficClass) {
        let info = &mut self.classes[class.index()];
        debug_assert!(info.free > 0, "credit consumed without admission check");
        info.free = info.free.saturating_sub(1);
    }

    /// Return up to `completed` credits, never exceeding the total.
    ///
    /// Returns the number actually restored.
    pub fn restore(&mut self, class: TrafficClass, completed: u32) -> u32 {
        let info = &mut self.classes[class.index()];
        let restored = completed.min(info.total - info.free);
        info.free += restored;
        restored
    }

    /// Drop all credit.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Gate bounding outstanding cancel requests.
///
/// Invariant: `free_slots <= q_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandQueue {
    q_size: u32,
    free_slots: u32,
}

impl CommandQueue {
    /// Gate with no slots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Size the gate from the transport's command queue, reserving one slot.
    pub fn initialize(&mut self, command_queue_size: u32) {
        self.q_size = command_queue_size.saturating_sub(1);
        self.free_slots = self.q_size;
    }

    /// Usable queue size.
    pub fn q_size(&self) -> u32 {
        self.q_size
    }

    /// Slots currently free.
    pub fn free_slots(&self) -> u32 {
        self.free_slots
    }

    /// Whether a request may be issued.
    pub fn has_free_slot(&self) -> bool {
        self.free_slots > 0
    }

    /// Take a slot. Returns `false` when none is free.
    pub fn try_acquire(&mut self) -> bool {
        if self.free_slots == 0 {
            return false;
        }
        self.free_slots -= 1;
        true
    }

    /// Return a slot, bounded by the queue size.
    pub fn release(&mut self) {
        if self.free_slots < self.q_size {
            self.free_slots += 1;
        }
    }

    /// Drop all slots.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
