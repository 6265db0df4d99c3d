//! Logical links and their registry.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use super::queue::TxQueue;
use super::tag::TagSequence;
use crate::core::{
    FlowSpec, LogicalLinkHandle, MacAddress, PhysicalLinkHandle, Result, TimerHandle,
    TimerService, TimerToken, TrafficClass, stop_timer,
};

/// Invoked once when a requested flush finishes. The flag tells whether any
/// packet was actually discarded.
pub type FlushCallback = Box<dyn FnOnce(bool) + Send + 'static>;

/// Invoked once after a deleted link has left the registry.
pub type DeleteCallback = Box<dyn FnOnce(LogicalLinkHandle) + Send + 'static>;

/// Parameters of a link creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkParams {
    /// Physical link carrying the logical link.
    pub physical_link: PhysicalLinkHandle,
    /// Logical link handle.
    pub logical_link: LogicalLinkHandle,
    /// Negotiated flow spec.
    pub flow_spec: FlowSpec,
    /// User priority; completions must carry the same value.
    pub priority: u8,
    /// Peer address.
    pub remote_mac: MacAddress,
    /// Local address.
    pub local_mac: MacAddress,
}

/// One logical link and its outstanding transmissions.
pub struct LogicalLink {
    pub(super) handle: LogicalLinkHandle,
    pub(super) physical: PhysicalLinkHandle,
    pub(super) remote_mac: MacAddress,
    pub(super) local_mac: MacAddress,
    pub(super) priority: u8,
    pub(super) flow_spec: FlowSpec,
    pub(super) class: TrafficClass,
    pub(super) failed_contact_counter: u16,
    pub(super) flush_pending_count: u32,
    pub(super) flush_all_pending: bool,
    /// A packet of the current flush round was discarded.
    pub(super) flush_discarded: bool,
    pub(super) queue: TxQueue,
    pub(super) tags: TagSequence,
    pub(super) received_ack_count: u16,
    pub(super) on_flush_complete: Option<FlushCallback>,
    pub(super) delete_requested: bool,
    pub(super) on_deleted: Option<DeleteCallback>,
    pub(super) flush_timer: Option<TimerHandle>,
}

impl LogicalLink {
    pub(super) fn new(params: LinkParams, total_credit: u32) -> Self {
        let class = TrafficClass::from(params.flow_spec.service_type);
        Self {
            handle: params.logical_link,
            physical: params.physical_link,
            remote_mac: params.remote_mac,
            local_mac: params.local_mac,
            priority: params.priority,
            flow_spec: params.flow_spec,
            class,
            failed_contact_counter: 0,
            flush_pending_count: 0,
            flush_all_pending: false,
            flush_discarded: false,
            queue: TxQueue::new(),
            tags: TagSequence::new(total_credit),
            received_ack_count: 0,
            on_flush_complete: None,
            delete_requested: false,
            on_deleted: None,
            flush_timer: None,
        }
    }

    /// Logical link handle.
    pub fn handle(&self) -> LogicalLinkHandle {
        self.handle
    }

    /// Physical link carrying this link.
    pub fn physical_link(&self) -> PhysicalLinkHandle {
        self.physical
    }

    /// Peer address.
    pub fn remote_mac(&self) -> MacAddress {
        self.remote_mac
    }

    /// Local address.
    pub fn local_mac(&self) -> MacAddress {
        self.local_mac
    }

    /// User priority.
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Current flow spec.
    pub fn flow_spec(&self) -> &FlowSpec {
        &self.flow_spec
    }

    /// Credit class, fixed at creation.
    pub fn class(&self) -> TrafficClass {
        self.class
    }

    /// Consecutive automatic flushes since the last successful ack.
    pub fn failed_contact_counter(&self) -> u16 {
        self.failed_contact_counter
    }

    /// Cancel requests issued and not yet completed.
    pub fn flush_pending_count(&self) -> u32 {
        self.flush_pending_count
    }

    /// Whether every outstanding packet is being flushed.
    pub fn is_flushing_all(&self) -> bool {
        self.flush_all_pending
    }

    /// Whether deletion has been requested.
    pub fn is_closing(&self) -> bool {
        self.delete_requested
    }

    /// Outstanding transmissions.
    pub fn queue(&self) -> &TxQueue {
        &self.queue
    }

    /// Whether the flush timer is armed.
    pub fn flush_timer_running(&self) -> bool {
        self.flush_timer.is_some()
    }

    /// Arm the flush timer unless it is already running.
    pub(super) fn start_flush_timer<S: TimerService + ?Sized>(
        &mut self,
        timers: &mut S,
        delay: Duration,
    ) {
        if self.flush_timer.is_none() {
            self.flush_timer = Some(timers.start(TimerToken::Flush(self.handle), delay));
        }
    }

    pub(super) fn stop_flush_timer<S: TimerService + ?Sized>(&mut self, timers: &mut S) {
        stop_timer(timers, &mut self.flush_timer);
    }

    pub(super) fn restart_flush_timer<S: TimerService + ?Sized>(
        &mut self,
        timers: &mut S,
        delay: Duration,
    ) {
        self.stop_flush_timer(timers);
        self.start_flush_timer(timers, delay);
    }

    /// Deletion may complete: nothing outstanding and nothing being cancelled.
    pub(super) fn ready_to_erase(&self) -> bool {
        self.delete_requested && self.flush_pending_count == 0 && self.queue.is_empty()
    }
}

impl fmt::Debug for LogicalLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogicalLink")
            .field("handle", &self.handle)
            .field("physical", &self.physical)
            .field("priority", &self.priority)
            .field("flow_spec", &self.flow_spec)
            .field("class", &self.class)
            .field("failed_contact_counter", &self.failed_contact_counter)
            .field("flush_pending_count", &self.flush_pending_count)
            .field("flush_all_pending", &self.flush_all_pending)
            .field("outstanding", &self.queue.len())
            .field("flush_callback", &self.on_flush_complete.is_some())
            .field("delete_requested", &self.delete_requested)
            .field("flush_timer", &self.flush_timer)
            .finish()
    }
}

/// Logical links keyed by handle.
#[derive(Debug, Default)]
pub struct LinkRegistry {
    links: HashMap<LogicalLinkHandle, LogicalLink>,
}

impl LinkRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a link. Fails with `OutOfMemory` when the map cannot grow.
    pub(super) fn insert(&mut self, link: LogicalLink) -> Result<()> {
        self.links.try_reserve(1)?;
        self.links.insert(link.handle, link);
        Ok(())
    }

    /// Look up a link.
    pub fn get(&self, handle: LogicalLinkHandle) -> Option<&LogicalLink> {
        self.links.get(&handle)
    }

    pub(super) fn get_mut(&mut self, handle: LogicalLinkHandle) -> Option<&mut LogicalLink> {
        self.links.get_mut(&handle)
    }

    pub(super) fn remove(&mut self, handle: LogicalLinkHandle) -> Option<LogicalLink> {
        self.links.remove(&handle)
    }

    /// Whether a link is registered.
    pub fn contains(&self, handle: LogicalLinkHandle) -> bool {
        self.links.contains_key(&handle)
    }

    /// Handles of the links carried by a physical link, ascending.
    pub fn handles_on(&self, physical: PhysicalLinkHandle) -> Vec<LogicalLinkHandle> {
        let mut handles: Vec<_> = self
            .links
            .values()
            .filter(|l| l.physical == physical)
            .map(|l| l.handle)
            .collect();
        handles.sort_unstable();
        handles
    }

    /// Number of registered links.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether no link is registered.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub(super) fn drain(&mut self) -> impl Iterator<Item = LogicalLink> + '_ {
        self.links.drain().map(|(_, link)| link)
    }
}
