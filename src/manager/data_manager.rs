//! The data manager: credit admission, link registry and supervision.
//!
//! Flush handling lives in [`flush`](super::flush) and completion
//! reconciliation in [`reconcile`](super::reconcile); both extend
//! [`DataManager`] with further `impl` blocks.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, info, trace, warn};

use super::config::DataManagerConfig;
use super::credit::{CommandQueue, CreditLedger};
use super::indication::{InboundFrame, Indication, ReceptionStatus};
use super::link::{DeleteCallback, LinkParams, LinkRegistry, LogicalLink};
use super::queue::TxPacket;
use super::stats::DataStats;
use super::supervision::{SupervisionTable, SupervisionVerdict};
use crate::core::{
    DataManagerError, EventMask, FlowSpec, LogicalLinkHandle, MAX_TIMEOUT, PhysicalLinkHandle,
    RequestId, Result, TimerHandle, TimerService, TimerToken, Transport,
};

fn check_timeout(name: &str, timeout: Duration) -> Result<()> {
    if timeout > MAX_TIMEOUT {
        return Err(DataManagerError::InvalidParameter(format!(
            "{name} {timeout:?} exceeds {MAX_TIMEOUT:?}"
        )));
    }
    Ok(())
}

fn check_flow_spec(flow_spec: &FlowSpec) -> Result<()> {
    check_timeout("flush timeout", flow_spec.flush_timeout)?;
    check_timeout("access latency", flow_spec.access_latency)
}

/// Per-instance data manager state.
///
/// Single-threaded and run-to-completion: every entry point finishes all
/// bookkeeping, including deferred callbacks, before returning. Upward
/// events are queued and read with [`poll_indication`](Self::poll_indication).
#[derive(Debug)]
pub struct DataManager<T, S> {
    pub(super) config: DataManagerConfig,
    pub(super) transport: T,
    pub(super) timers: S,
    pub(super) credits: CreditLedger,
    pub(super) command_queue: CommandQueue,
    pub(super) links: LinkRegistry,
    pub(super) supervision: SupervisionTable,
    pub(super) event_mask: EventMask,
    pub(super) subscribed: bool,
    pub(super) initialized: bool,
    pub(super) indications: VecDeque<Indication>,
    pub(super) stats: DataStats,
}

impl<T: Transport, S: TimerService> DataManager<T, S> {
    /// Create an uninitialized data manager.
    pub fn new(transport: T, timers: S, config: DataManagerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            supervision: SupervisionTable::new(config.max_physical_links, config.min_early_loss),
            event_mask: config.event_mask,
            config,
            transport,
            timers,
            credits: CreditLedger::new(),
            command_queue: CommandQueue::new(),
            links: LinkRegistry::new(),
            subscribed: false,
            initialized: false,
            indications: VecDeque::new(),
            stats: DataStats::default(),
        })
    }

    /// Size the credit ledger and command queue from the transport's
    /// capabilities.
    pub fn initialize(&mut self, traffic_queue_size: u32, command_queue_size: u32) {
        self.credits.initialize(traffic_queue_size);
        self.command_queue.initialize(command_queue_size);
        self.initialized = true;
        info!(
            traffic_queue_size,
            command_queue_size, "data manager initialized"
        );
    }

    /// Whether [`initialize`](Self::initialize) has run since the last reset.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Active configuration.
    pub fn config(&self) -> &DataManagerConfig {
        &self.config
    }

    /// Credit ledger.
    pub fn credits(&self) -> &CreditLedger {
        &self.credits
    }

    /// Command queue gate.
    pub fn command_queue(&self) -> &CommandQueue {
        &self.command_queue
    }

    /// Logical link registry.
    pub fn links(&self) -> &LinkRegistry {
        &self.links
    }

    /// Look up a logical link.
    pub fn link(&self, handle: LogicalLinkHandle) -> Option<&LogicalLink> {
        self.links.get(handle)
    }

    /// Supervision slots.
    pub fn supervision(&self) -> &SupervisionTable {
        &self.supervision
    }

    /// Data path counters.
    pub fn stats(&self) -> &DataStats {
        &self.stats
    }

    /// Enabled upward events.
    pub fn event_mask(&self) -> EventMask {
        self.event_mask
    }

    /// Enable or disable upward events.
    pub fn set_event_mask(&mut self, mask: EventMask) {
        self.event_mask = mask;
    }

    /// Whether inbound traffic is currently subscribed.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Timer service.
    pub fn timers(&self) -> &S {
        &self.timers
    }

    /// Timer service, mutably.
    pub fn timers_mut(&mut self) -> &mut S {
        &mut self.timers
    }

    /// Next queued upward event.
    pub fn poll_indication(&mut self) -> Option<Indication> {
        self.indications.pop_front()
    }

    /// Take every queued upward event, oldest first.
    pub fn drain_indications(&mut self) -> Vec<Indication> {
        self.indications.drain(..).collect()
    }

    pub(super) fn indicate(&mut self, indication: Indication) {
        self.indications.push_back(indication);
    }

    fn require_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(DataManagerError::NotActivated)
        }
    }

    // =========================================================================
    // LOGICAL LINKS
    // =========================================================================

    /// Register a logical link. Its physical link must already be supervised.
    pub fn create_link(&mut self, params: LinkParams) -> Result<()> {
        self.require_initialized()?;

        let handle = params.logical_link;
        let physical = params.physical_link;
        check_flow_spec(&params.flow_spec)?;
        if self.links.contains(handle) {
            return Err(DataManagerError::DuplicateLogicalLink(handle));
        }
        if !self.supervision.contains(physical) {
            warn!(logical_link = %handle, physical_link = %physical, "link create without supervision");
            return Err(DataManagerError::NoSupervision(physical));
        }

        let class = params.flow_spec.service_type.into();
        let total = self.credits.info(class).total();
        let link = LogicalLink::new(params, total);
        info!(
            logical_link = %handle,
            physical_link = %physical,
            service_type = ?link.flow_spec.service_type,
            remote = %link.remote_mac,
            "logical link created"
        );
        self.links.insert(link)
    }

    /// Replace a link's flow spec. A zero flush timeout stops automatic
    /// flushing. The credit class is not changed.
    pub fn modify_link(&mut self, handle: LogicalLinkHandle, flow_spec: FlowSpec) -> Result<()> {
        check_flow_spec(&flow_spec)?;
        let Self { links, timers, .. } = self;
        let link = links
            .get_mut(handle)
            .ok_or(DataManagerError::UnknownLogicalLink(handle))?;

        if !flow_spec.has_flush_timeout() {
            link.stop_flush_timer(timers);
        }
        debug!(logical_link = %handle, ?flow_spec, "flow spec modified");
        link.flow_spec = flow_spec;
        Ok(())
    }

    /// Delete a link once everything outstanding on it has been flushed.
    ///
    /// Returns `true` when the link was removed immediately. Otherwise
    /// `on_deleted` runs after the last cancelled packet completes.
    pub fn delete_link(
        &mut self,
        handle: LogicalLinkHandle,
        on_deleted: Option<DeleteCallback>,
        now: Instant,
    ) -> Result<bool> {
        let link = self
            .links
            .get_mut(handle)
            .ok_or(DataManagerError::UnknownLogicalLink(handle))?;
        if link.delete_requested {
            return Err(DataManagerError::LinkClosing(handle));
        }

        link.delete_requested = true;
        link.flush_all_pending = true;
        link.on_deleted = on_deleted;
        self.drain_link(handle, now);

        if self.links.get(handle).is_some_and(LogicalLink::ready_to_erase) {
            self.erase_link(handle);
            return Ok(true);
        }

        debug!(
            logical_link = %handle,
            pending = self.links.get(handle).map_or(0, |l| l.flush_pending_count),
            "link deletion deferred"
        );
        Ok(false)
    }

    /// Delete every link carried by a physical link, without callbacks.
    ///
    /// Returns how many links were removed immediately.
    pub fn delete_all_for_physical(&mut self, physical: PhysicalLinkHandle, now: Instant) -> usize {
        let mut removed = 0;
        for handle in self.links.handles_on(physical) {
            if matches!(self.delete_link(handle, None, now), Ok(true)) {
                removed += 1;
            }
        }
        removed
    }

    /// Remove a link whose queue has drained, then run its delete callback.
    pub(super) fn erase_link(&mut self, handle: LogicalLinkHandle) {
        let Some(mut link) = self.links.remove(handle) else {
            return;
        };
        link.stop_flush_timer(&mut self.timers);
        debug_assert!(link.queue.is_empty(), "erased link with packets outstanding");
        debug_assert_eq!(link.flush_pending_count, 0);

        info!(logical_link = %handle, "logical link deleted");
        if let Some(on_deleted) = link.on_deleted.take() {
            on_deleted(handle);
        }
    }

    /// Read a link's failed contact counter.
    pub fn failed_contact_counter(&self, handle: LogicalLinkHandle) -> Result<u16> {
        self.links
            .get(handle)
            .map(LogicalLink::failed_contact_counter)
            .ok_or(DataManagerError::UnknownLogicalLink(handle))
    }

    /// Zero a link's failed contact counter.
    pub fn reset_failed_contact_counter(&mut self, handle: LogicalLinkHandle) -> Result<()> {
        let link = self
            .links
            .get_mut(handle)
            .ok_or(DataManagerError::UnknownLogicalLink(handle))?;
        link.failed_contact_counter = 0;
        Ok(())
    }

    // =========================================================================
    // LINK SUPERVISION
    // =========================================================================

    /// Configure supervision of a physical link.
    ///
    /// Returns `true` when this is the first supervised physical link; inbound
    /// traffic is subscribed at that point.
    pub fn set_supervision_timeout(
        &mut self,
        physical: PhysicalLinkHandle,
        timeout: Duration,
        now: Instant,
    ) -> Result<bool> {
        self.require_initialized()?;
        check_timeout("supervision timeout", timeout)?;
        let first = self.supervision.set(&mut self.timers, physical, timeout, now)?;
        if first && !self.subscribed {
            self.transport.subscribe_inbound();
            self.subscribed = true;
            info!(physical_link = %physical, "inbound traffic subscribed");
        }
        Ok(first)
    }

    /// Change the supervision timeout of a physical link.
    pub fn modify_supervision_timeout(
        &mut self,
        physical: PhysicalLinkHandle,
        timeout: Duration,
        now: Instant,
    ) -> Result<()> {
        check_timeout("supervision timeout", timeout)?;
        self.supervision.modify(&mut self.timers, physical, timeout, now)
    }

    /// Drop one supervision user of a physical link. When the slot is freed,
    /// links still carried by it are deleted.
    ///
    /// Returns `true` when no physical link remains supervised; inbound
    /// traffic is unsubscribed at that point.
    pub fn delete_supervision_timeout(
        &mut self,
        physical: PhysicalLinkHandle,
        now: Instant,
    ) -> Result<bool> {
        let last = self.supervision.remove(&mut self.timers, physical)?;
        if !self.supervision.contains(physical) {
            self.delete_all_for_physical(physical, now);
        }
        if last && self.subscribed {
            self.transport.unsubscribe_inbound();
            self.subscribed = false;
            info!(physical_link = %physical, "inbound traffic unsubscribed");
        }
        Ok(last)
    }

    /// Liveness hint for a physical link from elsewhere in the system.
    pub fn link_alive(&mut self, physical: PhysicalLinkHandle, now: Instant) -> Result<()> {
        let entry = self
            .supervision
            .get_mut(physical)
            .ok_or(DataManagerError::UnknownPhysicalLink(physical))?;
        entry.mark_alive(&mut self.timers, now);
        Ok(())
    }

    // =========================================================================
    // DATA PATH
    // =========================================================================

    /// Admit an outbound frame and hand it to the transport.
    pub fn send_frame(
        &mut self,
        handle: LogicalLinkHandle,
        payload: Bytes,
        now: Instant,
    ) -> Result<RequestId> {
        self.require_initialized()?;

        let Self {
            links,
            credits,
            transport,
            timers,
            config,
            stats,
            ..
        } = self;
        let link = links
            .get_mut(handle)
            .ok_or(DataManagerError::UnknownLogicalLink(handle))?;

        if !link.flow_spec.service_type.carries_traffic() {
            return Err(DataManagerError::NoTraffic(handle));
        }
        if link.delete_requested {
            return Err(DataManagerError::LinkClosing(handle));
        }
        if !credits.has_credit(link.class) {
            stats.frames_rejected_no_credit += 1;
            debug!(logical_link = %handle, class = ?link.class, "no credit");
            return Err(DataManagerError::NoCredit(link.class));
        }

        let flush_timeout = link.flow_spec.flush_timeout;
        let tag = link.tags.next_tag();
        link.queue.push(TxPacket::new(tag, now, flush_timeout)?)?;
        credits.consume(link.class);

        if link.flow_spec.has_flush_timeout() {
            link.start_flush_timer(timers, flush_timeout);
        }

        let request_id = RequestId::encode(config.app_id, handle, tag);
        trace!(logical_link = %handle, %tag, %request_id, len = payload.len(), "frame admitted");
        transport.send_frame(request_id, link.class, payload);
        stats.frames_admitted += 1;
        Ok(request_id)
    }

    /// Process an inbound frame. Returns `true` when it was forwarded upward.
    pub fn receive_frame(&mut self, frame: InboundFrame, now: Instant) -> bool {
        if !self.initialized {
            self.stats.frames_dropped += 1;
            return false;
        }
        if frame.status != ReceptionStatus::Ok {
            self.stats.frames_dropped += 1;
            debug!(physical_link = %frame.physical_link, "inbound frame with bad status dropped");
            return false;
        }

        if let Some(entry) = self.supervision.get_mut(frame.physical_link) {
            entry.mark_alive(&mut self.timers, now);
        }

        self.stats.frames_received += 1;
        self.indicate(Indication::DataReceived {
            physical_link: frame.physical_link,
            priority: frame.priority,
            service_type: frame.service_type,
            payload: frame.payload,
        });
        true
    }

    // =========================================================================
    // TIMERS
    // =========================================================================

    /// Deliver a timer expiry. Stale or unknown timers are ignored.
    pub fn on_timer(&mut self, token: TimerToken, handle: TimerHandle, now: Instant) {
        match token {
            TimerToken::Flush(link) => self.on_flush_timer(link, handle, now),
            TimerToken::EarlyLoss(physical) => {
                let Some(entry) = self.supervision.get_mut(physical) else {
                    debug!(physical_link = %physical, "early loss timer for unsupervised link");
                    return;
                };
                match entry.on_early_loss_timer(&mut self.timers, handle, now) {
                    Some(SupervisionVerdict::EarlyLoss) => {
                        warn!(physical_link = %physical, "early link loss");
                        self.stats.early_link_losses += 1;
                        self.indicate(Indication::EarlyLinkLoss {
                            physical_link: physical,
                        });
                    }
                    Some(verdict) => debug!(physical_link = %physical, ?verdict, "supervision"),
                    None => debug!(physical_link = %physical, "stale early loss timer"),
                }
            }
            TimerToken::Loss(physical) => {
                let Some(entry) = self.supervision.get_mut(physical) else {
                    debug!(physical_link = %physical, "loss timer for unsupervised link");
                    return;
                };
                match entry.on_loss_timer(&mut self.timers, handle, now) {
                    Some(SupervisionVerdict::Lost) => {
                        warn!(physical_link = %physical, "physical link lost");
                        self.stats.links_lost += 1;
                        self.indicate(Indication::LinkLost {
                            physical_link: physical,
                        });
                    }
                    Some(verdict) => debug!(physical_link = %physical, ?verdict, "supervision"),
                    None => debug!(physical_link = %physical, "stale loss timer"),
                }
            }
        }
    }

    // =========================================================================
    // TEARDOWN
    // =========================================================================

    /// Soft teardown: stop every timer, release every link, notify pending
    /// callbacks and return to the uninitialized state. Configuration and
    /// counters are kept.
    pub fn reset(&mut self) {
        let mut released: Vec<LogicalLink> = self.links.drain().collect();
        released.sort_unstable_by_key(|l| l.handle);

        for link in &mut released {
            link.stop_flush_timer(&mut self.timers);
        }
        self.supervision.clear(&mut self.timers);
        if self.subscribed {
            self.transport.unsubscribe_inbound();
            self.subscribed = false;
        }
        self.credits.reset();
        self.command_queue.reset();
        self.event_mask = self.config.event_mask;
        self.initialized = false;

        for mut link in released {
            if let Some(on_flush) = link.on_flush_complete.take() {
                on_flush(false);
            }
            if let Some(on_deleted) = link.on_deleted.take() {
                on_deleted(link.handle);
            }
        }
        info!("data manager reset");
    }
}
