//! Confirmation reconciler.
//!
//! Every transmission completion retires the oldest outstanding packet of
//! its link. A completion that does not match that packet is a protocol
//! anomaly: it is logged and dropped without touching any state.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::data_manager::DataManager;
use super::indication::{ConfirmOutcome, ConfirmRejection, Indication, TxConfirm};
use super::link::LogicalLink;
use super::queue::TxPacket;
use crate::core::{APP_ID_MASK, LogicalLinkHandle, ServiceType, TimerService, Transport};

impl<T: Transport, S: TimerService> DataManager<T, S> {
    /// Reconcile a transmission completion.
    ///
    /// Returns the delay until the link's next flush deadline, or the reason
    /// the event was dropped.
    pub fn on_tx_confirm(&mut self, confirm: TxConfirm, now: Instant) -> ConfirmOutcome {
        let handle = match self.check_confirm(&confirm) {
            Ok(handle) => handle,
            Err(reason) => {
                self.stats.confirm_anomalies += 1;
                warn!(request_id = %confirm.request_id, ?reason, "completion dropped");
                return ConfirmOutcome::Rejected(reason);
            }
        };

        let delivered = confirm.is_delivered();
        let Some(packet) = self.retire_oldest(handle, now) else {
            return ConfirmOutcome::Rejected(ConfirmRejection::UnknownLink(handle));
        };

        if packet.flush_pending {
            self.command_queue.release();
            self.drain_link(handle, now);
            self.complete_cancelled(handle, delivered, packet.cancelled_on_expiry);
        } else {
            self.complete_transmitted(handle, delivered, now);
        }

        if self.links.get(handle).is_some_and(LogicalLink::ready_to_erase) {
            self.erase_link(handle);
            return ConfirmOutcome::Reconciled {
                next_flush: Duration::ZERO,
            };
        }

        let next_flush = self.reschedule_flush_timer(handle, now);
        ConfirmOutcome::Reconciled { next_flush }
    }

    fn check_confirm(&self, confirm: &TxConfirm) -> Result<LogicalLinkHandle, ConfirmRejection> {
        let decoded = confirm.request_id.decode();
        if u32::from(decoded.app_id) != u32::from(self.config.app_id) & APP_ID_MASK {
            return Err(ConfirmRejection::ForeignAppId(decoded.app_id));
        }

        let handle = decoded.logical_link;
        let link = self
            .links
            .get(handle)
            .ok_or(ConfirmRejection::UnknownLink(handle))?;
        if !link.flow_spec.service_type.carries_traffic() {
            return Err(ConfirmRejection::NoTraffic(handle));
        }
        if link.priority != confirm.priority {
            return Err(ConfirmRejection::PriorityMismatch {
                expected: link.priority,
                actual: confirm.priority,
            });
        }

        let oldest = link
            .queue
            .front()
            .ok_or(ConfirmRejection::NothingOutstanding(handle))?;
        if oldest.tag != decoded.tag {
            return Err(ConfirmRejection::OutOfOrder {
                expected: oldest.tag.0,
                actual: decoded.tag.0,
            });
        }
        Ok(handle)
    }

    /// QoS check, pop and credit restoration. Returns the retired packet.
    fn retire_oldest(&mut self, handle: LogicalLinkHandle, now: Instant) -> Option<TxPacket> {
        let Self {
            links,
            credits,
            config,
            event_mask,
            indications,
            stats,
            ..
        } = self;
        let link = links.get_mut(handle)?;

        let oldest = link.queue.front()?;
        if link.flow_spec.service_type == ServiceType::Guaranteed
            && oldest.time_in_queue(now) > link.flow_spec.access_latency
            && link.flush_pending_count == 0
            && event_mask.qos_violation
        {
            debug!(logical_link = %handle, waited = ?oldest.time_in_queue(now), "access latency exceeded");
            stats.qos_violations += 1;
            indications.push_back(Indication::QosViolation {
                logical_link: handle,
            });
        }

        let packet = link.queue.pop_front()?;
        link.received_ack_count = link.received_ack_count.saturating_add(1);
        if link.received_ack_count >= config.block_ack_batch_size || link.queue.is_empty() {
            let restored = credits.restore(link.class, u32::from(link.received_ack_count));
            link.received_ack_count = 0;
            debug!(logical_link = %handle, class = ?link.class, restored, "credit restored");
            if restored > 0 && event_mask.completed_data_blocks {
                indications.push_back(Indication::CompletedDataBlocks {
                    class: link.class,
                    logical_link: handle,
                    count: restored,
                });
            }
        }

        Some(packet)
    }

    /// Completion of a packet a cancel request was issued for.
    ///
    /// Only a discard of a packet cancelled on expiry counts as a failed
    /// contact.
    fn complete_cancelled(&mut self, handle: LogicalLinkHandle, delivered: bool, on_expiry: bool) {
        let Some(link) = self.links.get_mut(handle) else {
            return;
        };

        if delivered {
            self.stats.frames_delivered += 1;
            link.failed_contact_counter = 0;
        } else {
            self.stats.frames_failed += 1;
            link.flush_discarded = true;
            if on_expiry {
                link.failed_contact_counter = link.failed_contact_counter.saturating_add(1);
            }
        }

        link.flush_pending_count = link.flush_pending_count.saturating_sub(1);
        if link.flush_pending_count > 0 {
            return;
        }

        let discarded = std::mem::take(&mut link.flush_discarded);
        let on_complete = link.on_flush_complete.take();
        link.flush_all_pending = false;

        if discarded {
            debug!(logical_link = %handle, "flush occurred");
            self.stats.flushes_occurred += 1;
            self.indicate(Indication::FlushOccurred {
                logical_link: handle,
            });
        }
        if let Some(on_complete) = on_complete {
            on_complete(discarded);
        }
    }

    /// Completion of a packet no cancel request was issued for.
    fn complete_transmitted(&mut self, handle: LogicalLinkHandle, delivered: bool, now: Instant) {
        let Some(link) = self.links.get_mut(handle) else {
            return;
        };

        if delivered {
            self.stats.frames_delivered += 1;
            if link.failed_contact_counter != 0 {
                debug!(logical_link = %handle, "failed contact counter cleared");
                link.failed_contact_counter = 0;
            }
        } else {
            self.stats.frames_failed += 1;
        }

        // A starved delete keeps flush_all set until every packet is cancelled.
        if link.flow_spec.has_flush_timeout() || link.flush_all_pending {
            self.drain_link(handle, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;

    use super::*;
    use crate::core::{
        EventMask, FlowSpec, MacAddress, PhysicalLinkHandle, RequestId, TimerToken, TrafficClass,
    };
    use crate::manager::config::DataManagerConfig;
    use crate::manager::indication::{ConfirmResult, TransmissionStatus};
    use crate::manager::link::LinkParams;
    use crate::manager::tag::PacketTag;
    use crate::manager::testing::{ManualTimers, MockTransport};

    type Dm = DataManager<MockTransport, ManualTimers>;

    const PRIORITY: u8 = 3;

    fn handle(raw: u16) -> LogicalLinkHandle {
        LogicalLinkHandle::new(raw).unwrap()
    }

    fn phys() -> PhysicalLinkHandle {
        PhysicalLinkHandle::new(1).unwrap()
    }

    fn manager_with(config: DataManagerConfig, cmd_q: u32) -> (Dm, Instant) {
        let now = Instant::now();
        let mut dm = DataManager::new(MockTransport::new(), ManualTimers::new(), config).unwrap();
        dm.initialize(8, cmd_q);
        dm.set_supervision_timeout(phys(), Duration::from_secs(10), now).unwrap();
        (dm, now)
    }

    fn manager(cmd_q: u32) -> (Dm, Instant) {
        manager_with(DataManagerConfig::default(), cmd_q)
    }

    fn create(dm: &mut Dm, raw: u16, flow_spec: FlowSpec) {
        dm.create_link(LinkParams {
            physical_link: phys(),
            logical_link: handle(raw),
            flow_spec,
            priority: PRIORITY,
            remote_mac: MacAddress::default(),
            local_mac: MacAddress::default(),
        })
        .unwrap();
    }

    fn send(dm: &mut Dm, raw: u16, now: Instant) -> RequestId {
        dm.send_frame(handle(raw), Bytes::from_static(b"payload"), now).unwrap()
    }

    fn delivered(id: RequestId) -> TxConfirm {
        TxConfirm::delivered(id, PRIORITY, ServiceType::BestEffort)
    }

    fn discarded(id: RequestId) -> TxConfirm {
        TxConfirm::discarded(id, PRIORITY, ServiceType::BestEffort)
    }

    fn assert_bounds(dm: &Dm) {
        for class in TrafficClass::ALL {
            let info = dm.credits().info(class);
            assert!(info.free() <= info.total());
        }
        assert!(dm.command_queue().free_slots() <= dm.command_queue().q_size());
    }

    #[test]
    fn test_credit_exhaustion() {
        let (mut dm, now) = manager(8);
        create(&mut dm, 1, FlowSpec::best_effort(Duration::ZERO));

        let info = dm.credits().info(TrafficClass::BestEffort);
        assert_eq!((info.total(), info.free()), (7, 7));

        for _ in 0..7 {
            send(&mut dm, 1, now);
        }
        assert_eq!(dm.credits().info(TrafficClass::BestEffort).free(), 0);
        assert_eq!(
            dm.send_frame(handle(1), Bytes::from_static(b"x"), now),
            Err(crate::core::DataManagerError::NoCredit(TrafficClass::BestEffort))
        );
        assert_eq!(dm.stats().frames_rejected_no_credit, 1);
        assert_eq!(dm.transport().sent.len(), 7);
        assert_bounds(&dm);
    }

    #[test]
    fn test_ack_before_flush_deadline() {
        let (mut dm, now) = manager(8);
        create(&mut dm, 1, FlowSpec::best_effort(Duration::from_millis(100)));
        let token = TimerToken::Flush(handle(1));

        let id = send(&mut dm, 1, now);
        assert_eq!(dm.timers().delay_of(token), Some(Duration::from_millis(100)));

        let outcome = dm.on_tx_confirm(delivered(id), now + Duration::from_millis(50));
        assert_eq!(outcome, ConfirmOutcome::Reconciled { next_flush: Duration::ZERO });
        assert!(dm.link(handle(1)).unwrap().queue().is_empty());
        assert_eq!(dm.credits().info(TrafficClass::BestEffort).free(), 7);
        assert!(!dm.timers().is_running(token));
        assert_eq!(
            dm.drain_indications(),
            vec![Indication::CompletedDataBlocks {
                class: TrafficClass::BestEffort,
                logical_link: handle(1),
                count: 1,
            }]
        );
    }

    #[test]
    fn test_next_flush_follows_oldest_unflushed() {
        let (mut dm, now) = manager(8);
        create(&mut dm, 1, FlowSpec::best_effort(Duration::from_millis(100)));

        let first = send(&mut dm, 1, now);
        send(&mut dm, 1, now + Duration::from_millis(30));

        let outcome = dm.on_tx_confirm(delivered(first), now + Duration::from_millis(40));
        assert_eq!(outcome.next_flush(), Duration::from_millis(90));
        assert_eq!(
            dm.timers().delay_of(TimerToken::Flush(handle(1))),
            Some(Duration::from_millis(90))
        );
    }

    #[test]
    fn test_flush_slot_release_issues_next_cancel() {
        let (mut dm, now) = manager(3);
        create(&mut dm, 1, FlowSpec::best_effort(Duration::ZERO));
        let ids: Vec<RequestId> = (0..3).map(|_| send(&mut dm, 1, now)).collect();

        let outcome = Arc::new(Mutex::new(None));
        let seen = outcome.clone();
        dm.flush_link(handle(1), Box::new(move |occurred| *seen.lock().unwrap() = Some(occurred)), now)
            .unwrap();
        assert_eq!(dm.transport().cancels, ids[..2].to_vec());
        assert_eq!(dm.link(handle(1)).unwrap().flush_pending_count(), 2);

        dm.on_tx_confirm(discarded(ids[0]), now);
        assert_eq!(dm.transport().cancels, ids);
        assert_eq!(dm.command_queue().free_slots(), 0);
        assert_eq!(dm.link(handle(1)).unwrap().flush_pending_count(), 2);
        assert_bounds(&dm);

        dm.on_tx_confirm(discarded(ids[1]), now);
        assert!(outcome.lock().unwrap().is_none());
        dm.on_tx_confirm(discarded(ids[2]), now);

        assert_eq!(*outcome.lock().unwrap(), Some(true));
        assert_eq!(dm.command_queue().free_slots(), 2);
        let link = dm.link(handle(1)).unwrap();
        assert_eq!(link.flush_pending_count(), 0);
        assert!(!link.is_flushing_all());
        assert_eq!(link.failed_contact_counter(), 0);
        assert_bounds(&dm);
    }

    #[test]
    fn test_credit_restore_precedes_flush_occurred() {
        let (mut dm, now) = manager(8);
        create(&mut dm, 1, FlowSpec::best_effort(Duration::ZERO));
        let id = send(&mut dm, 1, now);
        dm.flush_link(handle(1), Box::new(|_| {}), now).unwrap();

        dm.on_tx_confirm(discarded(id), now);
        assert_eq!(
            dm.drain_indications(),
            vec![
                Indication::CompletedDataBlocks {
                    class: TrafficClass::BestEffort,
                    logical_link: handle(1),
                    count: 1,
                },
                Indication::FlushOccurred {
                    logical_link: handle(1)
                },
            ]
        );
        assert_eq!(dm.stats().flushes_occurred, 1);
    }

    #[test]
    fn test_flush_round_without_discard_reports_no_flush() {
        let (mut dm, now) = manager(8);
        create(&mut dm, 1, FlowSpec::best_effort(Duration::ZERO));
        let id = send(&mut dm, 1, now);

        let outcome = Arc::new(Mutex::new(None));
        let seen = outcome.clone();
        dm.flush_link(handle(1), Box::new(move |occurred| *seen.lock().unwrap() = Some(occurred)), now)
            .unwrap();
        dm.on_tx_confirm(delivered(id), now);

        assert_eq!(*outcome.lock().unwrap(), Some(false));
        assert!(
            !dm.drain_indications()
                .iter()
                .any(|i| matches!(i, Indication::FlushOccurred { .. }))
        );
    }

    #[test]
    fn test_out_of_order_completion_rejected() {
        let (mut dm, now) = manager(8);
        create(&mut dm, 1, FlowSpec::best_effort(Duration::ZERO));
        send(&mut dm, 1, now);
        let second = send(&mut dm, 1, now);

        let outcome = dm.on_tx_confirm(delivered(second), now);
        assert_eq!(
            outcome,
            ConfirmOutcome::Rejected(ConfirmRejection::OutOfOrder {
                expected: 0,
                actual: 1
            })
        );
        assert_eq!(dm.link(handle(1)).unwrap().queue().len(), 2);
        assert_eq!(dm.credits().info(TrafficClass::BestEffort).free(), 5);
        assert_eq!(dm.stats().confirm_anomalies, 1);
        assert!(dm.drain_indications().is_empty());
    }

    #[test]
    fn test_anomalies_leave_state_untouched() {
        let (mut dm, now) = manager(8);
        create(&mut dm, 1, FlowSpec::best_effort(Duration::ZERO));
        let id = send(&mut dm, 1, now);

        let foreign = RequestId::encode(0x2, handle(1), PacketTag(0));
        assert_eq!(
            dm.on_tx_confirm(delivered(foreign), now),
            ConfirmOutcome::Rejected(ConfirmRejection::ForeignAppId(0x2))
        );

        let unknown = RequestId::encode(0x1, handle(9), PacketTag(0));
        assert_eq!(
            dm.on_tx_confirm(delivered(unknown), now),
            ConfirmOutcome::Rejected(ConfirmRejection::UnknownLink(handle(9)))
        );

        let wrong_priority = TxConfirm {
            priority: PRIORITY + 1,
            ..delivered(id)
        };
        assert_eq!(
            dm.on_tx_confirm(wrong_priority, now),
            ConfirmOutcome::Rejected(ConfirmRejection::PriorityMismatch {
                expected: PRIORITY,
                actual: PRIORITY + 1
            })
        );

        assert_eq!(dm.link(handle(1)).unwrap().queue().len(), 1);
        assert_eq!(dm.stats().confirm_anomalies, 3);

        assert!(matches!(
            dm.on_tx_confirm(delivered(id), now),
            ConfirmOutcome::Reconciled { .. }
        ));
        assert_eq!(
            dm.on_tx_confirm(delivered(id), now),
            ConfirmOutcome::Rejected(ConfirmRejection::NothingOutstanding(handle(1)))
        );
    }

    #[test]
    fn test_tag_wraparound_reconciles() {
        let (mut dm, now) = manager(8);
        dm.initialize(9, 8);
        assert_eq!(dm.credits().info(TrafficClass::BestEffort).total(), 8);
        create(&mut dm, 1, FlowSpec::best_effort(Duration::ZERO));

        // 16 sends with immediate acks, then the 17th reuses tag 0.
        for expected in 0..16u16 {
            let id = send(&mut dm, 1, now);
            assert_eq!(id.packet_tag(), PacketTag(expected));
            assert!(matches!(
                dm.on_tx_confirm(delivered(id), now),
                ConfirmOutcome::Reconciled { .. }
            ));
        }
        let id = send(&mut dm, 1, now);
        assert_eq!(id.packet_tag(), PacketTag(0));
        assert!(matches!(
            dm.on_tx_confirm(delivered(id), now),
            ConfirmOutcome::Reconciled { .. }
        ));
        assert_eq!(dm.credits().info(TrafficClass::BestEffort).free(), 8);
    }

    #[test]
    fn test_block_ack_batching() {
        let config = DataManagerConfig::builder().block_ack_batch_size(2).build().unwrap();
        let (mut dm, now) = manager_with(config, 8);
        create(&mut dm, 1, FlowSpec::best_effort(Duration::ZERO));
        let ids: Vec<RequestId> = (0..3).map(|_| send(&mut dm, 1, now)).collect();

        dm.on_tx_confirm(delivered(ids[0]), now);
        assert_eq!(dm.credits().info(TrafficClass::BestEffort).free(), 4);
        dm.on_tx_confirm(delivered(ids[1]), now);
        assert_eq!(dm.credits().info(TrafficClass::BestEffort).free(), 6);
        // queue empties before the batch fills
        dm.on_tx_confirm(delivered(ids[2]), now);
        assert_eq!(dm.credits().info(TrafficClass::BestEffort).free(), 7);

        let counts: Vec<u32> = dm
            .drain_indications()
            .into_iter()
            .filter_map(|i| match i {
                Indication::CompletedDataBlocks { count, .. } => Some(count),
                _ => None,
            })
            .collect();
        assert_eq!(counts, vec![2, 1]);
    }

    #[test]
    fn test_qos_violation_on_late_guaranteed_ack() {
        let (mut dm, now) = manager(8);
        create(
            &mut dm,
            2,
            FlowSpec::guaranteed(Duration::from_millis(10), Duration::ZERO),
        );
        let early = send(&mut dm, 2, now);
        let late = send(&mut dm, 2, now);

        let confirm = |id| TxConfirm::delivered(id, PRIORITY, ServiceType::Guaranteed);
        dm.on_tx_confirm(confirm(early), now + Duration::from_millis(5));
        assert!(
            !dm.drain_indications()
                .iter()
                .any(|i| matches!(i, Indication::QosViolation { .. }))
        );

        dm.on_tx_confirm(confirm(late), now + Duration::from_millis(20));
        assert_eq!(
            dm.drain_indications()[0],
            Indication::QosViolation {
                logical_link: handle(2)
            }
        );
        assert_eq!(dm.stats().qos_violations, 1);
    }

    #[test]
    fn test_qos_violation_suppressed_while_flushing_or_masked() {
        let (mut dm, now) = manager(8);
        create(
            &mut dm,
            2,
            FlowSpec::guaranteed(Duration::from_millis(10), Duration::ZERO),
        );
        let confirm = |id| TxConfirm::discarded(id, PRIORITY, ServiceType::Guaranteed);

        let id = send(&mut dm, 2, now);
        dm.flush_link(handle(2), Box::new(|_| {}), now).unwrap();
        dm.on_tx_confirm(confirm(id), now + Duration::from_millis(20));

        dm.set_event_mask(EventMask {
            qos_violation: false,
            completed_data_blocks: false,
        });
        let id = send(&mut dm, 2, now);
        dm.on_tx_confirm(
            TxConfirm::delivered(id, PRIORITY, ServiceType::Guaranteed),
            now + Duration::from_millis(20),
        );

        assert!(
            !dm.drain_indications()
                .iter()
                .any(|i| matches!(i, Indication::QosViolation { .. }))
        );
    }

    #[test]
    fn test_failed_contact_counter() {
        let (mut dm, now) = manager(8);
        create(&mut dm, 1, FlowSpec::best_effort(Duration::from_millis(100)));
        let token = TimerToken::Flush(handle(1));

        let first = send(&mut dm, 1, now);
        let expired = now + Duration::from_millis(100);
        let timer = dm.timers_mut().fire(token).unwrap();
        dm.on_timer(token, timer, expired);
        dm.on_tx_confirm(discarded(first), expired);
        assert_eq!(dm.failed_contact_counter(handle(1)), Ok(1));

        // an explicit flush does not count as a failed contact
        let second = send(&mut dm, 1, expired);
        dm.flush_link(handle(1), Box::new(|_| {}), expired).unwrap();
        dm.on_tx_confirm(discarded(second), expired);
        assert_eq!(dm.failed_contact_counter(handle(1)), Ok(1));

        let third = send(&mut dm, 1, expired);
        dm.on_tx_confirm(delivered(third), expired);
        assert_eq!(dm.failed_contact_counter(handle(1)), Ok(0));
    }

    #[test]
    fn test_expiry_discard_counted_despite_later_flush() {
        let (mut dm, now) = manager(8);
        create(&mut dm, 1, FlowSpec::best_effort(Duration::from_millis(100)));
        let token = TimerToken::Flush(handle(1));

        let id = send(&mut dm, 1, now);
        let expired = now + Duration::from_millis(100);
        let timer = dm.timers_mut().fire(token).unwrap();
        dm.on_timer(token, timer, expired);
        assert_eq!(dm.transport().cancels, vec![id]);

        // the explicit flush finds the packet already cancelled
        let flushed = Arc::new(Mutex::new(None));
        let seen = flushed.clone();
        let pending = dm
            .flush_link(handle(1), Box::new(move |occurred| *seen.lock().unwrap() = Some(occurred)), expired)
            .unwrap();
        assert_eq!(pending, 1);
        assert_eq!(dm.transport().cancels.len(), 1);

        dm.on_tx_confirm(discarded(id), expired);
        assert_eq!(dm.failed_contact_counter(handle(1)), Ok(1));
        assert_eq!(*flushed.lock().unwrap(), Some(true));
        assert!(!dm.link(handle(1)).unwrap().is_flushing_all());
    }

    #[test]
    fn test_deferred_delete_waits_for_flush() {
        let (mut dm, now) = manager(8);
        create(&mut dm, 1, FlowSpec::best_effort(Duration::ZERO));
        let ids: Vec<RequestId> = (0..2).map(|_| send(&mut dm, 1, now)).collect();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let removed = dm
            .delete_link(
                handle(1),
                Some(Box::new(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })),
                now,
            )
            .unwrap();
        assert!(!removed);
        assert_eq!(dm.transport().cancels.len(), 2);

        dm.on_tx_confirm(discarded(ids[0]), now);
        assert!(dm.links().contains(handle(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        dm.on_tx_confirm(discarded(ids[1]), now);
        assert!(!dm.links().contains(handle(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dm.credits().info(TrafficClass::BestEffort).free(), 7);
        assert_eq!(dm.command_queue().free_slots(), 7);
    }

    #[test]
    fn test_delete_callback_observes_removed_link() {
        let (mut dm, now) = manager(8);
        create(&mut dm, 1, FlowSpec::best_effort(Duration::ZERO));
        let id = send(&mut dm, 1, now);

        let seen = Arc::new(Mutex::new(None));
        let slot = seen.clone();
        dm.delete_link(
            handle(1),
            Some(Box::new(move |h| *slot.lock().unwrap() = Some(h))),
            now,
        )
        .unwrap();
        assert!(seen.lock().unwrap().is_none());

        dm.on_tx_confirm(discarded(id), now);
        assert_eq!(*seen.lock().unwrap(), Some(handle(1)));
        assert!(dm.link(handle(1)).is_none());
    }

    #[test]
    fn test_starved_delete_completes_as_slots_free() {
        // command queue of 2 leaves a single usable slot
        let (mut dm, now) = manager(2);
        create(&mut dm, 1, FlowSpec::best_effort(Duration::ZERO));
        let ids: Vec<RequestId> = (0..3).map(|_| send(&mut dm, 1, now)).collect();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        dm.delete_link(
            handle(1),
            Some(Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
            now,
        )
        .unwrap();
        assert_eq!(dm.transport().cancels, ids[..1].to_vec());

        for id in &ids {
            assert!(dm.links().contains(handle(1)));
            dm.on_tx_confirm(discarded(*id), now);
        }
        assert!(!dm.links().contains(handle(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dm.transport().cancels, ids);
        assert_bounds(&dm);
    }
}
