//! Physical link supervision.
//!
//! Each supervised physical link runs a two-stage timer chain towards a
//! latched expiry deadline:
//!
//! ```text
//!   set_timeout / mark_alive
//!            │
//!            ▼
//!   ┌──────────────┐  early >= min   ┌───────────────┐
//!   │ EarlyWaiting │ ◄────────────── │ arm(remaining)│
//!   └──────┬───────┘                 └───────┬───────┘
//!          │ early loss timer                │ early < min
//!          ▼                                 ▼
//!    alive? re-arm (halving)          ┌──────────────┐
//!    else  EarlyLoss + re-arm         │ FinalWaiting │── loss timer ──► alive? restart
//!                                     └──────────────┘                 else Lost (Idle)
//! ```
//!
//! The early timer is armed for half the remaining time. Once that half
//! drops below the minimum early-loss duration the final loss timer is armed
//! for the full remainder instead.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::core::{
    DataManagerError, PhysicalLinkHandle, Result, TimerHandle, TimerService, TimerToken,
    stop_timer,
};

/// Position in the supervision timer chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionState {
    /// No timer running.
    Idle,
    /// Early loss timer armed.
    EarlyWaiting,
    /// Final loss timer armed.
    FinalWaiting,
}

/// Outcome of a supervision timer expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionVerdict {
    /// Traffic was seen; supervision continues.
    StillAlive,
    /// No traffic within the early window; supervision continues.
    EarlyLoss,
    /// No traffic before the deadline; the chain has stopped.
    Lost,
}

/// Supervision state of one physical link.
#[derive(Debug)]
pub struct LinkSupervisionEntry {
    handle: PhysicalLinkHandle,
    timeout: Duration,
    expiry: Instant,
    alive: bool,
    state: SupervisionState,
    early_timer: Option<TimerHandle>,
    loss_timer: Option<TimerHandle>,
    users: u32,
    min_early_loss: Duration,
}

impl LinkSupervisionEntry {
    fn new(handle: PhysicalLinkHandle, min_early_loss: Duration, now: Instant) -> Self {
        Self {
            handle,
            timeout: Duration::ZERO,
            expiry: now,
            alive: false,
            state: SupervisionState::Idle,
            early_timer: None,
            loss_timer: None,
            users: 0,
            min_early_loss,
        }
    }

    /// Physical link this entry supervises.
    pub fn handle(&self) -> PhysicalLinkHandle {
        self.handle
    }

    /// Configured supervision timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Latched expiry deadline.
    pub fn expiry(&self) -> Instant {
        self.expiry
    }

    /// Whether traffic was seen since the last timer re-arm.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Current chain position.
    pub fn state(&self) -> SupervisionState {
        self.state
    }

    /// Logical links that configured supervision on this physical link.
    pub fn users(&self) -> u32 {
        self.users
    }

    /// Configure the timeout and restart the chain from now.
    ///
    /// A zero timeout stops supervision.
    pub fn set_timeout<S: TimerService + ?Sized>(
        &mut self,
        timers: &mut S,
        timeout: Duration,
        now: Instant,
    ) {
        self.timeout = timeout;
        self.restart(timers, now);
    }

    /// Traffic was observed: restart the chain with the configured timeout.
    pub fn mark_alive<S: TimerService + ?Sized>(&mut self, timers: &mut S, now: Instant) {
        self.restart(timers, now);
        self.alive = true;
    }

    /// Stop both timers.
    pub fn stop<S: TimerService + ?Sized>(&mut self, timers: &mut S) {
        stop_timer(timers, &mut self.early_timer);
        stop_timer(timers, &mut self.loss_timer);
        self.state = SupervisionState::Idle;
    }

    fn restart<S: TimerService + ?Sized>(&mut self, timers: &mut S, now: Instant) {
        self.stop(timers);
        self.alive = false;
        if self.timeout.is_zero() {
            return;
        }
        let Some(expiry) = now.checked_add(self.timeout) else {
            warn!(physical_link = %self.handle, timeout = ?self.timeout, "supervision deadline out of range");
            return;
        };
        self.expiry = expiry;
        self.arm(timers, now);
    }

    fn arm<S: TimerService + ?Sized>(&mut self, timers: &mut S, now: Instant) {
        let remaining = self.expiry.saturating_duration_since(now);
        let early = remaining / 2;

        if early >= self.min_early_loss {
            stop_timer(timers, &mut self.early_timer);
            self.early_timer = Some(timers.start(TimerToken::EarlyLoss(self.handle), early));
            self.state = SupervisionState::EarlyWaiting;
            debug!(physical_link = %self.handle, ?early, "early loss timer armed");
        } else {
            stop_timer(timers, &mut self.loss_timer);
            self.loss_timer = Some(timers.start(TimerToken::Loss(self.handle), remaining));
            self.state = SupervisionState::FinalWaiting;
            debug!(physical_link = %self.handle, ?remaining, "loss timer armed");
        }
    }

    /// Early loss timer fired. Returns `None` for a stale expiry.
    pub fn on_early_loss_timer<S: TimerService + ?Sized>(
        &mut self,
        timers: &mut S,
        handle: TimerHandle,
        now: Instant,
    ) -> Option<SupervisionVerdict> {
        if self.early_timer != Some(handle) {
            return None;
        }
        self.early_timer = None;

        let remaining = self.expiry.saturating_duration_since(now);
        let verdict = if self.alive && remaining > self.min_early_loss {
            self.alive = false;
            SupervisionVerdict::StillAlive
        } else {
            SupervisionVerdict::EarlyLoss
        };
        self.arm(timers, now);
        Some(verdict)
    }

    /// Final loss timer fired. Returns `None` for a stale expiry.
    pub fn on_loss_timer<S: TimerService + ?Sized>(
        &mut self,
        timers: &mut S,
        handle: TimerHandle,
        now: Instant,
    ) -> Option<SupervisionVerdict> {
        if self.loss_timer != Some(handle) {
            return None;
        }
        self.loss_timer = None;

        if self.alive {
            self.restart(timers, now);
            Some(SupervisionVerdict::StillAlive)
        } else {
            self.stop(timers);
            Some(SupervisionVerdict::Lost)
        }
    }
}

fn check_deadline(timeout: Duration, now: Instant) -> Result<()> {
    now.checked_add(timeout).map(|_| ()).ok_or_else(|| {
        DataManagerError::InvalidParameter(format!("supervision timeout {timeout:?} out of range"))
    })
}

/// Fixed-capacity supervision slots keyed by physical link handle.
#[derive(Debug)]
pub struct SupervisionTable {
    slots: Vec<Option<LinkSupervisionEntry>>,
    min_early_loss: Duration,
}

impl SupervisionTable {
    /// Table with `capacity` free slots.
    pub fn new(capacity: usize, min_early_loss: Duration) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            min_early_loss,
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn active(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Entry of a physical link.
    pub fn get(&self, handle: PhysicalLinkHandle) -> Option<&LinkSupervisionEntry> {
        self.slots.iter().flatten().find(|e| e.handle == handle)
    }

    /// Entry of a physical link, mutably.
    pub fn get_mut(&mut self, handle: PhysicalLinkHandle) -> Option<&mut LinkSupervisionEntry> {
        self.slots.iter_mut().flatten().find(|e| e.handle == handle)
    }

    /// Whether a physical link is supervised.
    pub fn contains(&self, handle: PhysicalLinkHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Configure supervision for a physical link, taking a slot if needed.
    ///
    /// Returns `true` when this made the first slot of the table active.
    pub fn set<S: TimerService + ?Sized>(
        &mut self,
        timers: &mut S,
        handle: PhysicalLinkHandle,
        timeout: Duration,
        now: Instant,
    ) -> Result<bool> {
        check_deadline(timeout, now)?;
        let first_active = self.active() == 0;

        if self.get(handle).is_none() {
            let min_early_loss = self.min_early_loss;
            let slot = self
                .slots
                .iter_mut()
                .find(|s| s.is_none())
                .ok_or(DataManagerError::SupervisionSlotsExhausted)?;
            *slot = Some(LinkSupervisionEntry::new(handle, min_early_loss, now));
        }

        let entry = self
            .get_mut(handle)
            .ok_or(DataManagerError::UnknownPhysicalLink(handle))?;
        entry.users += 1;
        entry.set_timeout(timers, timeout, now);
        Ok(first_active)
    }

    /// Change the timeout of a supervised physical link.
    pub fn modify<S: TimerService + ?Sized>(
        &mut self,
        timers: &mut S,
        handle: PhysicalLinkHandle,
        timeout: Duration,
        now: Instant,
    ) -> Result<()> {
        check_deadline(timeout, now)?;
        let entry = self
            .get_mut(handle)
            .ok_or(DataManagerError::UnknownPhysicalLink(handle))?;
        entry.set_timeout(timers, timeout, now);
        Ok(())
    }

    /// Release one user of a physical link's entry, freeing the slot with the
    /// last one.
    ///
    /// Returns `true` when no slot is active afterwards.
    pub fn remove<S: TimerService + ?Sized>(
        &mut self,
        timers: &mut S,
        handle: PhysicalLinkHandle,
    ) -> Result<bool> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.as_ref().is_some_and(|e| e.handle == handle))
            .ok_or(DataManagerError::UnknownPhysicalLink(handle))?;

        if let Some(entry) = slot.as_mut() {
            entry.users = entry.users.saturating_sub(1);
            if entry.users == 0 {
                entry.stop(timers);
                *slot = None;
            }
        }
        Ok(self.active() == 0)
    }

    /// Stop every timer and free every slot.
    pub fn clear<S: TimerService + ?Sized>(&mut self, timers: &mut S) {
        for slot in &mut self.slots {
            if let Some(entry) = slot.as_mut() {
                entry.stop(timers);
            }
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MIN_EARLY_LOSS_DURATION;
    use crate::manager::testing::ManualTimers;

    fn phys(raw: u8) -> PhysicalLinkHandle {
        PhysicalLinkHandle::new(raw).unwrap()
    }

    fn table() -> SupervisionTable {
        SupervisionTable::new(2, MIN_EARLY_LOSS_DURATION)
    }

    #[test]
    fn test_set_arms_early_timer_at_half() {
        let mut timers = ManualTimers::new();
        let mut table = table();
        let now = Instant::now();

        let first = table.set(&mut timers, phys(1), Duration::from_secs(4), now).unwrap();
        assert!(first);

        let entry = table.get(phys(1)).unwrap();
        assert_eq!(entry.state(), SupervisionState::EarlyWaiting);
        assert!(!entry.is_alive());
        assert_eq!(
            timers.delay_of(TimerToken::EarlyLoss(phys(1))),
            Some(Duration::from_secs(2))
        );
    }

    #[test]
    fn test_short_timeout_goes_straight_to_final() {
        let mut timers = ManualTimers::new();
        let mut table = table();
        let now = Instant::now();

        table.set(&mut timers, phys(1), Duration::from_millis(1500), now).unwrap();
        let entry = table.get(phys(1)).unwrap();
        assert_eq!(entry.state(), SupervisionState::FinalWaiting);
        assert_eq!(
            timers.delay_of(TimerToken::Loss(phys(1))),
            Some(Duration::from_millis(1500))
        );
        assert!(!timers.is_running(TimerToken::EarlyLoss(phys(1))));
    }

    #[test]
    fn test_no_traffic_chain_reports_early_loss_then_lost() {
        let mut timers = ManualTimers::new();
        let mut table = table();
        let t0 = Instant::now();
        table.set(&mut timers, phys(1), Duration::from_secs(2), t0).unwrap();

        let early = timers.fire(TimerToken::EarlyLoss(phys(1))).unwrap();
        let entry = table.get_mut(phys(1)).unwrap();
        let verdict = entry.on_early_loss_timer(&mut timers, early, t0 + Duration::from_secs(1));
        assert_eq!(verdict, Some(SupervisionVerdict::EarlyLoss));
        assert_eq!(entry.state(), SupervisionState::FinalWaiting);
        assert_eq!(
            timers.delay_of(TimerToken::Loss(phys(1))),
            Some(Duration::from_secs(1))
        );

        let loss = timers.fire(TimerToken::Loss(phys(1))).unwrap();
        let verdict = entry.on_loss_timer(&mut timers, loss, t0 + Duration::from_secs(2));
        assert_eq!(verdict, Some(SupervisionVerdict::Lost));
        assert_eq!(entry.state(), SupervisionState::Idle);
        assert_eq!(timers.running(), 0);
    }

    #[test]
    fn test_traffic_keeps_link_alive() {
        let mut timers = ManualTimers::new();
        let mut table = table();
        let t0 = Instant::now();
        table.set(&mut timers, phys(1), Duration::from_secs(8), t0).unwrap();

        let t1 = t0 + Duration::from_secs(1);
        let entry = table.get_mut(phys(1)).unwrap();
        entry.mark_alive(&mut timers, t1);
        assert!(entry.is_alive());
        assert_eq!(entry.expiry(), t1 + Duration::from_secs(8));

        // Early timer rearmed from the new expiry; the alive latch passes once.
        let early = timers.fire(TimerToken::EarlyLoss(phys(1))).unwrap();
        let t2 = t1 + Duration::from_secs(4);
        let verdict = entry.on_early_loss_timer(&mut timers, early, t2);
        assert_eq!(verdict, Some(SupervisionVerdict::StillAlive));
        assert!(!entry.is_alive());
        assert_eq!(
            timers.delay_of(TimerToken::EarlyLoss(phys(1))),
            Some(Duration::from_secs(2))
        );
    }

    #[test]
    fn test_loss_timer_restarts_chain_when_alive() {
        let mut timers = ManualTimers::new();
        let mut table = table();
        let t0 = Instant::now();
        table.set(&mut timers, phys(1), Duration::from_millis(1200), t0).unwrap();

        let entry = table.get_mut(phys(1)).unwrap();
        entry.mark_alive(&mut timers, t0);
        let loss = timers.fire(TimerToken::Loss(phys(1))).unwrap();

        let t1 = t0 + Duration::from_millis(1200);
        let verdict = entry.on_loss_timer(&mut timers, loss, t1);
        assert_eq!(verdict, Some(SupervisionVerdict::StillAlive));
        assert_eq!(entry.state(), SupervisionState::FinalWaiting);
        assert_eq!(entry.expiry(), t1 + Duration::from_millis(1200));
    }

    #[test]
    fn test_stale_expiry_ignored() {
        let mut timers = ManualTimers::new();
        let mut table = table();
        let t0 = Instant::now();
        table.set(&mut timers, phys(1), Duration::from_secs(4), t0).unwrap();

        let old = timers.handle_of(TimerToken::EarlyLoss(phys(1))).unwrap();
        let entry = table.get_mut(phys(1)).unwrap();
        entry.mark_alive(&mut timers, t0);

        assert_eq!(entry.on_early_loss_timer(&mut timers, old, t0), None);
        assert_eq!(entry.on_loss_timer(&mut timers, old, t0), None);
        assert!(entry.is_alive());
    }

    #[test]
    fn test_slots_and_reference_counts() {
        let mut timers = ManualTimers::new();
        let mut table = table();
        let now = Instant::now();
        let timeout = Duration::from_secs(4);

        assert!(table.set(&mut timers, phys(1), timeout, now).unwrap());
        assert!(!table.set(&mut timers, phys(1), timeout, now).unwrap());
        assert!(!table.set(&mut timers, phys(2), timeout, now).unwrap());
        assert_eq!(
            table.set(&mut timers, phys(3), timeout, now),
            Err(DataManagerError::SupervisionSlotsExhausted)
        );
        assert_eq!(table.get(phys(1)).unwrap().users(), 2);

        assert!(!table.remove(&mut timers, phys(1)).unwrap());
        assert!(table.contains(phys(1)));
        assert!(!table.remove(&mut timers, phys(1)).unwrap());
        assert!(!table.contains(phys(1)));
        assert!(table.remove(&mut timers, phys(2)).unwrap());
        assert_eq!(timers.running(), 0);

        assert_eq!(
            table.remove(&mut timers, phys(2)),
            Err(DataManagerError::UnknownPhysicalLink(phys(2)))
        );
    }

    #[test]
    fn test_alive_early_expiry_near_deadline_reports_early_loss() {
        let mut timers = ManualTimers::new();
        let mut table = table();
        let t0 = Instant::now();
        table.set(&mut timers, phys(1), Duration::from_secs(4), t0).unwrap();

        let entry = table.get_mut(phys(1)).unwrap();
        entry.mark_alive(&mut timers, t0);
        assert_eq!(
            timers.delay_of(TimerToken::EarlyLoss(phys(1))),
            Some(Duration::from_secs(2))
        );

        // fires late: only 800ms of the 4s window left
        let early = timers.fire(TimerToken::EarlyLoss(phys(1))).unwrap();
        let late = t0 + Duration::from_millis(3200);
        let verdict = entry.on_early_loss_timer(&mut timers, early, late);
        assert_eq!(verdict, Some(SupervisionVerdict::EarlyLoss));
        assert_eq!(entry.state(), SupervisionState::FinalWaiting);
        assert_eq!(
            timers.delay_of(TimerToken::Loss(phys(1))),
            Some(Duration::from_millis(800))
        );
        assert!(!timers.is_running(TimerToken::EarlyLoss(phys(1))));
    }

    #[test]
    fn test_unrepresentable_timeout_rejected() {
        let mut timers = ManualTimers::new();
        let mut table = table();
        let now = Instant::now();

        assert!(matches!(
            table.set(&mut timers, phys(1), Duration::MAX, now),
            Err(DataManagerError::InvalidParameter(_))
        ));
        assert_eq!(table.active(), 0);

        table.set(&mut timers, phys(1), Duration::from_secs(4), now).unwrap();
        assert!(matches!(
            table.modify(&mut timers, phys(1), Duration::MAX, now),
            Err(DataManagerError::InvalidParameter(_))
        ));
        let entry = table.get(phys(1)).unwrap();
        assert_eq!(entry.timeout(), Duration::from_secs(4));
        assert_eq!(entry.users(), 1);
        assert_eq!(timers.running(), 1);
    }

    #[test]
    fn test_zero_timeout_disables() {
        let mut timers = ManualTimers::new();
        let mut table = table();
        let now = Instant::now();
        table.set(&mut timers, phys(1), Duration::from_secs(4), now).unwrap();
        table.modify(&mut timers, phys(1), Duration::ZERO, now).unwrap();

        assert_eq!(table.get(phys(1)).unwrap().state(), SupervisionState::Idle);
        assert_eq!(timers.running(), 0);
    }
}
