//! Recording transport and manually driven timers for unit tests.

use std::time::Duration;

use bytes::Bytes;

use crate::core::{RequestId, TimerHandle, TimerService, TimerToken, TrafficClass, Transport};

#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    pub capability_queries: usize,
    pub sent: Vec<(RequestId, TrafficClass, Bytes)>,
    pub cancels: Vec<RequestId>,
    pub subscribed: bool,
    pub subscribe_calls: usize,
    pub unsubscribe_calls: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for MockTransport {
    fn query_capabilities(&mut self) {
        self.capability_queries += 1;
    }

    fn send_frame(&mut self, request_id: RequestId, class: TrafficClass, payload: Bytes) {
        self.sent.push((request_id, class, payload));
    }

    fn cancel(&mut self, request_id: RequestId) {
        self.cancels.push(request_id);
    }

    fn subscribe_inbound(&mut self) {
        self.subscribed = true;
        self.subscribe_calls += 1;
    }

    fn unsubscribe_inbound(&mut self) {
        self.subscribed = false;
        self.unsubscribe_calls += 1;
    }
}

/// Timers that only fire when a test says so.
#[derive(Debug, Default)]
pub(crate) struct ManualTimers {
    next: u64,
    armed: Vec<(TimerHandle, TimerToken, Duration)>,
    pub cancelled: usize,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn running(&self) -> usize {
        self.armed.len()
    }

    pub fn count_for(&self, token: TimerToken) -> usize {
        self.armed.iter().filter(|(_, t, _)| *t == token).count()
    }

    pub fn is_running(&self, token: TimerToken) -> bool {
        self.count_for(token) > 0
    }

    pub fn handle_of(&self, token: TimerToken) -> Option<TimerHandle> {
        self.armed.iter().rev().find(|(_, t, _)| *t == token).map(|(h, _, _)| *h)
    }

    pub fn delay_of(&self, token: TimerToken) -> Option<Duration> {
        self.armed.iter().rev().find(|(_, t, _)| *t == token).map(|(_, _, d)| *d)
    }

    /// Remove the timer as if it fired, returning the handle to deliver.
    pub fn fire(&mut self, token: TimerToken) -> Option<TimerHandle> {
        let pos = self.armed.iter().position(|(_, t, _)| *t == token)?;
        Some(self.armed.remove(pos).0)
    }
}

impl TimerService for ManualTimers {
    fn start(&mut self, token: TimerToken, delay: Duration) -> TimerHandle {
        self.next += 1;
        let handle = TimerHandle(self.next);
        self.armed.push((handle, token, delay));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(pos) = self.armed.iter().position(|(h, _, _)| *h == handle) {
            self.armed.remove(pos);
            self.cancelled += 1;
        }
    }
}
