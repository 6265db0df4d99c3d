//! Data path counters.

/// Counters updated alongside the data manager's decisions.
///
/// Purely observational; nothing reads them back to steer the algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataStats {
    /// Frames admitted for transmission.
    pub frames_admitted: u64,
    /// Frames refused because the class had no credit.
    pub frames_rejected_no_credit: u64,
    /// Completions reporting successful delivery.
    pub frames_delivered: u64,
    /// Completions reporting failure or discard.
    pub frames_failed: u64,
    /// Cancel requests issued to the transport.
    pub cancels_issued: u64,
    /// Flush rounds that discarded at least one packet.
    pub flushes_occurred: u64,
    /// QoS violation indications raised.
    pub qos_violations: u64,
    /// Completions dropped as protocol anomalies.
    pub confirm_anomalies: u64,
    /// Early link loss indications raised.
    pub early_link_losses: u64,
    /// Physical links reported lost.
    pub links_lost: u64,
    /// Inbound frames forwarded upward.
    pub frames_received: u64,
    /// Inbound frames dropped.
    pub frames_dropped: u64,
}
