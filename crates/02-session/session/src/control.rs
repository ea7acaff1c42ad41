//! Launcher/observer control surface.

use std::time::Duration;

use serde::Serialize;

/// Commands issued by the launcher to the coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlMsg {
    /// Begin generating synthetic payloads of `payload_bytes` for `duration`.
    Start {
        payload_bytes: usize,
        duration: Duration,
    },
    /// Stop generating and drain the in-flight batch.
    Stop,
}

/// Counters published to the observer while a session runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Payloads currently waiting in the outbound queue.
    pub queue_depth: usize,
    /// Payloads accepted by `enqueue`.
    pub enqueued: u64,
    /// Payloads rejected for exceeding the MTU.
    pub rejected_oversize: u64,
    /// Payloads rejected because the queue was at capacity.
    pub rejected_full: u64,
    /// Batches written into the region.
    pub batches_written: u64,
    /// Messages carried by those batches.
    pub messages_sent: u64,
    /// Raw payload bytes carried by those batches.
    pub bytes_sent: u64,
    /// Batch acknowledgments received over the reverse channel.
    pub acks_received: u64,
    /// Application payloads received from the agent over the reverse channel.
    pub uplink_data: u64,
}
