//! Reverse channel: constrained agent -> coordinator.
//!
//! Carries both application payloads and the per-batch acknowledgment that
//! drives the coordinator's flow control. Delivery is reliable and ordered;
//! no backpressure is applied in this direction because the coordinator
//! always drains it asynchronously, while the constrained agent cannot
//! service callbacks at all.

use crossbeam_channel::{unbounded, Receiver, Sender};
use thiserror::Error;

/// Message kinds carried by the reverse channel, demultiplexed by the
/// coordinator's handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Uplink {
    /// One application payload from the constrained agent.
    Data(Vec<u8>),
    /// An ordered group of application payloads.
    DataBatch(Vec<Vec<u8>>),
    /// Batch-consumed acknowledgment. `true` means the batch was delivered
    /// to the agent's sink; `false` means it was discarded (malformed) but
    /// the slot is free again either way.
    Ack(bool),
}

/// The coordinator has gone away; without acknowledgments no flow control
/// is possible, so this is fatal to the session.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("reverse channel closed")]
pub struct UplinkClosed;

/// Constrained-agent endpoint of the reverse channel.
#[derive(Clone)]
pub struct UplinkSender {
    tx: Sender<Uplink>,
}

impl UplinkSender {
    /// Sends one application payload.
    pub fn send(&self, payload: Vec<u8>) -> Result<(), UplinkClosed> {
        self.tx.send(Uplink::Data(payload)).map_err(|_| UplinkClosed)
    }

    /// Sends an ordered group of application payloads as one message.
    pub fn send_batch(&self, payloads: Vec<Vec<u8>>) -> Result<(), UplinkClosed> {
        self.tx
            .send(Uplink::DataBatch(payloads))
            .map_err(|_| UplinkClosed)
    }

    /// Acknowledges one consumed batch.
    pub fn ack(&self, delivered: bool) -> Result<(), UplinkClosed> {
        self.tx.send(Uplink::Ack(delivered)).map_err(|_| UplinkClosed)
    }
}

/// Coordinator endpoint, drained inside its event loop.
pub type UplinkReceiver = Receiver<Uplink>;

/// Builds the reverse channel for one session.
pub fn uplink_channel() -> (UplinkSender, UplinkReceiver) {
    let (tx, rx) = unbounded();
    (UplinkSender { tx }, rx)
}
