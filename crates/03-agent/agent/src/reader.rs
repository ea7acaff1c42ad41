//! Blocking batch-decode loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;
use transport::{RegionReader, TransportError, UplinkSender};

use crate::sink::MessageSink;

/// Reader tunables.
#[derive(Clone, Copy, Debug)]
pub struct ReaderConfig {
    /// Bound on each blocking wait. Exists purely so the loop re-checks the
    /// stop flag; no data can be lost between iterations because the flag
    /// word guards it.
    pub poll_timeout: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(20),
        }
    }
}

/// Final counters from one reader run, plus the sink for inspection.
#[derive(Debug)]
pub struct ReaderRun<S> {
    pub sink: S,
    /// Messages delivered to the sink, across all batches.
    pub messages_delivered: u64,
    /// Batches consumed and acknowledged (malformed discards included).
    pub batches_consumed: u64,
}

/// The constrained agent's read loop over the shared region.
pub struct InboundReader<S> {
    region: RegionReader,
    uplink: UplinkSender,
    sink: S,
    stop: Arc<AtomicBool>,
    config: ReaderConfig,
}

impl<S: MessageSink> InboundReader<S> {
    pub fn new(region: RegionReader, uplink: UplinkSender, sink: S, stop: Arc<AtomicBool>) -> Self {
        Self::with_config(region, uplink, sink, stop, ReaderConfig::default())
    }

    pub fn with_config(
        region: RegionReader,
        uplink: UplinkSender,
        sink: S,
        stop: Arc<AtomicBool>,
        config: ReaderConfig,
    ) -> Self {
        Self {
            region,
            uplink,
            sink,
            stop,
            config,
        }
    }

    /// Acknowledges the region handoff, then blocks on the flag word until
    /// the stop flag is raised or the coordinator goes away.
    ///
    /// Exactly one acknowledgment is emitted per consumed batch, never per
    /// message, and a zero-message batch is delivered (as nothing) and
    /// acknowledged like any other. A malformed batch is discarded with a
    /// negative acknowledgment so the coordinator's flow control keeps
    /// moving; the region has already reset the flag by then.
    pub fn run(mut self) -> ReaderRun<S> {
        let mut messages_delivered = 0u64;
        let mut batches_consumed = 0u64;

        if self.uplink.ack(true).is_err() {
            return ReaderRun {
                sink: self.sink,
                messages_delivered,
                batches_consumed,
            };
        }

        while !self.stop.load(Ordering::Acquire) {
            match self.region.read_batch(self.config.poll_timeout) {
                Ok(Some(messages)) => {
                    for payload in messages {
                        self.sink.deliver(payload);
                        messages_delivered += 1;
                    }
                    batches_consumed += 1;
                    if self.uplink.ack(true).is_err() {
                        // Coordinator gone; nothing left to acknowledge to.
                        break;
                    }
                }
                // Timeout or spurious wake: re-check the stop flag and wait
                // again. This is expected control flow, not an error.
                Ok(None) => {}
                Err(err @ TransportError::MalformedBatch { .. }) => {
                    warn!(%err, "discarding malformed batch");
                    batches_consumed += 1;
                    if self.uplink.ack(false).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    // Read never reports payload/batch size errors; keep the
                    // loop alive if that ever changes.
                    warn!(%err, "unexpected transport error on read");
                }
            }
        }

        ReaderRun {
            sink: self.sink,
            messages_delivered,
            batches_consumed,
        }
    }
}
