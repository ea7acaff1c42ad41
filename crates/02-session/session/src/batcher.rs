//! Outbound queue and batch assembly.

use std::collections::VecDeque;

use smallvec::SmallVec;
use thiserror::Error;
use transport::{RegionWriter, TransportResult, LEN_PREFIX, MAX_BATCH_SIZE, MTU, PAYLOAD_CAPACITY};

/// Bound on the outbound queue. Enqueue past this is rejected with a
/// backpressure signal rather than blocking or silently dropping, so the
/// coordinator's event loop never stalls.
pub const MAX_QUEUE_SIZE: usize = 200;

/// Synchronous enqueue rejections. Neither variant affects queued entries
/// or the resident batch.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("payload of {len} bytes exceeds the {max} byte MTU")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("outbound queue is at capacity ({capacity})")]
    QueueFull { capacity: usize },
}

/// Outcome of one flush attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushOutcome {
    /// One batch was written into the region.
    Written { messages: usize, bytes: usize },
    /// A previous batch is still unread; the next acknowledgment retries.
    RegionBusy,
    /// Nothing queued.
    Idle,
}

/// Coordinator-owned FIFO of pending payloads plus the region writer.
///
/// `try_flush` never writes more than one batch: the single-slot region
/// cannot hold a second one, so after a successful write the remainder of
/// the queue waits for `on_ack`.
pub struct OutboundBatcher {
    writer: RegionWriter,
    queue: VecDeque<Vec<u8>>,
    capacity: usize,
    pub(crate) enqueued: u64,
    pub(crate) rejected_oversize: u64,
    pub(crate) rejected_full: u64,
    pub(crate) batches_written: u64,
    pub(crate) messages_sent: u64,
    pub(crate) bytes_sent: u64,
}

impl OutboundBatcher {
    pub fn new(writer: RegionWriter) -> Self {
        Self::with_capacity(writer, MAX_QUEUE_SIZE)
    }

    pub fn with_capacity(writer: RegionWriter, capacity: usize) -> Self {
        Self {
            writer,
            queue: VecDeque::with_capacity(capacity.min(MAX_QUEUE_SIZE)),
            capacity,
            enqueued: 0,
            rejected_oversize: 0,
            rejected_full: 0,
            batches_written: 0,
            messages_sent: 0,
            bytes_sent: 0,
        }
    }

    /// Appends a payload to the bounded queue.
    pub fn enqueue(&mut self, payload: Vec<u8>) -> Result<(), EnqueueError> {
        if payload.len() > MTU {
            self.rejected_oversize += 1;
            return Err(EnqueueError::PayloadTooLarge {
                len: payload.len(),
                max: MTU,
            });
        }
        if self.queue.len() >= self.capacity {
            self.rejected_full += 1;
            return Err(EnqueueError::QueueFull {
                capacity: self.capacity,
            });
        }
        self.queue.push_back(payload);
        self.enqueued += 1;
        Ok(())
    }

    /// Writes at most one batch when the region is free.
    pub fn try_flush(&mut self) -> TransportResult<FlushOutcome> {
        if self.queue.is_empty() {
            return Ok(FlushOutcome::Idle);
        }
        if !self.writer.is_writable() {
            return Ok(FlushOutcome::RegionBusy);
        }

        let mut staged: SmallVec<[Vec<u8>; MAX_BATCH_SIZE]> = SmallVec::new();
        let mut packed = 0usize;
        let mut bytes = 0usize;
        while staged.len() < MAX_BATCH_SIZE {
            match self.queue.front() {
                Some(front) if packed + LEN_PREFIX + front.len() <= PAYLOAD_CAPACITY => {
                    packed += LEN_PREFIX + front.len();
                    bytes += front.len();
                    if let Some(payload) = self.queue.pop_front() {
                        staged.push(payload);
                    }
                }
                _ => break,
            }
        }

        self.writer.write_batch(&staged)?;
        self.batches_written += 1;
        self.messages_sent += staged.len() as u64;
        self.bytes_sent += bytes as u64;
        tracing::trace!(messages = staged.len(), bytes, "batch written");
        Ok(FlushOutcome::Written {
            messages: staged.len(),
            bytes,
        })
    }

    /// Steady-state flush trigger, invoked when an acknowledgment reports a
    /// consumed batch.
    pub fn on_ack(&mut self) -> TransportResult<FlushOutcome> {
        self.try_flush()
    }

    /// Discards every queued payload and returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    /// True while a written batch has not been consumed yet.
    pub fn in_flight(&self) -> bool {
        !self.writer.is_writable()
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
