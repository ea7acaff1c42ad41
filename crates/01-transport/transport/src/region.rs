//! Single-slot shared region and its flag-word handoff protocol.
//!
//! The region is created once by the coordinator and shared with the
//! constrained agent. A single atomic flag word arbitrates the whole
//! payload area: `0` means the coordinator may write the next batch, `1`
//! means exactly one unread batch is resident. There is no ring buffer and
//! no lock; the release/acquire transitions of the flag order every other
//! access, and the out-of-band acknowledgment tells the coordinator when
//! the slot came free.

use std::cell::UnsafeCell;
use std::mem;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::batch;
use crate::constants::{FLAG_EMPTY, FLAG_FULL, HEADER_SIZE, PAYLOAD_CAPACITY, REGION_SIZE};
use crate::wait::{self, WaitResult};
use crate::TransportResult;

/// Header mirrored at offset zero of the shared byte layout.
///
/// Four little-endian words: flag, packed payload byte count, message
/// count, reserved padding. Only the flag is touched by both sides at once;
/// the count words are published before the empty -> full transition and
/// read after observing it, so the flag's release/acquire pair orders them.
#[repr(C, align(4))]
struct RegionHeader {
    flag: AtomicU32,
    payload_bytes: AtomicU32,
    message_count: AtomicU32,
    _reserved: u32,
}

const _: () = assert!(mem::size_of::<RegionHeader>() == HEADER_SIZE);

/// The fixed-size shared memory region backing one session. `repr(C)`
/// fixes the header-then-payload order of the wire layout.
#[repr(C)]
pub struct TransportRegion {
    header: RegionHeader,
    payload: UnsafeCell<[u8; PAYLOAD_CAPACITY]>,
}

const _: () = assert!(mem::size_of::<TransportRegion>() == REGION_SIZE);

// SAFETY: payload access alternates between the single writer (while the
// flag is empty) and the single reader (while it is full); the flag's
// release/acquire transitions order every payload access, and the writer
// and reader capabilities below are not cloneable.
unsafe impl Sync for TransportRegion {}

impl TransportRegion {
    /// Allocates the zeroed region and splits it into its two side
    /// capabilities. The [`RegionReader`] is the handle handed to the
    /// constrained agent during the handshake.
    pub fn allocate() -> (RegionWriter, RegionReader) {
        let region = Arc::new(TransportRegion {
            header: RegionHeader {
                flag: AtomicU32::new(FLAG_EMPTY),
                payload_bytes: AtomicU32::new(0),
                message_count: AtomicU32::new(0),
                _reserved: 0,
            },
            payload: UnsafeCell::new([0u8; PAYLOAD_CAPACITY]),
        });
        (
            RegionWriter {
                region: Arc::clone(&region),
            },
            RegionReader { region },
        )
    }

    fn is_writable(&self) -> bool {
        self.header.flag.load(Ordering::Acquire) == FLAG_EMPTY
    }

    fn write_batch<M: AsRef<[u8]>>(&self, messages: &[M]) -> TransportResult<()> {
        batch::check_limits(messages)?;

        let flag = self.header.flag.load(Ordering::Acquire);
        assert_eq!(
            flag, FLAG_EMPTY,
            "write_batch called while a batch is resident"
        );

        // SAFETY: the flag is empty, so the reader leaves the payload area
        // alone until the release store below publishes the batch.
        let payload = unsafe { &mut *self.payload.get() };
        let packed = batch::encode(payload, messages);

        self.header
            .payload_bytes
            .store(packed as u32, Ordering::Relaxed);
        self.header
            .message_count
            .store(messages.len() as u32, Ordering::Relaxed);
        self.header.flag.store(FLAG_FULL, Ordering::Release);
        wait::wake_one(&self.header.flag);
        Ok(())
    }

    fn read_batch(&self, timeout: Duration) -> TransportResult<Option<Vec<Vec<u8>>>> {
        if self.header.flag.load(Ordering::Acquire) == FLAG_EMPTY {
            match wait::wait_timeout(&self.header.flag, FLAG_EMPTY, timeout) {
                WaitResult::TimedOut => return Ok(None),
                WaitResult::Woken | WaitResult::NotEqual => {}
            }
            if self.header.flag.load(Ordering::Acquire) == FLAG_EMPTY {
                // Spurious wake: nothing resident, nothing to acknowledge.
                return Ok(None);
            }
        }

        let packed = self.header.payload_bytes.load(Ordering::Relaxed) as usize;
        let count = self.header.message_count.load(Ordering::Relaxed) as usize;

        // SAFETY: the flag is full, so the writer leaves the payload area
        // alone until the release store below hands the slot back.
        let payload = unsafe { &*self.payload.get() };
        let decoded = batch::decode(payload, packed, count);

        // The slot is handed back even when the header was malformed;
        // discarding the batch restores the invariant.
        self.header.flag.store(FLAG_EMPTY, Ordering::Release);

        decoded.map(Some)
    }

    #[cfg(test)]
    fn publish_raw_header(&self, packed: u32, count: u32) {
        self.header.payload_bytes.store(packed, Ordering::Relaxed);
        self.header.message_count.store(count, Ordering::Relaxed);
        self.header.flag.store(FLAG_FULL, Ordering::Release);
        wait::wake_one(&self.header.flag);
    }
}

/// Coordinator-side capability: sole writer of the payload bytes and of the
/// empty -> full flag transition. Not cloneable.
pub struct RegionWriter {
    region: Arc<TransportRegion>,
}

impl RegionWriter {
    /// True when the payload area is free for the next batch.
    pub fn is_writable(&self) -> bool {
        self.region.is_writable()
    }

    /// Packs `messages` into the payload area and publishes the batch with
    /// the empty -> full flag transition, waking a blocked reader.
    ///
    /// A zero-message batch is legal and still produces one handoff.
    ///
    /// # Panics
    ///
    /// Panics when a batch is still resident. Callers must check
    /// [`RegionWriter::is_writable`] first; writing over an unread batch is
    /// a protocol invariant violation, not a runtime condition.
    pub fn write_batch<M: AsRef<[u8]>>(&mut self, messages: &[M]) -> TransportResult<()> {
        self.region.write_batch(messages)
    }
}

/// Constrained-side capability: sole writer of the full -> empty flag
/// transition. Not cloneable.
pub struct RegionReader {
    region: Arc<TransportRegion>,
}

impl RegionReader {
    /// Blocks until a batch is resident or `timeout` elapses.
    ///
    /// `Ok(None)` means no data arrived in time (or the wake was spurious);
    /// the caller re-checks its shutdown signal and retries. On success all
    /// message bytes are copied into owned buffers before the flag returns
    /// to empty, so the coordinator may overwrite the region as soon as
    /// this call returns.
    ///
    /// A malformed header is reported as an error after the batch has been
    /// discarded and the flag reset, so the loop can log and continue.
    pub fn read_batch(&mut self, timeout: Duration) -> TransportResult<Option<Vec<Vec<u8>>>> {
        self.region.read_batch(timeout)
    }
}
