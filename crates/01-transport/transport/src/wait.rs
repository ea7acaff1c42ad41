//! Atomic wait/notify shims used by the region's flag word.
//!
//! Native targets park on the flag word's address via `parking_lot_core`
//! (futex-backed where available), which carries the deadline the blocking
//! read loop needs. Web workers park on wasm linear-memory atomics via
//! `memory_atomic_wait32`, which takes the timeout directly.

use std::sync::atomic::AtomicU32;
use std::time::Duration;

/// Result of attempting to wait on an atomic location.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitResult {
    /// A notify woke the caller while the value still matched.
    Woken,
    /// The value no longer matched when the wait was attempted.
    NotEqual,
    /// The timeout elapsed before a notify was observed.
    TimedOut,
}

#[cfg(not(target_arch = "wasm32"))]
mod imp {
    use super::{AtomicU32, Duration, WaitResult};
    use parking_lot_core::{ParkResult, DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};
    use std::sync::atomic::Ordering;
    use std::time::Instant;

    #[inline]
    fn key(atomic: &AtomicU32) -> usize {
        atomic as *const AtomicU32 as usize
    }

    pub(crate) fn wait_timeout(atomic: &AtomicU32, expected: u32, timeout: Duration) -> WaitResult {
        let deadline = Instant::now().checked_add(timeout);
        // SAFETY: the callbacks do not panic and do not re-enter
        // parking_lot_core. The validate closure runs under the bucket lock,
        // so a wake issued after a failed validation cannot be lost.
        let result = unsafe {
            parking_lot_core::park(
                key(atomic),
                || atomic.load(Ordering::Acquire) == expected,
                || {},
                |_, _| {},
                DEFAULT_PARK_TOKEN,
                deadline,
            )
        };
        match result {
            ParkResult::Unparked(_) => WaitResult::Woken,
            ParkResult::Invalid => WaitResult::NotEqual,
            ParkResult::TimedOut => WaitResult::TimedOut,
        }
    }

    pub(crate) fn wake_one(atomic: &AtomicU32) -> u32 {
        // SAFETY: the callback does not panic and does not re-enter
        // parking_lot_core.
        let result = unsafe { parking_lot_core::unpark_one(key(atomic), |_| DEFAULT_UNPARK_TOKEN) };
        result.unparked_threads as u32
    }

    pub(crate) fn wake_all(atomic: &AtomicU32) -> u32 {
        // SAFETY: as above.
        (unsafe { parking_lot_core::unpark_all(key(atomic), DEFAULT_UNPARK_TOKEN) }) as u32
    }
}

#[cfg(target_arch = "wasm32")]
mod imp {
    use super::{AtomicU32, Duration, WaitResult};
    use core::arch::wasm32::{memory_atomic_notify, memory_atomic_wait32};

    pub(crate) fn wait_timeout(atomic: &AtomicU32, expected: u32, timeout: Duration) -> WaitResult {
        let timeout_ns = i64::try_from(timeout.as_nanos()).unwrap_or(i64::MAX);
        // SAFETY: the atomic resides in the shared linear memory backing the
        // transport region.
        let result = unsafe {
            memory_atomic_wait32(atomic as *const _ as *mut i32, expected as i32, timeout_ns)
        };
        const WAIT_OK: i32 = 0;
        const WAIT_NOT_EQUAL: i32 = 1;
        const WAIT_TIMED_OUT: i32 = 2;
        match result {
            WAIT_OK => WaitResult::Woken,
            WAIT_NOT_EQUAL => WaitResult::NotEqual,
            WAIT_TIMED_OUT => WaitResult::TimedOut,
            _ => WaitResult::NotEqual,
        }
    }

    pub(crate) fn wake_one(atomic: &AtomicU32) -> u32 {
        // SAFETY: pointer addresses the same shared linear memory used for waits.
        unsafe { memory_atomic_notify(atomic as *const _ as *mut i32, 1) }
    }

    pub(crate) fn wake_all(atomic: &AtomicU32) -> u32 {
        // SAFETY: as above.
        unsafe { memory_atomic_notify(atomic as *const _ as *mut i32, u32::MAX) }
    }
}

/// Blocks until the atomic no longer holds `expected`, a wake arrives, or
/// `timeout` elapses. A timeout is expected control flow, not an error.
#[inline]
pub fn wait_timeout(atomic: &AtomicU32, expected: u32, timeout: Duration) -> WaitResult {
    imp::wait_timeout(atomic, expected, timeout)
}

/// Wakes at most one waiter parked on `atomic`.
#[inline]
pub fn wake_one(atomic: &AtomicU32) -> u32 {
    imp::wake_one(atomic)
}

/// Wakes all waiters parked on `atomic`.
#[inline]
pub fn wake_all(atomic: &AtomicU32) -> u32 {
    imp::wake_all(atomic)
}
