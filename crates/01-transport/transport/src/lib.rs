#![cfg_attr(target_arch = "wasm32", feature(stdarch_wasm_atomic_wait))]
//! Core primitives for the single-slot shared-memory transport.
//!
//! This crate holds the pieces both sides of the session depend on:
//! * [`TransportRegion`] – the fixed-size shared region and its flag-word
//!   handoff protocol, split into [`RegionWriter`] / [`RegionReader`]
//!   capabilities so each side can only perform its legal operations.
//! * [`uplink`] – the reliable, ordered reverse channel carrying agent
//!   application data and batch acknowledgments back to the coordinator.
//! * [`wait`] – atomic wait/notify shims with timeout support.
//! * [`TransportError`] – error surface for payload/batch/decode failures.

mod batch;
mod constants;
mod error;
mod region;
pub mod uplink;
pub mod wait;

pub use constants::{
    FLAG_EMPTY, FLAG_FULL, HEADER_SIZE, LEN_PREFIX, MAX_BATCH_BYTES, MAX_BATCH_SIZE, MTU,
    PAYLOAD_CAPACITY, REGION_SIZE,
};
pub use error::{TransportError, TransportResult};
pub use region::{RegionReader, RegionWriter, TransportRegion};
pub use uplink::{uplink_channel, Uplink, UplinkClosed, UplinkReceiver, UplinkSender};
