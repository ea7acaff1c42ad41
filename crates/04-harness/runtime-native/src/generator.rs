//! Synthetic load generator.
//!
//! Manufactures payloads of a target size for harness runs: an 8-byte
//! little-endian sequence stamp (when the payload has room for one)
//! followed by random fill, so receivers can verify ordering and loss.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use transport::MTU;

pub struct LoadGenerator {
    payload_bytes: usize,
    seq: u64,
    rng: SmallRng,
}

impl LoadGenerator {
    /// Target sizes above the MTU are clamped; the transport would reject
    /// them anyway.
    pub fn new(payload_bytes: usize) -> Self {
        Self::with_seed(payload_bytes, rand::random())
    }

    pub fn with_seed(payload_bytes: usize, seed: u64) -> Self {
        Self {
            payload_bytes: payload_bytes.min(MTU),
            seq: 0,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn next_payload(&mut self) -> Vec<u8> {
        let mut payload = vec![0u8; self.payload_bytes];
        self.rng.fill(payload.as_mut_slice());
        if payload.len() >= 8 {
            payload[..8].copy_from_slice(&self.seq.to_le_bytes());
        }
        self.seq += 1;
        payload
    }

    /// Payloads produced so far.
    pub fn produced(&self) -> u64 {
        self.seq
    }
}

/// Reads the sequence stamp back out of a generated payload.
pub fn sequence_of(payload: &[u8]) -> Option<u64> {
    let stamp = payload.get(..8)?;
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(stamp);
    Some(u64::from_le_bytes(bytes))
}
