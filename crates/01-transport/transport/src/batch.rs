//! Packed batch layout shared by the writer and reader paths.
//!
//! The payload area holds a tightly packed sequence of
//! `[len: u32 LE][payload bytes]` entries, one per message. The header's
//! byte count declares the packed length in use, so framing overhead counts
//! against the payload area's capacity.

use crate::constants::{LEN_PREFIX, MAX_BATCH_SIZE, MTU, PAYLOAD_CAPACITY};
use crate::{TransportError, TransportResult};

/// Packed size of `messages` including the per-entry length prefixes.
pub(crate) fn packed_len<M: AsRef<[u8]>>(messages: &[M]) -> usize {
    messages
        .iter()
        .map(|m| LEN_PREFIX + m.as_ref().len())
        .sum()
}

/// Validates batch limits before anything touches the region.
pub(crate) fn check_limits<M: AsRef<[u8]>>(messages: &[M]) -> TransportResult<()> {
    for message in messages {
        let len = message.as_ref().len();
        if len > MTU {
            return Err(TransportError::PayloadTooLarge { len, max: MTU });
        }
    }
    let packed = packed_len(messages);
    if messages.len() > MAX_BATCH_SIZE || packed > PAYLOAD_CAPACITY {
        return Err(TransportError::BatchTooLarge {
            messages: messages.len(),
            packed,
        });
    }
    Ok(())
}

/// Packs `messages` into `buf` and returns the packed byte count.
///
/// Callers must have run [`check_limits`] first; the packed form always
/// fits `buf` afterwards.
pub(crate) fn encode<M: AsRef<[u8]>>(buf: &mut [u8], messages: &[M]) -> usize {
    let mut cursor = 0;
    for message in messages {
        let payload = message.as_ref();
        buf[cursor..cursor + LEN_PREFIX].copy_from_slice(&(payload.len() as u32).to_le_bytes());
        cursor += LEN_PREFIX;
        buf[cursor..cursor + payload.len()].copy_from_slice(payload);
        cursor += payload.len();
    }
    cursor
}

/// Decodes `count` entries out of the first `packed` bytes of `buf` into
/// owned buffers, in batch order.
///
/// Every inconsistency between the declared header values and the packed
/// entries is reported as [`TransportError::MalformedBatch`]; the caller
/// discards the batch and carries on.
pub(crate) fn decode(buf: &[u8], packed: usize, count: usize) -> TransportResult<Vec<Vec<u8>>> {
    let malformed = |reason: &'static str| TransportError::MalformedBatch {
        reason,
        bytes: packed as u32,
        messages: count as u32,
    };

    if packed > buf.len() {
        return Err(malformed("declared bytes exceed region capacity"));
    }
    if count > MAX_BATCH_SIZE {
        return Err(malformed("message count exceeds batch limit"));
    }

    let mut out = Vec::with_capacity(count);
    let mut cursor = 0;
    for _ in 0..count {
        if cursor + LEN_PREFIX > packed {
            return Err(malformed("length prefix overruns declared bytes"));
        }
        let mut prefix = [0u8; LEN_PREFIX];
        prefix.copy_from_slice(&buf[cursor..cursor + LEN_PREFIX]);
        let len = u32::from_le_bytes(prefix) as usize;
        if len > MTU {
            return Err(malformed("entry exceeds MTU"));
        }
        cursor += LEN_PREFIX;
        if cursor + len > packed {
            return Err(malformed("entry overruns declared bytes"));
        }
        out.push(buf[cursor..cursor + len].to_vec());
        cursor += len;
    }
    if cursor != packed {
        return Err(malformed("declared bytes exceed packed entries"));
    }
    Ok(out)
}
