//! Wire constants shared by both sides of the region protocol.

/// Maximum size of one message payload in bytes.
pub const MTU: usize = 2048;

/// Bytes reserved at offset zero for the region header: flag word, packed
/// payload byte count, message count, reserved padding (4 bytes each).
pub const HEADER_SIZE: usize = 16;

/// Maximum number of messages carried by one batch.
pub const MAX_BATCH_SIZE: usize = 10;

/// Maximum cumulative payload bytes carried by one batch.
pub const MAX_BATCH_BYTES: usize = MTU * MAX_BATCH_SIZE;

/// Total region size: header plus payload area, rounded up to a word.
pub const REGION_SIZE: usize = align4(HEADER_SIZE + MAX_BATCH_BYTES);

/// Bytes available for packed batch entries after the header.
pub const PAYLOAD_CAPACITY: usize = REGION_SIZE - HEADER_SIZE;

/// Flag value: region free, writable by the coordinator.
pub const FLAG_EMPTY: u32 = 0;

/// Flag value: exactly one unread batch resident, readable by the agent.
pub const FLAG_FULL: u32 = 1;

/// Bytes of the little-endian length prefix in front of each packed entry.
pub const LEN_PREFIX: usize = 4;

const fn align4(value: usize) -> usize {
    (value + 3) & !3
}
