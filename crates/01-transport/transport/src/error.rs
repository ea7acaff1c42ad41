use thiserror::Error;

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("payload of {len} bytes exceeds the {max} byte MTU")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("batch of {messages} messages ({packed} packed bytes) exceeds region limits")]
    BatchTooLarge { messages: usize, packed: usize },

    #[error("malformed batch header: {reason} (declared bytes={bytes}, messages={messages})")]
    MalformedBatch {
        reason: &'static str,
        bytes: u32,
        messages: u32,
    },
}
