use thiserror::Error;

use transport::TransportError;

use crate::batcher::EnqueueError;
use crate::state::SessionState;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Local, synchronous rejection; the rest of the session is unaffected.
    #[error("enqueue rejected: {0}")]
    Rejected(#[from] EnqueueError),

    /// Enqueue attempted outside `Ready`.
    #[error("session does not accept traffic in state {state:?}")]
    NotReady { state: SessionState },

    /// The reverse channel disconnected; without acknowledgments no flow
    /// control is possible, so the session closes.
    #[error("reverse channel closed; session terminated")]
    ChannelClosed,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
