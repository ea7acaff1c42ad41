//! Coordinator side of the shuttle transport.
//!
//! The coordinator runs a single-threaded, event-driven loop: all queue
//! mutation happens synchronously inside reactions to enqueue calls,
//! acknowledgment arrivals, and timers, so no locking is needed on the
//! session's own state. The only synchronization device shared with the
//! constrained agent is the region's flag word.

mod batcher;
mod control;
mod error;
mod session;
mod state;

pub use batcher::{EnqueueError, FlushOutcome, OutboundBatcher, MAX_QUEUE_SIZE};
pub use control::{ControlMsg, StatsSnapshot};
pub use error::{SessionError, SessionResult};
pub use session::{AgentHandoff, Session, SessionConfig, UplinkEvent};
pub use state::SessionState;
