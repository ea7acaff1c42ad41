//! Session lifecycle states.

/// Lifecycle of one session, driven by the flow controller.
///
/// Legal transitions:
/// `Initializing -> Ready -> Draining -> Closed`, with `Ready` and
/// `Initializing` allowed to jump straight to `Closed` when nothing is in
/// flight at stop time. There is no pre-allocation variant: a session that
/// exists has already allocated its region, so `Session::start` begins at
/// `Initializing`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Region allocated and handed off; waiting for the agent's handshake
    /// acknowledgment.
    Initializing,
    /// Steady state: enqueue and flush are legal.
    Ready,
    /// Stop requested; the in-flight batch may still be acknowledged but no
    /// new batches are flushed.
    Draining,
    /// Terminal. Queued-but-unsent payloads have been discarded.
    Closed,
}

impl SessionState {
    /// Application enqueue requests are accepted only here.
    pub fn accepts_enqueue(self) -> bool {
        matches!(self, SessionState::Ready)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed)
    }
}
