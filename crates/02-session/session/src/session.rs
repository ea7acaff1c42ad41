//! Session lifecycle and flow control.
//!
//! The session ties the outbound batcher to the reverse channel: every
//! acknowledgment that arrives over the uplink hands the slot back and
//! triggers at most one flush attempt. Stop requests drain the in-flight
//! batch (bounded by a timeout) before the session closes; queued-but-
//! unsent payloads are not guaranteed across a stop.

use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, TryRecvError};
use tracing::{debug, warn};
use transport::{uplink_channel, RegionReader, TransportRegion, Uplink, UplinkReceiver, UplinkSender};

use crate::batcher::{FlushOutcome, OutboundBatcher, MAX_QUEUE_SIZE};
use crate::control::StatsSnapshot;
use crate::error::{SessionError, SessionResult};
use crate::state::SessionState;

/// Tunables fixed at session start.
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    /// Outbound queue bound; enqueue past it is rejected.
    pub queue_capacity: usize,
    /// How long `Draining` waits for the outstanding acknowledgment before
    /// discarding the queue and closing anyway.
    pub drain_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: MAX_QUEUE_SIZE,
            drain_timeout: Duration::from_millis(250),
        }
    }
}

/// Everything the constrained agent needs: the read capability over the
/// shared region and its end of the reverse channel.
pub struct AgentHandoff {
    pub region: RegionReader,
    pub uplink: UplinkSender,
}

/// Effects surfaced to the embedding event loop by uplink handling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UplinkEvent {
    /// The agent acknowledged the region handoff; traffic may start.
    HandshakeComplete,
    /// Application payloads from the agent, in arrival order.
    Data(Vec<Vec<u8>>),
    /// A batch acknowledgment arrived and one flush attempt ran.
    Acked(FlushOutcome),
    /// The session finished draining and closed.
    Closed,
}

/// Coordinator-side session: region writer, outbound queue, reverse
/// channel endpoint, and the lifecycle state machine.
pub struct Session {
    batcher: OutboundBatcher,
    uplink_rx: UplinkReceiver,
    state: SessionState,
    drain_deadline: Option<Instant>,
    drain_timeout: Duration,
    acks_received: u64,
    uplink_data: u64,
}

impl Session {
    /// Allocates the shared region and the reverse channel, returning the
    /// session (in `Initializing`) plus the handoff for the agent.
    ///
    /// The session reaches `Ready` once the agent's first acknowledgment
    /// arrives, confirming it holds the region.
    pub fn start(config: SessionConfig) -> (Session, AgentHandoff) {
        let (writer, reader) = TransportRegion::allocate();
        let (uplink_tx, uplink_rx) = uplink_channel();
        debug!(
            queue_capacity = config.queue_capacity,
            "session initializing"
        );
        (
            Session {
                batcher: OutboundBatcher::with_capacity(writer, config.queue_capacity),
                uplink_rx,
                state: SessionState::Initializing,
                drain_deadline: None,
                drain_timeout: config.drain_timeout,
                acks_received: 0,
                uplink_data: 0,
            },
            AgentHandoff {
                region: reader,
                uplink: uplink_tx,
            },
        )
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Appends one application payload to the outbound queue. Rejections
    /// are local and synchronous; the session is otherwise unaffected.
    pub fn enqueue(&mut self, payload: Vec<u8>) -> SessionResult<()> {
        if !self.state.accepts_enqueue() {
            return Err(SessionError::NotReady { state: self.state });
        }
        self.batcher.enqueue(payload)?;
        Ok(())
    }

    /// Attempts one flush. A no-op outside `Ready`; steady-state flushing
    /// rides on acknowledgments, this is the initial trigger after a burst
    /// of enqueues.
    pub fn flush(&mut self) -> SessionResult<FlushOutcome> {
        if self.state != SessionState::Ready {
            return Ok(FlushOutcome::Idle);
        }
        Ok(self.batcher.try_flush()?)
    }

    /// Drains every pending uplink message without blocking.
    ///
    /// A disconnected channel while the session is live is fatal: no flow
    /// control is possible without acknowledgments. Messages buffered ahead
    /// of the disconnect are still delivered; the closure then rides along
    /// as a final `Closed` event, and only an empty drain surfaces the
    /// disconnect as an error.
    pub fn drain_uplink(&mut self) -> SessionResult<Vec<UplinkEvent>> {
        let mut events = Vec::new();
        loop {
            match self.uplink_rx.try_recv() {
                Ok(msg) => {
                    if let Some(event) = self.on_uplink(msg)? {
                        events.push(event);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    match self.fail_channel() {
                        Ok(()) => {}
                        Err(err) if events.is_empty() => return Err(err),
                        Err(_) => events.push(UplinkEvent::Closed),
                    }
                    break;
                }
            }
        }
        Ok(events)
    }

    /// Blocks up to `timeout` for the first uplink message, then drains the
    /// rest without blocking.
    pub fn recv_uplink(&mut self, timeout: Duration) -> SessionResult<Vec<UplinkEvent>> {
        match self.uplink_rx.recv_timeout(timeout) {
            Ok(msg) => {
                let mut events = Vec::new();
                if let Some(event) = self.on_uplink(msg)? {
                    events.push(event);
                }
                match self.drain_uplink() {
                    Ok(more) => events.extend(more),
                    Err(SessionError::ChannelClosed) if !events.is_empty() => {
                        events.push(UplinkEvent::Closed)
                    }
                    Err(err) => return Err(err),
                }
                Ok(events)
            }
            Err(RecvTimeoutError::Timeout) => Ok(Vec::new()),
            Err(RecvTimeoutError::Disconnected) => {
                self.fail_channel()?;
                Ok(Vec::new())
            }
        }
    }

    /// Requests a stop. With no batch in flight the session closes
    /// immediately; otherwise it drains until the outstanding
    /// acknowledgment arrives or the drain timeout elapses.
    pub fn request_stop(&mut self, now: Instant) -> SessionState {
        match self.state {
            SessionState::Initializing | SessionState::Ready => {
                if self.batcher.in_flight() {
                    self.state = SessionState::Draining;
                    self.drain_deadline = Some(now + self.drain_timeout);
                    debug!("session draining");
                } else {
                    self.close("stop requested with nothing in flight");
                }
            }
            SessionState::Draining | SessionState::Closed => {}
        }
        self.state
    }

    /// Advances the drain timeout. Called periodically by the event loop.
    pub fn poll_drain(&mut self, now: Instant) -> SessionState {
        if self.state == SessionState::Draining {
            if let Some(deadline) = self.drain_deadline {
                if now >= deadline {
                    warn!("drain timeout elapsed; discarding the outstanding batch");
                    self.close("drain timeout");
                }
            }
        }
        self.state
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            queue_depth: self.batcher.queue_depth(),
            enqueued: self.batcher.enqueued,
            rejected_oversize: self.batcher.rejected_oversize,
            rejected_full: self.batcher.rejected_full,
            batches_written: self.batcher.batches_written,
            messages_sent: self.batcher.messages_sent,
            bytes_sent: self.batcher.bytes_sent,
            acks_received: self.acks_received,
            uplink_data: self.uplink_data,
        }
    }

    fn on_uplink(&mut self, msg: Uplink) -> SessionResult<Option<UplinkEvent>> {
        match msg {
            Uplink::Data(payload) => {
                self.uplink_data += 1;
                Ok(Some(UplinkEvent::Data(vec![payload])))
            }
            Uplink::DataBatch(payloads) => {
                self.uplink_data += payloads.len() as u64;
                Ok(Some(UplinkEvent::Data(payloads)))
            }
            Uplink::Ack(delivered) => self.on_ack(delivered),
        }
    }

    fn on_ack(&mut self, delivered: bool) -> SessionResult<Option<UplinkEvent>> {
        if !delivered {
            warn!("agent discarded a batch before acknowledging");
        }
        match self.state {
            SessionState::Initializing => {
                self.state = SessionState::Ready;
                debug!("handshake acknowledged; session ready");
                Ok(Some(UplinkEvent::HandshakeComplete))
            }
            SessionState::Ready => {
                self.acks_received += 1;
                let outcome = self.batcher.on_ack()?;
                Ok(Some(UplinkEvent::Acked(outcome)))
            }
            SessionState::Draining => {
                self.acks_received += 1;
                self.close("outstanding batch acknowledged");
                Ok(Some(UplinkEvent::Closed))
            }
            // Late acknowledgments after close carry no information.
            SessionState::Closed => Ok(None),
        }
    }

    fn fail_channel(&mut self) -> SessionResult<()> {
        if self.state.is_terminal() {
            // The agent exiting after close is the normal shutdown order.
            return Ok(());
        }
        self.close("reverse channel disconnected");
        Err(SessionError::ChannelClosed)
    }

    fn close(&mut self, reason: &'static str) {
        let dropped = self.batcher.clear();
        if dropped > 0 {
            debug!(dropped, reason, "discarding queued payloads at close");
        } else {
            debug!(reason, "session closed");
        }
        self.drain_deadline = None;
        self.state = SessionState::Closed;
    }
}
