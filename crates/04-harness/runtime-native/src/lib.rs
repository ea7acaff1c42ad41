//! Native harness for the shuttle transport.
//!
//! Owns the thread topology: the constrained agent runs its blocking read
//! loop on a dedicated `std::thread`, while the coordinator's event loop
//! runs single-threaded, fed by a control channel from the launcher and
//! publishing stats snapshots to an observer channel. Synthetic traffic
//! comes from [`LoadGenerator`].

mod generator;

pub use generator::{sequence_of, LoadGenerator};
pub use session::{ControlMsg, StatsSnapshot};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use agent::{InboundReader, ReaderRun, VecSink};
use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use session::{
    AgentHandoff, EnqueueError, Session, SessionConfig, SessionError, SessionState, UplinkEvent,
};
use tracing::{debug, warn};

/// Harness tunables.
#[derive(Clone, Copy, Debug)]
pub struct HarnessConfig {
    pub session: SessionConfig,
    /// Bound on each blocking uplink wait inside the event loop.
    pub tick: Duration,
    /// Cadence of stats snapshots on the observer channel.
    pub stats_interval: Duration,
    /// Enqueue attempts per tick while a load window is open.
    pub payloads_per_tick: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            tick: Duration::from_millis(1),
            stats_interval: Duration::from_millis(50),
            payloads_per_tick: 32,
        }
    }
}

/// The constrained agent running on its own thread.
pub struct AgentThread {
    stop: Arc<AtomicBool>,
    join: JoinHandle<ReaderRun<VecSink>>,
}

/// Moves the handoff onto a dedicated thread running the blocking read
/// loop into a [`VecSink`].
pub fn spawn_agent(handoff: AgentHandoff) -> Result<AgentThread> {
    let stop = Arc::new(AtomicBool::new(false));
    let AgentHandoff { region, uplink } = handoff;
    let thread_stop = Arc::clone(&stop);
    let join = thread::Builder::new()
        .name("constrained-agent".into())
        .spawn(move || InboundReader::new(region, uplink, VecSink::default(), thread_stop).run())
        .context("spawn constrained-agent thread")?;
    Ok(AgentThread { stop, join })
}

impl AgentThread {
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Raises the stop flag and waits for the read loop to exit.
    pub fn stop_and_join(self) -> ReaderRun<VecSink> {
        self.stop.store(true, Ordering::Release);
        self.join.join().expect("agent thread panicked")
    }
}

/// What a coordinator run leaves behind.
#[derive(Debug)]
pub struct RunSummary {
    pub stats: StatsSnapshot,
    /// Application payloads the agent sent back over the reverse channel.
    pub agent_data: Vec<Vec<u8>>,
}

/// Single-threaded coordinator event loop.
///
/// Each tick: apply pending control messages, wait briefly for uplink
/// traffic, pump the load generator while the session is `Ready`, advance
/// the drain timer, and publish stats on the configured cadence. The loop
/// exits once the session closes.
pub struct Coordinator {
    session: Session,
    control_rx: Receiver<ControlMsg>,
    stats_tx: Sender<StatsSnapshot>,
    config: HarnessConfig,
}

impl Coordinator {
    pub fn new(
        session: Session,
        control_rx: Receiver<ControlMsg>,
        stats_tx: Sender<StatsSnapshot>,
        config: HarnessConfig,
    ) -> Self {
        Self {
            session,
            control_rx,
            stats_tx,
            config,
        }
    }

    pub fn run(mut self) -> Result<RunSummary> {
        let mut agent_data = Vec::new();
        let mut load: Option<(LoadGenerator, Instant)> = None;
        let mut control_open = true;
        let mut last_stats = Instant::now();

        loop {
            let now = Instant::now();

            while control_open {
                match self.control_rx.try_recv() {
                    Ok(ControlMsg::Start {
                        payload_bytes,
                        duration,
                    }) => {
                        debug!(payload_bytes, ?duration, "load window opened");
                        load = Some((LoadGenerator::new(payload_bytes), now + duration));
                    }
                    Ok(ControlMsg::Stop) => {
                        load = None;
                        self.session.request_stop(now);
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        // Launcher gone; finish the current traffic and shut
                        // down.
                        control_open = false;
                        load = None;
                        self.session.request_stop(now);
                    }
                }
            }

            let window_expired = load.as_ref().is_some_and(|(_, until)| now >= *until);
            if window_expired {
                debug!("load window expired");
                load = None;
                self.session.request_stop(now);
            }

            for event in self.session.recv_uplink(self.config.tick)? {
                if let UplinkEvent::Data(payloads) = event {
                    agent_data.extend(payloads);
                }
            }

            if self.session.state() == SessionState::Ready {
                if let Some((generator, _)) = &mut load {
                    for _ in 0..self.config.payloads_per_tick {
                        match self.session.enqueue(generator.next_payload()) {
                            Ok(()) => {}
                            Err(SessionError::Rejected(EnqueueError::QueueFull { .. })) => {
                                // Backpressure; the queue drains on the next
                                // acknowledgment.
                                break;
                            }
                            Err(err) => return Err(err.into()),
                        }
                    }
                }
                self.session.flush()?;
            }

            self.session.poll_drain(Instant::now());

            if last_stats.elapsed() >= self.config.stats_interval {
                last_stats = Instant::now();
                if self.stats_tx.send(self.session.stats()).is_err() {
                    warn!("stats observer went away");
                }
            }

            if self.session.state() == SessionState::Closed {
                break;
            }
        }

        let stats = self.session.stats();
        let _ = self.stats_tx.send(stats);
        Ok(RunSummary { stats, agent_data })
    }
}

/// A launched coordinator/agent pair plus the launcher-side channel ends.
pub struct Harness {
    pub control: Sender<ControlMsg>,
    pub stats: Receiver<StatsSnapshot>,
    coordinator: JoinHandle<Result<RunSummary>>,
    agent: AgentThread,
}

impl Harness {
    /// Wires up the session, spawns the agent and the coordinator threads,
    /// and returns the control/observer endpoints.
    pub fn launch(config: HarnessConfig) -> Result<Harness> {
        let (session, handoff) = Session::start(config.session);
        let agent = spawn_agent(handoff)?;
        let (control_tx, control_rx) = unbounded();
        let (stats_tx, stats_rx) = unbounded();
        let coordinator = Coordinator::new(session, control_rx, stats_tx, config);
        let join = thread::Builder::new()
            .name("coordinator".into())
            .spawn(move || coordinator.run())
            .context("spawn coordinator thread")?;
        Ok(Harness {
            control: control_tx,
            stats: stats_rx,
            coordinator: join,
            agent,
        })
    }

    /// Drops the control channel (which stops the coordinator), then joins
    /// both threads.
    pub fn finish(self) -> Result<(RunSummary, ReaderRun<VecSink>)> {
        drop(self.control);
        let summary = self.coordinator.join().expect("coordinator thread panicked")?;
        let run = self.agent.stop_and_join();
        Ok((summary, run))
    }
}
