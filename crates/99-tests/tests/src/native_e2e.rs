//! End-to-end tests across the coordinator/agent thread boundary.

use std::time::{Duration, Instant};

use runtime_native::{sequence_of, spawn_agent, ControlMsg, Harness, HarnessConfig};
use session::{
    EnqueueError, Session, SessionConfig, SessionError, SessionState, UplinkEvent,
};
use transport::{uplink_channel, TransportRegion, MAX_BATCH_SIZE, MTU};

const TICK: Duration = Duration::from_millis(1);

/// Drives the session until the agent has acknowledged the handoff.
fn wait_ready(session: &mut Session) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while session.state() != SessionState::Ready {
        assert!(Instant::now() < deadline, "handshake never completed");
        session.recv_uplink(TICK).expect("uplink");
    }
}

fn stamped(seq: u32, filler: usize) -> Vec<u8> {
    let mut payload = seq.to_le_bytes().to_vec();
    payload.extend(std::iter::repeat(seq as u8).take(filler));
    payload
}

#[test]
fn ordered_lossless_delivery_under_load() {
    const TOTAL: u32 = 500;

    let (mut session, handoff) = Session::start(SessionConfig::default());
    let agent = spawn_agent(handoff).expect("spawn agent");
    wait_ready(&mut session);

    let mut next = 0u32;
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        assert!(Instant::now() < deadline, "delivery stalled");

        while next < TOTAL {
            match session.enqueue(stamped(next, (next as usize * 7) % 700)) {
                Ok(()) => next += 1,
                Err(SessionError::Rejected(EnqueueError::QueueFull { .. })) => break,
                Err(err) => panic!("enqueue failed: {err}"),
            }
        }
        session.flush().expect("flush");
        session.recv_uplink(TICK).expect("uplink");

        let stats = session.stats();
        if next == TOTAL
            && stats.queue_depth == 0
            && stats.acks_received == stats.batches_written
        {
            break;
        }
    }

    let stats = session.stats();
    assert_eq!(stats.messages_sent, u64::from(TOTAL));
    assert_eq!(
        session.request_stop(Instant::now()),
        SessionState::Closed,
        "nothing in flight, stop closes immediately"
    );

    let run = agent.stop_and_join();
    assert_eq!(run.messages_delivered, u64::from(TOTAL));
    for (seq, payload) in run.sink.payloads.iter().enumerate() {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&payload[..4]);
        assert_eq!(u32::from_le_bytes(bytes), seq as u32);
        assert_eq!(payload.len(), 4 + (seq * 7) % 700);
    }
}

#[test]
fn backpressure_rejects_then_recovers() {
    let (mut session, handoff) = Session::start(SessionConfig {
        queue_capacity: 8,
        ..SessionConfig::default()
    });
    let agent = spawn_agent(handoff).expect("spawn agent");
    wait_ready(&mut session);

    for seq in 0..8u32 {
        session.enqueue(stamped(seq, 16)).expect("within capacity");
    }
    assert!(matches!(
        session.enqueue(stamped(8, 16)),
        Err(SessionError::Rejected(EnqueueError::QueueFull { capacity: 8 }))
    ));
    assert_eq!(session.stats().rejected_full, 1);

    // One flush and one acknowledgment free the queue for new traffic.
    session.flush().expect("flush");
    let deadline = Instant::now() + Duration::from_secs(2);
    while session.stats().queue_depth > 0 || session.stats().acks_received == 0 {
        assert!(Instant::now() < deadline, "acknowledgments stalled");
        session.recv_uplink(TICK).expect("uplink");
    }
    session.enqueue(stamped(9, 16)).expect("recovered");

    session.flush().expect("flush");
    session.request_stop(Instant::now());
    let deadline = Instant::now() + Duration::from_secs(2);
    while session.state() != SessionState::Closed {
        assert!(Instant::now() < deadline, "drain stalled");
        session.recv_uplink(TICK).expect("uplink");
        session.poll_drain(Instant::now());
    }
    agent.stop_and_join();
}

#[test]
fn stop_mid_flight_drains_the_outstanding_batch() {
    let (mut session, handoff) = Session::start(SessionConfig::default());
    let agent = spawn_agent(handoff).expect("spawn agent");
    wait_ready(&mut session);

    for seq in 0..3u32 {
        session.enqueue(stamped(seq, 100)).expect("enqueue");
    }
    session.flush().expect("flush");
    assert_eq!(session.request_stop(Instant::now()), SessionState::Draining);

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut saw_closed_event = false;
    while session.state() != SessionState::Closed {
        assert!(Instant::now() < deadline, "drain stalled");
        for event in session.recv_uplink(TICK).expect("uplink") {
            if event == UplinkEvent::Closed {
                saw_closed_event = true;
            }
        }
        session.poll_drain(Instant::now());
    }
    assert!(saw_closed_event, "drain should end on the acknowledgment");

    let run = agent.stop_and_join();
    assert_eq!(run.messages_delivered, 3);
}

#[test]
fn reverse_data_reaches_the_coordinator_in_order() {
    let (mut session, handoff) = Session::start(SessionConfig::default());

    let agent = std::thread::spawn(move || {
        let uplink = handoff.uplink;
        uplink.ack(true).expect("handshake");
        uplink.send(b"one".to_vec()).expect("send");
        uplink
            .send_batch(vec![b"two".to_vec(), b"three".to_vec()])
            .expect("send batch");
        // Region reader kept alive until the messages are out.
        drop(handoff.region);
    });

    let mut received = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(2);
    while received.len() < 3 {
        assert!(Instant::now() < deadline, "uplink data stalled");
        for event in session.recv_uplink(TICK).expect("uplink") {
            if let UplinkEvent::Data(payloads) = event {
                received.extend(payloads);
            }
        }
    }
    assert_eq!(received, vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);
    assert_eq!(session.stats().uplink_data, 3);
    agent.join().expect("agent thread");
}

#[test]
fn oversize_payloads_are_rejected_without_disturbing_the_session() {
    let (mut session, handoff) = Session::start(SessionConfig::default());
    let agent = spawn_agent(handoff).expect("spawn agent");
    wait_ready(&mut session);

    assert!(matches!(
        session.enqueue(vec![0u8; MTU + 1]),
        Err(SessionError::Rejected(EnqueueError::PayloadTooLarge { .. }))
    ));
    let stats = session.stats();
    assert_eq!(stats.rejected_oversize, 1);
    assert_eq!(stats.queue_depth, 0);

    // Traffic still flows afterwards.
    session.enqueue(vec![0u8; MTU]).expect("exactly MTU is legal");
    session.flush().expect("flush");
    let deadline = Instant::now() + Duration::from_secs(2);
    while session.stats().acks_received == 0 {
        assert!(Instant::now() < deadline, "ack stalled");
        session.recv_uplink(TICK).expect("uplink");
    }

    session.request_stop(Instant::now());
    let run = agent.stop_and_join();
    assert_eq!(run.messages_delivered, 1);
}

#[test]
fn batches_never_exceed_the_message_limit() {
    let (mut session, handoff) = Session::start(SessionConfig::default());
    let (probe_tx, probe_rx) = crossbeam_channel::unbounded();

    // Hand-rolled agent that records per-batch sizes.
    let stop = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let agent_stop = std::sync::Arc::clone(&stop);
    let agent = std::thread::spawn(move || {
        let mut region = handoff.region;
        let uplink = handoff.uplink;
        uplink.ack(true).expect("handshake");
        while !agent_stop.load(std::sync::atomic::Ordering::Acquire) {
            match region.read_batch(Duration::from_millis(5)) {
                Ok(Some(messages)) => {
                    probe_tx.send(messages.len()).expect("probe");
                    if uplink.ack(true).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(_) => break,
            }
        }
    });
    wait_ready(&mut session);

    for seq in 0..35u32 {
        session.enqueue(stamped(seq, 8)).expect("enqueue");
    }
    session.flush().expect("flush");

    let mut delivered = 0usize;
    let deadline = Instant::now() + Duration::from_secs(5);
    while delivered < 35 {
        assert!(Instant::now() < deadline, "delivery stalled");
        session.recv_uplink(TICK).expect("uplink");
        while let Ok(size) = probe_rx.try_recv() {
            assert!(size <= MAX_BATCH_SIZE);
            delivered += size;
        }
    }
    // 35 small payloads pack as three full batches plus the remainder.
    assert_eq!(session.stats().batches_written, 4);

    stop.store(true, std::sync::atomic::Ordering::Release);
    session.request_stop(Instant::now());
    agent.join().expect("agent thread");
}

#[test]
fn harness_round_trip_is_ordered() {
    let harness = Harness::launch(HarnessConfig::default()).expect("launch");
    harness
        .control
        .send(ControlMsg::Start {
            payload_bytes: 256,
            duration: Duration::from_millis(60),
        })
        .expect("control");
    std::thread::sleep(Duration::from_millis(150));

    let (summary, run) = harness.finish().expect("finish");
    assert!(summary.stats.batches_written > 0);
    for (expected, payload) in run.sink.payloads.iter().enumerate() {
        assert_eq!(sequence_of(payload), Some(expected as u64));
    }
}

#[test]
fn agent_death_surfaces_as_a_session_error() {
    let (mut session, handoff) = Session::start(SessionConfig::default());
    // The agent dies before it ever acknowledges the handoff.
    drop(handoff);

    let err = session.recv_uplink(TICK).unwrap_err();
    assert!(matches!(err, SessionError::ChannelClosed));
    assert_eq!(session.state(), SessionState::Closed);
}

#[test]
fn agent_death_after_traffic_delivers_buffered_events_first() {
    let (mut session, handoff) = Session::start(SessionConfig::default());
    handoff.uplink.ack(true).expect("handshake");
    handoff.uplink.send(b"parting".to_vec()).expect("send");
    drop(handoff);

    // Everything buffered ahead of the disconnect arrives, capped by the
    // closure notice.
    let events = session.recv_uplink(TICK).expect("uplink");
    assert_eq!(
        events,
        vec![
            UplinkEvent::HandshakeComplete,
            UplinkEvent::Data(vec![b"parting".to_vec()]),
            UplinkEvent::Closed,
        ]
    );
    assert_eq!(session.state(), SessionState::Closed);
}

#[test]
fn uplink_channel_pair_is_independent_of_the_region() {
    // The reverse channel works before any batch ever crosses the region.
    let (_writer, _reader) = TransportRegion::allocate();
    let (tx, rx) = uplink_channel();
    tx.send(b"early".to_vec()).expect("send");
    drop(tx);
    assert_eq!(rx.try_iter().count(), 1);
}
