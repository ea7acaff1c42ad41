//! Property tests over the full coordinator-to-agent path.
//!
//! These run both ends on one thread: the coordinator flushes, the test
//! plays the agent by reading the region directly and acknowledging, and
//! the session reacts to each acknowledgment synchronously. That makes
//! every schedule deterministic under shrinking.

use std::time::Duration;

use proptest::collection::vec;
use proptest::prelude::*;
use session::{EnqueueError, Session, SessionConfig, SessionError, SessionState};
use transport::{MAX_BATCH_SIZE, MTU};

proptest! {
    #[test]
    fn any_payload_sequence_is_delivered_in_order(
        payloads in vec(vec(any::<u8>(), 0..300), 0..60),
    ) {
        let (mut session, mut handoff) = Session::start(SessionConfig {
            queue_capacity: payloads.len().max(1),
            ..SessionConfig::default()
        });
        handoff.uplink.ack(true).unwrap();
        session.drain_uplink().unwrap();
        prop_assert_eq!(session.state(), SessionState::Ready);

        for payload in &payloads {
            session.enqueue(payload.clone()).unwrap();
        }
        session.flush().unwrap();

        let mut delivered = Vec::new();
        let mut steps = 0usize;
        while delivered.len() < payloads.len() {
            steps += 1;
            prop_assert!(steps <= payloads.len() + 8, "delivery stalled");
            if let Some(messages) = handoff.region.read_batch(Duration::from_millis(1)).unwrap() {
                prop_assert!(messages.len() <= MAX_BATCH_SIZE);
                delivered.extend(messages);
                handoff.uplink.ack(true).unwrap();
                // The acknowledgment triggers the next flush synchronously.
                session.drain_uplink().unwrap();
            }
        }
        prop_assert_eq!(delivered, payloads);
        prop_assert_eq!(session.stats().queue_depth, 0);
    }

    #[test]
    fn oversize_payloads_are_always_rejected(extra in 1usize..64) {
        let (mut session, mut handoff) = Session::start(SessionConfig::default());
        handoff.uplink.ack(true).unwrap();
        session.drain_uplink().unwrap();

        let err = session.enqueue(vec![0u8; MTU + extra]).unwrap_err();
        let rejected_as_oversize = matches!(
            err,
            SessionError::Rejected(EnqueueError::PayloadTooLarge { .. })
        );
        prop_assert!(rejected_as_oversize);
        // Nothing was staged; the region stays idle.
        prop_assert_eq!(session.flush().unwrap(), session::FlushOutcome::Idle);
        prop_assert_eq!(handoff.region.read_batch(Duration::from_millis(1)).unwrap(), None);
    }
}
