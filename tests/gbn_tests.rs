//! Integration tests for the Go-Back-N engine driven step by step.
//!
//! Each test wires a [`Sender`] and a [`Receiver`] together and pumps frames
//! between them by hand, so every interleaving is deterministic.  Timer
//! behaviour runs on a paused tokio clock moved with `tokio::time::advance`.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

use gbn_arq::{
    events::LinkEvent, frame::wire_seq, Channel, ChannelConfig, ChannelLink, Direction,
    EventSink, Frame, FrameKind, Receiver, Sender, SenderConfig, SubmitOutcome,
    WindowFullPolicy,
};

type Wire = mpsc::UnboundedSender<Vec<u8>>;
type WireRx = mpsc::UnboundedReceiver<Vec<u8>>;

/// A sender and receiver joined by two perfect in-process wires.
struct Pair {
    sender: Sender<Wire, Vec<Vec<u8>>>,
    receiver: Receiver<Wire, Vec<Vec<u8>>>,
    to_receiver: WireRx,
    to_sender: WireRx,
}

impl Pair {
    fn new(config: SenderConfig) -> Self {
        let (s_tx, to_receiver) = mpsc::unbounded_channel();
        let (r_tx, to_sender) = mpsc::unbounded_channel();
        Self {
            sender: Sender::new(&config, s_tx, Vec::new(), EventSink::disabled()).unwrap(),
            receiver: Receiver::new(r_tx, Vec::new(), EventSink::disabled()),
            to_receiver,
            to_sender,
        }
    }

    /// Deliver queued frames in both directions until the wires are quiet.
    fn pump(&mut self) {
        loop {
            let mut moved = false;
            while let Ok(bytes) = self.to_receiver.try_recv() {
                self.receiver.on_incoming(&bytes);
                moved = true;
            }
            while let Ok(bytes) = self.to_sender.try_recv() {
                self.sender.on_incoming(&bytes);
                moved = true;
            }
            if !moved {
                break;
            }
        }
    }
}

fn payloads(n: usize) -> Vec<Vec<u8>> {
    (1..=n).map(|i| format!("msg-{i}").into_bytes()).collect()
}

// ---------------------------------------------------------------------------
// Scenario A: lossless transfer
// ---------------------------------------------------------------------------

#[test]
fn lossless_transfer_delivers_everything_in_order() {
    let mut pair = Pair::new(SenderConfig::default());
    let msgs = payloads(9);

    for msg in &msgs {
        let outcome = pair.sender.submit(msg.clone()).unwrap();
        assert!(matches!(outcome, SubmitOutcome::Sent { .. }));
        pair.pump();
    }

    assert_eq!(pair.receiver.network(), &msgs);
    assert_eq!(pair.sender.base(), 9);
    assert_eq!(pair.sender.next_seq(), 9);
    assert!(!pair.sender.timer().is_armed());
    assert_eq!(pair.receiver.expected_seq(), 1);
}

#[test]
fn burst_beyond_window_is_rejected_then_accepted_after_acks() {
    let mut pair = Pair::new(SenderConfig::default());
    let msgs = payloads(9);

    let outcomes: Vec<SubmitOutcome> = msgs
        .iter()
        .map(|m| pair.sender.submit(m.clone()).unwrap())
        .collect();
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == SubmitOutcome::Rejected)
            .count(),
        2
    );

    pair.pump();
    assert_eq!(pair.sender.base(), 7);
    for msg in &msgs[7..] {
        pair.sender.submit(msg.clone()).unwrap();
    }
    pair.pump();

    assert_eq!(pair.receiver.network(), &msgs);
    assert_eq!(pair.sender.base(), 9);
}

#[test]
fn queue_policy_absorbs_a_burst() {
    let mut pair = Pair::new(SenderConfig {
        policy: WindowFullPolicy::Queue,
        ..SenderConfig::default()
    });
    let msgs = payloads(20);
    for msg in &msgs {
        pair.sender.submit(msg.clone()).unwrap();
    }
    assert_eq!(pair.sender.stats().backlog, 13);

    pair.pump();
    assert_eq!(pair.receiver.network(), &msgs);
    assert_eq!(pair.sender.base(), 20);
    assert_eq!(pair.sender.stats().backlog, 0);
}

// ---------------------------------------------------------------------------
// Scenario B: timeout-driven retransmission
// ---------------------------------------------------------------------------

/// A sender→receiver link that loses every frame, plus the shared event
/// sink and its observer.
fn black_hole() -> (ChannelLink, EventSink, mpsc::UnboundedReceiver<LinkEvent>) {
    let (events, observed) = EventSink::channel();
    let config = ChannelConfig {
        loss_prob: 1.0,
        seed: Some(3),
        ..ChannelConfig::default()
    };
    let (channel, _inboxes) = Channel::new(&config, events.clone()).unwrap();
    (channel.link(Direction::SenderToReceiver), events, observed)
}

fn retransmitted_seqs(observed: &mut mpsc::UnboundedReceiver<LinkEvent>) -> Vec<u8> {
    let mut seqs = Vec::new();
    while let Ok(event) = observed.try_recv() {
        if let LinkEvent::Sent {
            seq,
            retransmission: true,
            ..
        } = event
        {
            seqs.push(seq);
        }
    }
    seqs
}

#[tokio::test(start_paused = true)]
async fn lost_window_is_resent_once_per_timeout() {
    let (link, events, mut observed) = black_hole();
    let mut sender = Sender::new(
        &SenderConfig::default(),
        link,
        Vec::<Vec<u8>>::new(),
        events,
    )
    .unwrap();

    for msg in payloads(5) {
        sender.submit(msg).unwrap();
    }
    assert!(retransmitted_seqs(&mut observed).is_empty());

    // Driver ticks every 100ms; nothing happens before the timeout.
    for _ in 0..19 {
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(sender.tick(), 0);
    }
    tokio::time::advance(Duration::from_millis(100)).await;
    assert_eq!(sender.tick(), 5);
    assert_eq!(retransmitted_seqs(&mut observed), vec![0, 1, 2, 3, 4]);

    // Exactly once per period.
    for _ in 0..19 {
        tokio::time::advance(Duration::from_millis(100)).await;
        sender.tick();
    }
    assert!(retransmitted_seqs(&mut observed).is_empty());
    tokio::time::advance(Duration::from_millis(100)).await;
    sender.tick();
    assert_eq!(retransmitted_seqs(&mut observed), vec![0, 1, 2, 3, 4]);

    assert_eq!(sender.base(), 0);
    assert_eq!(sender.stats().retransmissions, 10);
}

#[tokio::test(start_paused = true)]
async fn retransmission_recovers_a_lost_frame() {
    let mut pair = Pair::new(SenderConfig::default());
    let msgs = payloads(3);

    pair.sender.submit(msgs[0].clone()).unwrap();
    // Lose frame 0 on the wire.
    let lost = pair.to_receiver.try_recv().unwrap();
    assert_eq!(Frame::decode(&lost).unwrap().seq(), 0);

    pair.sender.submit(msgs[1].clone()).unwrap();
    pair.sender.submit(msgs[2].clone()).unwrap();
    pair.pump();
    // Receiver rejected 1 and 2; nothing delivered, base still 0.
    assert!(pair.receiver.network().is_empty());
    assert_eq!(pair.sender.base(), 0);

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(pair.sender.tick(), 3);
    pair.pump();

    assert_eq!(pair.receiver.network(), &msgs);
    assert_eq!(pair.sender.base(), 3);
    assert!(!pair.sender.timer().is_armed());
}

// ---------------------------------------------------------------------------
// Scenario C: piggybacking
// ---------------------------------------------------------------------------

#[test]
fn queued_reply_carries_the_ack() {
    let mut pair = Pair::new(SenderConfig::default());
    pair.receiver.enqueue_outgoing(b"reply-1".to_vec()).unwrap();

    pair.sender.submit(b"msg-1".to_vec()).unwrap();
    let data = pair.to_receiver.try_recv().unwrap();
    pair.receiver.on_incoming(&data);

    let back = pair.to_sender.try_recv().unwrap();
    assert!(pair.to_sender.try_recv().is_err(), "expected a single frame");
    let frame = Frame::decode(&back).unwrap();
    assert_eq!(frame.kind(), FrameKind::Data);
    assert_eq!(frame.ack(), 0);
    assert_eq!(frame.payload(), b"reply-1");

    pair.sender.on_incoming(&back);
    assert_eq!(pair.sender.base(), 1);
    assert_eq!(pair.sender.network(), &vec![b"reply-1".to_vec()]);
}

#[test]
fn replies_ride_on_successive_frames() {
    let mut pair = Pair::new(SenderConfig::default());
    for i in 1..=4 {
        pair.receiver
            .enqueue_outgoing(format!("reply-{i}").into_bytes())
            .unwrap();
    }
    for msg in payloads(9) {
        pair.sender.submit(msg).unwrap();
        pair.pump();
    }

    let replies: Vec<Vec<u8>> = (1..=4).map(|i| format!("reply-{i}").into_bytes()).collect();
    assert_eq!(pair.sender.network(), &replies);
    assert_eq!(pair.sender.base(), 9);
}

// ---------------------------------------------------------------------------
// Randomised: invariants under loss and corruption
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn lossy_channel_preserves_invariants_and_order() {
    for seed in 0..8u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let config = ChannelConfig {
            loss_prob: rng.random_range(0.0..0.4),
            corrupt_prob: rng.random_range(0.0..0.4),
            seed: Some(seed),
            ..ChannelConfig::default()
        };
        let window_size = rng.random_range(1..=7);
        let (channel, mut inboxes) = Channel::new(&config, EventSink::disabled()).unwrap();

        let mut sender = Sender::new(
            &SenderConfig {
                window_size,
                ..SenderConfig::default()
            },
            channel.link(Direction::SenderToReceiver),
            Vec::<Vec<u8>>::new(),
            EventSink::disabled(),
        )
        .unwrap();
        assert_eq!(sender.window_size(), window_size);
        let mut receiver = Receiver::new(
            channel.link(Direction::ReceiverToSender),
            Vec::<Vec<u8>>::new(),
            EventSink::disabled(),
        );

        let msgs = payloads(40);
        let mut submitted = 0;
        let mut last_base = 0;

        for _step in 0..200_000 {
            if receiver.network().len() == msgs.len() {
                break;
            }
            while submitted < msgs.len() && sender.can_send() {
                sender.submit(msgs[submitted].clone()).unwrap();
                submitted += 1;
            }

            let mut moved = false;
            if let Ok(bytes) = inboxes.receiver.try_recv() {
                receiver.on_incoming(&bytes);
                moved = true;
            }
            if let Ok(bytes) = inboxes.sender.try_recv() {
                sender.on_incoming(&bytes);
                moved = true;
            }
            if !moved {
                tokio::time::advance(Duration::from_millis(100)).await;
                sender.tick();
            }

            assert!(
                sender.in_flight() <= sender.window_size(),
                "seed {seed}: window overrun"
            );
            assert!(sender.base() >= last_base, "seed {seed}: base went backwards");
            last_base = sender.base();
            assert_eq!(
                receiver.expected_seq(),
                wire_seq(receiver.network().len() as u64),
                "seed {seed}: receiver state out of step with deliveries"
            );
        }

        assert_eq!(receiver.network(), &msgs, "seed {seed}");
    }
}
