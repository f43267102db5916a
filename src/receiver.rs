//! Go-Back-N receive-side state machine.
//!
//! [`Receiver`] implements the receiver side of Go-Back-N:
//!
//! - Only **in-order** frames are accepted (`seq == expected_seq`).
//! - Out-of-order or duplicate frames are discarded without buffering.
//! - After every decodable frame (accepted or not) a **cumulative ACK** for
//!   the last in-order sequence number goes back to the sender, piggybacked
//!   on queued outgoing data when there is any.
//! - An undecodable frame re-sends the pending ack, if one is still owed.

use std::collections::VecDeque;

use crate::channel::Direction;
use crate::events::{DiscardReason, EventSink, LinkEvent};
use crate::frame::{check_payload, Frame, FrameError, MAX_SEQ};
use crate::link::{Link, NetworkLayer};

/// Go-Back-N receive-side endpoint.
#[derive(Debug)]
pub struct Receiver<L, N> {
    /// The only wire sequence number currently acceptable.
    expected_seq: u8,
    /// Cumulative ack owed to the sender, or `None` once it has been sent.
    ack_pending: Option<u8>,
    /// Outgoing payloads waiting for a frame to ride back on.
    network_queue: VecDeque<Vec<u8>>,
    link: L,
    network: N,
    events: EventSink,
}

impl<L: Link, N: NetworkLayer> Receiver<L, N> {
    pub fn new(link: L, network: N, events: EventSink) -> Self {
        Self {
            expected_seq: 0,
            ack_pending: None,
            network_queue: VecDeque::new(),
            link,
            network,
            events,
        }
    }

    pub fn expected_seq(&self) -> u8 {
        self.expected_seq
    }

    pub fn ack_pending(&self) -> Option<u8> {
        self.ack_pending
    }

    /// Payloads still waiting to be piggybacked.
    pub fn queued(&self) -> usize {
        self.network_queue.len()
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    /// Queue a payload for the sender.  Nothing is transmitted until the
    /// next inbound frame gives it something to ride on.
    pub fn enqueue_outgoing(&mut self, payload: Vec<u8>) -> Result<(), FrameError> {
        check_payload(&payload)?;
        self.network_queue.push_back(payload);
        Ok(())
    }

    /// Handle one frame arriving from the sender.
    pub fn on_incoming(&mut self, bytes: &[u8]) {
        let frame = match Frame::decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("[receiver] ← undecodable frame discarded: {e}");
                self.events.emit(LinkEvent::Discarded {
                    direction: Direction::SenderToReceiver,
                    reason: DiscardReason::Undecodable(e),
                });
                // Only re-acks if an ack is still owed; otherwise the
                // sender's timer has to notice.
                self.send_standalone_ack();
                return;
            }
        };

        // Acceptance depends on the sequence number alone, whatever the type.
        let seq = frame.seq();
        let kind = frame.kind();
        if seq == self.expected_seq {
            let payload = frame.into_payload();
            log::debug!("[receiver] ← {kind} seq={seq} len={} accepted", payload.len());
            self.events.emit(LinkEvent::Delivered {
                direction: Direction::SenderToReceiver,
                len: payload.len(),
            });
            self.network.deliver(payload);
            self.expected_seq = (self.expected_seq + 1) % MAX_SEQ;
        } else {
            log::debug!(
                "[receiver] ← {kind} seq={seq} out of order (expected {}); discarded",
                self.expected_seq
            );
            self.events.emit(LinkEvent::Discarded {
                direction: Direction::SenderToReceiver,
                reason: DiscardReason::OutOfOrder {
                    seq,
                    expected: self.expected_seq,
                },
            });
        }

        self.ack_pending = Some(self.last_in_order());

        match self.network_queue.pop_front() {
            Some(payload) => self.send_piggybacked(payload),
            None => self.send_standalone_ack(),
        }
    }

    /// Send a bare ACK for the pending cumulative ack, if there is one.
    pub fn send_standalone_ack(&mut self) {
        let Some(ack) = self.ack_pending.take() else {
            return;
        };
        match Frame::ack_only(ack) {
            Ok(frame) => {
                log::debug!("[receiver] → ACK ack={ack}");
                self.transmit(&frame);
            }
            Err(e) => log::warn!("[receiver] could not build ACK: {e}"),
        }
    }

    /// Wire sequence number of the last frame received in order.
    fn last_in_order(&self) -> u8 {
        (self.expected_seq + MAX_SEQ - 1) % MAX_SEQ
    }

    fn send_piggybacked(&mut self, payload: Vec<u8>) {
        let ack = self.ack_pending.take().unwrap_or(0);
        // The reverse direction is not sequenced; seq stays 0.
        match Frame::data(0, ack, payload) {
            Ok(frame) => {
                log::debug!(
                    "[receiver] → DATA len={} piggybacking ack={ack}",
                    frame.payload().len()
                );
                self.transmit(&frame);
            }
            Err(e) => log::warn!("[receiver] dropping outgoing payload: {e}"),
        }
    }

    fn transmit(&mut self, frame: &Frame) {
        self.events.emit(LinkEvent::Sent {
            direction: Direction::ReceiverToSender,
            kind: frame.kind(),
            seq: frame.seq(),
            ack: frame.ack(),
            retransmission: false,
        });
        self.link.transmit(frame.encode());
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameKind;

    type TestReceiver = Receiver<Vec<Vec<u8>>, Vec<Vec<u8>>>;

    fn receiver() -> TestReceiver {
        Receiver::new(Vec::new(), Vec::new(), EventSink::disabled())
    }

    fn data(seq: u8, payload: &[u8]) -> Vec<u8> {
        Frame::data(seq, 0, payload.to_vec()).unwrap().encode()
    }

    fn last_sent(r: &TestReceiver) -> Frame {
        Frame::decode(r.link().last().unwrap()).unwrap()
    }

    #[test]
    fn initial_state() {
        let r = receiver();
        assert_eq!(r.expected_seq(), 0);
        assert_eq!(r.ack_pending(), None);
        assert_eq!(r.queued(), 0);
    }

    #[test]
    fn in_order_frame_delivered_and_acked() {
        let mut r = receiver();
        r.on_incoming(&data(0, b"hello"));

        assert_eq!(r.network(), &vec![b"hello".to_vec()]);
        assert_eq!(r.expected_seq(), 1);

        let ack = last_sent(&r);
        assert_eq!(ack.kind(), FrameKind::Ack);
        assert_eq!(ack.seq(), 0);
        assert_eq!(ack.ack(), 0);
        assert_eq!(r.ack_pending(), None);
    }

    #[test]
    fn out_of_order_frame_discarded_but_reacked() {
        let mut r = receiver();
        r.on_incoming(&data(0, b"a"));
        r.on_incoming(&data(2, b"c"));

        assert_eq!(r.network().len(), 1);
        assert_eq!(r.expected_seq(), 1);
        assert_eq!(r.link().len(), 2);
        assert_eq!(last_sent(&r).ack(), 0);
    }

    #[test]
    fn nothing_received_yet_acks_seven() {
        let mut r = receiver();
        r.on_incoming(&data(3, b"early"));
        assert!(r.network().is_empty());
        assert_eq!(last_sent(&r).ack(), 7);
    }

    #[test]
    fn duplicate_delivered_at_most_once() {
        let mut r = receiver();
        r.on_incoming(&data(0, b"once"));
        r.on_incoming(&data(0, b"once"));
        r.on_incoming(&data(0, b"once"));
        assert_eq!(r.network().len(), 1);
        assert_eq!(r.link().len(), 3);
    }

    #[test]
    fn expected_seq_wraps_modulo_eight() {
        let mut r = receiver();
        for i in 0..10u8 {
            r.on_incoming(&data(i % 8, &[i]));
        }
        assert_eq!(r.network().len(), 10);
        assert_eq!(r.expected_seq(), 2);
        assert_eq!(last_sent(&r).ack(), 1);
    }

    #[test]
    fn corrupted_frame_without_pending_ack_sends_nothing() {
        let mut r = receiver();
        r.on_incoming(&data(0, b"ok"));
        let mut bytes = data(1, b"bad");
        bytes[2] ^= 0xff;

        r.on_incoming(&bytes);
        assert_eq!(r.link().len(), 1);
        assert_eq!(r.expected_seq(), 1);
    }

    #[test]
    fn piggybacks_queued_payload() {
        let mut r = receiver();
        r.enqueue_outgoing(b"reply".to_vec()).unwrap();
        assert!(r.link().is_empty());

        r.on_incoming(&data(0, b"req"));
        assert_eq!(r.link().len(), 1);
        let frame = last_sent(&r);
        assert_eq!(frame.kind(), FrameKind::Data);
        assert_eq!(frame.ack(), 0);
        assert_eq!(frame.payload(), b"reply");
        assert_eq!(r.queued(), 0);
        assert_eq!(r.ack_pending(), None);
    }

    #[test]
    fn one_queued_payload_per_inbound_frame() {
        let mut r = receiver();
        r.enqueue_outgoing(b"r1".to_vec()).unwrap();
        r.enqueue_outgoing(b"r2".to_vec()).unwrap();

        r.on_incoming(&data(0, b"a"));
        assert_eq!(r.queued(), 1);
        r.on_incoming(&data(1, b"b"));
        assert_eq!(r.queued(), 0);
        r.on_incoming(&data(2, b"c"));

        let kinds: Vec<FrameKind> = r
            .link()
            .iter()
            .map(|b| Frame::decode(b).unwrap().kind())
            .collect();
        assert_eq!(kinds, vec![FrameKind::Data, FrameKind::Data, FrameKind::Ack]);
    }

    #[test]
    fn delivery_depends_on_seq_not_frame_type() {
        let mut r = receiver();
        let in_order = Frame::new(FrameKind::Ack, 0, 0, b"x".to_vec()).unwrap();
        r.on_incoming(&in_order.encode());
        assert_eq!(r.network(), &vec![b"x".to_vec()]);
        assert_eq!(r.expected_seq(), 1);
        assert_eq!(last_sent(&r).ack(), 0);

        // A bare ACK with the wrong seq is out of order like any other frame.
        r.on_incoming(&Frame::ack_only(3).unwrap().encode());
        assert_eq!(r.network().len(), 1);
        assert_eq!(r.expected_seq(), 1);
    }

    #[test]
    fn enqueue_rejects_oversized_payload() {
        let mut r = receiver();
        assert_eq!(
            r.enqueue_outgoing(vec![0; 300]),
            Err(FrameError::PayloadTooLarge(300))
        );
    }
}
