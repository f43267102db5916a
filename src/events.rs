//! Structured protocol events for observers and test harnesses.
//!
//! Components emit a [`LinkEvent`] at every interesting step (frame sent,
//! lost, corrupted, delivered, acknowledged, …) through an [`EventSink`].
//! A sink without an observer attached is a no-op, and a dropped observer is
//! ignored: emission never blocks and never affects the protocol.

use tokio::sync::mpsc;

use crate::channel::Direction;
use crate::frame::{DecodeError, FrameKind};

/// Why an endpoint threw an inbound frame away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// The bytes did not decode (treated as a lost frame).
    Undecodable(DecodeError),
    /// Valid frame, but not the sequence number the receiver expects.
    OutOfOrder { seq: u8, expected: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// An endpoint handed a frame to the channel.
    Sent {
        direction: Direction,
        kind: FrameKind,
        seq: u8,
        ack: u8,
        retransmission: bool,
    },
    /// The channel dropped a frame.
    Lost { direction: Direction },
    /// The channel inverted one byte of a frame.
    Corrupted { direction: Direction, offset: usize },
    /// The destination inbox was full; the frame was dropped.
    Overflowed { direction: Direction },
    /// A payload travelling in `direction` was handed to the network layer.
    Delivered { direction: Direction, len: usize },
    /// An inbound frame was thrown away by the endpoint at the end of `direction`.
    Discarded {
        direction: Direction,
        reason: DiscardReason,
    },
    /// A cumulative ack slid the sender's window.
    Acked { ack: u8, base: u64 },
    /// An ack matched nothing outstanding; `base` unchanged.
    StaleAck { ack: u8, base: u64 },
    /// The retransmission timer fired; the whole window went out again.
    Timeout { retransmitted: usize },
    /// Window full under the reject policy; the payload was dropped.
    Rejected,
    /// Window full under the queue policy; the payload waits in the backlog.
    Queued { backlog: usize },
}

/// Cheap, cloneable handle for emitting [`LinkEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<LinkEvent>>,
}

impl EventSink {
    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// A sink wired to a fresh observer queue.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, event: LinkEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
