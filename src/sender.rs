//! Go-Back-N send-side state machine.
//!
//! [`Sender`] maintains a sliding window of up to `window_size` in-flight
//! frames.  Multiple frames may be outstanding simultaneously.
//!
//! # Protocol contract
//!
//! - At most `window_size` (≤ 7) frames may be in flight at once.  Eight
//!   would make the three-bit ack ambiguous between "everything
//!   acknowledged" and "nothing acknowledged".
//! - ACKs are **cumulative**: `ack = K` means every frame up to and
//!   including wire sequence number `K` arrived.
//! - On timeout the whole window is retransmitted in ascending order (go
//!   back to N).
//! - `base` and `next_seq` are absolute counters that never wrap; only
//!   [`wire_seq`] reduces them modulo 8.
//! - One timer covers the whole window: armed whenever frames are
//!   outstanding, restarted on every inbound ack, cancelled when the window
//!   drains.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

use crate::channel::Direction;
use crate::config::ConfigError;
use crate::events::{DiscardReason, EventSink, LinkEvent};
use crate::frame::{check_payload, wire_seq, Frame, FrameError, FrameKind, MAX_SEQ};
use crate::link::{Link, NetworkLayer};
use crate::timer::{RetransmitTimer, DEFAULT_TIMEOUT};

/// Largest legal window for a three-bit sequence space.
pub const MAX_WINDOW: usize = MAX_SEQ as usize - 1;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What [`Sender::submit`] does when the window is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowFullPolicy {
    /// Drop the payload and tell the caller; resubmission is their business.
    #[default]
    Reject,
    /// Hold the payload in an unbounded backlog and send it once the window
    /// opens.
    Queue,
}

#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub window_size: usize,
    pub timeout: Duration,
    pub policy: WindowFullPolicy,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            window_size: MAX_WINDOW,
            timeout: DEFAULT_TIMEOUT,
            policy: WindowFullPolicy::Reject,
        }
    }
}

impl SenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 || self.window_size > MAX_WINDOW {
            return Err(ConfigError::WindowSize(self.window_size));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Outcomes and stats
// ---------------------------------------------------------------------------

/// Result of handing a payload to [`Sender::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Transmitted immediately as absolute sequence number `seq`.
    Sent { seq: u64 },
    /// Window full; waiting in the backlog behind `backlog - 1` others.
    Queued { backlog: usize },
    /// Window full; the payload was dropped.
    Rejected,
}

/// A snapshot of the sender's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SenderStats {
    pub base: u64,
    pub next_seq: u64,
    pub outstanding: usize,
    pub backlog: usize,
    /// Frames sent again because of a timeout.
    pub retransmissions: u64,
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Go-Back-N send-side endpoint.
///
/// # Sequence-number layout
///
/// ```text
///    base              next_seq        base + window_size
///      │                   │                  │
///  ────┼───────────────────┼──────────────────┼──────▶ absolute seq
///      │ <── in flight ──▶ │ <── sendable ──▶ │
/// ```
#[derive(Debug)]
pub struct Sender<L, N> {
    /// Oldest unacknowledged absolute sequence number (left window edge).
    base: u64,
    /// Absolute sequence number for the next new frame.
    next_seq: u64,
    window_size: usize,
    policy: WindowFullPolicy,
    /// Frames in flight keyed by absolute sequence; keys are exactly
    /// `base..next_seq`.
    buffer: BTreeMap<u64, Frame>,
    /// Payloads waiting for window space under [`WindowFullPolicy::Queue`].
    backlog: VecDeque<Vec<u8>>,
    timer: RetransmitTimer,
    retransmissions: u64,
    link: L,
    network: N,
    events: EventSink,
}

impl<L: Link, N: NetworkLayer> Sender<L, N> {
    /// Create an idle sender transmitting over `link` and delivering
    /// piggybacked payloads to `network`.
    pub fn new(
        config: &SenderConfig,
        link: L,
        network: N,
        events: EventSink,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            base: 0,
            next_seq: 0,
            window_size: config.window_size,
            policy: config.policy,
            buffer: BTreeMap::new(),
            backlog: VecDeque::new(),
            timer: RetransmitTimer::new(config.timeout),
            retransmissions: 0,
            link,
            network,
            events,
        })
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Number of frames currently awaiting acknowledgement.
    pub fn in_flight(&self) -> usize {
        (self.next_seq - self.base) as usize
    }

    /// `true` when there is room for at least one more frame.
    pub fn can_send(&self) -> bool {
        self.next_seq < self.base + self.window_size as u64
    }

    /// `true` when at least one frame is awaiting acknowledgement.
    pub fn has_unacked(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn timer(&self) -> &RetransmitTimer {
        &self.timer
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn stats(&self) -> SenderStats {
        SenderStats {
            base: self.base,
            next_seq: self.next_seq,
            outstanding: self.buffer.len(),
            backlog: self.backlog.len(),
            retransmissions: self.retransmissions,
        }
    }

    /// Accept a payload from the network layer.
    ///
    /// Sends it at once when the window has room.  Otherwise the configured
    /// [`WindowFullPolicy`] decides between dropping it and queueing it.
    /// While a backlog exists new payloads join its tail so submission order
    /// is kept.
    pub fn submit(&mut self, payload: Vec<u8>) -> Result<SubmitOutcome, FrameError> {
        check_payload(&payload)?;

        if self.can_send() && self.backlog.is_empty() {
            let seq = self.send_new(payload)?;
            return Ok(SubmitOutcome::Sent { seq });
        }

        match self.policy {
            WindowFullPolicy::Reject => {
                log::debug!(
                    "[sender] window full ({} / {}); payload rejected",
                    self.in_flight(),
                    self.window_size
                );
                self.events.emit(LinkEvent::Rejected);
                Ok(SubmitOutcome::Rejected)
            }
            WindowFullPolicy::Queue => {
                self.backlog.push_back(payload);
                let backlog = self.backlog.len();
                log::debug!("[sender] window full; payload queued (backlog={backlog})");
                self.events.emit(LinkEvent::Queued { backlog });
                Ok(SubmitOutcome::Queued { backlog })
            }
        }
    }

    /// Handle a frame arriving from the receiver: a standalone ACK or DATA
    /// carrying a piggybacked ACK.
    pub fn on_incoming(&mut self, bytes: &[u8]) {
        let frame = match Frame::decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                // Same as a lost ack: only the timer recovers from this.
                log::debug!("[sender] ← undecodable frame discarded: {e}");
                self.events.emit(LinkEvent::Discarded {
                    direction: Direction::ReceiverToSender,
                    reason: DiscardReason::Undecodable(e),
                });
                return;
            }
        };

        let ack = frame.ack();
        if frame.kind() == FrameKind::Data {
            let payload = frame.into_payload();
            log::debug!("[sender] ← DATA len={} ack={ack}", payload.len());
            self.events.emit(LinkEvent::Delivered {
                direction: Direction::ReceiverToSender,
                len: payload.len(),
            });
            self.network.deliver(payload);
        } else {
            log::debug!("[sender] ← ACK ack={ack}");
        }

        self.on_ack(ack);
        self.fill_from_backlog();
    }

    /// Apply a cumulative ack and restart or cancel the timer.
    ///
    /// Returns the number of frames newly acknowledged.
    fn on_ack(&mut self, ack: u8) -> u64 {
        let old_base = self.base;
        // Wire values within one window are distinct, so the earliest match
        // is the only one.
        if let Some(s) = (self.base..self.next_seq).find(|s| wire_seq(*s) == ack) {
            self.base = s + 1;
            log::debug!("[sender] ack={ack} slides base {old_base} → {}", self.base);
            self.events.emit(LinkEvent::Acked {
                ack,
                base: self.base,
            });
        } else {
            log::debug!("[sender] stale ack={ack} (base={})", self.base);
            self.events.emit(LinkEvent::StaleAck {
                ack,
                base: self.base,
            });
        }

        let base = self.base;
        self.buffer.retain(|seq, _| *seq >= base);

        if self.buffer.is_empty() {
            self.timer.cancel();
        } else {
            self.timer.arm(Instant::now());
        }
        self.base - old_base
    }

    /// Driver entry point: retransmit the whole window if the timer expired.
    ///
    /// Returns the number of frames retransmitted.
    pub fn tick(&mut self) -> usize {
        let now = Instant::now();
        if !self.timer.expired(now) {
            return 0;
        }
        self.timer.arm(now);

        let frames: Vec<Frame> = self.buffer.values().cloned().collect();
        log::debug!("[sender] timeout, retransmitting {} frame(s)", frames.len());
        self.events.emit(LinkEvent::Timeout {
            retransmitted: frames.len(),
        });
        for frame in &frames {
            self.transmit(frame, true);
        }
        self.retransmissions += frames.len() as u64;
        frames.len()
    }

    /// Frame, transmit and buffer one payload.  Caller checks window space.
    fn send_new(&mut self, payload: Vec<u8>) -> Result<u64, FrameError> {
        debug_assert!(self.can_send(), "send_new called on a full window");
        let seq = self.next_seq;
        let frame = Frame::data(wire_seq(seq), 0, payload)?;
        let was_idle = self.buffer.is_empty();

        self.transmit(&frame, false);
        self.buffer.insert(seq, frame);
        self.next_seq += 1;

        if was_idle {
            self.timer.arm(Instant::now());
        }
        Ok(seq)
    }

    /// Move queued payloads into the window while it has room.
    fn fill_from_backlog(&mut self) {
        while self.can_send() {
            let Some(payload) = self.backlog.pop_front() else {
                break;
            };
            // Payload sizes were checked on submit.
            if let Err(e) = self.send_new(payload) {
                log::warn!("[sender] dropping queued payload: {e}");
            }
        }
    }

    fn transmit(&mut self, frame: &Frame, retransmission: bool) {
        log::debug!(
            "[sender] → DATA seq={} len={}{}",
            frame.seq(),
            frame.payload().len(),
            if retransmission { " (retransmit)" } else { "" }
        );
        self.events.emit(LinkEvent::Sent {
            direction: Direction::SenderToReceiver,
            kind: frame.kind(),
            seq: frame.seq(),
            ack: frame.ack(),
            retransmission,
        });
        self.link.transmit(frame.encode());
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
