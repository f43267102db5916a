//! Unreliable point-to-point medium.
//!
//! Real links drop and corrupt frames.  To exercise the reliability
//! mechanisms without depending on actual network conditions, [`Channel`]
//! applies a configurable fault model to every transmission before routing
//! it to the endpoint on the other side:
//!
//! | Fault      | Description                                              |
//! |------------|----------------------------------------------------------|
//! | Loss       | Drop the frame silently with probability `loss_prob`.    |
//! | Corruption | Invert every bit of one random byte (`XOR 0xFF`) with    |
//! |            | probability `corrupt_prob`.                              |
//!
//! There is no reordering and no duplication: each direction is a bounded
//! FIFO queue read by the destination endpoint's task.  A frame that finds
//! the queue full is dropped, exactly like a frame lost on the wire.
//!
//! Endpoints never hold the `Channel`; they hold a [`ChannelLink`] obtained
//! from [`Channel::link`], which implements [`Link`].

use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

use crate::config::{check_probability, ConfigError};
use crate::events::{EventSink, LinkEvent};
use crate::link::Link;

/// Default per-direction queue depth.
pub const DEFAULT_CAPACITY: usize = 64;

/// Which endpoint a frame is travelling towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    SenderToReceiver,
    ReceiverToSender,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SenderToReceiver => write!(f, "sender→receiver"),
            Self::ReceiverToSender => write!(f, "receiver→sender"),
        }
    }
}

/// Configuration for the fault-injection model.
///
/// All probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Probability that any given frame is silently dropped.
    pub loss_prob: f64,
    /// Probability that a surviving frame has one byte inverted.
    pub corrupt_prob: f64,
    /// Frames that may queue per direction before new ones are dropped.
    pub capacity: usize,
    /// Seed for reproducible fault sequences (`None` = seeded from the OS).
    pub seed: Option<u64>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        // No faults by default: the channel is a transparent pass-through.
        Self {
            loss_prob: 0.0,
            corrupt_prob: 0.0,
            capacity: DEFAULT_CAPACITY,
            seed: None,
        }
    }
}

impl ChannelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("loss_prob", self.loss_prob)?;
        check_probability("corrupt_prob", self.corrupt_prob)?;
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FaultModel
// ---------------------------------------------------------------------------

/// What the medium decided to do with one transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    Lost,
    Corrupted { offset: usize },
    Delivered,
    /// Survived the medium but the destination queue was full.
    Overflowed,
}

/// Per-transmission loss/corruption decisions driven by a seedable RNG.
#[derive(Debug)]
pub struct FaultModel {
    loss_prob: f64,
    corrupt_prob: f64,
    rng: StdRng,
}

impl FaultModel {
    pub fn new(loss_prob: f64, corrupt_prob: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            loss_prob,
            corrupt_prob,
            rng,
        }
    }

    /// Decide the fate of `frame`, corrupting it in place when required.
    ///
    /// Never returns [`Fate::Overflowed`]; that is the router's call.
    pub fn apply(&mut self, frame: &mut [u8]) -> Fate {
        if self.rng.random::<f64>() < self.loss_prob {
            return Fate::Lost;
        }
        if !frame.is_empty() && self.rng.random::<f64>() < self.corrupt_prob {
            let offset = self.rng.random_range(0..frame.len());
            frame[offset] ^= 0xff;
            return Fate::Corrupted { offset };
        }
        Fate::Delivered
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Receiving ends of the two directions, handed to the endpoint tasks.
#[derive(Debug)]
pub struct Inboxes {
    /// Frames travelling receiver→sender.
    pub sender: mpsc::Receiver<Vec<u8>>,
    /// Frames travelling sender→receiver.
    pub receiver: mpsc::Receiver<Vec<u8>>,
}

#[derive(Debug)]
struct Shared {
    faults: Mutex<FaultModel>,
    to_receiver: mpsc::Sender<Vec<u8>>,
    to_sender: mpsc::Sender<Vec<u8>>,
    events: EventSink,
}

/// The simulated medium.  Cloning yields another handle to the same medium.
#[derive(Debug, Clone)]
pub struct Channel {
    shared: Arc<Shared>,
}

impl Channel {
    /// Build a channel and the two inboxes its frames arrive on.
    pub fn new(config: &ChannelConfig, events: EventSink) -> Result<(Self, Inboxes), ConfigError> {
        config.validate()?;
        let (to_receiver, receiver) = mpsc::channel(config.capacity);
        let (to_sender, sender) = mpsc::channel(config.capacity);
        let shared = Shared {
            faults: Mutex::new(FaultModel::new(
                config.loss_prob,
                config.corrupt_prob,
                config.seed,
            )),
            to_receiver,
            to_sender,
            events,
        };
        Ok((
            Self {
                shared: Arc::new(shared),
            },
            Inboxes { sender, receiver },
        ))
    }

    /// Register a transmitter for one direction.
    pub fn link(&self, direction: Direction) -> ChannelLink {
        ChannelLink {
            channel: self.clone(),
            direction,
        }
    }

    /// Push one frame through the medium towards the endpoint selected by
    /// `direction`.
    pub fn transmit(&self, mut frame: Vec<u8>, direction: Direction) -> Fate {
        let fate = self
            .shared
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(&mut frame);

        match fate {
            Fate::Lost => {
                log::debug!("[channel] {direction} frame lost");
                self.shared.events.emit(LinkEvent::Lost { direction });
                return fate;
            }
            Fate::Corrupted { offset } => {
                log::debug!("[channel] {direction} frame corrupted at byte {offset}");
                self.shared
                    .events
                    .emit(LinkEvent::Corrupted { direction, offset });
            }
            Fate::Delivered | Fate::Overflowed => {}
        }

        let route = match direction {
            Direction::SenderToReceiver => &self.shared.to_receiver,
            Direction::ReceiverToSender => &self.shared.to_sender,
        };
        match route.try_send(frame) {
            Ok(()) => fate,
            Err(_) => {
                log::warn!("[channel] {direction} inbox full or closed; frame dropped");
                self.shared.events.emit(LinkEvent::Overflowed { direction });
                Fate::Overflowed
            }
        }
    }
}

/// Opaque transmit capability for one direction of a [`Channel`].
#[derive(Debug, Clone)]
pub struct ChannelLink {
    channel: Channel,
    direction: Direction,
}

impl ChannelLink {
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl Link for ChannelLink {
    fn transmit(&mut self, frame: Vec<u8>) {
        self.channel.transmit(frame, self.direction);
    }
}
