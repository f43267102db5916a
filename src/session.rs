//! Concurrent wiring: sender and receiver as independent tokio tasks.
//!
//! # Architecture
//!
//! ```text
//!  Application                          LinkSession
//!      │  submit / enqueue_outgoing     ┌──────────────────────────┐
//!      ├──────────────────────────────▶ │ submit_tx   outgoing_tx  │
//!      │  recv_at_receiver / _sender    │ at_receiver at_sender    │
//!      ◀─────────────────────────────── └─────┬──────────────┬─────┘
//!                                             │              │
//!                                  sender task│              │receiver task
//!                                   ┌─────────▼───┐      ┌───▼─────────┐
//!                                   │ Sender      │      │ Receiver    │
//!                                   │ + interval  │      │             │
//!                                   └──────┬──────┘      └──────┬──────┘
//!                                          │   Channel (faults) │
//!                                          └──────▶ FIFO ◀──────┘
//! ```
//!
//! Each task owns its endpoint outright, so no state is shared between
//! threads of control.  Frames travel over the channel's bounded per-direction
//! queues; nothing recurses.
//!
//! ```ignore
//! let mut session = LinkSession::spawn(LinkConfig::default(), EventSink::disabled())?;
//! session.enqueue_outgoing(b"reply".to_vec()).await?;
//! session.submit(b"hello".to_vec()).await?;
//! let data = session.recv_at_receiver().await;
//! let summary = session.close().await?;
//! ```

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;

use crate::channel::{Channel, ChannelLink, Direction};
use crate::config::{ConfigError, LinkConfig};
use crate::events::EventSink;
use crate::frame::{check_payload, FrameError};
use crate::receiver::Receiver;
use crate::sender::{Sender, SenderStats, SubmitOutcome};

/// Depth of the application → endpoint command queues.
const COMMAND_CAPACITY: usize = 64;

type Delivery = mpsc::UnboundedSender<Vec<u8>>;
type SessionSender = Sender<ChannelLink, Delivery>;
type SessionReceiver = Receiver<ChannelLink, Delivery>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("endpoint task has stopped")]
    Closed,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("endpoint task failed: {0}")]
    Join(#[from] JoinError),
}

/// Final state reported by [`LinkSession::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub sender: SenderStats,
    /// The receiver's `expected_seq` when it stopped.
    pub expected_seq: u8,
}

struct Submit {
    payload: Vec<u8>,
    reply: oneshot::Sender<Result<SubmitOutcome, FrameError>>,
}

// ---------------------------------------------------------------------------
// LinkSession
// ---------------------------------------------------------------------------

/// Handle to a running sender/channel/receiver trio.
pub struct LinkSession {
    submit_tx: mpsc::Sender<Submit>,
    outgoing_tx: mpsc::Sender<Vec<u8>>,
    at_receiver: mpsc::UnboundedReceiver<Vec<u8>>,
    at_sender: mpsc::UnboundedReceiver<Vec<u8>>,
    sender_task: JoinHandle<SenderStats>,
    receiver_task: JoinHandle<u8>,
}

impl LinkSession {
    /// Validate `config`, build the channel and spawn both endpoint tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(config: LinkConfig, events: EventSink) -> Result<Self, ConfigError> {
        config.validate()?;
        let (channel, inboxes) = Channel::new(&config.channel, events.clone())?;

        let (to_receiver_app, at_receiver) = mpsc::unbounded_channel();
        let (to_sender_app, at_sender) = mpsc::unbounded_channel();

        let sender = Sender::new(
            &config.sender,
            channel.link(Direction::SenderToReceiver),
            to_sender_app,
            events.clone(),
        )?;
        let receiver = Receiver::new(
            channel.link(Direction::ReceiverToSender),
            to_receiver_app,
            events,
        );

        let (submit_tx, submit_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(COMMAND_CAPACITY);

        let sender_task = tokio::spawn(run_sender(
            sender,
            inboxes.sender,
            submit_rx,
            config.tick_interval,
        ));
        let receiver_task = tokio::spawn(run_receiver(receiver, inboxes.receiver, outgoing_rx));

        Ok(Self {
            submit_tx,
            outgoing_tx,
            at_receiver,
            at_sender,
            sender_task,
            receiver_task,
        })
    }

    /// Hand a payload to the sender and report what it did with it.
    pub async fn submit(&self, payload: Vec<u8>) -> Result<SubmitOutcome, SessionError> {
        let (reply, outcome) = oneshot::channel();
        self.submit_tx
            .send(Submit { payload, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        let outcome = outcome.await.map_err(|_| SessionError::Closed)??;
        Ok(outcome)
    }

    /// Queue a payload at the receiver for piggybacking.
    pub async fn enqueue_outgoing(&self, payload: Vec<u8>) -> Result<(), SessionError> {
        check_payload(&payload)?;
        self.outgoing_tx
            .send(payload)
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Next payload the receiver delivered in order.
    pub async fn recv_at_receiver(&mut self) -> Option<Vec<u8>> {
        self.at_receiver.recv().await
    }

    /// Next payload that rode back to the sender.
    pub async fn recv_at_sender(&mut self) -> Option<Vec<u8>> {
        self.at_sender.recv().await
    }

    /// A payload that already rode back to the sender, without waiting.
    pub fn try_recv_at_sender(&mut self) -> Option<Vec<u8>> {
        self.at_sender.try_recv().ok()
    }

    /// Stop both tasks and collect their final state.
    pub async fn close(self) -> Result<SessionSummary, SessionError> {
        let Self {
            submit_tx,
            outgoing_tx,
            sender_task,
            receiver_task,
            ..
        } = self;
        // Closing the command queues ends both event loops.
        drop(submit_tx);
        drop(outgoing_tx);

        let sender = sender_task.await?;
        let expected_seq = receiver_task.await?;
        Ok(SessionSummary {
            sender,
            expected_seq,
        })
    }
}

// ---------------------------------------------------------------------------
// Event loops
// ---------------------------------------------------------------------------

async fn run_sender(
    mut sender: SessionSender,
    mut inbox: mpsc::Receiver<Vec<u8>>,
    mut commands: mpsc::Receiver<Submit>,
    tick_every: Duration,
) -> SenderStats {
    let mut ticker = tokio::time::interval(tick_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            // ── Branch 1: frame from the receiver ────────────────────────
            Some(bytes) = inbox.recv() => sender.on_incoming(&bytes),

            // ── Branch 2: payload from the application ───────────────────
            cmd = commands.recv() => {
                let Some(Submit { payload, reply }) = cmd else {
                    break;
                };
                let _ = reply.send(sender.submit(payload));
            }

            // ── Branch 3: driver tick ────────────────────────────────────
            _ = ticker.tick() => {
                sender.tick();
            }
        }
    }

    let stats = sender.stats();
    log::debug!("[sender] task stopped: {stats:?}");
    stats
}

async fn run_receiver(
    mut receiver: SessionReceiver,
    mut inbox: mpsc::Receiver<Vec<u8>>,
    mut outgoing: mpsc::Receiver<Vec<u8>>,
) -> u8 {
    loop {
        tokio::select! {
            // Queued replies first, so a reply enqueued before a frame
            // arrives is there to ride on it.
            biased;

            payload = outgoing.recv() => {
                let Some(payload) = payload else {
                    break;
                };
                if let Err(e) = receiver.enqueue_outgoing(payload) {
                    log::warn!("[receiver] outgoing payload refused: {e}");
                }
            }

            Some(bytes) = inbox.recv() => receiver.on_incoming(&bytes),
        }
    }

    log::debug!("[receiver] task stopped at expected_seq={}", receiver.expected_seq());
    receiver.expected_seq()
}
