//! `gbn-arq` — Go-Back-N ARQ over a simulated unreliable link.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐  DATA frames   ┌─────────┐  DATA frames  ┌──────────┐
//!  │  Sender  │───────────────▶│         │──────────────▶│ Receiver │
//!  │ (window, │                │ Channel │               │ (in-order│
//!  │  timer)  │◀───────────────│ (loss,  │◀──────────────│  + acks) │
//!  └────┬─────┘  ACK / DATA+ACK│ corrupt)│ ACK / DATA+ACK└────┬─────┘
//!       │                      └─────────┘                    │
//!       │ deliver (piggybacked)                     deliver   │
//!       ▼                                                     ▼
//!   network layer                                     network layer
//! ```
//!
//! Each module has a single responsibility:
//! - [`frame`]    — wire format (encode / decode, checksum)
//! - [`channel`]  — lossy/corrupting medium with per-direction FIFO routing
//! - [`link`]     — the `Link` / `NetworkLayer` capabilities endpoints use
//! - [`sender`]   — Go-Back-N sliding-window send-side state machine
//! - [`receiver`] — Go-Back-N in-order receive-side state machine
//! - [`timer`]    — single retransmission timer for the window
//! - [`events`]   — structured events for observers and tests
//! - [`config`]   — construction-time configuration and its validation
//! - [`session`]  — sender and receiver as independent tokio tasks

pub mod channel;
pub mod config;
pub mod events;
pub mod frame;
pub mod link;
pub mod receiver;
pub mod sender;
pub mod session;
pub mod timer;

pub use channel::{Channel, ChannelConfig, ChannelLink, Direction, Fate};
pub use config::{ConfigError, LinkConfig};
pub use events::{EventSink, LinkEvent};
pub use frame::{DecodeError, Frame, FrameError, FrameKind, MAX_SEQ};
pub use link::{Link, NetworkLayer};
pub use receiver::Receiver;
pub use sender::{Sender, SenderConfig, SenderStats, SubmitOutcome, WindowFullPolicy};
pub use session::{LinkSession, SessionError, SessionSummary};
