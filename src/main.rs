//! Entry point for `gbn-arq`.
//!
//! Runs one simulated transfer: queues replies at the receiver, pushes
//! messages through the sender, and waits until every message has been
//! delivered in order.  All protocol work is delegated to the library;
//! `main.rs` owns only process setup (logging, argument parsing) and the
//! driver loop.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use gbn_arq::{
    ChannelConfig, EventSink, LinkConfig, LinkSession, SenderConfig, SubmitOutcome,
    WindowFullPolicy,
};

/// Go-Back-N ARQ over a simulated lossy, corrupting link.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Probability that a frame is lost.
    #[arg(long, default_value_t = 0.1)]
    loss: f64,

    /// Probability that a surviving frame has one byte inverted.
    #[arg(long, default_value_t = 0.2)]
    corrupt: f64,

    /// Sender window size (1–7).
    #[arg(short, long, default_value_t = 7)]
    window: usize,

    /// Retransmission timeout in milliseconds.
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    /// Interval between timeout checks in milliseconds.
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,

    /// Seed for the channel's fault injection.
    #[arg(long)]
    seed: Option<u64>,

    /// What the sender does when its window is full.
    #[arg(long, value_enum, default_value_t = Policy::Queue)]
    policy: Policy,

    /// Number of messages sent from sender to receiver.
    #[arg(short, long, default_value_t = 9)]
    messages: usize,

    /// Number of replies queued at the receiver for piggybacking.
    #[arg(short, long, default_value_t = 4)]
    replies: usize,

    /// Give up if the transfer has not finished after this many seconds.
    #[arg(long, default_value_t = 60)]
    deadline_secs: u64,

    /// Log every protocol event at info level.
    #[arg(long)]
    trace_events: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    /// Drop payloads submitted while the window is full; the driver retries.
    Reject,
    /// Hold them in a backlog until the window opens.
    Queue,
}

impl From<Policy> for WindowFullPolicy {
    fn from(p: Policy) -> Self {
        match p {
            Policy::Reject => WindowFullPolicy::Reject,
            Policy::Queue => WindowFullPolicy::Queue,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let config = LinkConfig {
        channel: ChannelConfig {
            loss_prob: cli.loss,
            corrupt_prob: cli.corrupt,
            seed: cli.seed,
            ..ChannelConfig::default()
        },
        sender: SenderConfig {
            window_size: cli.window,
            timeout: Duration::from_millis(cli.timeout_ms),
            policy: cli.policy.into(),
        },
        tick_interval: Duration::from_millis(cli.tick_ms),
    };

    let events = if cli.trace_events {
        let (sink, mut rx) = EventSink::channel();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                log::info!("event: {event:?}");
            }
        });
        sink
    } else {
        EventSink::disabled()
    };

    let tick = config.tick_interval;
    let mut session = LinkSession::spawn(config, events).context("invalid link configuration")?;

    for i in 1..=cli.replies {
        session.enqueue_outgoing(format!("reply-{i}").into_bytes()).await?;
    }

    let transfer = async {
        for i in 1..=cli.messages {
            let payload = format!("msg-{i}").into_bytes();
            // Under the reject policy retrying is the caller's job.
            while session.submit(payload.clone()).await? == SubmitOutcome::Rejected {
                log::debug!("window full; retrying msg-{i}");
                tokio::time::sleep(tick).await;
            }
        }

        let mut delivered = 0;
        while delivered < cli.messages {
            match session.recv_at_receiver().await {
                Some(payload) => {
                    delivered += 1;
                    log::info!("receiver delivered: {}", String::from_utf8_lossy(&payload));
                }
                None => bail!("receiver stopped after {delivered} messages"),
            }
        }
        Ok::<_, anyhow::Error>(())
    };

    let deadline = Duration::from_secs(cli.deadline_secs);
    let finished = tokio::time::timeout(deadline, transfer).await;

    while let Some(payload) = session.try_recv_at_sender() {
        log::info!("sender delivered: {}", String::from_utf8_lossy(&payload));
    }

    let summary = session.close().await?;
    log::info!(
        "done: base={} next_seq={} retransmissions={} receiver expected_seq={}",
        summary.sender.base,
        summary.sender.next_seq,
        summary.sender.retransmissions,
        summary.expected_seq
    );

    match finished {
        Ok(result) => result,
        Err(_) => bail!("transfer did not finish within {deadline:?}"),
    }
}
