//! Construction-time configuration for a simulated link.
//!
//! Each component owns its own config struct ([`ChannelConfig`],
//! [`SenderConfig`]); [`LinkConfig`] bundles them together with the driver's
//! tick cadence.  Configuration misuse is the only error class that is
//! rejected up front; everything that happens on the wire is recovered by
//! the protocol itself.

use std::time::Duration;

use thiserror::Error;

use crate::channel::ChannelConfig;
use crate::frame::MAX_SEQ;
use crate::sender::SenderConfig;

/// Default cadence of the driver's timeout check.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be a probability in [0, 1], got {value}")]
    Probability { name: &'static str, value: f64 },
    #[error("window size {0} must be between 1 and {max}", max = MAX_SEQ - 1)]
    WindowSize(usize),
    #[error("retransmission timeout must be non-zero")]
    ZeroTimeout,
    #[error("tick interval must be non-zero")]
    ZeroTickInterval,
    #[error("channel capacity must be non-zero")]
    ZeroCapacity,
}

/// Everything needed to spin up a sender, a receiver and the channel
/// between them.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub channel: ChannelConfig,
    pub sender: SenderConfig,
    /// How often the driver calls [`crate::sender::Sender::tick`].
    pub tick_interval: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            sender: SenderConfig::default(),
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

impl LinkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.channel.validate()?;
        self.sender.validate()?;
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroTickInterval);
        }
        Ok(())
    }
}

/// Check that `value` is a finite probability.
pub(crate) fn check_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Probability { name, value })
    }
}
