//! The two narrow capabilities a protocol endpoint depends on.
//!
//! - [`Link`] — hand an encoded frame to the medium.
//! - [`NetworkLayer`] — hand a received payload up to the application.
//!
//! Endpoints never see the [`crate::channel::Channel`] itself, only a
//! [`crate::channel::ChannelLink`] (or any other `Link`), so tests can swap
//! in a plain `Vec` to capture traffic.

use tokio::sync::mpsc;

/// Outbound half of a point-to-point medium.
pub trait Link {
    /// Transmit one encoded frame.  Loss is silent: there is no result.
    fn transmit(&mut self, frame: Vec<u8>);
}

/// Consumer of payloads that made it through the protocol.
pub trait NetworkLayer {
    /// Called once per payload handed upward.
    fn deliver(&mut self, payload: Vec<u8>);
}

/// Records every transmitted frame in order.
impl Link for Vec<Vec<u8>> {
    fn transmit(&mut self, frame: Vec<u8>) {
        self.push(frame);
    }
}

/// Forwards frames over an in-process queue.  A closed queue behaves like a
/// cut cable.
impl Link for mpsc::UnboundedSender<Vec<u8>> {
    fn transmit(&mut self, frame: Vec<u8>) {
        let _ = self.send(frame);
    }
}

impl NetworkLayer for Vec<Vec<u8>> {
    fn deliver(&mut self, payload: Vec<u8>) {
        self.push(payload);
    }
}

impl NetworkLayer for mpsc::UnboundedSender<Vec<u8>> {
    fn deliver(&mut self, payload: Vec<u8>) {
        if self.send(payload).is_err() {
            log::warn!("network layer went away; payload dropped");
        }
    }
}
