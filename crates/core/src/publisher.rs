//! Outbound event channel.
//!
//! Jobs and the dispatcher emit [`Envelope`]s through a [`Publisher`]; the
//! transport owns the receiving end and fans each envelope out to its peers
//! (the broker in embedded mode, the relay socket in the agent).

use tokio::sync::mpsc;

use crate::protocol::Envelope;

/// Cloneable handle for emitting envelopes.
///
/// Publishing never blocks and never fails from the caller's point of view:
/// if the receiving side is gone the envelope is dropped.
#[derive(Debug, Clone)]
pub struct Publisher {
    sender: mpsc::UnboundedSender<Envelope>,
}

impl Publisher {
    /// Create a publisher and the receiver that drains it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (sender, rx) = mpsc::unbounded_channel();
        (Self { sender }, rx)
    }

    pub fn publish(&self, envelope: Envelope) {
        if self.sender.send(envelope).is_err() {
            tracing::trace!("Publisher has no receiver, envelope dropped");
        }
    }

    pub fn log(&self, message: impl Into<String>) {
        self.publish(Envelope::LogMsg(message.into()));
    }

    pub fn chat(&self, message: impl Into<String>) {
        self.publish(Envelope::ChatMsg(message.into()));
    }

    pub fn alert(&self, message: impl Into<String>) {
        self.publish(Envelope::Alert(message.into()));
    }
}
