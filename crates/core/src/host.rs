//! Capability surface of the embedded scripting host.
//!
//! Job bodies, the dispatcher and the inventory poller only ever talk to the
//! host through [`HostCapabilities`]. A real embedding links its own
//! implementation; [`ConsoleHost`] stands in when none is available.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// A simulated player input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Attack,
    Use,
    Forward,
    Backward,
    Left,
    Right,
    Jump,
    Sneak,
    Sprint,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputKind::Attack => "attack",
            InputKind::Use => "use",
            InputKind::Forward => "forward",
            InputKind::Backward => "backward",
            InputKind::Left => "left",
            InputKind::Right => "right",
            InputKind::Jump => "jump",
            InputKind::Sneak => "sneak",
            InputKind::Sprint => "sprint",
        };
        f.write_str(name)
    }
}

/// One raw inventory slot as the host reports it (`minecraft:stone`, 12).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventorySlot {
    pub item_id: String,
    pub count: u32,
}

/// Automation primitives exposed by the host.
///
/// Calls are synchronous and must be cheap enough to issue from any task.
pub trait HostCapabilities: Send + Sync {
    fn send_chat(&self, text: &str) -> Result<(), HostError>;

    fn read_inventory(&self) -> Result<Vec<InventorySlot>, HostError>;

    fn simulate_input(&self, kind: InputKind, pressed: bool) -> Result<(), HostError>;

    /// Write to the host's own console; never fails.
    fn log_to_console(&self, text: &str);
}

/// Host stand-in that writes everything to the log.
#[derive(Debug, Clone, Default)]
pub struct ConsoleHost;

impl HostCapabilities for ConsoleHost {
    fn send_chat(&self, text: &str) -> Result<(), HostError> {
        tracing::info!(text, "[chat]");
        Ok(())
    }

    fn read_inventory(&self) -> Result<Vec<InventorySlot>, HostError> {
        Ok(Vec::new())
    }

    fn simulate_input(&self, kind: InputKind, pressed: bool) -> Result<(), HostError> {
        tracing::debug!(%kind, pressed, "[input]");
        Ok(())
    }

    fn log_to_console(&self, text: &str) {
        tracing::info!(text, "[console]");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_kind_wire_names() {
        let kind: InputKind = serde_json::from_str("\"attack\"").unwrap();
        assert_eq!(kind, InputKind::Attack);
        assert_eq!(InputKind::Sneak.to_string(), "sneak");
    }

    #[test]
    fn console_host_is_inert() {
        let host = ConsoleHost;
        assert!(host.send_chat("hello").is_ok());
        assert!(host.simulate_input(InputKind::Jump, true).is_ok());
        assert!(host.read_inventory().unwrap().is_empty());
    }
}
