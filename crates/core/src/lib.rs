//! Shared building blocks for the relaydeck relay and job orchestrator.
//!
//! - [`protocol`]: the [`Envelope`] sum type and its JSON wire codec.
//! - [`ui_config`]: the regenerable control-surface description.
//! - [`host`]: the capability surface exposed by the scripting host.
//! - [`cancel`]: the cooperative [`CancelSignal`] handed to job bodies.
//! - [`config`]: typed settings from environment variables.
//! - [`publisher`]: the [`Publisher`] used to emit envelopes towards the UI.

pub mod cancel;
pub mod config;
pub mod error;
pub mod host;
pub mod protocol;
pub mod publisher;
pub mod types;
pub mod ui_config;

pub use cancel::CancelSignal;
pub use config::ConfigError;
pub use error::{HostError, ProtocolError};
pub use host::{ConsoleHost, HostCapabilities, InputKind, InventorySlot};
pub use protocol::{
    ControlCommand, Envelope, HostStatus, InventoryItem, JobCommand, RawFrame, Tag,
};
pub use publisher::Publisher;
pub use ui_config::{UiButton, UiConfig, UiGroup};
