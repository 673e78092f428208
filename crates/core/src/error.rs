/// Failure to decode or encode a wire frame.
///
/// Decode failures are never fatal: the broker drops the frame and keeps
/// the connection open.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unknown envelope type: {0}")]
    UnknownTag(String),

    #[error("Invalid payload for {tag}: {reason}")]
    InvalidPayload { tag: &'static str, reason: String },
}

/// Failure reported by the scripting host's capability surface.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    #[error("Host capability unavailable: {0}")]
    Unavailable(String),

    #[error("Host rejected the call: {0}")]
    Rejected(String),
}
