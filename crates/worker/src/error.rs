use relaydeck_core::HostError;

/// Failure while resolving or running a job.
///
/// Never escapes the registry: every variant ends up as a `LOG_MSG`.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Invalid job script {name}: {reason}")]
    InvalidScript { name: String, reason: String },

    #[error("Host call failed: {0}")]
    Host(#[from] HostError),

    #[error("Job panicked: {0}")]
    Panicked(String),

    #[error("Job source task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
