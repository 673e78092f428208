use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Cooperative stop flag handed to a running job.
///
/// Set at most once; jobs poll [`is_set`](Self::is_set) or sleep through
/// [`wait`](Self::wait), which returns early when the flag is raised.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    token: CancellationToken,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.token.cancel();
    }

    pub fn is_set(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Sleep for `duration` or until the signal is set.
    ///
    /// Returns `true` if the signal was set.
    pub async fn wait(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => true,
            _ = tokio::time::sleep(duration) => self.is_set(),
        }
    }

    /// Resolves once the signal is set.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
