//! Task Dispatcher: routes inbound envelopes to their effect.

use std::sync::Arc;

use relaydeck_core::{ControlCommand, Envelope, HostCapabilities, JobCommand, Publisher};

use crate::registry::JobRegistry;

/// Terminates the process on `EXIT`.
pub trait ExitHandler: Send + Sync {
    fn exit(&self);
}

/// Exits the process immediately with status 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExit;

impl ExitHandler for ProcessExit {
    fn exit(&self) {
        tracing::warn!("EXIT received, terminating process");
        std::process::exit(0);
    }
}

/// Stateless router from [`Envelope`] to registry, host or control action.
pub struct TaskDispatcher {
    registry: Arc<JobRegistry>,
    host: Arc<dyn HostCapabilities>,
    publisher: Publisher,
    exit: Arc<dyn ExitHandler>,
}

impl TaskDispatcher {
    pub fn new(
        registry: Arc<JobRegistry>,
        host: Arc<dyn HostCapabilities>,
        publisher: Publisher,
        exit: Arc<dyn ExitHandler>,
    ) -> Self {
        Self {
            registry,
            host,
            publisher,
            exit,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Apply one envelope. Tags without an effect here are ignored.
    pub async fn dispatch(&self, envelope: Envelope) {
        match envelope {
            Envelope::Job(JobCommand::Start { script }) => {
                self.registry.start(&script).await;
            }
            Envelope::Job(JobCommand::StopAll) => {
                self.registry.stop_all().await;
            }
            Envelope::Cmd(ControlCommand::ReloadUi) => {
                self.registry.discover().await;
                self.publisher
                    .publish(Envelope::UiConfig(self.registry.ui_config().await));
            }
            Envelope::Cmd(ControlCommand::Status) => {
                self.publisher.log(self.registry.status_line().await);
            }
            Envelope::Say(text) => {
                if let Err(e) = self.host.send_chat(&text) {
                    tracing::warn!(error = %e, "Chat forward failed");
                    self.publisher.log(format!("❌ Chat failed: {e}"));
                }
                self.publisher.chat(format!("[Me] {text}"));
            }
            Envelope::Exit => {
                let cancelled = self.registry.cancel_all().await;
                tracing::info!(cancelled, "Exit requested");
                self.exit.exit();
            }
            other => {
                tracing::trace!(tag = %other.tag(), "No dispatch effect");
            }
        }
    }
}
