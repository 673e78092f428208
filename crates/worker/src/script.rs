//! Declarative job scripts and the job body contract.
//!
//! A job script is a JSON document with three step lists:
//!
//! ```json
//! {
//!   "setup":    [{"op": "echo", "text": "Auto-attack started"}],
//!   "loop":     [{"op": "press", "input": "attack"}, {"op": "wait", "ms": 600}],
//!   "teardown": [{"op": "release", "input": "attack"}]
//! }
//! ```
//!
//! `setup` runs once, `loop` repeats until the cancel signal is set, and
//! `teardown` always runs once afterwards.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use relaydeck_core::{CancelSignal, HostCapabilities, InputKind, Publisher};
use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// Everything a running job may touch.
#[derive(Clone)]
pub struct JobContext {
    pub name: String,
    pub signal: CancelSignal,
    pub host: Arc<dyn HostCapabilities>,
    pub publisher: Publisher,
}

/// A runnable job body.
///
/// The returned future must observe `ctx.signal` at sub-second granularity;
/// the registry never preempts it.
pub trait JobBody: Send + Sync {
    fn run(self: Arc<Self>, ctx: JobContext) -> BoxFuture<'static, Result<(), JobError>>;
}

/// A single script instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Host console.
    Echo { text: String },
    /// Host chat.
    Chat { text: String },
    Press { input: InputKind },
    Release { input: InputKind },
    /// Cancellable pause.
    Wait { ms: u64 },
    /// `LOG_MSG` to every UI.
    Log { text: String },
    /// `ALERT` to every UI.
    Alert { text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobScript {
    #[serde(default)]
    pub setup: Vec<Step>,
    #[serde(default, rename = "loop")]
    pub repeat: Vec<Step>,
    #[serde(default)]
    pub teardown: Vec<Step>,
}

impl JobScript {
    /// Parse and validate a script.
    pub fn from_json(name: &str, text: &str) -> Result<Self, JobError> {
        let script: JobScript =
            serde_json::from_str(text).map_err(|e| JobError::InvalidScript {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        script.validate(name)?;
        Ok(script)
    }

    fn validate(&self, name: &str) -> Result<(), JobError> {
        let waits = self
            .repeat
            .iter()
            .any(|step| matches!(step, Step::Wait { .. }));
        if !self.repeat.is_empty() && !waits {
            return Err(JobError::InvalidScript {
                name: name.to_string(),
                reason: "loop must contain a wait step".to_string(),
            });
        }
        Ok(())
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        let outcome = self.run_body(ctx).await;

        // Teardown runs to completion even after cancellation.
        for step in &self.teardown {
            if let Err(e) = run_step(step, ctx, false).await {
                tracing::warn!(job = %ctx.name, error = %e, "Teardown step failed");
            }
        }
        outcome
    }

    async fn run_body(&self, ctx: &JobContext) -> Result<(), JobError> {
        if run_steps(&self.setup, ctx).await? == Flow::Cancelled {
            return Ok(());
        }
        if self.repeat.is_empty() {
            return Ok(());
        }
        while !ctx.signal.is_set() {
            if run_steps(&self.repeat, ctx).await? == Flow::Cancelled {
                break;
            }
        }
        Ok(())
    }
}

impl JobBody for JobScript {
    fn run(self: Arc<Self>, ctx: JobContext) -> BoxFuture<'static, Result<(), JobError>> {
        async move { self.execute(&ctx).await }.boxed()
    }
}

async fn run_steps(steps: &[Step], ctx: &JobContext) -> Result<Flow, JobError> {
    for step in steps {
        if run_step(step, ctx, true).await? == Flow::Cancelled {
            return Ok(Flow::Cancelled);
        }
    }
    Ok(Flow::Continue)
}

async fn run_step(step: &Step, ctx: &JobContext, interruptible: bool) -> Result<Flow, JobError> {
    match step {
        Step::Echo { text } => ctx.host.log_to_console(text),
        Step::Chat { text } => ctx.host.send_chat(text)?,
        Step::Press { input } => ctx.host.simulate_input(*input, true)?,
        Step::Release { input } => ctx.host.simulate_input(*input, false)?,
        Step::Log { text } => ctx.publisher.log(text.clone()),
        Step::Alert { text } => ctx.publisher.alert(text.clone()),
        Step::Wait { ms } => {
            let duration = Duration::from_millis(*ms);
            if !interruptible {
                tokio::time::sleep(duration).await;
            } else if ctx.signal.wait(duration).await {
                return Ok(Flow::Cancelled);
            }
        }
    }
    Ok(Flow::Continue)
}
