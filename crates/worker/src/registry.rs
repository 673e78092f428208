//! Job Registry & Runner.
//!
//! [`JobRegistry`] owns the live set of Job Instances, at most one per job
//! name. Each instance runs on its own Tokio task with a fresh
//! [`CancelSignal`]; stopping sets the signal and waits a bounded time for
//! the body to return. A body that overruns the wait keeps running detached
//! but is no longer tracked.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use relaydeck_core::types::Timestamp;
use relaydeck_core::{CancelSignal, HostCapabilities, Publisher, UiConfig};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::definition::{DefinitionCache, JobDefinition, JobSource};
use crate::error::JobError;
use crate::script::{JobBody, JobContext};

/// How long `stop` waits for a body to observe its signal.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Result of [`JobRegistry::start`].
#[derive(Debug)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    Failed(JobError),
}

/// Result of [`JobRegistry::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The body returned within the stop timeout.
    Stopped,
    /// The body overran the timeout and was left to finish on its own.
    Detached,
    NotRunning,
}

/// One live Job Instance.
struct RunningJob {
    /// Distinguishes this instance from a later one with the same name.
    id: Uuid,
    signal: CancelSignal,
    /// Taken by the stop that is waiting on this instance.
    handle: Option<JoinHandle<()>>,
    started_at: Timestamp,
}

impl RunningJob {
    fn is_stopping(&self) -> bool {
        self.handle.is_none()
    }

    /// Signal the instance and take its handle. `None` if a stop is
    /// already in progress.
    fn claim(&mut self) -> Option<Halting> {
        let handle = self.handle.take()?;
        self.signal.set();
        Some(Halting {
            id: self.id,
            handle,
            started_at: self.started_at,
        })
    }
}

/// A signalled instance whose exit a stop is waiting for. The entry stays
/// in the live set until the wait ends, so a concurrent `start` of the same
/// name is refused.
struct Halting {
    id: Uuid,
    handle: JoinHandle<()>,
    started_at: Timestamp,
}

type RunningMap = Arc<Mutex<HashMap<String, RunningJob>>>;

pub struct JobRegistry {
    cache: DefinitionCache,
    host: Arc<dyn HostCapabilities>,
    publisher: Publisher,
    running: RunningMap,
    stop_timeout: Duration,
}

impl JobRegistry {
    pub fn new(
        source: Arc<dyn JobSource>,
        host: Arc<dyn HostCapabilities>,
        publisher: Publisher,
    ) -> Self {
        Self {
            cache: DefinitionCache::new(source),
            host,
            publisher,
            running: Arc::new(Mutex::new(HashMap::new())),
            stop_timeout: STOP_TIMEOUT,
        }
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Re-scan the job source. Failures and an empty result are logged and
    /// yield an empty list.
    pub async fn discover(&self) -> Vec<JobDefinition> {
        match self.cache.reload_all().await {
            Ok(definitions) => {
                if definitions.is_empty() {
                    tracing::warn!("No job scripts found");
                } else {
                    tracing::info!(count = definitions.len(), "Discovered job scripts");
                }
                definitions
            }
            Err(e) => {
                tracing::error!(error = %e, "Job discovery failed");
                Vec::new()
            }
        }
    }

    pub async fn definitions(&self) -> Vec<JobDefinition> {
        self.cache.definitions().await
    }

    /// UI Configuration for the currently known definitions.
    pub async fn ui_config(&self) -> UiConfig {
        let definitions = self.cache.definitions().await;
        UiConfig::for_jobs(
            definitions
                .iter()
                .map(|d| (d.name.as_str(), d.label.as_str())),
        )
    }

    pub async fn is_running(&self, name: &str) -> bool {
        self.running.lock().await.contains_key(name)
    }

    /// Names of all live instances, sorted.
    pub async fn active_jobs(&self) -> Vec<String> {
        let mut names: Vec<String> = self.running.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn started_at(&self, name: &str) -> Option<Timestamp> {
        self.running.lock().await.get(name).map(|job| job.started_at)
    }

    /// `Active Jobs: a, b` or `Active Jobs: None`.
    pub async fn status_line(&self) -> String {
        let active = self.active_jobs().await;
        if active.is_empty() {
            "Active Jobs: None".to_string()
        } else {
            format!("Active Jobs: {}", active.join(", "))
        }
    }

    /// Start `name` unless it is already running.
    ///
    /// The body is re-loaded from the source on every start so edits are
    /// picked up. Load failures are reported as `LOG_MSG` and leave the
    /// registry unchanged.
    pub async fn start(&self, name: &str) -> StartOutcome {
        if self.is_running(name).await {
            return self.already_running(name);
        }

        let body = match self.cache.reload(name).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(job = %name, error = %e, "Failed to load job");
                self.publisher.log(format!("❌ Error starting {name}: {e}"));
                return StartOutcome::Failed(e);
            }
        };

        let mut running = self.running.lock().await;
        if running.contains_key(name) {
            drop(running);
            return self.already_running(name);
        }

        let id = Uuid::new_v4();
        let signal = CancelSignal::new();
        let ctx = JobContext {
            name: name.to_string(),
            signal: signal.clone(),
            host: Arc::clone(&self.host),
            publisher: self.publisher.clone(),
        };
        let handle = tokio::spawn(supervise(
            Arc::clone(&self.running),
            self.publisher.clone(),
            name.to_string(),
            id,
            body,
            ctx,
        ));

        running.insert(
            name.to_string(),
            RunningJob {
                id,
                signal,
                handle: Some(handle),
                started_at: chrono::Utc::now(),
            },
        );
        // Published under the lock so it always precedes the finish report.
        self.publisher.log(format!("🚀 Started {name}"));
        drop(running);

        tracing::info!(job = %name, instance = %id, "Job started");
        StartOutcome::Started
    }

    /// Signal `name` to stop and wait up to the stop timeout.
    ///
    /// The instance keeps its slot while the wait runs and leaves the live
    /// set afterwards, whether or not it exited in time.
    pub async fn stop(&self, name: &str) -> StopOutcome {
        let claimed = self
            .running
            .lock()
            .await
            .get_mut(name)
            .and_then(RunningJob::claim);
        let Some(halting) = claimed else {
            tracing::debug!(job = %name, "Stop requested for a job that is not running");
            return StopOutcome::NotRunning;
        };

        let id = halting.id;
        let outcome = halt(name, halting, self.stop_timeout).await;
        self.release(name, id).await;
        self.publisher.log(format!("⏹️ Stopped {name}"));
        outcome
    }

    /// Stop every live instance, waiting for all of them concurrently.
    pub async fn stop_all(&self) -> usize {
        let claimed: Vec<(String, Halting)> = self
            .running
            .lock()
            .await
            .iter_mut()
            .filter_map(|(name, job)| job.claim().map(|halting| (name.clone(), halting)))
            .collect();
        let count = claimed.len();

        let halts = claimed.into_iter().map(|(name, halting)| {
            let timeout = self.stop_timeout;
            async move {
                let id = halting.id;
                halt(&name, halting, timeout).await;
                (name, id)
            }
        });
        for (name, id) in futures::future::join_all(halts).await {
            self.release(&name, id).await;
            self.publisher.log(format!("⏹️ Stopped {name}"));
        }

        if count > 0 {
            tracing::info!(count, "Stopped all jobs");
        }
        count
    }

    /// Drop the entry for `name` if it still belongs to instance `id`.
    async fn release(&self, name: &str, id: Uuid) {
        let mut running = self.running.lock().await;
        if running.get(name).is_some_and(|job| job.id == id) {
            running.remove(name);
        }
    }

    /// Signal every live instance and forget it without waiting.
    pub async fn cancel_all(&self) -> usize {
        let mut running = self.running.lock().await;
        let count = running.len();
        for (name, job) in running.drain() {
            tracing::info!(job = %name, "Cancelling job");
            job.signal.set();
        }
        count
    }

    fn already_running(&self, name: &str) -> StartOutcome {
        self.publisher.log(format!("⚠️ {name} is already running."));
        StartOutcome::AlreadyRunning
    }
}

/// Wait for a signalled task, detaching it on timeout.
async fn halt(name: &str, halting: Halting, timeout: Duration) -> StopOutcome {
    let ran_for = chrono::Utc::now() - halting.started_at;

    match tokio::time::timeout(timeout, halting.handle).await {
        Ok(_) => {
            tracing::info!(job = %name, ran_secs = ran_for.num_seconds(), "Job stopped");
            StopOutcome::Stopped
        }
        Err(_) => {
            tracing::warn!(
                job = %name,
                timeout_ms = timeout.as_millis() as u64,
                "Job did not exit in time, detaching",
            );
            StopOutcome::Detached
        }
    }
}

/// Run a body to completion, then drop its own registry entry.
///
/// Panics are caught and reported like errors.
async fn supervise(
    running: RunningMap,
    publisher: Publisher,
    name: String,
    id: Uuid,
    body: Arc<dyn JobBody>,
    ctx: JobContext,
) {
    let result = match AssertUnwindSafe(body.run(ctx)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(JobError::Panicked(panic_message(panic.as_ref()))),
    };

    // A body that returns while a stop waits on it was stopped, not finished.
    let finished_by_itself = {
        let mut running = running.lock().await;
        match running.get(&name) {
            Some(job) if job.id == id => {
                let stopping = job.is_stopping();
                running.remove(&name);
                !stopping
            }
            _ => false,
        }
    };

    match result {
        Ok(()) if finished_by_itself => {
            tracing::info!(job = %name, "Job finished");
            publisher.log(format!("✅ {name} finished"));
        }
        Ok(()) => {}
        Err(e) => {
            tracing::warn!(job = %name, error = %e, "Job failed");
            publisher.log(format!("❌ {name} failed: {e}"));
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
