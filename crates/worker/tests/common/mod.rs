#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use relaydeck_core::{
    Envelope, HostCapabilities, HostError, InputKind, InventorySlot, Publisher,
};
use relaydeck_worker::{
    ExitHandler, JobBody, JobContext, JobDefinition, JobError, JobRegistry, JobSource,
};
use tokio::sync::mpsc::UnboundedReceiver;

/// Job body backed by a closure.
pub struct FnBody<F>(pub F);

impl<F> JobBody for FnBody<F>
where
    F: Fn(JobContext) -> BoxFuture<'static, Result<(), JobError>> + Send + Sync,
{
    fn run(self: Arc<Self>, ctx: JobContext) -> BoxFuture<'static, Result<(), JobError>> {
        (self.0)(ctx)
    }
}

/// Loops on its signal until stopped.
pub fn idle_body() -> Arc<dyn JobBody> {
    Arc::new(FnBody(|ctx: JobContext| {
        async move {
            while !ctx.signal.wait(Duration::from_millis(20)).await {}
            Ok::<_, JobError>(())
        }
        .boxed()
    }))
}

/// Ignores its signal and sleeps for a long time.
pub fn stubborn_body() -> Arc<dyn JobBody> {
    Arc::new(FnBody(|_ctx: JobContext| {
        async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, JobError>(())
        }
        .boxed()
    }))
}

/// Waits for its signal, then takes `linger` to wind down. Tracks how many
/// copies are alive at once in `live` and the highest count in `peak`.
pub fn lingering_body(
    linger: Duration,
    live: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
) -> Arc<dyn JobBody> {
    Arc::new(FnBody(move |ctx: JobContext| {
        let live = Arc::clone(&live);
        let peak = Arc::clone(&peak);
        async move {
            let now = live.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            while !ctx.signal.wait(Duration::from_millis(5)).await {}
            tokio::time::sleep(linger).await;
            live.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, JobError>(())
        }
        .boxed()
    }))
}

/// Returns immediately.
pub fn quick_body() -> Arc<dyn JobBody> {
    Arc::new(FnBody(|_ctx: JobContext| async move { Ok::<_, JobError>(()) }.boxed()))
}

pub fn panicking_body() -> Arc<dyn JobBody> {
    Arc::new(FnBody(|_ctx: JobContext| {
        async move {
            if true {
                panic!("boom");
            }
            Ok::<_, JobError>(())
        }
        .boxed()
    }))
}

/// Job source over in-memory bodies; counts loads.
#[derive(Default)]
pub struct StaticSource {
    bodies: BTreeMap<String, Arc<dyn JobBody>>,
    loads: AtomicUsize,
}

impl StaticSource {
    pub fn with(mut self, name: &str, body: Arc<dyn JobBody>) -> Self {
        self.bodies.insert(name.to_string(), body);
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl JobSource for StaticSource {
    fn discover(&self) -> Result<Vec<JobDefinition>, JobError> {
        Ok(self
            .bodies
            .keys()
            .map(|name| JobDefinition::new(name.clone(), PathBuf::from(format!("{name}.json"))))
            .collect())
    }

    fn load(&self, definition: &JobDefinition) -> Result<Arc<dyn JobBody>, JobError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.bodies
            .get(&definition.name)
            .cloned()
            .ok_or_else(|| JobError::NotFound(definition.name.clone()))
    }
}

/// Host that records chat lines.
#[derive(Default)]
pub struct RecordingHost {
    pub chat: Mutex<Vec<String>>,
}

impl HostCapabilities for RecordingHost {
    fn send_chat(&self, text: &str) -> Result<(), HostError> {
        self.chat.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn read_inventory(&self) -> Result<Vec<InventorySlot>, HostError> {
        Ok(Vec::new())
    }

    fn simulate_input(&self, _kind: InputKind, _pressed: bool) -> Result<(), HostError> {
        Ok(())
    }

    fn log_to_console(&self, _text: &str) {}
}

/// Exit handler that only records the call.
#[derive(Default)]
pub struct RecordingExit {
    pub called: AtomicBool,
}

impl ExitHandler for RecordingExit {
    fn exit(&self) {
        self.called.store(true, Ordering::SeqCst);
    }
}

/// Build a registry over `source`, returning the envelope receiver.
pub async fn registry_with(
    source: Arc<dyn JobSource>,
) -> (Arc<JobRegistry>, UnboundedReceiver<Envelope>) {
    let (publisher, rx) = Publisher::channel();
    let registry = JobRegistry::new(source, Arc::new(RecordingHost::default()), publisher)
        .with_stop_timeout(Duration::from_millis(200));
    registry.discover().await;
    (Arc::new(registry), rx)
}

/// Every `LOG_MSG` currently queued.
pub fn drain_logs(rx: &mut UnboundedReceiver<Envelope>) -> Vec<String> {
    let mut logs = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        if let Envelope::LogMsg(text) = envelope {
            logs.push(text);
        }
    }
    logs
}

/// Poll until `name` is no longer running or the deadline passes.
pub async fn wait_until_idle(registry: &JobRegistry, name: &str) -> bool {
    for _ in 0..100 {
        if !registry.is_running(name).await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
