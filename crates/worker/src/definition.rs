//! Job Definitions and where they come from.
//!
//! A [`JobSource`] lists the available jobs and loads a runnable body for
//! one of them. [`DirectorySource`] reads `<name>.json` job scripts from a
//! directory. [`DefinitionCache`] sits in front of a source and keeps the
//! discovered list plus the loaded bodies, so reloads are explicit.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::JobError;
use crate::script::{JobBody, JobScript};

/// Extension of eligible job files.
pub const SCRIPT_EXTENSION: &str = "json";

/// Static description of a runnable job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDefinition {
    /// Unique key: the file name minus extension.
    pub name: String,
    /// Human label shown on the start button.
    pub label: String,
    pub path: PathBuf,
}

impl JobDefinition {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            label: capitalize(&name),
            name,
            path: path.into(),
        }
    }
}

/// Upper-case the first character, lower-case the rest.
fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Names starting with `__` or `.` are private and never listed.
fn is_reserved(name: &str) -> bool {
    name.is_empty() || name.starts_with("__") || name.starts_with('.')
}

/// Provider of Job Definitions and their bodies.
pub trait JobSource: Send + Sync {
    /// List the jobs currently available, sorted by name.
    fn discover(&self) -> Result<Vec<JobDefinition>, JobError>;

    /// Load a fresh body for `definition`.
    fn load(&self, definition: &JobDefinition) -> Result<Arc<dyn JobBody>, JobError>;
}

// ---------------------------------------------------------------------------
// DirectorySource
// ---------------------------------------------------------------------------

/// Job scripts stored as `<name>.json` files in one directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl JobSource for DirectorySource {
    fn discover(&self) -> Result<Vec<JobDefinition>, JobError> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root)?;
            tracing::info!(dir = %self.root.display(), "Created job directory");
        }

        let mut definitions = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(SCRIPT_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if is_reserved(name) {
                continue;
            }
            definitions.push(JobDefinition::new(name, &path));
        }

        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(definitions)
    }

    fn load(&self, definition: &JobDefinition) -> Result<Arc<dyn JobBody>, JobError> {
        let text = std::fs::read_to_string(&definition.path)?;
        let script = JobScript::from_json(&definition.name, &text)?;
        Ok(Arc::new(script))
    }
}

// ---------------------------------------------------------------------------
// DefinitionCache
// ---------------------------------------------------------------------------

/// Discovered definitions plus loaded bodies, keyed by job name.
///
/// Source calls do file I/O and run on the blocking pool.
pub struct DefinitionCache {
    source: Arc<dyn JobSource>,
    definitions: RwLock<Vec<JobDefinition>>,
    bodies: RwLock<HashMap<String, Arc<dyn JobBody>>>,
}

impl DefinitionCache {
    pub fn new(source: Arc<dyn JobSource>) -> Self {
        Self {
            source,
            definitions: RwLock::new(Vec::new()),
            bodies: RwLock::new(HashMap::new()),
        }
    }

    /// Re-discover every definition and drop all loaded bodies.
    pub async fn reload_all(&self) -> Result<Vec<JobDefinition>, JobError> {
        let discovered = self.on_source(|source| source.discover()).await?;
        *self.definitions.write().await = discovered.clone();
        self.bodies.write().await.clear();
        Ok(discovered)
    }

    /// The definitions from the last discovery.
    pub async fn definitions(&self) -> Vec<JobDefinition> {
        self.definitions.read().await.clone()
    }

    /// Drop the loaded body for `name` so the next resolve reads it again.
    pub async fn invalidate(&self, name: &str) {
        self.bodies.write().await.remove(name);
    }

    /// Whether a body for `name` is currently loaded.
    pub async fn cached(&self, name: &str) -> bool {
        self.bodies.read().await.contains_key(name)
    }

    /// Return the body for `name`, loading it if needed.
    ///
    /// A name missing from the last discovery triggers one re-discovery so
    /// files added since then can be started without a reload.
    pub async fn resolve(&self, name: &str) -> Result<Arc<dyn JobBody>, JobError> {
        if let Some(body) = self.bodies.read().await.get(name) {
            return Ok(Arc::clone(body));
        }

        let definition = match self.find(name).await {
            Some(definition) => definition,
            None => {
                self.reload_all().await?;
                self.find(name)
                    .await
                    .ok_or_else(|| JobError::NotFound(name.to_string()))?
            }
        };

        let body = self
            .on_source(move |source| source.load(&definition))
            .await?;
        self.bodies
            .write()
            .await
            .insert(name.to_string(), Arc::clone(&body));
        Ok(body)
    }

    /// Invalidate then resolve, picking up edits to the job source.
    pub async fn reload(&self, name: &str) -> Result<Arc<dyn JobBody>, JobError> {
        self.invalidate(name).await;
        self.resolve(name).await
    }

    async fn on_source<T, F>(&self, call: F) -> Result<T, JobError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn JobSource) -> Result<T, JobError> + Send + 'static,
    {
        let source = Arc::clone(&self.source);
        tokio::task::spawn_blocking(move || call(source.as_ref())).await?
    }

    async fn find(&self, name: &str) -> Option<JobDefinition> {
        self.definitions
            .read()
            .await
            .iter()
            .find(|d| d.name == name)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_capitalized() {
        assert_eq!(capitalize("mine"), "Mine");
        assert_eq!(capitalize("auto_FARM"), "Auto_farm");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn reserved_names() {
        assert!(is_reserved("__init__"));
        assert!(is_reserved(".hidden"));
        assert!(!is_reserved("mine"));
    }

    #[test]
    fn discover_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for file in ["mine.json", "farm.json", "__private.json", "notes.txt", ".x.json"] {
            std::fs::write(dir.path().join(file), "{}").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();

        let names: Vec<_> = DirectorySource::new(dir.path())
            .discover()
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, ["farm", "mine"]);
    }

    #[test]
    fn discover_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("scripts");
        let found = DirectorySource::new(&root).discover().unwrap();
        assert!(found.is_empty());
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn resolve_picks_up_new_files_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DefinitionCache::new(Arc::new(DirectorySource::new(dir.path())));
        cache.reload_all().await.unwrap();

        std::fs::write(dir.path().join("late.json"), r#"{"setup":[]}"#).unwrap();
        assert!(cache.resolve("late").await.is_ok());
        assert!(cache.cached("late").await);

        cache.invalidate("late").await;
        assert!(!cache.cached("late").await);
    }

    /// Source whose discovery blocks the calling thread.
    struct SlowSource;

    impl JobSource for SlowSource {
        fn discover(&self) -> Result<Vec<JobDefinition>, JobError> {
            std::thread::sleep(std::time::Duration::from_millis(200));
            Ok(Vec::new())
        }

        fn load(&self, definition: &JobDefinition) -> Result<Arc<dyn JobBody>, JobError> {
            Err(JobError::NotFound(definition.name.clone()))
        }
    }

    #[tokio::test]
    async fn slow_discovery_does_not_stall_the_runtime() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let ticks = Arc::clone(&ticks);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        let cache = DefinitionCache::new(Arc::new(SlowSource));
        cache.reload_all().await.unwrap();

        // Single-threaded test runtime: the ticker only ran if discovery yielded.
        assert!(ticks.load(Ordering::SeqCst) > 0);
        ticker.abort();
    }

    #[tokio::test]
    async fn resolve_unknown_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DefinitionCache::new(Arc::new(DirectorySource::new(dir.path())));
        let err = cache.resolve("ghost").await.err().expect("should fail");
        assert!(matches!(err, JobError::NotFound(name) if name == "ghost"));
    }
}
