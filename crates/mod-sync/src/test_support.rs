use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::{
    AnalysisError, BackendError, Conflict, ConflictAnalyzer, EventSink, PackageId,
    PlatformVersion, RepositoryBackend, ScratchDir, SyncEvent, VersionInfo,
};

/// Scripted behavior of a [`ScriptedBackend`] for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Resolve and fetch both succeed.
    Found,
    /// Resolve reports no compatible version.
    NotFound,
    /// Resolve fails with a network fault.
    ResolveFault(String),
    /// Resolve succeeds, fetch fails with a network fault.
    FetchFault(String),
    /// Fetch "succeeds" but leaves a zero-byte file.
    EmptyArtifact,
    /// Resolve panics.
    Panic,
}

/// Tracks how many backend calls are running at once.
#[derive(Debug, Default)]
pub struct InFlightGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightGauge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) -> GaugeGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard { gauge: self }
    }
}

struct GaugeGuard<'a> {
    gauge: &'a InFlightGauge,
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Backend with per-package scripted behavior, for testing the coordinator.
///
/// Artifacts are written into a real [`ScratchDir`] so synced paths exist.
pub struct ScriptedBackend {
    label: String,
    scratch: ScratchDir,
    scripts: HashMap<PackageId, Script>,
    fallback: Script,
    delay: Option<Duration>,
    gauge: Arc<InFlightGauge>,
    resolve_calls: Mutex<Vec<PackageId>>,
    fetch_calls: AtomicUsize,
}

impl ScriptedBackend {
    /// A backend that finds every package unless scripted otherwise.
    pub fn new(label: impl Into<String>, scratch_root: &Path) -> Self {
        let label = label.into();
        Self {
            scratch: ScratchDir::new(scratch_root, &label),
            label,
            scripts: HashMap::new(),
            fallback: Script::Found,
            delay: None,
            gauge: InFlightGauge::new(),
            resolve_calls: Mutex::new(Vec::new()),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn script(mut self, package: &str, script: Script) -> Self {
        self.scripts.insert(PackageId::new(package), script);
        self
    }

    /// Behavior for packages without an explicit script.
    pub fn otherwise(mut self, script: Script) -> Self {
        self.fallback = script;
        self
    }

    /// Sleep this long inside every resolve and fetch call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Share an in-flight gauge with other backends.
    pub fn with_gauge(mut self, gauge: Arc<InFlightGauge>) -> Self {
        self.gauge = gauge;
        self
    }

    pub fn resolve_calls(&self) -> Vec<PackageId> {
        self.resolve_calls.lock().unwrap().clone()
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    fn script_for(&self, package: &PackageId) -> &Script {
        self.scripts.get(package).unwrap_or(&self.fallback)
    }

    fn download_ref(&self, package: &PackageId) -> String {
        format!("scripted://{}/{}", self.label, package)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl RepositoryBackend for ScriptedBackend {
    fn label(&self) -> &str {
        &self.label
    }

    async fn resolve(
        &self,
        package: &PackageId,
        _platform: &PlatformVersion,
    ) -> Result<Option<VersionInfo>, BackendError> {
        let _guard = self.gauge.enter();
        self.resolve_calls.lock().unwrap().push(package.clone());
        self.pause().await;

        match self.script_for(package) {
            Script::NotFound => Ok(None),
            Script::ResolveFault(msg) => Err(BackendError::Network(msg.clone())),
            Script::Panic => panic!("scripted panic for {package}"),
            Script::Found | Script::FetchFault(_) | Script::EmptyArtifact => Ok(Some(
                VersionInfo::new(self.download_ref(package), format!("{package}.jar"))
                    .with_metadata("display_name", format!("{package} from {}", self.label)),
            )),
        }
    }

    async fn fetch(
        &self,
        package: &PackageId,
        version: &VersionInfo,
    ) -> Result<PathBuf, BackendError> {
        let _guard = self.gauge.enter();
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if version.download_ref != self.download_ref(package) {
            return Err(BackendError::Other(format!(
                "version info for {package} was not produced by {}",
                self.label
            )));
        }

        match self.script_for(package) {
            Script::FetchFault(msg) => Err(BackendError::Network(msg.clone())),
            Script::EmptyArtifact => {
                self.scratch
                    .write_artifact(package, &version.file_name, b"")
                    .await
            }
            _ => {
                let body = format!("{}:{package}", self.label);
                self.scratch
                    .write_artifact(package, &version.file_name, body.as_bytes())
                    .await
            }
        }
    }
}

/// Event sink that keeps everything it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: SyncEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Analyzer that records every input set and returns a canned result.
#[derive(Debug)]
pub struct RecordingAnalyzer {
    calls: Mutex<Vec<BTreeSet<PackageId>>>,
    result: Result<Vec<Conflict>, AnalysisError>,
}

impl RecordingAnalyzer {
    pub fn new() -> Arc<Self> {
        Self::returning(Vec::new())
    }

    pub fn returning(conflicts: Vec<Conflict>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            result: Ok(conflicts),
        })
    }

    pub fn failing(message: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            result: Err(AnalysisError::Other(message.into())),
        })
    }

    pub fn calls(&self) -> Vec<BTreeSet<PackageId>> {
        self.calls.lock().unwrap().clone()
    }
}

impl ConflictAnalyzer for RecordingAnalyzer {
    fn analyze(&self, synced: &BTreeSet<PackageId>) -> Result<Vec<Conflict>, AnalysisError> {
        self.calls.lock().unwrap().push(synced.clone());
        self.result.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform() -> PlatformVersion {
        PlatformVersion::new("1.19.2")
    }

    #[tokio::test]
    async fn found_package_resolves_and_fetches() {
        let root = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new("alpha", root.path());
        let package = PackageId::new("p1");

        let version = backend.resolve(&package, &platform()).await.unwrap().unwrap();
        assert_eq!(version.file_name, "p1.jar");

        let path = backend.fetch(&package, &version).await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "alpha:p1");
        assert_eq!(backend.resolve_calls(), vec![package]);
        assert_eq!(backend.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn scripted_not_found_and_faults() {
        let root = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new("alpha", root.path())
            .script("gone", Script::NotFound)
            .otherwise(Script::ResolveFault("down".into()));

        let gone = backend.resolve(&PackageId::new("gone"), &platform()).await;
        assert!(matches!(gone, Ok(None)));

        let other = backend.resolve(&PackageId::new("other"), &platform()).await;
        assert_eq!(other, Err(BackendError::Network("down".into())));
    }

    #[tokio::test]
    async fn fetch_rejects_foreign_version_info() {
        let root = tempfile::tempdir().unwrap();
        let alpha = ScriptedBackend::new("alpha", root.path());
        let beta = ScriptedBackend::new("beta", root.path());
        let package = PackageId::new("p1");

        let version = alpha.resolve(&package, &platform()).await.unwrap().unwrap();
        let result = beta.fetch(&package, &version).await;
        assert!(matches!(result, Err(BackendError::Other(_))));
    }

    #[test]
    fn gauge_tracks_peak() {
        let gauge = InFlightGauge::new();
        {
            let _a = gauge.enter();
            let _b = gauge.enter();
        }
        let _c = gauge.enter();
        assert_eq!(gauge.peak(), 2);
    }

    #[test]
    fn recording_sink_and_analyzer() {
        let sink = RecordingSink::new();
        sink.emit(SyncEvent::AnalysisFinished {
            packages: 0,
            conflicts: 0,
        });
        assert_eq!(sink.events().len(), 1);

        let analyzer = RecordingAnalyzer::failing("nope");
        assert!(analyzer.analyze(&BTreeSet::new()).is_err());
        assert_eq!(analyzer.calls().len(), 1);
    }
}
