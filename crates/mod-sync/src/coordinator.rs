use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, mpsc};

use crate::analyzer::{AnalysisError, ConflictAnalyzer};
use crate::backend::RepositoryBackend;
use crate::event::{EventSink, NullSink, SyncEvent};
use crate::package::{PackageId, PlatformVersion};
use crate::report::{AttemptError, FailedPackage, SyncOutcome, SyncReport, SyncedPackage};

/// Maximum number of attempts in flight when none is configured.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// How packages are spread across backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendPolicy {
    /// Attempt every package on every backend and record every outcome.
    /// A package may be synced from several backends in one report.
    #[default]
    AllBackends,
    /// Walk the backends in order for each package and stop at the first
    /// one that syncs it. Failures on earlier backends are still recorded.
    FirstSuccess,
}

/// Call-level failures. Per-attempt problems never surface here; they end up
/// in [`SyncReport::failed`].
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("could not schedule sync attempts: {0}")]
    Scheduling(String),

    #[error("conflict analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
}

/// Fans package resolution and download out across repository backends.
pub struct SyncCoordinator {
    platform: PlatformVersion,
    analyzer: Arc<dyn ConflictAnalyzer>,
    sink: Arc<dyn EventSink>,
    concurrency: usize,
    policy: BackendPolicy,
}

impl SyncCoordinator {
    pub fn new(platform: PlatformVersion, analyzer: Arc<dyn ConflictAnalyzer>) -> Self {
        Self {
            platform,
            analyzer,
            sink: Arc::new(NullSink),
            concurrency: DEFAULT_CONCURRENCY,
            policy: BackendPolicy::default(),
        }
    }

    /// Ceiling on attempts in flight at once. `sync` rejects zero and
    /// anything above `Semaphore::MAX_PERMITS`.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_policy(mut self, policy: BackendPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn platform(&self) -> &PlatformVersion {
        &self.platform
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn policy(&self) -> BackendPolicy {
        self.policy
    }

    /// Synchronize `packages` against `backends`.
    ///
    /// Every package shows up in the returned report at least once. Duplicate
    /// identifiers in `packages` are attempted once. The analyzer runs after
    /// every attempt has finished, over the packages that synced.
    pub async fn sync(
        &self,
        packages: &[PackageId],
        backends: &[Arc<dyn RepositoryBackend>],
    ) -> Result<SyncReport, SyncError> {
        if self.concurrency == 0 {
            return Err(SyncError::Scheduling(
                "concurrency ceiling must be at least 1".into(),
            ));
        }
        if self.concurrency > Semaphore::MAX_PERMITS {
            return Err(SyncError::Scheduling(format!(
                "concurrency ceiling must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SyncError::Scheduling(e.to_string()))?;

        let packages = distinct(packages);
        let mut report = SyncReport::default();

        if backends.is_empty() {
            for package in packages {
                report.record(SyncOutcome::Failed(FailedPackage {
                    package,
                    backend: None,
                    reason: AttemptError::NoBackends,
                }));
            }
        } else {
            let runner = Arc::new(AttemptRunner {
                platform: self.platform.clone(),
                sink: Arc::clone(&self.sink),
                permits: Arc::new(Semaphore::new(self.concurrency)),
            });
            let (tx, mut rx) = mpsc::unbounded_channel::<SyncOutcome>();

            match self.policy {
                BackendPolicy::AllBackends => {
                    for package in &packages {
                        for backend in backends {
                            let runner = Arc::clone(&runner);
                            let backend = Arc::clone(backend);
                            let package = package.clone();
                            let tx = tx.clone();
                            runtime.spawn(async move {
                                let outcome = runner.run(&package, backend.as_ref()).await;
                                let _ = tx.send(outcome);
                            });
                        }
                    }
                }
                BackendPolicy::FirstSuccess => {
                    let backends: Arc<[Arc<dyn RepositoryBackend>]> = backends.to_vec().into();
                    for package in &packages {
                        let runner = Arc::clone(&runner);
                        let backends = Arc::clone(&backends);
                        let package = package.clone();
                        let tx = tx.clone();
                        runtime.spawn(async move {
                            for backend in backends.iter() {
                                let outcome = runner.run(&package, backend.as_ref()).await;
                                let done = outcome.is_synced();
                                let _ = tx.send(outcome);
                                if done {
                                    break;
                                }
                            }
                        });
                    }
                }
            }

            // The channel closes once every attempt task has dropped its sender.
            drop(tx);
            while let Some(outcome) = rx.recv().await {
                report.record(outcome);
            }
        }

        let synced = report.synced_packages();
        let conflicts = self.analyzer.analyze(&synced)?;
        self.sink.emit(SyncEvent::AnalysisFinished {
            packages: synced.len(),
            conflicts: conflicts.len(),
        });
        report.conflicts = conflicts;

        self.sink.emit(SyncEvent::Finished(report.summary()));
        Ok(report)
    }
}

/// Shared state for attempts spawned by one `sync` call.
struct AttemptRunner {
    platform: PlatformVersion,
    sink: Arc<dyn EventSink>,
    permits: Arc<Semaphore>,
}

impl AttemptRunner {
    /// Run one (package, backend) attempt under a pool permit.
    /// Always produces an outcome, even if the backend panics.
    async fn run(&self, package: &PackageId, backend: &dyn RepositoryBackend) -> SyncOutcome {
        let label = match std::panic::catch_unwind(AssertUnwindSafe(|| backend.label().to_owned())) {
            Ok(label) => label,
            Err(payload) => {
                return SyncOutcome::Failed(FailedPackage {
                    package: package.clone(),
                    backend: None,
                    reason: AttemptError::Aborted(panic_message(payload.as_ref())),
                });
            }
        };

        let Ok(_permit) = self.permits.acquire().await else {
            return failed(
                package,
                &label,
                AttemptError::Aborted("worker pool closed".into()),
            );
        };

        self.sink.emit(SyncEvent::AttemptStarted {
            package: package.clone(),
            backend: label.clone(),
        });

        match AssertUnwindSafe(self.attempt(package, backend, &label))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                self.sink.emit(SyncEvent::AttemptAborted {
                    package: package.clone(),
                    backend: label.clone(),
                    error: message.clone(),
                });
                failed(package, &label, AttemptError::Aborted(message))
            }
        }
    }

    async fn attempt(
        &self,
        package: &PackageId,
        backend: &dyn RepositoryBackend,
        label: &str,
    ) -> SyncOutcome {
        let version = match backend.resolve(package, &self.platform).await {
            Ok(Some(version)) => {
                self.sink.emit(SyncEvent::Resolved {
                    package: package.clone(),
                    backend: label.to_owned(),
                    version: version.display_name().to_owned(),
                });
                version
            }
            Ok(None) => {
                self.sink.emit(SyncEvent::NotFound {
                    package: package.clone(),
                    backend: label.to_owned(),
                });
                return failed(package, label, AttemptError::ResolutionNotFound);
            }
            Err(e) => {
                self.sink.emit(SyncEvent::ResolveFailed {
                    package: package.clone(),
                    backend: label.to_owned(),
                    error: e.to_string(),
                });
                return failed(package, label, AttemptError::ResolutionFault(e.to_string()));
            }
        };

        let fetched = match backend.fetch(package, &version).await {
            Ok(path) => verify_artifact(&path).await.map(|()| path),
            Err(e) => Err(e.to_string()),
        };

        match fetched {
            Ok(artifact) => {
                self.sink.emit(SyncEvent::Fetched {
                    package: package.clone(),
                    backend: label.to_owned(),
                    artifact: artifact.clone(),
                });
                SyncOutcome::Synced(SyncedPackage {
                    package: package.clone(),
                    backend: label.to_owned(),
                    version,
                    artifact,
                })
            }
            Err(error) => {
                self.sink.emit(SyncEvent::FetchFailed {
                    package: package.clone(),
                    backend: label.to_owned(),
                    error: error.clone(),
                });
                failed(package, label, AttemptError::FetchFault(error))
            }
        }
    }
}

fn failed(package: &PackageId, backend: &str, reason: AttemptError) -> SyncOutcome {
    SyncOutcome::Failed(FailedPackage {
        package: package.clone(),
        backend: Some(backend.to_owned()),
        reason,
    })
}

/// A synced artifact must be an existing, non-empty regular file.
async fn verify_artifact(path: &Path) -> Result<(), String> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if !meta.is_file() => Err(format!("{} is not a file", path.display())),
        Ok(meta) if meta.len() == 0 => Err(format!("{} is empty", path.display())),
        Ok(_) => Ok(()),
        Err(e) => Err(format!("{} is not readable: {e}", path.display())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "backend panicked".to_owned()
    }
}

/// Drop repeated identifiers, keeping first-occurrence order.
fn distinct(packages: &[PackageId]) -> Vec<PackageId> {
    let mut seen = HashSet::new();
    packages
        .iter()
        .filter(|p| seen.insert(*p))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_keeps_first_occurrence_order() {
        let input: Vec<PackageId> = ["b", "a", "b", "c", "a"]
            .into_iter()
            .map(PackageId::new)
            .collect();
        let names: Vec<String> = distinct(&input).iter().map(|p| p.to_string()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn panic_message_handles_common_payloads() {
        let boxed: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(boxed.as_ref()), "static str");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");

        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "backend panicked");
    }

    #[tokio::test]
    async fn verify_artifact_rejects_missing_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.jar");
        assert!(verify_artifact(&missing).await.is_err());

        let empty = dir.path().join("empty.jar");
        std::fs::write(&empty, b"").unwrap();
        let err = verify_artifact(&empty).await.unwrap_err();
        assert!(err.contains("is empty"), "got: {err}");

        assert!(verify_artifact(dir.path()).await.is_err());

        let full = dir.path().join("full.jar");
        std::fs::write(&full, b"PK").unwrap();
        assert!(verify_artifact(&full).await.is_ok());
    }

    #[test]
    fn policy_parses_from_kebab_case() {
        let policy: BackendPolicy = serde_json::from_str("\"first-success\"").unwrap();
        assert_eq!(policy, BackendPolicy::FirstSuccess);
        assert_eq!(BackendPolicy::default(), BackendPolicy::AllBackends);
    }

    #[test]
    fn sync_outside_tokio_is_a_scheduling_fault() {
        let coordinator = SyncCoordinator::new(
            PlatformVersion::new("1.19.2"),
            Arc::new(crate::analyzer::NoConflicts),
        );
        let result = futures::executor::block_on(coordinator.sync(&[PackageId::new("a")], &[]));
        assert!(matches!(result, Err(SyncError::Scheduling(_))));
    }
}
