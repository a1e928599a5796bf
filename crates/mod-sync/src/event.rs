use std::path::PathBuf;

use crate::package::PackageId;
use crate::report::ReportSummary;

/// Structured progress emitted by the coordinator.
///
/// Callers decide how to present these: the CLI forwards them to `tracing`,
/// tests record them, library consumers can ignore them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    AttemptStarted {
        package: PackageId,
        backend: String,
    },
    Resolved {
        package: PackageId,
        backend: String,
        version: String,
    },
    /// No compatible release. Not an error condition.
    NotFound {
        package: PackageId,
        backend: String,
    },
    ResolveFailed {
        package: PackageId,
        backend: String,
        error: String,
    },
    Fetched {
        package: PackageId,
        backend: String,
        artifact: PathBuf,
    },
    FetchFailed {
        package: PackageId,
        backend: String,
        error: String,
    },
    AttemptAborted {
        package: PackageId,
        backend: String,
        error: String,
    },
    AnalysisFinished {
        packages: usize,
        conflicts: usize,
    },
    Finished(ReportSummary),
}

impl SyncEvent {
    /// Returns true for events describing a fault.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::ResolveFailed { .. } | Self::FetchFailed { .. } | Self::AttemptAborted { .. }
        )
    }

    /// Package this event concerns, if any.
    pub fn package(&self) -> Option<&PackageId> {
        match self {
            Self::AttemptStarted { package, .. }
            | Self::Resolved { package, .. }
            | Self::NotFound { package, .. }
            | Self::ResolveFailed { package, .. }
            | Self::Fetched { package, .. }
            | Self::FetchFailed { package, .. }
            | Self::AttemptAborted { package, .. } => Some(package),
            Self::AnalysisFinished { .. } | Self::Finished(_) => None,
        }
    }
}

impl std::fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AttemptStarted { package, backend } => {
                write!(f, "[{backend}] syncing {package}")
            }
            Self::Resolved {
                package,
                backend,
                version,
            } => write!(f, "[{backend}] resolved {package} to {version}"),
            Self::NotFound { package, backend } => {
                write!(f, "[{backend}] no compatible version of {package}")
            }
            Self::ResolveFailed {
                package,
                backend,
                error,
            } => write!(f, "[{backend}] failed to resolve {package}: {error}"),
            Self::Fetched {
                package,
                backend,
                artifact,
            } => write!(f, "[{backend}] downloaded {package} to {}", artifact.display()),
            Self::FetchFailed {
                package,
                backend,
                error,
            } => write!(f, "[{backend}] failed to download {package}: {error}"),
            Self::AttemptAborted {
                package,
                backend,
                error,
            } => write!(f, "[{backend}] attempt for {package} aborted: {error}"),
            Self::AnalysisFinished {
                packages,
                conflicts,
            } => write!(f, "analyzed {packages} packages, {conflicts} conflicts"),
            Self::Finished(summary) => write!(f, "sync finished: {summary}"),
        }
    }
}

/// Receives coordinator events. Must tolerate concurrent calls.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SyncEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: SyncEvent) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: SyncEvent) {
        match &event {
            SyncEvent::AttemptStarted { package, backend } => {
                tracing::debug!(%package, backend = %backend, "attempt started");
            }
            SyncEvent::Resolved {
                package,
                backend,
                version,
            } => {
                tracing::debug!(%package, backend = %backend, version = %version, "resolved");
            }
            SyncEvent::NotFound { package, backend } => {
                tracing::debug!(%package, backend = %backend, "no compatible version");
            }
            SyncEvent::Fetched {
                package,
                backend,
                artifact,
            } => {
                tracing::info!(
                    %package,
                    backend = %backend,
                    artifact = %artifact.display(),
                    "downloaded"
                );
            }
            SyncEvent::ResolveFailed {
                package,
                backend,
                error,
            }
            | SyncEvent::FetchFailed {
                package,
                backend,
                error,
            }
            | SyncEvent::AttemptAborted {
                package,
                backend,
                error,
            } => {
                tracing::warn!(%package, backend = %backend, error = %error, "{event}");
            }
            SyncEvent::AnalysisFinished {
                packages,
                conflicts,
            } => {
                tracing::debug!(packages, conflicts, "conflict analysis finished");
            }
            SyncEvent::Finished(summary) => {
                tracing::info!(
                    synced = summary.synced,
                    failed = summary.failed,
                    conflicts = summary.conflicts,
                    "sync finished"
                );
            }
        }
    }
}
