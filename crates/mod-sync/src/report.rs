use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::analyzer::Conflict;
use crate::package::{PackageId, VersionInfo};

/// Why a single (package, backend) attempt did not produce an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AttemptError {
    /// No release matched the platform filter. This is an ordinary result.
    #[error("no compatible version found")]
    ResolutionNotFound,

    #[error("resolution failed: {0}")]
    ResolutionFault(String),

    #[error("fetch failed: {0}")]
    FetchFault(String),

    /// No backend was configured, so nothing could be attempted.
    #[error("no repository backends configured")]
    NoBackends,

    /// The attempt panicked before producing an outcome.
    #[error("attempt aborted: {0}")]
    Aborted(String),
}

/// A package whose artifact was downloaded successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncedPackage {
    pub package: PackageId,
    pub backend: String,
    pub version: VersionInfo,
    pub artifact: PathBuf,
}

/// A failed attempt for a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPackage {
    pub package: PackageId,
    /// `None` when no backend was available to attempt the package.
    pub backend: Option<String>,
    pub reason: AttemptError,
}

/// The result of one (package, backend) attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced(SyncedPackage),
    Failed(FailedPackage),
}

impl SyncOutcome {
    pub fn package(&self) -> &PackageId {
        match self {
            Self::Synced(synced) => &synced.package,
            Self::Failed(failed) => &failed.package,
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced(_))
    }
}

/// Aggregated result of a sync call.
///
/// `synced` and `failed` are in attempt completion order, which varies
/// between runs. Only use it for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub synced: Vec<SyncedPackage>,
    pub failed: Vec<FailedPackage>,
    pub conflicts: Vec<Conflict>,
}

impl SyncReport {
    pub(crate) fn record(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Synced(synced) => self.synced.push(synced),
            SyncOutcome::Failed(failed) => self.failed.push(failed),
        }
    }

    /// Distinct identifiers present in `synced`.
    pub fn synced_packages(&self) -> BTreeSet<PackageId> {
        self.synced.iter().map(|s| s.package.clone()).collect()
    }

    /// Package identifiers of the failed attempts, one per entry.
    pub fn failed_packages(&self) -> Vec<&PackageId> {
        self.failed.iter().map(|f| &f.package).collect()
    }

    /// True if `package` appears in either `synced` or `failed`.
    pub fn covers(&self, package: &PackageId) -> bool {
        self.synced.iter().any(|s| &s.package == package)
            || self.failed.iter().any(|f| &f.package == package)
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            synced: self.synced.len(),
            failed: self.failed.len(),
            conflicts: self.conflicts.len(),
        }
    }
}

/// Entry counts of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub synced: usize,
    pub failed: usize,
    pub conflicts: usize,
}

impl std::fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} synced, {} failed, {} conflicts",
            self.synced, self.failed, self.conflicts
        )
    }
}
