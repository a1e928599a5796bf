pub mod analyzer;
pub mod backend;
pub mod coordinator;
pub mod event;
pub mod install;
pub mod package;
pub mod report;
pub mod scratch;

pub use analyzer::{AnalysisError, Conflict, ConflictAnalyzer, ConflictRule, DeclaredConflicts, NoConflicts};
pub use backend::{BackendError, RepositoryBackend};
pub use coordinator::{BackendPolicy, DEFAULT_CONCURRENCY, SyncCoordinator, SyncError};
pub use event::{EventSink, NullSink, SyncEvent, TracingSink};
pub use install::{InstallError, install_path, install_report};
pub use package::{PackageId, PlatformVersion, VersionInfo};
pub use report::{AttemptError, FailedPackage, ReportSummary, SyncOutcome, SyncReport, SyncedPackage};
pub use scratch::ScratchDir;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
