use std::path::PathBuf;
use std::sync::Arc;

use crate::package::{PackageId, PlatformVersion, VersionInfo};

/// Faults a backend can report while resolving or fetching.
///
/// "No compatible release" is not a fault; `resolve` reports it as `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// A remote repository that can resolve and download packages.
///
/// `fetch` is only ever called with a [`VersionInfo`] that this same
/// instance returned from `resolve` for the same package.
#[async_trait::async_trait]
pub trait RepositoryBackend: Send + Sync {
    /// Human-readable label identifying this backend.
    fn label(&self) -> &str;

    /// Find the newest release of `package` compatible with `platform`.
    async fn resolve(
        &self,
        package: &PackageId,
        platform: &PlatformVersion,
    ) -> Result<Option<VersionInfo>, BackendError>;

    /// Download the artifact described by `version` into this backend's
    /// scratch directory and return the written path.
    async fn fetch(&self, package: &PackageId, version: &VersionInfo)
    -> Result<PathBuf, BackendError>;
}

#[async_trait::async_trait]
impl<T: RepositoryBackend + ?Sized> RepositoryBackend for Arc<T> {
    fn label(&self) -> &str {
        (**self).label()
    }

    async fn resolve(
        &self,
        package: &PackageId,
        platform: &PlatformVersion,
    ) -> Result<Option<VersionInfo>, BackendError> {
        (**self).resolve(package, platform).await
    }

    async fn fetch(
        &self,
        package: &PackageId,
        version: &VersionInfo,
    ) -> Result<PathBuf, BackendError> {
        (**self).fetch(package, version).await
    }
}
