use std::path::{Path, PathBuf};

use crate::report::{SyncReport, SyncedPackage};

/// Errors that can occur while installing synced artifacts.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("artifact for {package} is missing: {}", .path.display())]
    MissingArtifact { package: String, path: PathBuf },
}

/// Where a synced artifact lands inside `mods_dir`: `mods_dir/<file name>`.
pub fn install_path(mods_dir: &Path, synced: &SyncedPackage) -> PathBuf {
    let name = synced
        .artifact
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| synced.version.file_name.clone().into());
    mods_dir.join(name)
}

/// Copy every synced artifact of `report` into `mods_dir`, creating it as
/// needed. When two entries share a file name, the later one wins.
/// Returns the installed paths in report order.
pub async fn install_report(
    report: &SyncReport,
    mods_dir: &Path,
) -> Result<Vec<PathBuf>, InstallError> {
    tokio::fs::create_dir_all(mods_dir).await?;

    let mut installed = Vec::with_capacity(report.synced.len());
    for synced in &report.synced {
        if !tokio::fs::try_exists(&synced.artifact).await? {
            return Err(InstallError::MissingArtifact {
                package: synced.package.to_string(),
                path: synced.artifact.clone(),
            });
        }

        let target = install_path(mods_dir, synced);
        tokio::fs::copy(&synced.artifact, &target).await?;
        installed.push(target);
    }

    Ok(installed)
}

#[cfg(test)]
mod tests {
    use crate::{PackageId, VersionInfo};

    use super::*;

    fn synced(id: &str, artifact: PathBuf) -> SyncedPackage {
        SyncedPackage {
            package: PackageId::new(id),
            backend: "test".into(),
            version: VersionInfo::new("ref", format!("{id}.jar")),
            artifact,
        }
    }

    #[test]
    fn install_path_uses_artifact_file_name() {
        let entry = synced("jei", PathBuf::from("/cache/cf/downloads/jei/jei-11.jar"));
        assert_eq!(
            install_path(Path::new("/mods"), &entry),
            PathBuf::from("/mods/jei-11.jar")
        );
    }

    #[tokio::test]
    async fn install_report_copies_artifacts() {
        let scratch = tempfile::tempdir().unwrap();
        let mods = tempfile::tempdir().unwrap();
        let artifact = scratch.path().join("a.jar");
        std::fs::write(&artifact, b"jar a").unwrap();

        let report = SyncReport {
            synced: vec![synced("a", artifact)],
            ..SyncReport::default()
        };

        let target = mods.path().join("mods");
        let installed = install_report(&report, &target).await.unwrap();
        assert_eq!(installed, vec![target.join("a.jar")]);
        assert_eq!(std::fs::read(&installed[0]).unwrap(), b"jar a");
    }

    #[tokio::test]
    async fn install_report_errors_on_missing_artifact() {
        let mods = tempfile::tempdir().unwrap();
        let report = SyncReport {
            synced: vec![synced("gone", mods.path().join("nope.jar"))],
            ..SyncReport::default()
        };

        let result = install_report(&report, mods.path()).await;
        assert!(matches!(result, Err(InstallError::MissingArtifact { .. })));
    }

    #[tokio::test]
    async fn empty_report_only_creates_directory() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("mods");
        let installed = install_report(&SyncReport::default(), &target).await.unwrap();
        assert!(installed.is_empty());
        assert!(target.is_dir());
    }
}
