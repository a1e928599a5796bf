use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use mod_sync::{
    BackendPolicy, DeclaredConflicts, PackageId, PlatformVersion, SyncCoordinator, SyncReport,
    TracingSink, install_report,
};

use super::{backends, format};
use crate::config::AppConfig;

/// Command-line overrides for a sync run.
#[derive(Debug, Default)]
pub struct SyncArgs {
    pub packages: Vec<String>,
    pub platform: Option<String>,
    pub concurrency: Option<usize>,
    pub first_success: bool,
    pub json: bool,
    pub install_dir: Option<PathBuf>,
}

/// Packages named on the command line win over the config list.
fn requested_packages(args: &SyncArgs, config: &AppConfig) -> Vec<PackageId> {
    let source = if args.packages.is_empty() {
        &config.packages
    } else {
        &args.packages
    };
    source.iter().map(PackageId::new).collect()
}

fn policy(args: &SyncArgs, config: &AppConfig) -> BackendPolicy {
    if args.first_success {
        BackendPolicy::FirstSuccess
    } else {
        config.policy
    }
}

pub async fn run(config: &AppConfig, args: SyncArgs) -> Result<()> {
    let Some(platform) = args
        .platform
        .clone()
        .or_else(|| config.platform_version.clone())
    else {
        bail!("no platform version given; pass --platform or set platform_version in the config");
    };

    let packages = requested_packages(&args, config);
    if packages.is_empty() {
        bail!("no packages to sync; name them on the command line or under `packages` in the config");
    }

    let backends = backends::build_all(config)?;
    if backends.is_empty() {
        tracing::warn!("no enabled backends; every package will be reported as failed");
    }

    let analyzer = DeclaredConflicts::new(config.conflicts.clone())
        .context("invalid conflict rule in config")?;

    let coordinator = SyncCoordinator::new(PlatformVersion::new(platform), Arc::new(analyzer))
        .with_concurrency(args.concurrency.unwrap_or(config.concurrency))
        .with_policy(policy(&args, config))
        .with_sink(Arc::new(TracingSink));

    tracing::info!(
        packages = packages.len(),
        backends = backends.len(),
        platform = %coordinator.platform(),
        "starting sync"
    );

    let report = coordinator.sync(&packages, &backends).await?;
    let mods_dir = args.install_dir.as_deref().or(config.mods_dir.as_deref());
    finish(&report, args.json, mods_dir, &mut std::io::stdout()).await
}

/// Write the report to `out`, then install it if a mods dir is set.
///
/// The report goes out first so its counts survive a failed install.
async fn finish(
    report: &SyncReport,
    json: bool,
    mods_dir: Option<&Path>,
    out: &mut dyn Write,
) -> Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(report)?)?;
    } else {
        write!(out, "{}", format::render_report(report))?;
    }
    out.flush()?;

    if let Some(mods_dir) = mods_dir {
        let installed = install_report(report, mods_dir)
            .await
            .with_context(|| format!("failed to install into {}", mods_dir.display()))?;
        eprintln!(
            "Installed {} artifact(s) into {}",
            installed.len(),
            mods_dir.display()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_packages(packages: &[&str]) -> AppConfig {
        AppConfig {
            packages: packages.iter().map(|p| p.to_string()).collect(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn command_line_packages_override_config() {
        let config = config_with_packages(&["from-config"]);
        let args = SyncArgs {
            packages: vec!["a".into(), "b".into()],
            ..SyncArgs::default()
        };
        assert_eq!(
            requested_packages(&args, &config),
            vec![PackageId::new("a"), PackageId::new("b")]
        );
    }

    #[test]
    fn config_packages_used_when_none_given() {
        let config = config_with_packages(&["from-config"]);
        assert_eq!(
            requested_packages(&SyncArgs::default(), &config),
            vec![PackageId::new("from-config")]
        );
    }

    #[test]
    fn first_success_flag_overrides_config_policy() {
        let config = AppConfig::default();
        assert_eq!(policy(&SyncArgs::default(), &config), BackendPolicy::AllBackends);

        let args = SyncArgs {
            first_success: true,
            ..SyncArgs::default()
        };
        assert_eq!(policy(&args, &config), BackendPolicy::FirstSuccess);
    }

    fn one_synced(artifact: PathBuf) -> SyncReport {
        SyncReport {
            synced: vec![mod_sync::SyncedPackage {
                package: PackageId::new("jei"),
                backend: "curseforge".into(),
                version: mod_sync::VersionInfo::new("ref", "jei.jar"),
                artifact,
            }],
            ..SyncReport::default()
        }
    }

    #[tokio::test]
    async fn report_is_printed_even_when_install_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let report = one_synced(dir.path().join("jei.jar"));
        let mut out = Vec::new();
        let result = finish(&report, false, Some(blocker.join("mods").as_path()), &mut out).await;

        assert!(result.is_err());
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.starts_with("Synced: 1\n"), "got: {printed}");
    }

    #[tokio::test]
    async fn json_report_then_install() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("jei.jar");
        std::fs::write(&artifact, b"jar").unwrap();
        let mods = dir.path().join("mods");

        let mut out = Vec::new();
        finish(&one_synced(artifact), true, Some(mods.as_path()), &mut out)
            .await
            .unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed["synced"][0]["package"], "jei");
        assert!(mods.join("jei.jar").is_file());
    }

    #[tokio::test]
    async fn missing_platform_is_an_error() {
        let config = config_with_packages(&["a"]);
        let err = run(&config, SyncArgs::default()).await.unwrap_err();
        assert!(err.to_string().contains("platform"), "got: {err}");
    }

    #[tokio::test]
    async fn missing_packages_is_an_error() {
        let config = AppConfig {
            platform_version: Some("1.19.2".into()),
            ..AppConfig::default()
        };
        let err = run(&config, SyncArgs::default()).await.unwrap_err();
        assert!(err.to_string().contains("no packages"), "got: {err}");
    }
}
