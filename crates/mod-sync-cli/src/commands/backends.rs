use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use mod_sync::{RepositoryBackend, ScratchDir};
use mod_sync_curseforge::{CurseForgeBackend, CurseForgeConfig};

use crate::config::{AppConfig, BackendEntry, BackendType};

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn build_backend(entry: &BackendEntry, cache_root: &Path) -> Result<Arc<dyn RepositoryBackend>> {
    match &entry.backend_type {
        BackendType::CurseForge {
            api_base_url,
            timeout_secs,
            ..
        } => {
            let api_key = entry.backend_type.api_key(env_lookup).with_context(|| {
                format!(
                    "no API key for backend [{}]; set api_key or api_key_env in the config",
                    entry.label
                )
            })?;

            let config = CurseForgeConfig {
                label: entry.label.clone(),
                api_key,
                api_base_url: api_base_url.clone(),
                scratch_root: cache_root.to_path_buf(),
                timeout: timeout_secs.map(Duration::from_secs),
            };
            let backend = CurseForgeBackend::new(config)
                .with_context(|| format!("failed to set up backend [{}]", entry.label))?;
            Ok(Arc::new(backend))
        }
    }
}

/// Labels name scratch directories, so no two entries may share one.
fn ensure_unique_labels(entries: &[BackendEntry]) -> Result<()> {
    let mut seen = HashSet::new();
    for entry in entries {
        if !seen.insert(entry.label.as_str()) {
            bail!("backend label [{}] is configured more than once", entry.label);
        }
    }
    Ok(())
}

/// Build every enabled backend, in config order.
pub fn build_all(config: &AppConfig) -> Result<Vec<Arc<dyn RepositoryBackend>>> {
    ensure_unique_labels(&config.backends)?;
    let cache_root = config.cache_root()?;
    config
        .backends
        .iter()
        .filter(|entry| entry.enabled)
        .map(|entry| build_backend(entry, &cache_root))
        .collect()
}

/// Print configured backends and where their downloads go.
pub fn run(config: &AppConfig) -> Result<()> {
    let cache_root = config.cache_root()?;

    if config.backends.is_empty() {
        println!("No backends configured.");
        return Ok(());
    }

    for entry in &config.backends {
        let kind = match entry.backend_type {
            BackendType::CurseForge { .. } => "curseforge",
        };
        let state = if entry.enabled { "" } else { " (disabled)" };
        let scratch = ScratchDir::new(&cache_root, &entry.label);
        println!(
            "{:<16} {:<12} {}{}",
            entry.label,
            kind,
            scratch.path().display(),
            state
        );
    }

    Ok(())
}
