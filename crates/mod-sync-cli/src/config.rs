use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mod_sync::{BackendPolicy, ConflictRule, DEFAULT_CONCURRENCY};
use serde::{Deserialize, Serialize};

const DEFAULT_API_KEY_ENV: &str = "CURSEFORGE_API_KEY";

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub platform_version: Option<String>,
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub policy: BackendPolicy,
    /// Root for backend scratch directories. Defaults to the user cache dir.
    pub cache_dir: Option<PathBuf>,
    /// Where synced artifacts are copied after a run, if set.
    pub mods_dir: Option<PathBuf>,
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendEntry>,
    #[serde(default)]
    pub conflicts: Vec<ConflictRule>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            platform_version: None,
            packages: Vec::new(),
            concurrency: default_concurrency(),
            policy: BackendPolicy::default(),
            cache_dir: None,
            mods_dir: None,
            backends: default_backends(),
            conflicts: Vec::new(),
        }
    }
}

/// A single configured backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendEntry {
    pub label: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub backend_type: BackendType,
}

/// The kind of remote repository.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum BackendType {
    #[serde(rename = "curseforge")]
    CurseForge {
        /// Literal API key. Takes precedence over `api_key_env`.
        api_key: Option<String>,
        /// Environment variable holding the API key.
        api_key_env: Option<String>,
        api_base_url: Option<String>,
        timeout_secs: Option<u64>,
    },
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

/// Built-in backend list used when the config names none.
pub fn default_backends() -> Vec<BackendEntry> {
    vec![BackendEntry {
        label: "curseforge".into(),
        enabled: true,
        backend_type: BackendType::CurseForge {
            api_key: None,
            api_key_env: None,
            api_base_url: None,
            timeout_secs: None,
        },
    }]
}

impl BackendType {
    /// Resolve the API key from the literal value or the environment.
    pub fn api_key(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        match self {
            Self::CurseForge {
                api_key,
                api_key_env,
                ..
            } => api_key.clone().or_else(|| {
                lookup(api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV))
            }),
        }
    }
}

impl AppConfig {
    /// Root directory for backend scratch space.
    pub fn cache_root(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => {
                let base = dirs::cache_dir().context("could not determine cache directory")?;
                Ok(base.join("mod-sync"))
            }
        }
    }
}

/// Config file path: `~/.config/mod-sync/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mod-sync").join("config.toml"))
}

/// Load config from `explicit` or the default location.
///
/// A missing default file yields the built-in defaults; an explicit path
/// must exist. A file that fails to parse is always an error.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(AppConfig::default()),
        },
    };

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("failed to parse config at {}", path.display()))
}

pub fn parse_config(contents: &str) -> Result<AppConfig> {
    Ok(toml::from_str(contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_curseforge_backend() {
        let config = AppConfig::default();
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.policy, BackendPolicy::AllBackends);
        assert_eq!(config.backends.len(), 1);
        assert_eq!(config.backends[0].label, "curseforge");
        assert!(config.backends[0].enabled);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.backends.len(), 1);
        assert!(config.packages.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
platform_version = "1.19.2"
packages = ["324006", "238222"]
concurrency = 3
policy = "first-success"
cache_dir = "/var/cache/mods"
mods_dir = "./mods"

[[backends]]
label = "cf-main"
type = "curseforge"
api_key_env = "MY_CF_KEY"
timeout_secs = 10

[[backends]]
label = "cf-mirror"
type = "curseforge"
api_key = "literal"
api_base_url = "http://mirror.local/v1"
enabled = false

[[conflicts]]
packages = ["optifine", "sodium"]
reason = "both replace the renderer"
"#;
        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.platform_version.as_deref(), Some("1.19.2"));
        assert_eq!(config.packages, vec!["324006", "238222"]);
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.policy, BackendPolicy::FirstSuccess);
        assert_eq!(config.cache_root().unwrap(), PathBuf::from("/var/cache/mods"));
        assert_eq!(config.mods_dir, Some(PathBuf::from("./mods")));
        assert_eq!(config.backends.len(), 2);
        assert!(!config.backends[1].enabled);
        assert_eq!(config.conflicts.len(), 1);
        assert_eq!(config.conflicts[0].packages.len(), 2);

        match &config.backends[0].backend_type {
            BackendType::CurseForge {
                api_key_env,
                timeout_secs,
                ..
            } => {
                assert_eq!(api_key_env.as_deref(), Some("MY_CF_KEY"));
                assert_eq!(*timeout_secs, Some(10));
            }
        }
    }

    #[test]
    fn unknown_backend_type_is_rejected() {
        let toml_str = r#"
[[backends]]
label = "x"
type = "ftp"
"#;
        assert!(parse_config(toml_str).is_err());
    }

    #[test]
    fn api_key_prefers_literal_then_env() {
        let literal = BackendType::CurseForge {
            api_key: Some("abc".into()),
            api_key_env: Some("IGNORED".into()),
            api_base_url: None,
            timeout_secs: None,
        };
        assert_eq!(literal.api_key(|_| Some("env".into())).as_deref(), Some("abc"));

        let from_env = BackendType::CurseForge {
            api_key: None,
            api_key_env: None,
            api_base_url: None,
            timeout_secs: None,
        };
        let key = from_env.api_key(|name| (name == "CURSEFORGE_API_KEY").then(|| "env".into()));
        assert_eq!(key.as_deref(), Some("env"));
        assert_eq!(from_env.api_key(|_| None), None);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "platform_version = \"1.20.1\"\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.platform_version.as_deref(), Some("1.20.1"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "concurrency = \"many\"\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
