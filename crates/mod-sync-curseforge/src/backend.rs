use std::path::PathBuf;
use std::time::Duration;

use mod_sync::{BackendError, PackageId, PlatformVersion, RepositoryBackend, ScratchDir, VersionInfo};

use crate::files::{FilesResponse, latest_compatible};

const DEFAULT_API_BASE: &str = "https://api.curseforge.com/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("mod-sync/", env!("CARGO_PKG_VERSION"));

/// Configuration for a CurseForge backend.
#[derive(Debug, Clone)]
pub struct CurseForgeConfig {
    pub label: String,
    pub api_key: String,
    pub api_base_url: Option<String>,
    /// Downloads go to `<scratch_root>/<label>/downloads/...`.
    pub scratch_root: PathBuf,
    pub timeout: Option<Duration>,
}

impl CurseForgeConfig {
    pub fn new(api_key: impl Into<String>, scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            label: "curseforge".into(),
            api_key: api_key.into(),
            api_base_url: None,
            scratch_root: scratch_root.into(),
            timeout: None,
        }
    }
}

/// Resolves and downloads mods through the CurseForge REST API.
pub struct CurseForgeBackend {
    config: CurseForgeConfig,
    client: reqwest::Client,
    scratch: ScratchDir,
}

impl CurseForgeBackend {
    pub fn new(config: CurseForgeConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|e| BackendError::Other(format!("failed to build HTTP client: {e}")))?;
        let scratch = ScratchDir::new(&config.scratch_root, &config.label);

        Ok(Self {
            config,
            client,
            scratch,
        })
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    fn api_base(&self) -> &str {
        self.config
            .api_base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
    }

    fn files_url(
        &self,
        package: &PackageId,
        platform: &PlatformVersion,
    ) -> Result<reqwest::Url, BackendError> {
        let base = self.api_base();
        let mut url = reqwest::Url::parse(base)
            .map_err(|e| BackendError::Other(format!("invalid API base {base}: {e}")))?;

        // The package id is pushed as one encoded segment.
        url.path_segments_mut()
            .map_err(|()| BackendError::Other(format!("API base {base} cannot take a path")))?
            .pop_if_empty()
            .extend(["mods", package.as_str(), "files"]);
        url.query_pairs_mut()
            .append_pair("gameVersion", platform.as_str())
            .append_pair("sortOrder", "desc")
            .append_pair("pageSize", "1");

        Ok(url)
    }

    fn build_request(&self, url: reqwest::Url) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
            .header("x-api-key", &self.config.api_key)
    }
}

fn transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout(err.to_string())
    } else {
        BackendError::Network(err.to_string())
    }
}

#[async_trait::async_trait]
impl RepositoryBackend for CurseForgeBackend {
    fn label(&self) -> &str {
        &self.config.label
    }

    async fn resolve(
        &self,
        package: &PackageId,
        platform: &PlatformVersion,
    ) -> Result<Option<VersionInfo>, BackendError> {
        let url = self.files_url(package, platform)?;

        let response = self
            .build_request(url)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(BackendError::Auth(format!(
                "HTTP {status} while resolving {package}"
            )));
        }

        if !status.is_success() {
            return Err(BackendError::Network(format!(
                "HTTP {}: {}",
                status,
                response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown".into())
            )));
        }

        let files: FilesResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(e.to_string())
            } else {
                BackendError::Parse(e.to_string())
            }
        })?;

        let Some(file) = latest_compatible(files.data, platform) else {
            return Ok(None);
        };

        let download_url = file.download_url.clone().ok_or_else(|| {
            BackendError::Unavailable(format!(
                "file {} of {package} has no download URL",
                file.id
            ))
        })?;

        Ok(Some(file.to_version_info(download_url)))
    }

    async fn fetch(
        &self,
        package: &PackageId,
        version: &VersionInfo,
    ) -> Result<PathBuf, BackendError> {
        // The API key stays on the API host; CDN downloads go out without it.
        let response = self
            .client
            .get(&version.download_ref)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(BackendError::Network(format!(
                "HTTP {} downloading {}",
                response.status(),
                version.file_name
            )));
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        if bytes.is_empty() {
            return Err(BackendError::Unavailable(format!(
                "{} downloaded as an empty file",
                version.file_name
            )));
        }

        self.scratch
            .write_artifact(package, &version.file_name, &bytes)
            .await
    }
}
