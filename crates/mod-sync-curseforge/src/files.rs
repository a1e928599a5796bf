use mod_sync::{PlatformVersion, VersionInfo};
use serde::Deserialize;

/// Response from the mod files endpoint.
/// `GET /mods/{modId}/files`
#[derive(Debug, Deserialize)]
pub struct FilesResponse {
    #[serde(default)]
    pub data: Vec<ModFile>,
}

/// One downloadable file of a mod.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModFile {
    pub id: u64,
    #[serde(default)]
    pub display_name: Option<String>,
    pub file_name: String,
    /// `null` when the author has disabled third-party distribution.
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub file_date: Option<String>,
    #[serde(default)]
    pub file_length: Option<u64>,
    #[serde(default)]
    pub game_versions: Vec<String>,
}

impl ModFile {
    /// True if the file lists `platform`, or lists no versions at all.
    pub fn supports(&self, platform: &PlatformVersion) -> bool {
        self.game_versions.is_empty()
            || self.game_versions.iter().any(|v| v == platform.as_str())
    }

    pub fn to_version_info(&self, download_url: String) -> VersionInfo {
        let mut info = VersionInfo::new(download_url, self.file_name.clone())
            .with_metadata("file_id", self.id.to_string());
        if let Some(name) = &self.display_name {
            info = info.with_metadata("display_name", name.clone());
        }
        if let Some(date) = &self.file_date {
            info = info.with_metadata("file_date", date.clone());
        }
        if let Some(len) = self.file_length {
            info = info.with_metadata("file_length", len.to_string());
        }
        info
    }
}

/// Pick the newest file compatible with `platform`.
///
/// Dates are ISO-8601, so they order correctly as strings. Ties keep the
/// earlier entry, which is the server's preferred order.
pub fn latest_compatible(files: Vec<ModFile>, platform: &PlatformVersion) -> Option<ModFile> {
    files
        .into_iter()
        .filter(|f| f.supports(platform))
        .fold(None, |best: Option<ModFile>, file| match best {
            Some(current) if current.file_date >= file.file_date => Some(current),
            _ => Some(file),
        })
}
