use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Backend-opaque identifier for a package.
/// The same string may name different packages on different backends.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PackageId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Target runtime version used to filter compatible releases (e.g. `1.19.2`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformVersion(String);

impl PlatformVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata for a resolved release, as produced by a backend.
///
/// The coordinator never looks inside this value; it is handed back to the
/// backend that produced it when the artifact is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Stable reference the backend can download from (usually a URL).
    pub download_ref: String,
    /// File name the artifact should be stored under.
    pub file_name: String,
    /// Backend-specific extras (release id, display name, dates...).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl VersionInfo {
    pub fn new(download_ref: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            download_ref: download_ref.into(),
            file_name: file_name.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Human-readable name for the release, falling back to the file name.
    pub fn display_name(&self) -> &str {
        self.metadata
            .get("display_name")
            .map(String::as_str)
            .unwrap_or(&self.file_name)
    }
}
