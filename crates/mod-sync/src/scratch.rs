use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::backend::BackendError;
use crate::package::PackageId;

/// A backend-owned directory for downloaded artifacts.
///
/// Layout: `<root>/<label>/downloads/<package>/<file_name>`. The directory
/// tree is created lazily on the first write. Each package gets its own
/// subdirectory, so concurrent downloads of different packages never write
/// to the same path.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    dir: PathBuf,
}

impl ScratchDir {
    pub fn new(root: impl AsRef<Path>, label: &str) -> Self {
        Self {
            dir: root.as_ref().join(sanitize_segment(label)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Where the artifact for `package` named `file_name` will be written.
    pub fn artifact_path(&self, package: &PackageId, file_name: &str) -> PathBuf {
        self.dir
            .join("downloads")
            .join(sanitize_segment(package.as_str()))
            .join(sanitize_segment(file_name))
    }

    /// Write `bytes` as the artifact for `package`.
    ///
    /// The data goes to a uniquely named `.part` file next to the target and
    /// is persisted into place, so a reader never sees a half-written
    /// artifact and concurrent writers never share a temp file.
    pub async fn write_artifact(
        &self,
        package: &PackageId,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, BackendError> {
        let path = self.artifact_path(package, file_name);
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.dir.clone());
        tokio::fs::create_dir_all(&parent).await?;

        let target = path.clone();
        let bytes = bytes.to_vec();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut part = tempfile::Builder::new()
                .prefix(".")
                .suffix(".part")
                .tempfile_in(&parent)?;
            part.write_all(&bytes)?;
            part.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| BackendError::Io(e.to_string()))??;

        Ok(path)
    }
}

/// Encode a string as a single safe path segment.
///
/// Alphanumerics and `-_+.` pass through; every other byte becomes `%XX`.
/// A leading `.` is always encoded, and the empty string maps to `%`, which
/// no other input can produce. Distinct inputs give distinct segments.
fn sanitize_segment(raw: &str) -> String {
    if raw.is_empty() {
        return "%".to_owned();
    }

    let mut out = String::with_capacity(raw.len());
    for (i, c) in raw.char_indices() {
        let keep = c.is_alphanumeric() || matches!(c, '-' | '_' | '+') || (c == '.' && i > 0);
        if keep {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}
