//! The startup listing of available documents.

use std::fmt;

use serde::Deserialize;

use crate::fetch::Fetcher;

/// Root-relative location of the manifest.
pub const MANIFEST_PATH: &str = "src/manifest.json";

/// Directory prefix under which every listed document lives.
pub const DOCUMENT_DIR: &str = "src";

/// Example manifest shown in the "no files" guidance panel.
pub const EXAMPLE_MANIFEST: &str = r#"{
  "files": [
    "README.md",
    "documentation.md",
    "tutorial.md"
  ]
}"#;

#[derive(Debug, Deserialize)]
struct Manifest {
    files: Vec<String>,
}

/// Why the manifest produced no usable entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestProblem {
    Unreachable,
    Status(u16),
    Invalid,
    Empty,
}

impl fmt::Display for ManifestProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestProblem::Unreachable => f.write_str("unreachable"),
            ManifestProblem::Status(code) => write!(f, "status {code}"),
            ManifestProblem::Invalid => f.write_str("invalid json"),
            ManifestProblem::Empty => f.write_str("no files listed"),
        }
    }
}

/// Root-relative path of a listed document.
pub fn document_path(filename: &str) -> String {
    format!("{DOCUMENT_DIR}/{filename}")
}

/// Parse manifest JSON into its ordered filename list.
///
/// Only the `files` field is read; anything else in the object is ignored.
pub fn parse(text: &str) -> Result<Vec<String>, ManifestProblem> {
    let manifest: Manifest = serde_json::from_str(text).map_err(|e| {
        log::warn!("[manifest] invalid json: {e}");
        ManifestProblem::Invalid
    })?;
    if manifest.files.is_empty() {
        return Err(ManifestProblem::Empty);
    }
    Ok(manifest.files)
}

/// Fetch and parse the manifest.
///
/// Every failure mode collapses to "no files" for the caller; the problem is
/// returned for logging only.
pub async fn load<F: Fetcher>(fetcher: &F) -> Result<Vec<String>, ManifestProblem> {
    let resp = match fetcher.fetch(MANIFEST_PATH).await {
        Ok(resp) => resp,
        Err(e) => {
            log::warn!("[manifest] path={MANIFEST_PATH} error={e}");
            return Err(ManifestProblem::Unreachable);
        }
    };
    if !resp.is_success() {
        log::warn!("[manifest] path={MANIFEST_PATH} status={}", resp.status);
        return Err(ManifestProblem::Status(resp.status));
    }
    let files = parse(&resp.body)?;
    log::info!("[manifest] path={MANIFEST_PATH} files={}", files.len());
    Ok(files)
}
