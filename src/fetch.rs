//! Static resource fetching for the manifest and the documents it lists.
//!
//! The viewer only ever asks for root-relative paths such as
//! `src/manifest.json` or `src/guide.md`. Where those bytes come from is
//! decided once at startup: a local directory ([`DirFetcher`]) or a remote
//! static host ([`HttpFetcher`]).

use std::future::Future;
use std::path::{Path, PathBuf};

use crate::error::FetchError;
use crate::serve::{normalize_path, MAX_FILE_SIZE};

/// The answer to a fetch that reached its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP-style status code (200, 404, 413, ...).
    pub status: u16,
    /// Response body. Empty for non-success responses.
    pub body: String,
}

impl FetchResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }

    /// `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetches a root-relative static resource.
pub trait Fetcher {
    fn fetch(&self, path: &str) -> impl Future<Output = Result<FetchResponse, FetchError>> + Send;
}

// ---------------------------------------------------------------------------
// Local directory
// ---------------------------------------------------------------------------

/// Serves resources from a directory on the local file system.
///
/// Paths are normalised the same way the HTTP server normalises request paths,
/// so a manifest entry like `../secret.md` resolves to a 404 rather than
/// escaping the root.
pub struct DirFetcher {
    root: PathBuf,
    canonical_root: PathBuf,
}

impl DirFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let canonical_root = std::fs::canonicalize(&root).unwrap_or_else(|_| root.clone());
        Self {
            root,
            canonical_root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn canonical_root(&self) -> &Path {
        &self.canonical_root
    }
}

impl Fetcher for DirFetcher {
    async fn fetch(&self, path: &str) -> Result<FetchResponse, FetchError> {
        let Some(relative) = normalize_path(path) else {
            log::debug!("[fetch] path={path} status=404 reason=path-traversal");
            return Ok(FetchResponse::status(404));
        };
        let candidate = self.root.join(&relative);

        let canonical = match tokio::fs::canonicalize(&candidate).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("[fetch] path={path} status=404 reason=not-found");
                return Ok(FetchResponse::status(404));
            }
            Err(source) => {
                return Err(FetchError::Io {
                    path: path.to_owned(),
                    source,
                })
            }
        };
        if !canonical.starts_with(&self.canonical_root) {
            log::debug!("[fetch] path={path} status=404 reason=outside-root");
            return Ok(FetchResponse::status(404));
        }

        let meta = tokio::fs::metadata(&canonical)
            .await
            .map_err(|source| FetchError::Io {
                path: path.to_owned(),
                source,
            })?;
        if !meta.is_file() {
            log::debug!("[fetch] path={path} status=404 reason=not-a-file");
            return Ok(FetchResponse::status(404));
        }
        if meta.len() > MAX_FILE_SIZE {
            log::debug!("[fetch] path={path} status=413 size={}", meta.len());
            return Ok(FetchResponse::status(413));
        }

        let bytes = tokio::fs::read(&canonical)
            .await
            .map_err(|source| FetchError::Io {
                path: path.to_owned(),
                source,
            })?;
        // Invalid UTF-8 shows up as U+FFFD rather than failing the load.
        let body = String::from_utf8_lossy(&bytes).into_owned();
        log::debug!("[fetch] path={path} status=200 bytes={}", body.len());
        Ok(FetchResponse::ok(body))
    }
}

// ---------------------------------------------------------------------------
// Remote static host
// ---------------------------------------------------------------------------

/// Fetches resources relative to a base URL on a static web host.
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, path: &str) -> Result<FetchResponse, FetchError> {
        let url = self.url_for(path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.clone(),
                source,
            })?;
        let status = resp.status();
        if !status.is_success() {
            log::debug!("[fetch] url={url} status={}", status.as_u16());
            return Ok(FetchResponse::status(status.as_u16()));
        }
        let body = resp.text().await.map_err(|source| FetchError::Http {
            url: url.clone(),
            source,
        })?;
        log::debug!("[fetch] url={url} status={} bytes={}", status.as_u16(), body.len());
        Ok(FetchResponse {
            status: status.as_u16(),
            body,
        })
    }
}

// ---------------------------------------------------------------------------
// Runtime-selected source
// ---------------------------------------------------------------------------

/// The document source chosen on the command line.
pub enum Source {
    Dir(DirFetcher),
    Http(HttpFetcher),
}

impl Source {
    /// Canonical local root, when documents come from the file system.
    pub fn local_root(&self) -> Option<&Path> {
        match self {
            Source::Dir(dir) => Some(dir.canonical_root()),
            Source::Http(_) => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Source::Dir(dir) => dir.root().display().to_string(),
            Source::Http(http) => http.base_url.clone(),
        }
    }
}

impl Fetcher for Source {
    async fn fetch(&self, path: &str) -> Result<FetchResponse, FetchError> {
        match self {
            Source::Dir(dir) => dir.fetch(path).await,
            Source::Http(http) => http.fetch(path).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-memory fetcher: unknown paths answer 404, `fail` paths error out.
    #[derive(Default)]
    pub struct MemoryFetcher {
        responses: HashMap<String, FetchResponse>,
        failing: Vec<String>,
        pub requests: Mutex<Vec<String>>,
    }

    impl MemoryFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, path: &str, body: &str) -> Self {
            self.responses
                .insert(path.to_owned(), FetchResponse::ok(body));
            self
        }

        pub fn with_status(mut self, path: &str, status: u16) -> Self {
            self.responses
                .insert(path.to_owned(), FetchResponse::status(status));
            self
        }

        pub fn failing(mut self, path: &str) -> Self {
            self.failing.push(path.to_owned());
            self
        }
    }

    impl Fetcher for MemoryFetcher {
        async fn fetch(&self, path: &str) -> Result<FetchResponse, FetchError> {
            self.requests.lock().unwrap().push(path.to_owned());
            if self.failing.iter().any(|p| p == path) {
                return Err(FetchError::Io {
                    path: path.to_owned(),
                    source: std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"),
                });
            }
            Ok(self
                .responses
                .get(path)
                .cloned()
                .unwrap_or_else(|| FetchResponse::status(404)))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        assert!(FetchResponse::ok("x").is_success());
        assert!(FetchResponse::status(204).is_success());
        assert!(!FetchResponse::status(404).is_success());
        assert!(!FetchResponse::status(500).is_success());
        assert!(!FetchResponse::status(304).is_success());
    }

    #[test]
    fn http_url_joining_handles_slashes() {
        let f = HttpFetcher::new("https://example.com/docs/");
        assert_eq!(
            f.url_for("src/manifest.json"),
            "https://example.com/docs/src/manifest.json"
        );
        let f = HttpFetcher::new("https://example.com");
        assert_eq!(f.url_for("/src/a.md"), "https://example.com/src/a.md");
    }

    #[tokio::test]
    async fn dir_fetcher_reads_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("src")).unwrap();
        std::fs::write(tmp.path().join("src/a.md"), "# A\n").unwrap();

        let fetcher = DirFetcher::new(tmp.path());
        let resp = fetcher.fetch("src/a.md").await.unwrap();
        assert_eq!(resp, FetchResponse::ok("# A\n"));
    }

    #[tokio::test]
    async fn dir_fetcher_decodes_invalid_utf8_lossily() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("src")).unwrap();
        std::fs::write(tmp.path().join("src/latin1.md"), b"# Caf\xe9\n").unwrap();

        let fetcher = DirFetcher::new(tmp.path());
        let resp = fetcher.fetch("src/latin1.md").await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "# Caf\u{FFFD}\n");
    }

    #[tokio::test]
    async fn dir_fetcher_missing_file_is_404() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = DirFetcher::new(tmp.path());
        let resp = fetcher.fetch("src/nope.md").await.unwrap();
        assert_eq!(resp.status, 404);
        assert!(resp.body.is_empty());
    }

    #[tokio::test]
    async fn dir_fetcher_rejects_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(tmp.path().join("secret.md"), "secret").unwrap();

        let fetcher = DirFetcher::new(&root);
        let resp = fetcher.fetch("src/../../secret.md").await.unwrap();
        assert_eq!(resp.status, 404);
    }

    #[tokio::test]
    async fn dir_fetcher_directory_is_404() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("src/sub")).unwrap();
        let fetcher = DirFetcher::new(tmp.path());
        assert_eq!(fetcher.fetch("src/sub").await.unwrap().status, 404);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dir_fetcher_symlink_outside_root_is_404() {
        use std::os::unix::fs::symlink;

        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        std::fs::create_dir_all(root.join("src")).unwrap();
        let outside = tmp.path().join("outside.md");
        std::fs::write(&outside, "secret").unwrap();
        symlink(&outside, root.join("src/evil.md")).unwrap();

        let fetcher = DirFetcher::new(&root);
        assert_eq!(fetcher.fetch("src/evil.md").await.unwrap().status, 404);
    }
}
