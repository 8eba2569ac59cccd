use std::collections::HashMap;
use std::fs::Metadata;
use std::io;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use axum::{
    body::Body,
    extract::{Query, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use tokio::signal;
use tokio::sync::Mutex;
use tower_http::compression::CompressionLayer;

use crate::app::{App, Dispatch};
use crate::config::{DocumentSource, PrefsLocation, ServeConfig};
use crate::error::StoreError;
use crate::events::ClickEvent;
use crate::fetch::{DirFetcher, HttpFetcher, Source};
use crate::manifest::DOCUMENT_DIR;
use crate::theme::{FileStore, MemoryStore, PreferenceStore};
use crate::web_assets;

/// Maximum number of consecutive ports to try before giving up.
const MAX_PORT_ATTEMPTS: u16 = 100;

/// Maximum file size that will be read and served (16 MiB).
pub const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// The preference store selected on the command line.
pub enum Prefs {
    File(FileStore),
    Memory(MemoryStore),
}

impl PreferenceStore for Prefs {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self {
            Prefs::File(store) => store.get(key),
            Prefs::Memory(store) => store.get(key),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        match self {
            Prefs::File(store) => store.set(key, value),
            Prefs::Memory(store) => store.set(key, value),
        }
    }
}

/// Shared state for all request handlers.
pub struct AppState {
    /// The single viewer session. Locked per step, never across a fetch.
    pub app: Mutex<App<Source, Prefs>>,
    /// Canonical site root for `/src/...`, when documents are local.
    pub static_root: Option<PathBuf>,
}

/// Attempt to bind a TCP listener on `bind_addr` starting at `start_port`.
///
/// On `EADDRINUSE` the port is incremented by one and the attempt is retried up
/// to `MAX_PORT_ATTEMPTS` times. Any other OS error fails immediately.
pub fn bind_with_retry(bind_addr: &str, start_port: u16) -> anyhow::Result<(TcpListener, u16)> {
    let mut port = start_port;
    log::debug!("[bind] trying port={port}");
    for _ in 0..MAX_PORT_ATTEMPTS {
        let addr = format!("{bind_addr}:{port}");
        match TcpListener::bind(&addr) {
            Ok(listener) => {
                log::debug!("[bind] success port={port}");
                return Ok((listener, port));
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                let next = port.wrapping_add(1);
                log::info!("[bind] EADDRINUSE port={port}, trying {next}");
                port = next;
            }
            Err(e) => return Err(e).with_context(|| format!("bind {addr} failed")),
        }
    }
    Err(anyhow!(
        "exhausted {MAX_PORT_ATTEMPTS} port candidates starting at {start_port}; all ports in use"
    ))
}

// ---------------------------------------------------------------------------
// Path resolution helpers
// ---------------------------------------------------------------------------

/// Percent-decode a URL path byte-by-byte (RFC 3986 §2.1).
///
/// Returns `Err(())` if the encoding is malformed (truncated `%XX` sequence or
/// non-hex digit) or if the decoded bytes are not valid UTF-8.
pub fn percent_decode(encoded: &str) -> Result<String, ()> {
    let bytes = encoded.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len() {
                return Err(());
            }
            let hi = hex_digit(bytes[i + 1])?;
            let lo = hex_digit(bytes[i + 2])?;
            out.push((hi << 4) | lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| ())
}

fn hex_digit(b: u8) -> Result<u8, ()> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(()),
    }
}

/// Normalize a decoded path, stripping `.` and `..` components.
///
/// Returns `None` if a `..` would climb above the root.
pub fn normalize_path(decoded: &str) -> Option<PathBuf> {
    let mut parts: Vec<&str> = Vec::new();
    for component in decoded.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            name => parts.push(name),
        }
    }
    Some(parts.iter().collect())
}

/// `Content-Type` for a file extension (case-insensitive).
///
/// Unknown extensions get `application/octet-stream` so browsers never sniff.
pub fn mime_for_ext(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "md" | "markdown" => "text/markdown; charset=utf-8",
        "json" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Why a `/src/...` request was refused.
#[derive(Debug, PartialEq, Eq)]
enum Denied {
    NotFound(&'static str),
    TooLarge(u64),
}

/// Resolve a raw request path under `canonical_root`.
///
/// 1. Percent-decode the raw path and reject null bytes.
/// 2. Normalise; reject traversal above the root and anything outside `src/`.
/// 3. Canonicalise and re-verify containment (symlink-safe).
/// 4. Require a regular file no larger than [`MAX_FILE_SIZE`].
async fn resolve_static(canonical_root: &Path, raw_path: &str) -> Result<(PathBuf, Metadata), Denied> {
    let decoded = percent_decode(raw_path).map_err(|_| Denied::NotFound("invalid-percent-encoding"))?;
    if decoded.contains('\0') {
        return Err(Denied::NotFound("null-byte"));
    }

    let normalized = normalize_path(&decoded).ok_or(Denied::NotFound("path-traversal"))?;
    if !normalized.starts_with(DOCUMENT_DIR) {
        return Err(Denied::NotFound("outside-src"));
    }

    let canonical = tokio::fs::canonicalize(canonical_root.join(&normalized))
        .await
        .map_err(|_| Denied::NotFound("not-found"))?;
    if !canonical.starts_with(canonical_root) {
        return Err(Denied::NotFound("outside-root"));
    }

    let meta = tokio::fs::metadata(&canonical)
        .await
        .map_err(|_| Denied::NotFound("metadata-failed"))?;
    if !meta.is_file() {
        return Err(Denied::NotFound("not-a-file"));
    }
    if meta.len() > MAX_FILE_SIZE {
        return Err(Denied::TooLarge(meta.len()));
    }
    Ok((canonical, meta))
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn plain_response(status: StatusCode, body: String) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        body,
    )
        .into_response()
}

fn not_found_response() -> Response {
    plain_response(StatusCode::NOT_FOUND, "Not Found".to_owned())
}

fn too_large_response(path: &str, size: u64) -> Response {
    plain_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("Content Too Large: {path} ({size} bytes exceeds {MAX_FILE_SIZE} byte limit)"),
    )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn page_handler(State(state): State<Arc<AppState>>) -> Response {
    let html = state.app.lock().await.render();
    (
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        html,
    )
        .into_response()
}

/// Dispatch a click and redirect back to the page.
///
/// A document load releases the lock while fetching; if another click
/// supersedes it meanwhile, the late outcome is discarded.
async fn click_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let click = ClickEvent::from_params(&params);
    let (dispatch, fetcher) = {
        let mut app = state.app.lock().await;
        (app.dispatch(&click), app.fetcher())
    };

    let location = match dispatch {
        Dispatch::Load(ticket) => {
            let outcome = ticket.run(fetcher.as_ref()).await;
            state.app.lock().await.complete(outcome);
            "/".to_owned()
        }
        Dispatch::Scroll(anchor_id) => format!("/#{anchor_id}"),
        Dispatch::Repainted | Dispatch::Ignored => "/".to_owned(),
    };
    Redirect::to(&location).into_response()
}

async fn css_handler() -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/css; charset=utf-8"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        web_assets::CSS,
    )
        .into_response()
}

/// Raw files under `src/`, local mode only.
async fn static_handler(State(state): State<Arc<AppState>>, req: Request) -> Response {
    let raw_path = req.uri().path().to_owned();
    let Some(root) = state.static_root.as_deref() else {
        log::debug!("[resolve] path={raw_path} branch=denied reason=remote-source");
        return not_found_response();
    };

    let (canonical, meta) = match resolve_static(root, &raw_path).await {
        Ok(resolved) => resolved,
        Err(Denied::NotFound(reason)) => {
            log::info!("[resolve] path={raw_path} branch=denied reason={reason}");
            return not_found_response();
        }
        Err(Denied::TooLarge(size)) => {
            log::info!("[resolve] path={raw_path} branch=denied reason=too-large size={size}");
            return too_large_response(&raw_path, size);
        }
    };

    let bytes = match tokio::fs::read(&canonical).await {
        Ok(b) => b,
        Err(e) => {
            log::warn!("[resolve] path={raw_path} read failed: {e}");
            return not_found_response();
        }
    };
    log::debug!("[resolve] path={raw_path} branch=static size={}", bytes.len());

    let ext = canonical
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_for_ext(ext))
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff");
    if let Ok(modified) = meta.modified() {
        builder = builder.header(header::LAST_MODIFIED, httpdate::fmt_http_date(modified));
    }
    builder
        .body(Body::from(bytes))
        .unwrap_or_else(|_| not_found_response())
}

async fn fallback_handler(req: Request) -> Response {
    log::debug!("[request] path={} status=404", req.uri().path());
    not_found_response()
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(page_handler))
        .route("/click", get(click_handler))
        .route("/assets/shelf.css", get(css_handler))
        .route("/src/{*path}", get(static_handler))
        .fallback(fallback_handler)
        .layer(CompressionLayer::new())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

fn open_source(source: &DocumentSource) -> Source {
    match source {
        DocumentSource::Local(root) => Source::Dir(DirFetcher::new(root)),
        DocumentSource::Remote(url) => Source::Http(HttpFetcher::new(url.as_str())),
    }
}

fn open_prefs(prefs: &PrefsLocation) -> Prefs {
    match prefs {
        PrefsLocation::File(path) => Prefs::File(FileStore::new(path)),
        PrefsLocation::Ephemeral => Prefs::Memory(MemoryStore::new()),
    }
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        log::error!("[shutdown] could not install SIGINT handler: {e}");
        std::future::pending::<()>().await;
    }
}

/// Start the viewer and serve it until SIGINT.
///
/// Binds to `config.bind` starting at `config.port`, retrying on `EADDRINUSE`
/// up to 100 times.
pub async fn run_serve(config: ServeConfig) -> anyhow::Result<()> {
    let source = Arc::new(open_source(&config.source));
    let static_root = source.local_root().map(Path::to_path_buf);
    log::info!("[serve] documents from {}", source.describe());
    if let PrefsLocation::File(path) = &config.prefs {
        log::debug!("[serve] preferences at {}", path.display());
    }

    let app = App::start(source, open_prefs(&config.prefs)).await;
    let state = Arc::new(AppState {
        app: Mutex::new(app),
        static_root,
    });

    let (std_listener, bound_port) = bind_with_retry(&config.bind, config.port)?;
    std_listener.set_nonblocking(true)?;
    let listener = tokio::net::TcpListener::from_std(std_listener)?;

    log::info!("[serve] listening on http://{}:{}", config.bind, bound_port);

    axum::serve(listener, router(Arc::clone(&state)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    state.app.lock().await.shutdown();
    log::info!("[shutdown] complete");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // --- percent_decode ---

    #[test]
    fn decode_plain_ascii() {
        assert_eq!(percent_decode("/src/guide.md").unwrap(), "/src/guide.md");
    }

    #[test]
    fn decode_dot_dot_either_case() {
        assert_eq!(percent_decode("%2e%2e").unwrap(), "..");
        assert_eq!(percent_decode("%2E%2E").unwrap(), "..");
    }

    #[test]
    fn decode_encoded_slash() {
        assert_eq!(percent_decode("%2e%2e%2f").unwrap(), "../");
    }

    #[test]
    fn decode_space() {
        assert_eq!(percent_decode("/src/my%20notes.md").unwrap(), "/src/my notes.md");
    }

    #[test]
    fn decode_truncated_sequence_is_error() {
        assert!(percent_decode("%2").is_err());
        assert!(percent_decode("%").is_err());
    }

    #[test]
    fn decode_invalid_hex_is_error() {
        assert!(percent_decode("%zz").is_err());
    }

    #[test]
    fn decode_invalid_utf8_sequence_is_error() {
        // Lone continuation byte.
        assert!(percent_decode("%80").is_err());
    }

    // --- normalize_path ---

    #[test]
    fn normalize_simple_path() {
        assert_eq!(normalize_path("/src/a.md").unwrap(), PathBuf::from("src/a.md"));
    }

    #[test]
    fn normalize_root_gives_empty() {
        assert_eq!(normalize_path("/").unwrap(), PathBuf::new());
    }

    #[test]
    fn normalize_dot_components_stripped() {
        assert_eq!(normalize_path("/a/./b").unwrap(), PathBuf::from("a/b"));
    }

    #[test]
    fn normalize_dotdot_within_root() {
        assert_eq!(normalize_path("/a/b/../c").unwrap(), PathBuf::from("a/c"));
    }

    #[test]
    fn normalize_traversal_above_root_rejected() {
        assert!(normalize_path("/../etc/passwd").is_none());
        assert!(normalize_path("/../../etc/passwd").is_none());
        assert!(normalize_path("/a/../../etc/passwd").is_none());
    }

    #[test]
    fn normalize_encoded_traversal_after_decode() {
        let decoded = percent_decode("/%2e%2e%2fetc%2fpasswd").unwrap();
        assert!(normalize_path(&decoded).is_none());
    }

    #[test]
    fn normalize_trailing_slash_ok() {
        assert_eq!(normalize_path("/src/").unwrap(), PathBuf::from("src"));
    }

    // --- mime_for_ext ---

    #[test]
    fn mime_documents() {
        assert_eq!(mime_for_ext("md"), "text/markdown; charset=utf-8");
        assert_eq!(mime_for_ext("MD"), "text/markdown; charset=utf-8");
        assert_eq!(mime_for_ext("json"), "application/json");
    }

    #[test]
    fn mime_images() {
        assert_eq!(mime_for_ext("png"), "image/png");
        assert_eq!(mime_for_ext("JPEG"), "image/jpeg");
        assert_eq!(mime_for_ext("svg"), "image/svg+xml");
    }

    #[test]
    fn mime_unknown_extension_is_octet_stream() {
        assert_eq!(mime_for_ext("xyz"), "application/octet-stream");
        assert_eq!(mime_for_ext(""), "application/octet-stream");
    }

    // --- bind_with_retry ---

    #[test]
    fn bind_skips_occupied_port() {
        let held = TcpListener::bind("127.0.0.1:0").unwrap();
        let busy = held.local_addr().unwrap().port();
        match bind_with_retry("127.0.0.1", busy) {
            Ok((_listener, port)) => assert_ne!(port, busy),
            // The next port happened to be taken by something else too and
            // so on for 100 ports; vanishingly unlikely but not a failure of
            // the retry logic.
            Err(e) => assert!(e.to_string().contains("exhausted"), "{e}"),
        }
    }

    // --- resolve_static ---

    fn site() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("src")).unwrap();
        std::fs::write(tmp.path().join("src/a.md"), "# A\n").unwrap();
        std::fs::write(tmp.path().join("secret.txt"), "nope").unwrap();
        let root = std::fs::canonicalize(tmp.path()).unwrap();
        (tmp, root)
    }

    #[tokio::test]
    async fn resolves_file_under_src() {
        let (_tmp, root) = site();
        let (path, meta) = resolve_static(&root, "/src/a.md").await.unwrap();
        assert_eq!(path, root.join("src/a.md"));
        assert_eq!(meta.len(), 4);
    }

    #[tokio::test]
    async fn rejects_paths_outside_src() {
        let (_tmp, root) = site();
        assert_eq!(
            resolve_static(&root, "/src/%2e%2e/secret.txt").await.unwrap_err(),
            Denied::NotFound("outside-src")
        );
        assert_eq!(
            resolve_static(&root, "/src/%2e%2e/%2e%2e/etc/passwd").await.unwrap_err(),
            Denied::NotFound("path-traversal")
        );
    }

    #[tokio::test]
    async fn rejects_directories_and_missing_files() {
        let (_tmp, root) = site();
        assert_eq!(
            resolve_static(&root, "/src/").await.unwrap_err(),
            Denied::NotFound("not-a-file")
        );
        assert_eq!(
            resolve_static(&root, "/src/missing.md").await.unwrap_err(),
            Denied::NotFound("not-found")
        );
        assert_eq!(
            resolve_static(&root, "/src/a%00.md").await.unwrap_err(),
            Denied::NotFound("null-byte")
        );
    }

    #[tokio::test]
    async fn rejects_oversized_files() {
        let (_tmp, root) = site();
        let file = std::fs::File::create(root.join("src/big.md")).unwrap();
        file.set_len(MAX_FILE_SIZE + 1).unwrap();
        assert_eq!(
            resolve_static(&root, "/src/big.md").await.unwrap_err(),
            Denied::TooLarge(MAX_FILE_SIZE + 1)
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_out_of_root_is_rejected() {
        use std::os::unix::fs::symlink;

        let (_tmp, root) = site();
        let outside = tempfile::tempdir().unwrap();
        let target = outside.path().join("leak.md");
        std::fs::write(&target, "secret").unwrap();
        symlink(&target, root.join("src/leak.md")).unwrap();

        assert_eq!(
            resolve_static(&root, "/src/leak.md").await.unwrap_err(),
            Denied::NotFound("outside-root")
        );
    }

    // --- Prefs ---

    #[test]
    fn prefs_delegate_to_inner_store() {
        let mut prefs = Prefs::Memory(MemoryStore::new());
        prefs.set("k", "v").unwrap();
        assert_eq!(prefs.get("k").unwrap().as_deref(), Some("v"));
    }
}
