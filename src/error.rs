//! Error types shared by the fetch and preference layers.
//!
//! Neither error ever reaches the user directly: the viewer turns fetch
//! failures into inline error panels and the theme controller falls back to
//! the default preference when the store misbehaves.

use thiserror::Error;

/// Failure to obtain a static resource at all.
///
/// A resource that was reached but answered with a non-success status is
/// *not* an error; see [`crate::fetch::FetchResponse::is_success`].
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("requesting {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Failure of the persistent preference store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("preference file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("preference file {path} is not a JSON object: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
