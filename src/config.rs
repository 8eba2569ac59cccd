//! Resolved runtime configuration for `mdshelf serve`.

use std::path::PathBuf;

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3333;

/// Where the manifest and documents are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// A local site root containing `src/manifest.json`.
    Local(PathBuf),
    /// A static host serving `src/manifest.json` under this base URL.
    Remote(String),
}

/// Where the theme preference lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefsLocation {
    File(PathBuf),
    /// Kept in memory and forgotten on exit.
    Ephemeral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeConfig {
    pub bind: String,
    pub port: u16,
    pub source: DocumentSource,
    pub prefs: PrefsLocation,
}

impl ServeConfig {
    /// Defaults for serving `root` locally.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            bind: DEFAULT_BIND.to_owned(),
            port: DEFAULT_PORT,
            source: DocumentSource::Local(root.into()),
            prefs: PrefsLocation::File(default_prefs_path()),
        }
    }
}

/// `mdshelf/preferences.json` under the platform config directory, else a
/// dotfile in the working directory.
pub fn default_prefs_path() -> PathBuf {
    prefs_path_in(dirs::config_dir())
}

fn prefs_path_in(config_dir: Option<PathBuf>) -> PathBuf {
    match config_dir {
        Some(dir) => dir.join("mdshelf").join("preferences.json"),
        None => PathBuf::from(".mdshelf-preferences.json"),
    }
}
