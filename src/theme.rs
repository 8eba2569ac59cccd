//! Light/dark theme preference.
//!
//! The controller is constructed once by the app bootstrap and receives its
//! store by injection. It writes the preference onto the page root and every
//! theme icon, and persists it on every change.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::error::StoreError;
use crate::events::{ClickEvent, ListenerId, ListenerKind, ListenerRegistry};
use crate::page::{RootRegion, THEME_TOGGLE_ID};

/// Key under which the preference is persisted.
pub const STORAGE_KEY: &str = "markdown-reader-theme";

/// The two display themes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preference {
    #[default]
    Dim,
    Bright,
}

impl Preference {
    /// Attribute and storage value.
    pub fn as_str(self) -> &'static str {
        match self {
            Preference::Dim => "dark",
            Preference::Bright => "light",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "dark" => Some(Preference::Dim),
            "light" => Some(Preference::Bright),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Preference::Dim => Preference::Bright,
            Preference::Bright => Preference::Dim,
        }
    }

    /// Glyph shown by theme icons while this theme is applied.
    pub fn glyph(self) -> &'static str {
        match self {
            Preference::Dim => "\u{1F319}",
            Preference::Bright => "\u{2600}\u{FE0F}",
        }
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// Durable string key-value store.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// A JSON object of string values in a single file.
///
/// Writes go through a sibling temporary file and a rename so a crash never
/// leaves a truncated preference file behind.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };
        serde_json::from_str(&text).map_err(|source| StoreError::Json {
            path: self.path.display().to_string(),
            source,
        })
    }

    fn write_value(&self, key: &str, value: &str) -> Result<(), StoreError> {
        // A corrupt file is replaced rather than failing every future write.
        let mut values = self.read_all().unwrap_or_else(|e| {
            log::warn!("[prefs] discarding unreadable store: {e}");
            BTreeMap::new()
        });
        values.insert(key.to_owned(), value.to_owned());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }
        let text = serde_json::to_string_pretty(&values).map_err(|source| StoreError::Json {
            path: self.path.display().to_string(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl PreferenceStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(blocking(|| self.read_all())?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        blocking(|| self.write_value(key, value))
    }
}

/// Run synchronous file I/O without stalling other tasks on a worker thread.
///
/// Store calls happen while the app lock is held, so on the multi-thread
/// runtime the worker hands its queued tasks to another thread first.
/// Outside a runtime, or on a current-thread runtime, `f` runs inline.
fn blocking<T>(f: impl FnOnce() -> T) -> T {
    use tokio::runtime::{Handle, RuntimeFlavor};
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Process-lifetime store, for `--ephemeral` runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every access fails.
    #[cfg(test)]
    pub fn unavailable() -> Self {
        Self {
            values: HashMap::new(),
            unavailable: true,
        }
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Io {
                path: "<memory>".to_owned(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "store disabled"),
            });
        }
        Ok(())
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check()?;
        self.values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Owns the theme preference and its reflection onto the page root.
pub struct ThemeController<S> {
    store: S,
    listener: Option<ListenerId>,
}

impl<S: PreferenceStore> ThemeController<S> {
    /// Restore the stored preference (default Dim), apply it, and bind the
    /// toggle listener.
    ///
    /// The registry holds at most one toggle listener. When one is already
    /// bound and the root already carries a theme, the new controller adopts
    /// that theme without writing to its store, and it does not own the
    /// binding: disposing it leaves the first controller's listener in place.
    pub fn install(store: S, root: &mut RootRegion, listeners: &mut ListenerRegistry) -> Self {
        if listeners.is_registered(ListenerKind::ThemeToggle) {
            if let Some(applied) = root.theme {
                log::debug!("[theme] toggle already bound, adopting={}", applied.as_str());
                return Self {
                    store,
                    listener: None,
                };
            }
        }
        let restored = match store.get(STORAGE_KEY) {
            Ok(Some(value)) => Preference::parse(&value).unwrap_or_else(|| {
                log::warn!("[theme] ignoring unknown stored value={value:?}");
                Preference::default()
            }),
            Ok(None) => Preference::default(),
            Err(e) => {
                log::warn!("[theme] store unavailable, using default: {e}");
                Preference::default()
            }
        };
        let mut controller = Self {
            store,
            listener: None,
        };
        controller.apply(root, restored);
        if !listeners.is_registered(ListenerKind::ThemeToggle) {
            controller.listener = Some(listeners.register(ListenerKind::ThemeToggle));
        }
        controller
    }

    /// Reflect `preference` onto the page, persist it, and update every icon.
    pub fn apply(&mut self, root: &mut RootRegion, preference: Preference) {
        root.theme = Some(preference);
        if let Err(e) = self.store.set(STORAGE_KEY, preference.as_str()) {
            log::warn!("[theme] could not persist preference: {e}");
        }
        for icon in root.theme_icons.iter_mut() {
            *icon = preference.glyph().to_owned();
        }
        log::info!("[theme] applied={}", preference.as_str());
    }

    /// The applied preference, defaulting to Dim.
    pub fn current(&self, root: &RootRegion) -> Preference {
        root.theme.unwrap_or_default()
    }

    pub fn toggle(&mut self, root: &mut RootRegion) -> Preference {
        let next = self.current(root).toggled();
        self.apply(root, next);
        next
    }

    /// Toggle when the click originated inside the toggle control.
    ///
    /// Returns whether the click was handled.
    pub fn handle_click(&mut self, root: &mut RootRegion, click: &ClickEvent) -> bool {
        if click.closest_id(THEME_TOGGLE_ID).is_none() {
            return false;
        }
        self.toggle(root);
        true
    }

    /// Unbind the toggle listener.
    pub fn dispose(&mut self, listeners: &mut ListenerRegistry) {
        if let Some(id) = self.listener.take() {
            listeners.dispose(id);
        }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }
}
