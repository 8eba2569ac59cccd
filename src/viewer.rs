//! The document viewer: manifest listing, document selection, outline
//! navigation.
//!
//! Selection is split in three so that the fetch can run without holding the
//! page: [`DocumentViewer::begin_load`] updates the page and hands out a
//! [`LoadTicket`], [`LoadTicket::run`] fetches and converts, and
//! [`DocumentViewer::complete_load`] applies the outcome. Every selection bumps
//! a generation counter, and outcomes from superseded selections are dropped.

use std::fmt;

use crate::events::{ClickEvent, ListenerId, ListenerKind, ListenerRegistry};
use crate::fetch::Fetcher;
use crate::html::{self, RenderedDocument};
use crate::manifest::{self, ManifestProblem};
use crate::page::{FileItem, FileList, Header, ViewerRegions, FILE_ITEM_CLASS, TOC_ITEM_CLASS};
use crate::selection;

/// What went wrong, for the `Failed` state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    Manifest,
    Document { filename: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerState {
    /// No manifest yet.
    Idle,
    /// Manifest loaded, nothing selected.
    Listed,
    Loading { generation: u64, filename: String },
    Rendered { filename: String },
    Failed(Failure),
}

/// Why a document could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadFailure {
    Status(u16),
    Fetch(String),
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadFailure::Status(code) => write!(f, "status {code}"),
            LoadFailure::Fetch(e) => f.write_str(e),
        }
    }
}

/// Permission to fetch one selected document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    filename: String,
}

impl LoadTicket {
    /// Fetch `src/{filename}` and convert it. Touches no page state.
    pub async fn run<F: Fetcher>(self, fetcher: &F) -> LoadOutcome {
        let path = manifest::document_path(&self.filename);
        let result = match fetcher.fetch(&path).await {
            Ok(resp) if resp.is_success() => Ok(html::render(&resp.body)),
            Ok(resp) => Err(LoadFailure::Status(resp.status)),
            Err(e) => Err(LoadFailure::Fetch(e.to_string())),
        };
        LoadOutcome {
            generation: self.generation,
            filename: self.filename,
            result,
        }
    }
}

#[cfg(test)]
impl LoadTicket {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Result of running a [`LoadTicket`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    generation: u64,
    filename: String,
    result: Result<RenderedDocument, LoadFailure>,
}

/// Where the page should scroll after an outline click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollTarget {
    pub anchor_id: String,
}

/// Header title for a document: the filename without a trailing `.md`.
pub fn title_for(filename: &str) -> &str {
    if filename.to_ascii_lowercase().ends_with(".md") {
        &filename[..filename.len() - 3]
    } else {
        filename
    }
}

pub fn manifest_error_message() -> String {
    format!(
        "Failed to load markdown files. Make sure to create a {} file listing your .md files.",
        manifest::MANIFEST_PATH
    )
}

pub fn document_error_message(filename: &str) -> String {
    format!("Failed to load {filename}. Make sure the file exists in the src folder.")
}

pub struct DocumentViewer {
    documents: Vec<String>,
    state: ViewerState,
    generation: u64,
    listeners: Vec<ListenerId>,
}

impl DocumentViewer {
    /// Construct the viewer and bind its file-list and outline listeners.
    pub fn new(listeners: &mut ListenerRegistry) -> Self {
        let bound = vec![
            listeners.register(ListenerKind::FileList),
            listeners.register(ListenerKind::Outline),
        ];
        Self {
            documents: Vec::new(),
            state: ViewerState::Idle,
            generation: 0,
            listeners: bound,
        }
    }

    /// The document being loaded, shown, or reported as failed.
    pub fn current_document(&self) -> Option<&str> {
        match &self.state {
            ViewerState::Loading { filename, .. }
            | ViewerState::Rendered { filename }
            | ViewerState::Failed(Failure::Document { filename }) => Some(filename),
            ViewerState::Idle | ViewerState::Listed | ViewerState::Failed(Failure::Manifest) => {
                None
            }
        }
    }

    /// Fetch the manifest and render the file list.
    pub async fn initialize<F: Fetcher>(&mut self, fetcher: &F, regions: &mut ViewerRegions) {
        let result = manifest::load(fetcher).await;
        self.apply_manifest(result, regions);
    }

    /// Render the file list from a manifest result.
    pub fn apply_manifest(
        &mut self,
        result: Result<Vec<String>, ManifestProblem>,
        regions: &mut ViewerRegions,
    ) {
        match result {
            Ok(files) => {
                regions.file_list = FileList::Entries(
                    files
                        .iter()
                        .map(|filename| FileItem {
                            filename: filename.clone(),
                            active: false,
                        })
                        .collect(),
                );
                regions.set_header(Header::default_header());
                regions.clear_toc();
                self.documents = files;
                self.state = ViewerState::Listed;
                log::info!("[viewer] state=listed files={}", self.documents.len());
            }
            Err(problem) => {
                self.documents.clear();
                regions.file_list = FileList::NoFilesGuide;
                regions.show_error(manifest_error_message());
                self.state = ViewerState::Failed(Failure::Manifest);
                log::warn!("[viewer] state=failed reason=manifest problem=\"{problem}\"");
            }
        }
    }

    /// Start loading `filename`: mark it active and show the loading state.
    ///
    /// Returns `None` when the file is not in the list.
    pub fn begin_load(&mut self, filename: &str, regions: &mut ViewerRegions) -> Option<LoadTicket> {
        let index = self.documents.iter().position(|f| f == filename)?;
        if let FileList::Entries(items) = &mut regions.file_list {
            selection::mark_exclusive(items, index);
        }

        self.generation += 1;
        regions.clear_content();
        regions.set_header(Header::title(title_for(filename)));
        regions.show_loading();
        regions.clear_toc();

        self.state = ViewerState::Loading {
            generation: self.generation,
            filename: filename.to_owned(),
        };
        log::info!("[load] file={filename} generation={} outcome=started", self.generation);
        Some(LoadTicket {
            generation: self.generation,
            filename: filename.to_owned(),
        })
    }

    /// Apply a finished load. Returns `false` unless the viewer is still
    /// loading that exact selection, in which case the page is left untouched.
    pub fn complete_load(&mut self, outcome: LoadOutcome, regions: &mut ViewerRegions) -> bool {
        let awaited = matches!(
            &self.state,
            ViewerState::Loading { generation, filename }
                if *generation == outcome.generation && *filename == outcome.filename
        );
        if !awaited {
            log::debug!(
                "[load] file={} generation={} outcome=stale current={} showing={:?}",
                outcome.filename,
                outcome.generation,
                self.generation,
                self.current_document()
            );
            return false;
        }

        match outcome.result {
            Ok(document) => {
                regions.hide_loading();
                regions.append_markdown(document.html);
                let headings = document.outline.len();
                regions.set_toc(document.outline.into_entries());
                log::info!(
                    "[load] file={} generation={} outcome=rendered headings={headings}",
                    outcome.filename,
                    outcome.generation
                );
                self.state = ViewerState::Rendered {
                    filename: outcome.filename,
                };
            }
            Err(failure) => {
                regions.show_error(document_error_message(&outcome.filename));
                log::warn!(
                    "[load] file={} generation={} outcome=failed reason={failure}",
                    outcome.filename,
                    outcome.generation
                );
                self.state = ViewerState::Failed(Failure::Document {
                    filename: outcome.filename,
                });
            }
        }
        true
    }

    /// Mark an outline entry active and report where to scroll.
    ///
    /// The active file entry is not affected.
    pub fn activate_heading(
        &mut self,
        anchor_id: &str,
        regions: &mut ViewerRegions,
    ) -> Option<ScrollTarget> {
        let crate::page::Toc::Entries(items) = &mut regions.toc else {
            return None;
        };
        let index = items.iter().position(|i| i.entry.anchor_id == anchor_id)?;
        selection::mark_exclusive(items, index);
        log::debug!("[outline] active={anchor_id}");
        Some(ScrollTarget {
            anchor_id: anchor_id.to_owned(),
        })
    }

    /// File-list delegation: clicks on a `.file-item` start a load.
    pub fn handle_file_click(
        &mut self,
        click: &ClickEvent,
        regions: &mut ViewerRegions,
    ) -> Option<LoadTicket> {
        let filename = click.closest_class(FILE_ITEM_CLASS)?.data_value("file")?;
        self.begin_load(filename, regions)
    }

    /// Outline delegation: clicks on a `.toc-item` scroll to its heading.
    pub fn handle_outline_click(
        &mut self,
        click: &ClickEvent,
        regions: &mut ViewerRegions,
    ) -> Option<ScrollTarget> {
        let anchor_id = click.closest_class(TOC_ITEM_CLASS)?.data_value("id")?;
        self.activate_heading(anchor_id, regions)
    }

    /// Unbind the viewer's listeners.
    pub fn dispose(&mut self, listeners: &mut ListenerRegistry) {
        for id in self.listeners.drain(..) {
            listeners.dispose(id);
        }
    }
}

#[cfg(test)]
impl DocumentViewer {
    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Begin, fetch and complete a selection in one go.
    pub async fn select<F: Fetcher>(
        &mut self,
        fetcher: &F,
        filename: &str,
        regions: &mut ViewerRegions,
    ) -> bool {
        let Some(ticket) = self.begin_load(filename, regions) else {
            return false;
        };
        let outcome = ticket.run(fetcher).await;
        self.complete_load(outcome, regions)
    }
}
