//! Retained model of the viewer page.
//!
//! The page is split into disjoint regions: the root (theme attribute and
//! icons) belongs to the theme controller, everything else to the document
//! viewer. [`crate::shell`] turns the model into HTML.

use crate::outline::OutlineEntry;
use crate::selection::Mark;
use crate::theme::Preference;

// Element ids.
pub const FILE_LIST_ID: &str = "file-list";
pub const CONTENT_ID: &str = "content";
pub const TOC_ID: &str = "toc";
pub const THEME_TOGGLE_ID: &str = "theme-toggle";

// Class names.
pub const FILE_ITEM_CLASS: &str = "file-item";
pub const TOC_ITEM_CLASS: &str = "toc-item";
pub const THEME_ICON_CLASS: &str = "theme-icon";
pub const LOADING_CLASS: &str = "loading";
pub const ERROR_CLASS: &str = "error";
pub const CONTENT_HEADER_CLASS: &str = "content-header";
pub const MARKDOWN_CONTENT_CLASS: &str = "markdown-content";
pub const NO_CONTENT_CLASS: &str = "no-content";
pub const ACTIVE_CLASS: &str = "active";

pub const DEFAULT_TITLE: &str = "Markdown File Reader";
pub const DEFAULT_SUBTITLE: &str = "Click on any file to view its content";
pub const LOADING_TEXT: &str = "Loading markdown file...";
pub const NO_HEADINGS_TEXT: &str = "No headings found";

/// The whole page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub root: RootRegion,
    pub viewer: ViewerRegions,
}

impl Page {
    /// A freshly loaded page: no theme applied, one theme icon inside the
    /// toggle control, empty viewer regions.
    pub fn new() -> Self {
        Self {
            root: RootRegion {
                theme: None,
                theme_icons: vec![String::new()],
            },
            viewer: ViewerRegions::new(),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Root region
// ---------------------------------------------------------------------------

/// The page-wide `data-theme` attribute and every `.theme-icon` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootRegion {
    pub theme: Option<Preference>,
    pub theme_icons: Vec<String>,
}

// ---------------------------------------------------------------------------
// Viewer regions
// ---------------------------------------------------------------------------

/// Contents of `#file-list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileList {
    Empty,
    Entries(Vec<FileItem>),
    /// Instructions for creating a manifest, shown when none could be loaded.
    NoFilesGuide,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileItem {
    pub filename: String,
    pub active: bool,
}

impl Mark for FileItem {
    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

/// The `.content-header` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub title: String,
    pub subtitle: Option<String>,
}

impl Header {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
        }
    }

    pub fn default_header() -> Self {
        Self {
            title: DEFAULT_TITLE.to_owned(),
            subtitle: Some(DEFAULT_SUBTITLE.to_owned()),
        }
    }
}

/// One child of `#content`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentNode {
    Header(Header),
    Loading,
    /// Converted document HTML, wrapped in `.markdown-content`.
    Markdown(String),
    Error(String),
}

/// Contents of `#toc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toc {
    /// The neutral "No headings found" placeholder.
    Placeholder,
    Entries(Vec<TocItem>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocItem {
    pub entry: OutlineEntry,
    pub active: bool,
}

impl Mark for TocItem {
    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

/// `#file-list`, `#content` and `#toc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerRegions {
    pub file_list: FileList,
    pub content: Vec<ContentNode>,
    pub toc: Toc,
}

impl ViewerRegions {
    pub fn new() -> Self {
        Self {
            file_list: FileList::Empty,
            content: Vec::new(),
            toc: Toc::Placeholder,
        }
    }

    pub fn clear_content(&mut self) {
        self.content.clear();
    }

    /// Replace the existing header in place, or append one if there is none.
    pub fn set_header(&mut self, header: Header) {
        match self
            .content
            .iter_mut()
            .find(|node| matches!(node, ContentNode::Header(_)))
        {
            Some(existing) => *existing = ContentNode::Header(header),
            None => self.content.push(ContentNode::Header(header)),
        }
    }

    pub fn show_loading(&mut self) {
        self.content.push(ContentNode::Loading);
    }

    pub fn hide_loading(&mut self) {
        self.content.retain(|node| !matches!(node, ContentNode::Loading));
    }

    pub fn append_markdown(&mut self, html: String) {
        self.content.push(ContentNode::Markdown(html));
    }

    /// Replace the content with the default header and an error panel, and
    /// reset the outline.
    pub fn show_error(&mut self, message: impl Into<String>) {
        self.clear_content();
        self.set_header(Header::default_header());
        self.content.push(ContentNode::Error(message.into()));
        self.clear_toc();
    }

    pub fn clear_toc(&mut self) {
        self.toc = Toc::Placeholder;
    }

    pub fn set_toc(&mut self, entries: Vec<OutlineEntry>) {
        if entries.is_empty() {
            self.clear_toc();
            return;
        }
        self.toc = Toc::Entries(
            entries
                .into_iter()
                .map(|entry| TocItem {
                    entry,
                    active: false,
                })
                .collect(),
        );
    }

    // --- queries ---

    pub fn header(&self) -> Option<&Header> {
        self.content.iter().find_map(|node| match node {
            ContentNode::Header(h) => Some(h),
            _ => None,
        })
    }
}

#[cfg(test)]
impl ViewerRegions {
    pub fn is_loading(&self) -> bool {
        self.content
            .iter()
            .any(|node| matches!(node, ContentNode::Loading))
    }

    pub fn markdown(&self) -> Option<&str> {
        self.content.iter().find_map(|node| match node {
            ContentNode::Markdown(html) => Some(html.as_str()),
            _ => None,
        })
    }

    pub fn error(&self) -> Option<&str> {
        self.content.iter().find_map(|node| match node {
            ContentNode::Error(msg) => Some(msg.as_str()),
            _ => None,
        })
    }

    pub fn file_items(&self) -> &[FileItem] {
        match &self.file_list {
            FileList::Entries(items) => items,
            FileList::Empty | FileList::NoFilesGuide => &[],
        }
    }

    pub fn toc_items(&self) -> &[TocItem] {
        match &self.toc {
            Toc::Entries(items) => items,
            Toc::Placeholder => &[],
        }
    }

    pub fn active_file(&self) -> Option<&str> {
        let items = self.file_items();
        crate::selection::active_index(items).map(|i| items[i].filename.as_str())
    }

    pub fn active_heading(&self) -> Option<&str> {
        let items = self.toc_items();
        crate::selection::active_index(items).map(|i| items[i].entry.anchor_id.as_str())
    }
}

impl Default for ViewerRegions {
    fn default() -> Self {
        Self::new()
    }
}
