//! HTML rendering of the page model.
//!
//! Every interactive element is a plain link to `/click?...`, so the page
//! works without any client-side script.

use crate::html::html_escape;
use crate::manifest::{DOCUMENT_DIR, EXAMPLE_MANIFEST, MANIFEST_PATH};
use crate::page::{
    ContentNode, FileList, Header, Page, Toc, ACTIVE_CLASS, CONTENT_HEADER_CLASS, CONTENT_ID,
    ERROR_CLASS, FILE_ITEM_CLASS, FILE_LIST_ID, LOADING_CLASS, LOADING_TEXT,
    MARKDOWN_CONTENT_CLASS, NO_CONTENT_CLASS, NO_HEADINGS_TEXT, THEME_ICON_CLASS,
    THEME_TOGGLE_ID, TOC_ID, TOC_ITEM_CLASS,
};

/// Percent-encode a query parameter value. Only RFC 3986 unreserved
/// characters pass through.
pub fn query_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

fn class_list(base: &str, active: bool) -> String {
    if active {
        format!("{base} {ACTIVE_CLASS}")
    } else {
        base.to_owned()
    }
}

fn render_file_list(list: &FileList) -> String {
    match list {
        FileList::Empty => String::new(),
        FileList::Entries(items) => {
            let mut html = String::new();
            for item in items {
                let name = html_escape(&item.filename);
                html.push_str(&format!(
                    "<a class=\"{}\" href=\"/click?file={}\" data-file=\"{name}\">{name}</a>\n",
                    class_list(FILE_ITEM_CLASS, item.active),
                    query_escape(&item.filename),
                ));
            }
            html
        }
        FileList::NoFilesGuide => format!(
            "<div class=\"{ERROR_CLASS}\">\n\
<h3>No Markdown Files Found</h3>\n\
<p>To use this application:</p>\n\
<ol>\n\
<li>Place your .md files in the <code>{DOCUMENT_DIR}/</code> folder</li>\n\
<li>Create a <code>{MANIFEST_PATH}</code> file listing your files</li>\n\
</ol>\n\
<p><small>Example manifest.json:</small></p>\n\
<pre>{}</pre>\n\
</div>\n",
            html_escape(EXAMPLE_MANIFEST)
        ),
    }
}

fn render_header(header: &Header) -> String {
    let subtitle = header
        .subtitle
        .as_deref()
        .map(|s| format!("<p>{}</p>\n", html_escape(s)))
        .unwrap_or_default();
    format!(
        "<div class=\"{CONTENT_HEADER_CLASS}\">\n<h1>{}</h1>\n{subtitle}</div>\n",
        html_escape(&header.title)
    )
}

fn render_content(nodes: &[ContentNode]) -> String {
    let mut html = String::new();
    for node in nodes {
        match node {
            ContentNode::Header(header) => html.push_str(&render_header(header)),
            ContentNode::Loading => html.push_str(&format!(
                "<div class=\"{LOADING_CLASS}\">{LOADING_TEXT}</div>\n"
            )),
            // Already HTML; the converter never passes raw HTML through.
            ContentNode::Markdown(body) => html.push_str(&format!(
                "<div class=\"{MARKDOWN_CONTENT_CLASS}\">\n{body}</div>\n"
            )),
            ContentNode::Error(message) => html.push_str(&format!(
                "<div class=\"{ERROR_CLASS}\">\n<h3>Error</h3>\n<p>{}</p>\n</div>\n",
                html_escape(message)
            )),
        }
    }
    html
}

fn render_toc(toc: &Toc) -> String {
    match toc {
        Toc::Placeholder => format!("<p class=\"{NO_CONTENT_CLASS}\">{NO_HEADINGS_TEXT}</p>\n"),
        Toc::Entries(items) => {
            let mut html = String::new();
            for item in items {
                let base = format!("{TOC_ITEM_CLASS} toc-h{}", item.entry.level);
                let anchor = html_escape(&item.entry.anchor_id);
                html.push_str(&format!(
                    "<a class=\"{}\" href=\"/click?heading={}\" data-id=\"{anchor}\">{}</a>\n",
                    class_list(&base, item.active),
                    query_escape(&item.entry.anchor_id),
                    html_escape(&item.entry.text),
                ));
            }
            html
        }
    }
}

/// The complete HTML document for the current page state.
pub fn render_page(page: &Page) -> String {
    let theme_attr = page
        .root
        .theme
        .map(|t| format!(" data-theme=\"{}\"", t.as_str()))
        .unwrap_or_default();
    let icons: String = page
        .root
        .theme_icons
        .iter()
        .map(|glyph| format!("<span class=\"{THEME_ICON_CLASS}\">{}</span>", html_escape(glyph)))
        .collect();

    let title = page
        .viewer
        .header()
        .map(|h| h.title.as_str())
        .unwrap_or(crate::page::DEFAULT_TITLE);

    format!(
        "<!DOCTYPE html>\n\
<html lang=\"en\"{theme_attr}>\n\
<head>\n\
<meta charset=\"utf-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
<title>{} · mdshelf</title>\n\
<link rel=\"stylesheet\" href=\"/assets/shelf.css\">\n\
</head>\n\
<body>\n\
<a id=\"{THEME_TOGGLE_ID}\" class=\"theme-toggle\" href=\"/click?id={THEME_TOGGLE_ID}\" aria-label=\"Toggle theme\">{icons}</a>\n\
<div class=\"layout\">\n\
<nav id=\"{FILE_LIST_ID}\">\n\
{}</nav>\n\
<main id=\"{CONTENT_ID}\">\n\
{}</main>\n\
<aside id=\"{TOC_ID}\">\n\
{}</aside>\n\
</div>\n\
</body>\n\
</html>\n",
        html_escape(title),
        render_file_list(&page.viewer.file_list),
        render_content(&page.viewer.content),
        render_toc(&page.viewer.toc),
    )
}
