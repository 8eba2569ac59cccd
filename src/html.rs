//! Markdown → HTML conversion.
//!
//! Converts markdown text to HTML using comrak with GFM extensions. Headings
//! are collected from the same AST that produces the HTML, so the outline is
//! derived from the document structure rather than from the rendered markup.

use comrak::{
    arena_tree::NodeEdge,
    format_html,
    nodes::{AstNode, NodeValue},
    parse_document, Arena, Options,
};

use crate::outline::{self, Outline};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A heading as it appears in the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceHeading {
    /// Heading level (1–6).
    pub level: u8,
    /// Text content of the heading, untrimmed.
    pub text: String,
}

/// Output of the conversion collaborator: plain HTML plus heading structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted {
    pub html: String,
    pub headings: Vec<SourceHeading>,
}

/// A document ready for display: HTML whose headings carry their outline
/// anchors, and the outline itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub html: String,
    pub outline: Outline,
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Build comrak render options with GFM extensions and secure defaults.
///
/// Raw HTML from input is stripped and replaced with
/// `<!-- raw HTML omitted -->`. Anchor assignment relies on this: no bare
/// `<hN>` tag can reach the output except from a markdown heading.
fn make_options() -> Options<'static> {
    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.render.unsafe_ = false;
    options
}

/// Collect the text a browser would report as the heading's `textContent`.
///
/// Images and omitted raw HTML contribute nothing; line breaks contribute a
/// newline, as they do in the rendered markup.
fn collect_heading_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    for child in node.children() {
        match &child.data.borrow().value {
            NodeValue::Text(s) => text.push_str(s),
            NodeValue::Code(c) => text.push_str(&c.literal),
            NodeValue::SoftBreak | NodeValue::LineBreak => text.push('\n'),
            NodeValue::Image(_) | NodeValue::HtmlInline(_) => {}
            _ => text.push_str(&collect_heading_text(child)),
        }
    }
    text
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Minimal HTML entity escaping for text content and attribute values.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Convert markdown to HTML and list its headings in document order.
///
/// Pure: no state, no I/O.
pub fn convert(input: &str) -> Converted {
    let arena = Arena::new();
    let options = make_options();
    let root = parse_document(&arena, input, &options);

    let mut headings = Vec::new();
    for edge in root.traverse() {
        if let NodeEdge::Start(node) = edge {
            if let NodeValue::Heading(nh) = &node.data.borrow().value {
                headings.push(SourceHeading {
                    level: nh.level,
                    text: collect_heading_text(node),
                });
            }
        }
    }

    let mut html_bytes = Vec::new();
    if let Err(e) = format_html(root, &options, &mut html_bytes) {
        log::error!("[convert] html formatting failed: {e}");
        html_bytes.clear();
    }
    let html = String::from_utf8_lossy(&html_bytes).into_owned();

    Converted { html, headings }
}

/// Convert markdown and attach outline anchors to its headings.
pub fn render(input: &str) -> RenderedDocument {
    let converted = convert(input);
    let outline = outline::build(&converted.headings);
    let html = outline::assign_anchor_ids(&converted.html, &outline);
    RenderedDocument { html, outline }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn html(input: &str) -> String {
        convert(input).html
    }

    #[test]
    fn paragraph_renders() {
        assert!(html("hello world\n").contains("<p>"), "expected <p> tag");
    }

    #[test]
    fn emphasis_and_strong_render() {
        let out = html("*a* **b**\n");
        assert!(out.contains("<em>"), "expected <em>, got: {out}");
        assert!(out.contains("<strong>"), "expected <strong>, got: {out}");
    }

    #[test]
    fn gfm_table_renders() {
        let out = html("| A | B |\n|---|---|\n| 1 | 2 |\n");
        assert!(out.contains("<table>"), "expected <table>");
        assert!(out.contains("<td>"), "expected <td>");
    }

    #[test]
    fn task_list_renders() {
        let out = html("- [ ] todo\n- [x] done\n");
        assert!(
            out.contains("<input") && out.contains("checkbox"),
            "expected checkbox input, got: {out}"
        );
    }

    #[test]
    fn strikethrough_renders() {
        assert!(html("~~gone~~\n").contains("<del>"));
    }

    #[test]
    fn autolink_renders() {
        let out = html("https://example.com\n");
        assert!(out.contains("<a ") && out.contains("https://example.com"));
    }

    #[test]
    fn script_tag_stripped_from_output() {
        let out = html("<script>alert(1)</script>\n");
        assert!(!out.contains("<script>"), "raw script must not pass through");
    }

    #[test]
    fn headings_extracted_in_order_across_levels() {
        let converted = convert("# One\n\ntext\n\n### Three\n\n## Two\n");
        let levels: Vec<u8> = converted.headings.iter().map(|h| h.level).collect();
        let texts: Vec<&str> = converted.headings.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(levels, vec![1, 3, 2]);
        assert_eq!(texts, vec!["One", "Three", "Two"]);
    }

    #[test]
    fn heading_text_flattens_inline_markup() {
        let converted = convert("## Use `cargo` **now**\n");
        assert_eq!(converted.headings[0].text, "Use cargo now");
    }

    #[test]
    fn heading_text_skips_image_alt() {
        let converted = convert("## Logo ![alt text](logo.png)\n");
        assert_eq!(converted.headings[0].text, "Logo ");
    }

    #[test]
    fn setext_headings_are_collected() {
        let converted = convert("Title\n=====\n\nSub\n---\n");
        assert_eq!(converted.headings.len(), 2);
        assert_eq!(converted.headings[0].level, 1);
        assert_eq!(converted.headings[1].level, 2);
    }

    #[test]
    fn heading_markers_in_code_blocks_are_ignored() {
        let converted = convert("```\n# not a heading\n```\n\n# Real\n");
        assert_eq!(converted.headings.len(), 1);
        assert_eq!(converted.headings[0].text, "Real");
    }

    #[test]
    fn render_injects_anchor_ids() {
        let doc = render("## Intro\n\n### Details\n");
        assert!(doc.html.contains("<h2 id=\"heading-0-intro\">Intro</h2>"), "{}", doc.html);
        assert!(doc.html.contains("<h3 id=\"heading-1-details\">Details</h3>"), "{}", doc.html);
        assert_eq!(doc.outline.len(), 2);
    }

    #[test]
    fn render_with_html_heading_in_code_keeps_real_heading_ids() {
        let doc = render("```html\n<h2>fake</h2>\n```\n\n## Real\n");
        assert!(doc.html.contains("&lt;h2&gt;fake"), "{}", doc.html);
        assert!(doc.html.contains("<h2 id=\"heading-0-real\">Real</h2>"), "{}", doc.html);
    }

    #[test]
    fn render_without_headings_has_empty_outline() {
        let doc = render("just a paragraph\n");
        assert!(doc.outline.is_empty());
    }

    #[test]
    fn render_is_stable_across_calls() {
        let input = "# Title\n\n## Section\n\n## Section\n";
        assert_eq!(render(input), render(input));
    }

    #[test]
    fn html_escape_handles_special_chars() {
        assert_eq!(html_escape("<>&\"'"), "&lt;&gt;&amp;&quot;&#39;");
    }
}
