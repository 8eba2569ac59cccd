//! Embedded static web assets.
//!
//! The stylesheet is compiled into the binary via `include_str!`, so nothing
//! besides the executable needs to be distributed.

/// Stylesheet for the viewer page. Dark and light palettes are keyed off the
/// root `data-theme` attribute.
pub const CSS: &str = include_str!("assets/shelf.css");
