//! Source text helpers
//!
//! Small checks applied to script source before it reaches the engine.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Text used for a value that has no string form
pub const UNDEFINED_TEXT: &str = "undefined";

static PROPERTY_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[A-Za-z_$][A-Za-z0-9_$]*(?:\s*\.\s*[A-Za-z_$][A-Za-z0-9_$]*)*\s*$")
        .expect("property path pattern is valid")
});

/// Whether `source` looks like `name` or `name.name.name`
pub fn is_property_path(source: &str) -> bool {
    PROPERTY_PATH.is_match(source)
}

/// Split a property path into trimmed segments
pub fn path_segments(source: &str) -> impl Iterator<Item = &str> {
    source.split('.').map(str::trim)
}

/// Reject source the engine would silently truncate.
///
/// The engine entry point takes a length but scans for a terminator, and the
/// backend copies the source into an owned, NUL-terminated buffer before
/// handing it over. An interior NUL would end the script early.
pub fn check_source(source: &str) -> Result<()> {
    match source.find('\0') {
        Some(offset) => Err(Error::Marshal {
            index: 0,
            reason: format!("source contains a NUL byte at offset {offset}"),
        }),
        None => Ok(()),
    }
}

/// Force expression-context parsing: `{a: 1}` would otherwise be a block
pub fn parenthesize(source: &str) -> String {
    let mut wrapped = String::with_capacity(source.len() + 2);
    wrapped.push('(');
    wrapped.push_str(source);
    wrapped.push(')');
    wrapped
}
