//! Context configuration
//!
//! Only limits the engine itself offers are exposed; the bridge adds no
//! sandboxing of its own.

use serde::Deserialize;

use crate::error::{Error, Result};

/// Default bound on the length of a source string that is tried as a direct
/// global lookup before being evaluated.
pub const DEFAULT_LOOKUP_LIMIT: usize = 128;

/// Options applied when a context is created
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ContextOptions {
    /// Heap limit for the engine runtime, in bytes.
    pub memory_limit: Option<usize>,
    /// Native stack limit for script execution, in bytes.
    pub max_stack_size: Option<usize>,
    /// Allocation threshold that triggers an automatic collector pass.
    pub gc_threshold: Option<usize>,
    /// Sources shorter than this are first tried as a global property path.
    pub resolve_lookup_limit: usize,
    /// Name of the read-only alias for the global object. `None` disables it.
    pub global_alias: Option<String>,
    /// Install `print` and `console.log`.
    pub console: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            memory_limit: None,
            max_stack_size: None,
            gc_threshold: None,
            resolve_lookup_limit: DEFAULT_LOOKUP_LIMIT,
            global_alias: Some("global".to_string()),
            console: true,
        }
    }
}

impl ContextOptions {
    /// Parse options from a TOML document. Missing keys keep their defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| Error::Config(err.to_string()))
    }
}
