//! Exception record
//!
//! One optional message per context. Every engine-touching entry point clears
//! it before calling into the engine and writes it when the engine reports a
//! failure. It is a side channel read after an absent result, not a Rust error.

use crate::error::{Error, Result};

/// Stored when the engine's exception cannot be turned into text
pub const UNKNOWN_EXCEPTION: &str = "Unknown Exception";

/// Last failure message surfaced by the engine
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExceptionRecord {
    message: Option<String>,
}

impl ExceptionRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the previous failure
    pub fn clear(&mut self) {
        self.message = None;
    }

    /// Current message, if the last operation failed
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Store the description of `error` if it is a recordable failure
    pub fn record(&mut self, error: &Error) {
        if error.is_recorded() {
            let message = match error {
                Error::Exception(text) => text.clone(),
                other => other.to_string(),
            };
            self.message = Some(message);
        }
    }

    /// Record a failed result and turn it into absence
    pub fn capture<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.record(&error);
                None
            }
        }
    }
}
