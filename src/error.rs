//! Bridge errors
//!
//! Most accessors on [`Context`](crate::Context) report failure as an absent
//! result and leave the message in the context's exception record. The strict
//! entry points (`exec`, `try_resolve`, `try_call`) return these directly.

use crate::value::Kind;

/// Result type used throughout the bridge
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while talking to the script engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Script raised an exception; carries the engine's description of it.
    #[error("{0}")]
    Exception(String),

    /// The value's runtime tag does not match the requested host type.
    #[error("expected {expected}, found {found}")]
    Mismatch {
        /// Requested host type
        expected: &'static str,
        /// Runtime tag of the script value
        found: Kind,
    },

    /// A call argument could not be converted to a script value.
    #[error("failed to convert argument {index} to a script value: {reason}")]
    Marshal {
        /// Position of the offending argument
        index: usize,
        /// Why the conversion failed
        reason: String,
    },

    /// A function handle was used with a context other than its own.
    #[error("function belongs to context {owner}, not context {context}")]
    ForeignFunction {
        /// Context the function lives in
        owner: u64,
        /// Context it was used with
        context: u64,
    },

    /// Script invoked a native function whose host closure is gone.
    #[error("no host closure bound to `{0}`")]
    UnknownCallback(String),

    /// The JSON form of a value could not be decoded into the requested shape.
    #[error("failed to decode JSON: {0}")]
    Json(String),

    /// The context owning a handle has been destroyed.
    #[error("script context has been destroyed")]
    Detached,

    /// Invalid configuration document.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Engine failure outside of script execution.
    #[error("engine error: {0}")]
    Engine(String),
}

impl Error {
    /// Whether this error belongs in the exception record.
    ///
    /// Tag mismatches and decode failures are plain absence.
    pub fn is_recorded(&self) -> bool {
        !matches!(self, Error::Mismatch { .. } | Error::Json(_))
    }

    /// Re-number a marshal failure to the argument position it came from.
    pub(crate) fn at_argument(self, index: usize) -> Self {
        match self {
            Error::Marshal { reason, .. } => Error::Marshal { index, reason },
            other => other,
        }
    }
}
