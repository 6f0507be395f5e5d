//! jsbridge - embed a JavaScript engine behind a small, thread-safe facade
//!
//! A [`Context`] evaluates script source, resolves expressions into host
//! types, calls script functions with host arguments and exposes host
//! closures to script as ordinary functions.
//!
//! # Features
//! - Three-tier expression resolution: global lookup, expression, script
//! - Conversions to text, integers, floats, booleans, functions, JSON text,
//!   `serde` types and `chrono` dates
//! - Host closures callable from script, with arguments passed as text
//! - One lock per context; independent contexts run in parallel
//! - Engine backends behind the [`Backend`] and [`Session`] traits
//!
//! # Example
//! ```
//! use jsbridge::{Context, HostValue, ScriptFunction};
//!
//! let ctx = Context::new().unwrap();
//! let shout = ctx
//!     .new_function("shout", |args| Some(HostValue::from(args.join(" ").to_uppercase())))
//!     .unwrap();
//! ctx.set_global("shout", &shout).unwrap();
//!
//! let greet: ScriptFunction = ctx
//!     .resolve("(function (name) { return shout('hello', name); })")
//!     .unwrap();
//! let text: Option<String> = ctx.call(&greet, &["world".into()]);
//! assert_eq!(text.as_deref(), Some("HELLO WORLD"));
//! ```

// Public facade
pub mod context;
pub mod config;
pub mod error;
pub mod value;

// Engine backends
pub mod engine;

// Native function bridge
pub mod runtime;

// Conversions and resolution
pub mod marshal;
pub mod resolver;
pub mod exception;

// Pinning
pub mod gc;

// Globals installed on every context
pub mod builtins;

// Utilities
pub mod util;

#[cfg(test)]
mod tests;

// Re-export main types
pub use config::ContextOptions;
pub use context::{Context, ContextBuilder};
pub use engine::{Backend, QuickJs, Session};
pub use error::{Error, Result};
pub use marshal::{Decoded, FromScript, Json};
pub use runtime::{HostFunction, ScriptFunction};
pub use value::{HostValue, Kind};
