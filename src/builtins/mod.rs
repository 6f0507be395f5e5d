//! Globals installed on every new context
//!
//! - `global`: read-only alias of the global object
//! - `print(...)`: writes each argument to the context's print sink
//! - `console.log`: same as `print`
//!
//! A global that cannot be installed is logged and skipped; the context is
//! still usable.

use std::sync::Arc;

use tracing::warn;

use crate::config::ContextOptions;
use crate::engine::Session;
use crate::error::Result;
use crate::runtime::{HostFunction, Scope};

/// Receives one line per `print` argument
pub type PrintSink = Arc<dyn Fn(&str) + Send + Sync>;

const CONSOLE_SETUP: &str = "console = {}; console.log = print;";

/// Sink writing to standard output
pub fn stdout_sink() -> PrintSink {
    Arc::new(|line| println!("{line}"))
}

pub(crate) fn install<S: Session>(
    session: &S,
    scope: &mut Scope<'_>,
    options: &ContextOptions,
    sink: &PrintSink,
) {
    if let Some(alias) = options.global_alias.as_deref() {
        if let Err(err) = session.define_global(alias, session.global_object()) {
            warn!(alias, "failed to install global alias: {err}");
        }
    }

    if options.console {
        if let Err(err) = install_print(session, scope, sink.clone()) {
            warn!("print failed to be created, console.log will not work: {err}");
        }
    }
}

fn install_print<S: Session>(session: &S, scope: &mut Scope<'_>, sink: PrintSink) -> Result<()> {
    let body: Arc<HostFunction> = Arc::new(move |args: &[String]| {
        for arg in args {
            sink(arg);
        }
        None
    });
    let print = scope.register(session, "print", body)?;
    session.define_global("print", session.pinned(print.pin_id())?)?;
    session.eval(CONSOLE_SETUP)?;
    Ok(())
}
