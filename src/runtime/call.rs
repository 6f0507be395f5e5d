//! Native call dispatch
//!
//! The engine invokes [`trampoline`] for every call of a native callable. It
//! runs on the thread that holds the context lock, inside that thread's
//! session.

use tracing::{trace, warn};

use super::Binding;
use crate::engine::Session;
use crate::error::Error;
use crate::marshal;
use crate::util::UNDEFINED_TEXT;

/// Dispatch one script call to the closure behind `binding`.
///
/// Every argument is passed as its string form. A released binding, a
/// closure returning nothing or a return value that cannot be converted all
/// give the script `undefined`.
pub fn trampoline<S: Session>(session: &S, binding: &Binding, args: &[S::Value]) -> S::Value {
    let Some(body) = binding.body() else {
        let err = Error::UnknownCallback(binding.name().to_owned());
        warn!(context = binding.context(), "{err}");
        return session.undefined();
    };

    let texts: Vec<String> = args
        .iter()
        .map(|arg| {
            session
                .to_text(arg)
                .unwrap_or_else(|_| UNDEFINED_TEXT.to_owned())
        })
        .collect();
    trace!(function = binding.name(), argc = texts.len(), "native call");

    let Some(result) = body(&texts) else {
        return session.undefined();
    };
    match marshal::to_script(session, binding.context(), &result) {
        Ok(value) => value,
        Err(err) => {
            warn!(function = binding.name(), "dropping native return value: {err}");
            session.undefined()
        }
    }
}
