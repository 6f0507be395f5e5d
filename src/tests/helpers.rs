//! Test helpers
//!
//! Contexts with their print output captured instead of written to stdout.

use std::sync::{Arc, Mutex};

use crate::Context;

/// Lines written through `print` / `console.log`
pub type Printed = Arc<Mutex<Vec<String>>>;

/// A context whose print output is kept in memory
pub fn capture_context() -> (Context, Printed) {
    let printed: Printed = Arc::default();
    let sink = printed.clone();
    let ctx = Context::builder()
        .on_print(move |line| sink.lock().unwrap().push(line.to_owned()))
        .build()
        .expect("context creation failed");
    (ctx, printed)
}

/// A context that discards print output
pub fn quiet_context() -> Context {
    Context::builder()
        .on_print(|_| {})
        .build()
        .expect("context creation failed")
}
