//! Expression resolver
//!
//! Turns a source string into a script value, first match wins:
//!
//! 1. a short property path (`name`, `a.b.c`) is looked up from the global
//!    object without evaluating anything;
//! 2. `(source)` is evaluated, so a bare object literal parses as an
//!    expression rather than a block;
//! 3. `source` is evaluated as written.
//!
//! Tiers 1 and 2 only answer with a defined value and swallow their failures.
//! Tier 3 answers with whatever the engine produces, `undefined` and raised
//! exceptions included. Later tiers re-run the source, so side effects of a
//! source that got past tier 2 happen twice.

use tracing::trace;

use crate::engine::Session;
use crate::error::Result;
use crate::util::{check_source, is_property_path, parenthesize, path_segments};
use crate::value::Kind;

/// Resolve `source` to a script value.
///
/// Sources shorter than `lookup_limit` bytes are candidates for the direct
/// lookup.
pub fn resolve<S: Session>(session: &S, source: &str, lookup_limit: usize) -> Result<S::Value> {
    check_source(source)?;

    if source.len() < lookup_limit && is_property_path(source) {
        if let Some(value) = lookup(session, source) {
            trace!(source, "resolved by global lookup");
            return Ok(value);
        }
    }

    match session.eval(&parenthesize(source)) {
        Ok(value) if session.kind(&value) != Kind::Undefined => {
            trace!(source, "resolved as expression");
            return Ok(value);
        }
        Ok(_) => trace!(source, "expression was undefined"),
        Err(err) => trace!(source, %err, "expression failed"),
    }

    trace!(source, "evaluating as script");
    session.eval(source)
}

/// Walk a property path from the global object. Only a defined value counts.
fn lookup<S: Session>(session: &S, path: &str) -> Option<S::Value> {
    let mut segments = path_segments(path);
    let mut value = session.get_global(segments.next()?).ok()?;
    for segment in segments {
        if !session.kind(&value).is_object_like() {
            return None;
        }
        value = session.get_property(&value, segment).ok()?;
    }
    (session.kind(&value) != Kind::Undefined).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContextOptions, DEFAULT_LOOKUP_LIMIT};
    use crate::engine::{Backend, QuickJs};
    use crate::error::Error;

    fn engine(setup: &str) -> QuickJs {
        let js = QuickJs::create(&ContextOptions::default()).unwrap();
        js.enter(|s| s.eval(setup).map(|_| ())).unwrap();
        js
    }

    fn resolve_text(js: &QuickJs, source: &str) -> Result<String> {
        js.enter(|s| {
            let value = resolve(s, source, DEFAULT_LOOKUP_LIMIT)?;
            match s.json_stringify(&value)? {
                Some(json) => Ok(json),
                None => s.to_text(&value),
            }
        })
    }

    #[test]
    fn test_global_lookup() {
        let js = engine("var config = { server: { port: 8080 } };");
        assert_eq!(resolve_text(&js, "config.server.port").unwrap(), "8080");
        assert_eq!(resolve_text(&js, " config . server ").unwrap(), r#"{"port":8080}"#);
    }

    #[test]
    fn test_lookup_does_not_evaluate() {
        // a getter on a lookup path runs once; evaluation would run it again
        let js = engine(
            "var hits = 0; var probe = {}; \
             Object.defineProperty(probe, 'value', { get: function () { hits++; return 7; } });",
        );
        assert_eq!(resolve_text(&js, "probe.value").unwrap(), "7");
        assert_eq!(resolve_text(&js, "hits").unwrap(), "1");
    }

    #[test]
    fn test_missing_path_falls_through() {
        let js = engine("var a = 1;");
        // `a.b` is undefined: every tier answers undefined
        assert_eq!(resolve_text(&js, "a.b").unwrap(), "undefined");
        // lookup through a primitive is skipped, evaluation still works
        assert_eq!(resolve_text(&js, "a.constructor.name").unwrap(), r#""Number""#);
    }

    #[test]
    fn test_object_literal() {
        let js = engine("");
        assert_eq!(resolve_text(&js, "{  a  :  1}").unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn test_statement_source() {
        let js = engine("");
        // not an expression: tier 2 fails, tier 3 evaluates the statements
        assert_eq!(resolve_text(&js, " `Hello World`; ").unwrap(), r#""Hello World""#);
        assert_eq!(resolve_text(&js, "var y = 3; y * 2").unwrap(), "6");
    }

    #[test]
    fn test_exception() {
        let js = engine("");
        let err = resolve_text(&js, "x.hello()").unwrap_err();
        match err {
            Error::Exception(text) => {
                assert!(text.starts_with("ReferenceError"), "{text}");
                assert!(text.contains("is not defined") && text.contains('x'), "{text}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_lookup_limit() {
        let js = engine("var abc = 1;");
        let value = js.enter(|s| {
            let value = resolve(s, "abc", 2).unwrap();
            s.to_number(&value)
        });
        assert_eq!(value, Some(1.0));
    }

    #[test]
    fn test_nul_rejected() {
        let js = engine("");
        assert!(matches!(resolve_text(&js, "1\0"), Err(Error::Marshal { .. })));
    }
}
