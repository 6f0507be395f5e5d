//! Exception record behaviour

use super::helpers::quiet_context;
use crate::Error;

#[test]
fn test_exception_capture() {
    let ctx = quiet_context();
    assert_eq!(ctx.resolve::<String>("x.hello()"), None);
    let message = ctx.exception().unwrap();
    assert!(message.starts_with("ReferenceError"), "{message}");
    assert!(message.contains("is not defined") && message.contains('x'), "{message}");

    // a successful resolve clears the previous record
    assert_eq!(ctx.resolve::<i64>("1 + 1"), Some(2));
    assert!(ctx.exception().is_none());
}

#[test]
fn test_context_survives_exceptions() {
    let ctx = quiet_context();
    for _ in 0..3 {
        assert!(ctx.eval("throw new Error('again')").is_none());
        assert_eq!(ctx.exception().as_deref(), Some("Error: again"));
    }
    assert_eq!(ctx.resolve::<i64>("6 * 7"), Some(42));
}

#[test]
fn test_thrown_values() {
    let ctx = quiet_context();
    assert!(ctx.eval("throw 'plain'").is_none());
    assert_eq!(ctx.exception().as_deref(), Some("plain"));

    assert!(ctx.eval("throw 42").is_none());
    assert_eq!(ctx.exception().as_deref(), Some("42"));
}

#[test]
fn test_unknown_exception() {
    let ctx = quiet_context();
    assert!(ctx.eval("throw { toString: function () { throw 1; } }").is_none());
    assert_eq!(ctx.exception().as_deref(), Some("Unknown Exception"));
}

#[test]
fn test_syntax_error() {
    let ctx = quiet_context();
    let err = ctx.exec("var = ;").unwrap_err();
    match err {
        Error::Exception(text) => assert!(text.starts_with("SyntaxError"), "{text}"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_strict_resolve() {
    let ctx = quiet_context();
    assert!(matches!(
        ctx.try_resolve::<i64>("missing.value"),
        Err(Error::Exception(_))
    ));
    assert_eq!(
        ctx.try_resolve::<i64>("'text'"),
        Err(Error::Mismatch {
            expected: "integer",
            found: crate::Kind::String
        })
    );
    assert!(ctx.exception().is_none());
}

#[test]
fn test_nul_in_source() {
    let ctx = quiet_context();
    assert!(ctx.eval("var a = 1;\0 a = 2;").is_none());
    assert!(ctx.exception().unwrap().contains("NUL"));
    assert_eq!(ctx.resolve::<i64>("typeof a === 'undefined' ? 0 : a"), Some(0));
}

#[test]
fn test_garbage_collect_keeps_record() {
    let ctx = quiet_context();
    assert!(ctx.eval("undefinedName").is_none());
    ctx.garbage_collect();
    assert!(ctx.exception().is_some());
}
